//! # Quote Lifecycle
//!
//! A quote freezes cart prices for [`QUOTE_VALIDITY_DAYS`] and converts into
//! at most one Order.
//!
//! Status is never stored. [`current_status`] derives it from the conversion
//! link and the clock, and it is the only function that does so.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{compute_totals, Totals};
use crate::order::Order;
use crate::types::{Delivery, Holder, LineItem, LineItemInput};
use crate::validation::{validate_delivery, validate_holder, validate_line_items};
use crate::{new_id, QUOTE_VALIDITY_DAYS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Active,
    Expired,
    Converted,
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuoteStatus::Active => "active",
            QuoteStatus::Expired => "expired",
            QuoteStatus::Converted => "converted",
        };
        f.write_str(s)
    }
}

/// A price-locked, time-boxed proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quote {
    id: String,
    /// Secret for anonymous retrieval; never derived from the id.
    access_token: String,
    holder: Holder,
    items: Vec<LineItem>,
    totals: Totals,
    #[ts(as = "String")]
    created_at: DateTime<Utc>,
    #[ts(as = "String")]
    expires_at: DateTime<Utc>,
    converted_order_id: Option<String>,
}

/// Converted if an order exists, else expired once `now > expires_at`.
pub fn current_status(quote: &Quote, now: DateTime<Utc>) -> QuoteStatus {
    if quote.converted_order_id.is_some() {
        QuoteStatus::Converted
    } else if now > quote.expires_at {
        QuoteStatus::Expired
    } else {
        QuoteStatus::Active
    }
}

/// 32 lowercase hex chars from a fresh random UUID.
fn generate_access_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl Quote {
    /// Saves a quote with prices snapshotted as of `now`.
    pub fn create(holder: Holder, lines: &[LineItemInput], now: DateTime<Utc>) -> CoreResult<Self> {
        validate_holder(&holder)?;
        validate_line_items(lines)?;

        let items: Vec<LineItem> = lines.iter().map(LineItem::snapshot).collect();
        let totals = compute_totals(&items);

        Ok(Quote {
            id: new_id(),
            access_token: generate_access_token(),
            holder,
            items,
            totals,
            created_at: now,
            expires_at: now + Duration::days(QUOTE_VALIDITY_DAYS),
            converted_order_id: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn holder(&self) -> &Holder {
        &self.holder
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn converted_order_id(&self) -> Option<&str> {
        self.converted_order_id.as_deref()
    }

    pub fn status(&self, now: DateTime<Utc>) -> QuoteStatus {
        current_status(self, now)
    }

    /// Turns the quote into a `pending_payment` order with the frozen lines.
    ///
    /// One-shot: the quote is marked converted and a second call fails with
    /// `AlreadyConverted`.
    pub fn convert(&mut self, delivery: Delivery, now: DateTime<Utc>) -> CoreResult<Order> {
        match current_status(self, now) {
            QuoteStatus::Converted => {
                return Err(CoreError::AlreadyConverted {
                    quote_id: self.id.clone(),
                    order_id: self.converted_order_id.clone().unwrap_or_default(),
                });
            }
            QuoteStatus::Expired => {
                return Err(CoreError::Expired {
                    quote_id: self.id.clone(),
                });
            }
            QuoteStatus::Active => {}
        }
        validate_delivery(&delivery)?;

        let order = Order::from_quote(
            &self.id,
            self.holder.clone(),
            self.items.clone(),
            delivery,
            now,
        );
        self.converted_order_id = Some(order.id().to_string());
        Ok(order)
    }
}
