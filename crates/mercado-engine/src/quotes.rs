//! # Quote Service
//!
//! Create, read and convert quotes. Conversion is one-shot: concurrent
//! calls on the same quote yield one order and one `AlreadyConverted`.

use serde::Serialize;
use tracing::info;

use mercado_core::{
    current_status, CoreError, Delivery, Holder, LineItemInput, Order, Quote, QuoteStatus,
    StatusChange,
};
use mercado_db::{DbError, OrderRepository, QuoteRepository};

use crate::error::{EngineError, EngineResult};
use crate::notify::Notification;
use crate::Engine;

/// A quote together with its status as of the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteView {
    pub quote: Quote,
    pub status: QuoteStatus,
}

impl Engine {
    /// Saves a quote at current prices and sends the guest access link.
    pub async fn create_quote(
        &self,
        holder: Holder,
        lines: Vec<LineItemInput>,
    ) -> EngineResult<Quote> {
        let quote = Quote::create(holder, &lines, self.now())?;

        let mut tx = self.db.begin_write().await?;
        QuoteRepository::insert(tx.conn(), &quote).await?;
        tx.commit().await?;

        info!(
            quote_id = %quote.id(),
            total = %quote.totals().total,
            expires_at = %quote.expires_at(),
            "Quote created"
        );

        self.publish(Notification::QuoteCreated {
            quote_id: quote.id().to_string(),
            access_token: quote.access_token().to_string(),
            email: quote.holder().guest_email().map(str::to_string),
            expires_at: quote.expires_at(),
        });

        Ok(quote)
    }

    /// Reads a quote by id or access token. Never writes.
    pub async fn get_quote(&self, id_or_token: &str) -> EngineResult<QuoteView> {
        let quote = self
            .db
            .quotes()
            .get(id_or_token)
            .await?
            .ok_or_else(|| EngineError::not_found("Quote", id_or_token))?;

        let status = current_status(&quote, self.now());
        Ok(QuoteView { quote, status })
    }

    /// A customer's quotes, newest first, with their live status.
    pub async fn list_customer_quotes(&self, customer_id: &str) -> EngineResult<Vec<QuoteView>> {
        let now = self.now();
        let quotes = self.db.quotes().list_by_customer(customer_id).await?;
        Ok(quotes
            .into_iter()
            .map(|quote| QuoteView {
                status: current_status(&quote, now),
                quote,
            })
            .collect())
    }

    /// Converts an active quote into a `pending_payment` order.
    pub async fn convert_quote(
        &self,
        id_or_token: &str,
        delivery: Delivery,
    ) -> EngineResult<Order> {
        let now = self.now();
        let mut tx = self.db.begin_write().await?;

        let mut quote = QuoteRepository::find(tx.conn(), id_or_token)
            .await?
            .ok_or_else(|| EngineError::not_found("Quote", id_or_token))?;

        let order = quote.convert(delivery, now)?;
        let created = StatusChange::created(&order);

        match OrderRepository::insert(tx.conn(), &order).await {
            Ok(()) => {}
            // Another writer converted it first.
            Err(DbError::UniqueViolation { .. }) => {
                let existing = OrderRepository::find_by_quote(tx.conn(), quote.id()).await?;
                return Err(CoreError::AlreadyConverted {
                    quote_id: quote.id().to_string(),
                    order_id: existing.map(|o| o.id().to_string()).unwrap_or_default(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }
        OrderRepository::append_history(tx.conn(), &created).await?;
        QuoteRepository::update(tx.conn(), &quote).await?;
        tx.commit().await?;

        info!(quote_id = %quote.id(), order_id = %order.id(), "Quote converted");

        self.publish(Notification::OrderStatusChanged {
            order_id: order.id().to_string(),
            from: None,
            to: order.status(),
            reason: None,
        });

        Ok(order)
    }
}
