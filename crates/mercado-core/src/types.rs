//! # Domain Types
//!
//! Value types shared by quotes and orders.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shared Value Types                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ LineItemInput   │   │    Holder       │   │    Delivery     │       │
//! │  │  (from cart)    │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_ref    │   │  Customer{id}   │   │  Home{address}  │       │
//! │  │  quantity       │   │  Guest{contact} │   │  StorePickup    │       │
//! │  │  unit_price     │   └─────────────────┘   └─────────────────┘       │
//! │  └───────┬─────────┘                                                   │
//! │          │ snapshot()                                                   │
//! │          ▼                                                              │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    LineItem     │   │    TaxRate      │   │  PaymentProof   │       │
//! │  │  (frozen price) │   │  bps (u32)      │   │  storage ref    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (1 bps = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

// =============================================================================
// Line Items
// =============================================================================

/// A priced cart line as handed over by the checkout collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItemInput {
    pub product_ref: String,
    pub name: String,
    pub quantity: i64,
    /// Current catalog price at the moment of checkout or quote save.
    pub unit_price_cents: i64,
}

/// A line item with its unit price frozen.
///
/// ## Snapshot Pattern
/// Once a quote or order is created, prices are never re-read from the
/// catalog. The line keeps what the customer was shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_ref: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl LineItem {
    /// Freezes a priced cart line.
    pub fn snapshot(input: &LineItemInput) -> Self {
        let unit_price = Money::from_cents(input.unit_price_cents);
        LineItem {
            product_ref: input.product_ref.trim().to_string(),
            name_snapshot: input.name.trim().to_string(),
            quantity: input.quantity,
            unit_price_cents: input.unit_price_cents,
            subtotal_cents: unit_price.multiply_quantity(input.quantity).cents(),
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Holder
// =============================================================================

/// Contact bundle for a customer who checks out without an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GuestContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// National id document number.
    pub document: Option<String>,
}

/// Who a quote or order belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Holder {
    /// A registered customer.
    Customer { customer_id: String },
    /// An anonymous buyer identified by contact data.
    Guest(GuestContact),
}

impl Holder {
    /// Returns the registered customer id, if any.
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            Holder::Customer { customer_id } => Some(customer_id),
            Holder::Guest(_) => None,
        }
    }

    /// Returns the guest email, if any.
    ///
    /// Registered customers are reached through the account service, so only
    /// guests carry an address here.
    pub fn guest_email(&self) -> Option<&str> {
        match self {
            Holder::Customer { .. } => None,
            Holder::Guest(contact) => Some(&contact.email),
        }
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// How an order reaches the customer (without the address payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Home,
    StorePickup,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Home => "home",
            DeliveryMethod::StorePickup => "store_pickup",
        }
    }
}

/// The delivery choice made at checkout.
///
/// The address lives inside the `Home` variant, so "address present iff
/// home delivery" holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Delivery {
    Home { address: String },
    StorePickup,
}

impl Delivery {
    pub fn method(&self) -> DeliveryMethod {
        match self {
            Delivery::Home { .. } => DeliveryMethod::Home,
            Delivery::StorePickup => DeliveryMethod::StorePickup,
        }
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            Delivery::Home { address } => Some(address),
            Delivery::StorePickup => None,
        }
    }
}

// =============================================================================
// Payment Proof
// =============================================================================

/// An uploaded transfer receipt awaiting administrative review.
///
/// Only the file-storage reference is kept; the image itself lives with the
/// storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentProof {
    pub id: String,
    pub reference: String,
    #[ts(as = "String")]
    pub uploaded_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
