//! # mercado-core: Commerce Lifecycle Rules
//!
//! This crate is the **heart** of Mercado. It owns every rule that keeps the
//! storefront financially correct: how totals are derived, how a Quote expires
//! and converts, how an Order moves from payment to fulfillment, and how a
//! Credit Account is drawn down and paid back.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Storefront / Back-office UI (external)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   mercado-engine  (transactions, notifications, sweeper)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ mercado-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  money  │ │  quote  │ │  order  │ │ payment │ │ credit  │  │   │
//! │  │   │ Totals  │ │ expiry  │ │  state  │ │ reconc. │ │ ledger  │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 mercado-db (SQLite repositories)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type, tax rate and `compute_totals`
//! - [`types`] - Line items, holders, delivery choice, proofs
//! - [`validation`] - Input validation
//! - [`order`] - Order aggregate and its transition table
//! - [`quote`] - Price-locked, time-boxed quotes
//! - [`payment`] - Proofs, verification, credit application
//! - [`credit`] - Credit accounts, installments and credit requests
//! - [`error`] - Domain error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use mercado_core::money::{compute_totals, Money};
//! use mercado_core::types::{LineItem, LineItemInput};
//!
//! let line = LineItem::snapshot(&LineItemInput {
//!     product_ref: "SKU-1".to_string(),
//!     name: "Taladro".to_string(),
//!     quantity: 2,
//!     unit_price_cents: Money::from_major(50_000).cents(),
//! });
//!
//! let totals = compute_totals(&[line]);
//! assert_eq!(totals.subtotal, Money::from_major(100_000));
//! assert_eq!(totals.tax, Money::from_major(19_000));
//! assert_eq!(totals.total, Money::from_major(119_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod credit;
pub mod error;
pub mod money;
pub mod order;
pub mod payment;
pub mod quote;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use credit::{
    CreditAccount, CreditAccountStatus, CreditRequest, CreditRequestStatus, Installment,
    InstallmentInput, InstallmentMethod,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{compute_totals, Money, Totals};
pub use order::{
    allowed_targets, InactivityOutcome, NewOrder, Order, OrderProjection, OrderStatus,
    StatusChange,
};
pub use payment::Coverage;
pub use quote::{current_status, Quote, QuoteStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Fixed VAT rate applied to every subtotal, in basis points (19%).
pub const VAT_RATE: TaxRate = TaxRate::from_bps(1900);

/// Days a quote keeps its frozen prices before it expires.
pub const QUOTE_VALIDITY_DAYS: i64 = 15;

/// Minutes a `pending_payment_temporary` order may stay untouched before the
/// scheduler is allowed to cancel it for inactivity.
pub const TEMPORARY_HOLD_MINUTES: i64 = 60;

/// Maximum line items in a single order or quote.
pub const MAX_LINE_ITEMS: usize = 100;

/// Maximum quantity of a single line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest accepted unit price, in cents. A full cart at this price still
/// fits in i64 after VAT.
pub const MAX_UNIT_PRICE_CENTS: i64 = 1_000_000_000_000;

/// Largest credit limit, and largest interest balance, in cents.
pub const MAX_CREDIT_CENTS: i64 = 1_000_000_000_000_000;

/// Generates a new entity id (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
