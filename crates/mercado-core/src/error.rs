//! # Error Types
//!
//! Domain error taxonomy for mercado-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mercado-core errors (this file)                                       │
//! │  ├── CoreError        - Lifecycle precondition violations              │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  mercado-db errors                                                     │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  mercado-engine errors                                                 │
//! │  └── EngineError      - Core | Db | Config                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Check-then-act
//! Every `CoreError` is raised before the aggregate is touched. A rejected
//! operation leaves the Order, Quote or Credit Account exactly as it was.

use thiserror::Error;

use crate::money::Money;
use crate::order::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Commerce lifecycle errors, surfaced to callers verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The requested status is not reachable from the current one.
    ///
    /// ## When This Occurs
    /// - Target not in the transition table for `from`
    /// - `in_transit` requested for a store-pickup order
    /// - `cancelled_for_inactivity` requested through the generic transition
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order is delivered or cancelled and can no longer change.
    #[error("Order is in terminal state {status}")]
    TerminalState { status: OrderStatus },

    /// Cancellation without a reason.
    #[error("A cancellation reason is required")]
    MissingReason,

    /// Credit application must cover the order total exactly.
    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: Money, actual: Money },

    /// Credit debit beyond the available balance.
    #[error("Insufficient credit: available {available}, requested {requested}")]
    InsufficientCredit { available: Money, requested: Money },

    /// An amount is zero, negative or outside the allowed range.
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Money, reason: String },

    /// The quote already produced an order.
    #[error("Quote {quote_id} was already converted into order {order_id}")]
    AlreadyConverted { quote_id: String, order_id: String },

    /// The quote is past its expiry.
    #[error("Quote {quote_id} has expired")]
    Expired { quote_id: String },

    /// An aggregate does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The operation is not valid while the aggregate is in its current
    /// status (e.g. verifying a payment on a confirmed order, drawing on a
    /// voided credit account).
    #[error("Cannot {operation} while {status}")]
    InvalidState { operation: String, status: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_amount(amount: Money, reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            amount,
            reason: reason.into(),
        }
    }

    pub fn invalid_state(operation: impl Into<String>, status: impl ToString) -> Self {
        CoreError::InvalidState {
            operation: operation.into(),
            status: status.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any business rule runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;
