//! # Order State Machine
//!
//! The Order aggregate and the single transition table that governs it.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Order Lifecycle                                 │
//! │                                                                         │
//! │  pending_payment ─────────────┐                                        │
//! │  pending_payment_temporary ───┼──► in_verification ──┬──► confirmed    │
//! │        │                      │          ▲           │        │        │
//! │        │ (scheduler, 60 min)  │          │           ▼        │        │
//! │        ▼                      │   incomplete_payment ─────────┤        │
//! │  cancelled_for_inactivity     │                               │        │
//! │                               │      home:   confirmed ──► in_transit  │
//! │                               │                               │        │
//! │                               │      pickup: confirmed ──► delivered   │
//! │                               │                  in_transit ──► delivered
//! │                               ▼                                        │
//! │  cancelled ◄── pending_*, in_verification, incomplete_payment,         │
//! │                in_transit                                              │
//! │                                                                         │
//! │  Terminal: delivered, cancelled, cancelled_for_inactivity              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A fully credit-covered order may also jump from a pending state straight
//! to `confirmed`: the debit already happened at checkout and there is no
//! proof to review.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{compute_totals, Money, Totals};
use crate::payment::{self, Coverage};
use crate::types::{Delivery, DeliveryMethod, Holder, LineItem, LineItemInput, PaymentProof};
use crate::validation::{
    normalize_reason, validate_delivery, validate_holder, validate_line_items,
};
use crate::{new_id, TEMPORARY_HOLD_MINUTES};

// =============================================================================
// Order Status
// =============================================================================

/// Every status an order can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting a transfer proof.
    PendingPayment,
    /// Awaiting a transfer proof; cancelled for inactivity after 60 minutes.
    PendingPaymentTemporary,
    /// A proof is under administrative review.
    InVerification,
    /// Part of the total was verified; more is owed.
    IncompletePayment,
    /// Fully paid, ready for fulfillment.
    Confirmed,
    InTransit,
    Delivered,
    Cancelled,
    CancelledForInactivity,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::PendingPayment,
        OrderStatus::PendingPaymentTemporary,
        OrderStatus::InVerification,
        OrderStatus::IncompletePayment,
        OrderStatus::Confirmed,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::CancelledForInactivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::PendingPaymentTemporary => "pending_payment_temporary",
            OrderStatus::InVerification => "in_verification",
            OrderStatus::IncompletePayment => "incomplete_payment",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::CancelledForInactivity => "cancelled_for_inactivity",
        }
    }

    /// Delivered and both cancellation states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::CancelledForInactivity
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            OrderStatus::PendingPayment | OrderStatus::PendingPaymentTemporary
        )
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::CancelledForInactivity
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown order status '{}'", s),
            })
    }
}

// =============================================================================
// Transition Table
// =============================================================================

/// Allowed destinations for `from`, given the delivery method.
///
/// This is the only place the table lives; UI projections and the machine
/// itself both read from here.
pub fn allowed_targets(from: OrderStatus, method: DeliveryMethod) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match from {
        PendingPayment | PendingPaymentTemporary => &[InVerification, Cancelled],
        InVerification => &[IncompletePayment, Confirmed, Cancelled],
        IncompletePayment => &[InVerification, Confirmed, Cancelled],
        Confirmed => match method {
            DeliveryMethod::Home => &[InTransit],
            DeliveryMethod::StorePickup => &[Delivered],
        },
        InTransit => &[Delivered, Cancelled],
        Delivered | Cancelled | CancelledForInactivity => &[],
    }
}

// =============================================================================
// Status Change (audit record)
// =============================================================================

/// One committed status change. Persisted append-only for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusChange {
    pub order_id: String,
    /// `None` for the creation record.
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub at: DateTime<Utc>,
}

impl StatusChange {
    /// The record written when an order is first placed.
    pub fn created(order: &Order) -> Self {
        StatusChange {
            order_id: order.id.clone(),
            from: None,
            to: order.status,
            reason: None,
            at: order.created_at,
        }
    }
}

// =============================================================================
// New Order (checkout input)
// =============================================================================

/// Everything direct checkout hands over to create an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrder {
    pub holder: Holder,
    pub lines: Vec<LineItemInput>,
    pub delivery: Delivery,
    /// Start in `pending_payment_temporary` (60-minute hold).
    #[serde(default)]
    pub temporary_hold: bool,
}

/// Result of asking the machine to cancel an order for inactivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InactivityOutcome {
    /// The order moved to `cancelled_for_inactivity`.
    Expired(StatusChange),
    /// Still inside its hold window.
    NotDue { deadline: DateTime<Utc> },
    /// No longer eligible (already left the temporary state, or has a proof).
    Skipped { status: OrderStatus },
}

// =============================================================================
// Order
// =============================================================================

/// A committed purchase with delivery and payment tracking.
///
/// Fields are crate-private: outside this crate the only way to change an
/// order is through the transition and reconciliation operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub(crate) id: String,
    pub(crate) holder: Holder,
    pub(crate) items: Vec<LineItem>,
    pub(crate) totals: Totals,
    pub(crate) delivery: Delivery,
    pub(crate) status: OrderStatus,
    pub(crate) cancellation_reason: Option<String>,
    pub(crate) verified_paid: Money,
    pub(crate) credit_applied: Money,
    pub(crate) credit_account_id: Option<String>,
    pub(crate) proofs: Vec<PaymentProof>,
    pub(crate) quote_id: Option<String>,
    #[ts(as = "String")]
    pub(crate) created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub(crate) updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an order from a direct checkout.
    ///
    /// ## Errors
    /// `Validation` when the holder, lines or delivery are malformed.
    pub fn place(new: NewOrder, now: DateTime<Utc>) -> CoreResult<Order> {
        validate_holder(&new.holder)?;
        validate_line_items(&new.lines)?;
        validate_delivery(&new.delivery)?;

        let items: Vec<LineItem> = new.lines.iter().map(LineItem::snapshot).collect();
        let status = if new.temporary_hold {
            OrderStatus::PendingPaymentTemporary
        } else {
            OrderStatus::PendingPayment
        };

        Ok(Order::assemble(
            new.holder, items, new.delivery, status, None, now,
        ))
    }

    /// Builds an order from a converted quote's frozen lines.
    pub(crate) fn from_quote(
        quote_id: &str,
        holder: Holder,
        items: Vec<LineItem>,
        delivery: Delivery,
        now: DateTime<Utc>,
    ) -> Order {
        Order::assemble(
            holder,
            items,
            delivery,
            OrderStatus::PendingPayment,
            Some(quote_id.to_string()),
            now,
        )
    }

    fn assemble(
        holder: Holder,
        items: Vec<LineItem>,
        delivery: Delivery,
        status: OrderStatus,
        quote_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Order {
        let totals = compute_totals(&items);
        Order {
            id: new_id(),
            holder,
            items,
            totals,
            delivery,
            status,
            cancellation_reason: None,
            verified_paid: Money::zero(),
            credit_applied: Money::zero(),
            credit_account_id: None,
            proofs: Vec::new(),
            quote_id,
            created_at: now,
            updated_at: now,
        }
    }

    // -------------------------------------------------------------------------
    // Read accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
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

    pub fn subtotal(&self) -> Money {
        self.totals.subtotal
    }

    pub fn tax(&self) -> Money {
        self.totals.tax
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    pub fn delivery_method(&self) -> DeliveryMethod {
        self.delivery.method()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn verified_paid(&self) -> Money {
        self.verified_paid
    }

    pub fn credit_applied(&self) -> Money {
        self.credit_applied
    }

    pub fn credit_account_id(&self) -> Option<&str> {
        self.credit_account_id.as_deref()
    }

    pub fn proofs(&self) -> &[PaymentProof] {
        &self.proofs
    }

    pub fn quote_id(&self) -> Option<&str> {
        self.quote_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Paid in full by a credit account; no proof is ever required.
    pub fn is_credit_covered(&self) -> bool {
        self.credit_applied.is_positive() && self.credit_applied == self.total()
    }

    pub fn is_fully_covered(&self) -> bool {
        self.is_credit_covered() || self.verified_paid >= self.total()
    }

    /// When the scheduler may cancel this order, if it is on a timed hold.
    pub fn inactivity_deadline(&self) -> Option<DateTime<Utc>> {
        (self.status == OrderStatus::PendingPaymentTemporary)
            .then(|| self.created_at + Duration::minutes(TEMPORARY_HOLD_MINUTES))
    }

    /// Destinations reachable right now, including the credit shortcut.
    pub fn allowed_next(&self) -> Vec<OrderStatus> {
        let mut targets = allowed_targets(self.status, self.delivery_method()).to_vec();
        if self.status.is_pending() && self.is_credit_covered() {
            targets.push(OrderStatus::Confirmed);
        }
        targets
    }

    /// Read-only projection for status-dependent UI logic.
    pub fn projection(&self) -> OrderProjection {
        let coverage = payment::coverage(self);
        OrderProjection {
            status: self.status,
            terminal: self.status.is_terminal(),
            allowed_next: self.allowed_next(),
            awaiting_proof: matches!(
                self.status,
                OrderStatus::PendingPayment
                    | OrderStatus::PendingPaymentTemporary
                    | OrderStatus::IncompletePayment
            ) && !self.is_fully_covered(),
            coverage,
            inactivity_deadline: self.inactivity_deadline(),
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Moves the order to `target`.
    ///
    /// ## Checks (in order, all before any write)
    /// 1. Terminal source → `TerminalState`
    /// 2. Target not allowed for this status/delivery → `InvalidTransition`
    /// 3. `cancelled` without a reason → `MissingReason`
    /// 4. `incomplete_payment` needs `0 < verified < total` → `InvalidAmount`
    /// 5. `confirmed` needs full coverage → `InvalidAmount`
    pub fn transition(
        &mut self,
        target: OrderStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<StatusChange> {
        if self.status.is_terminal() {
            return Err(CoreError::TerminalState {
                status: self.status,
            });
        }

        if !self.allowed_next().contains(&target) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        let reason = normalize_reason(reason);

        match target {
            OrderStatus::Cancelled if reason.is_none() => {
                return Err(CoreError::MissingReason);
            }
            OrderStatus::IncompletePayment => {
                if !self.verified_paid.is_positive() {
                    return Err(CoreError::invalid_amount(
                        self.verified_paid,
                        "no verified payment recorded",
                    ));
                }
                if self.verified_paid >= self.total() {
                    return Err(CoreError::invalid_amount(
                        self.verified_paid,
                        "verified payment covers the total; confirm instead",
                    ));
                }
            }
            OrderStatus::Confirmed if !self.is_fully_covered() => {
                return Err(CoreError::invalid_amount(
                    self.verified_paid,
                    format!("payment does not cover total {}", self.total()),
                ));
            }
            _ => {}
        }

        Ok(self.commit_status(target, reason, now))
    }

    /// Scheduler entry point for the 60-minute temporary hold.
    ///
    /// Idempotent: an order that already left `pending_payment_temporary`,
    /// received a proof, or was paid by credit is reported as `Skipped` and
    /// left untouched.
    pub fn expire_for_inactivity(&mut self, now: DateTime<Utc>) -> InactivityOutcome {
        if self.status != OrderStatus::PendingPaymentTemporary
            || !self.proofs.is_empty()
            || self.is_credit_covered()
        {
            return InactivityOutcome::Skipped {
                status: self.status,
            };
        }

        let deadline = self.created_at + Duration::minutes(TEMPORARY_HOLD_MINUTES);
        if now < deadline {
            return InactivityOutcome::NotDue { deadline };
        }

        let change = self.commit_status(
            OrderStatus::CancelledForInactivity,
            Some("no payment proof received before the hold expired".to_string()),
            now,
        );
        InactivityOutcome::Expired(change)
    }

    fn commit_status(
        &mut self,
        target: OrderStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> StatusChange {
        let from = self.status;
        self.status = target;
        if target.is_cancellation() {
            self.cancellation_reason = reason.clone();
        }
        self.updated_at = now;

        StatusChange {
            order_id: self.id.clone(),
            from: Some(from),
            to: target,
            reason,
            at: now,
        }
    }
}

/// What a UI needs to render an order's status without re-deriving rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderProjection {
    pub status: OrderStatus,
    pub terminal: bool,
    pub allowed_next: Vec<OrderStatus>,
    pub awaiting_proof: bool,
    pub coverage: Coverage,
    #[ts(as = "Option<String>")]
    pub inactivity_deadline: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
