//! # Credit Ledger
//!
//! Store-credit accounts, their installment history, and the credit requests
//! that create them.
//!
//! ## Balances
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  approved_limit ─────────────────────────────────────────────┐          │
//! │  ├── outstanding_principal (drawn by credit orders)          │          │
//! │  └── available_balance = max(0, limit - principal) ◄─────────┘          │
//! │                                                                         │
//! │  total_debt = outstanding_principal + accrued_interest                  │
//! │                                                                         │
//! │  Interest raises what must be paid back, never what can be spent.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Installment allocation
//! Payments go to principal first, then to interest. A payment can never be
//! larger than the total debt, so neither balance goes negative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::{new_id, MAX_CREDIT_CENTS};
use crate::validation::normalize_reason;

/// Longest term a credit request may ask for.
pub const MAX_TERM_MONTHS: u32 = 120;

// =============================================================================
// Credit Account Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditAccountStatus {
    Active,
    /// Debt reached zero through installments.
    Paid,
    Overdue,
    /// No purchasing power left while debt remains.
    Exhausted,
    /// Administratively closed; accepts no further movements.
    Voided,
}

impl CreditAccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditAccountStatus::Active => "active",
            CreditAccountStatus::Paid => "paid",
            CreditAccountStatus::Overdue => "overdue",
            CreditAccountStatus::Exhausted => "exhausted",
            CreditAccountStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for CreditAccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Installments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentMethod {
    BankTransfer,
    Cash,
    Card,
    Other,
}

/// An installment as reported by the back office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstallmentInput {
    pub amount: Money,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
    pub method: InstallmentMethod,
    pub proof_reference: Option<String>,
}

/// A recorded installment with its allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Installment {
    pub id: String,
    pub amount: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
    pub method: InstallmentMethod,
    pub proof_reference: Option<String>,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// Credit Account
// =============================================================================

/// A revolving line of store credit, one per customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreditAccount {
    id: String,
    customer_id: String,
    approved_limit: Money,
    outstanding_principal: Money,
    accrued_interest: Money,
    installments: Vec<Installment>,
    status: CreditAccountStatus,
    #[ts(as = "String")]
    created_at: DateTime<Utc>,
    #[ts(as = "String")]
    updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// Opens an account with nothing drawn.
    pub fn open(customer_id: &str, approved_limit: Money, now: DateTime<Utc>) -> CoreResult<Self> {
        if customer_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "customer_id".to_string(),
            }
            .into());
        }
        if !approved_limit.is_positive() {
            return Err(CoreError::invalid_amount(
                approved_limit,
                "approved limit must be greater than zero",
            ));
        }
        if approved_limit.cents() > MAX_CREDIT_CENTS {
            return Err(CoreError::invalid_amount(
                approved_limit,
                format!("approved limit above {}", Money::from_cents(MAX_CREDIT_CENTS)),
            ));
        }

        Ok(CreditAccount {
            id: new_id(),
            customer_id: customer_id.trim().to_string(),
            approved_limit,
            outstanding_principal: Money::zero(),
            accrued_interest: Money::zero(),
            installments: Vec::new(),
            status: CreditAccountStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn approved_limit(&self) -> Money {
        self.approved_limit
    }

    pub fn outstanding_principal(&self) -> Money {
        self.outstanding_principal
    }

    pub fn accrued_interest(&self) -> Money {
        self.accrued_interest
    }

    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    pub fn status(&self) -> CreditAccountStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// `principal + interest`.
    pub fn total_debt(&self) -> Money {
        self.outstanding_principal + self.accrued_interest
    }

    /// `limit - principal`, clamped to zero.
    pub fn available_balance(&self) -> Money {
        self.approved_limit.saturating_sub(self.outstanding_principal)
    }

    pub(crate) fn ensure_usable(&self, operation: &str) -> CoreResult<()> {
        if self.status == CreditAccountStatus::Voided {
            return Err(CoreError::invalid_state(operation, self.status));
        }
        Ok(())
    }

    /// Draws `amount` of principal to pay for an order.
    pub fn disburse_for_order(&mut self, amount: Money, now: DateTime<Utc>) -> CoreResult<()> {
        if !amount.is_positive() {
            return Err(CoreError::invalid_amount(amount, "must be greater than zero"));
        }
        self.ensure_usable("draw credit")?;

        let available = self.available_balance();
        if amount > available {
            return Err(CoreError::InsufficientCredit {
                available,
                requested: amount,
            });
        }

        self.outstanding_principal += amount;
        if self.available_balance().is_zero() {
            self.status = CreditAccountStatus::Exhausted;
        } else if self.status == CreditAccountStatus::Paid {
            self.status = CreditAccountStatus::Active;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Gives back principal drawn by an order that was later cancelled.
    pub fn reverse_disbursement(&mut self, amount: Money, now: DateTime<Utc>) -> CoreResult<()> {
        if !amount.is_positive() || amount > self.outstanding_principal {
            return Err(CoreError::invalid_amount(
                amount,
                format!(
                    "reversal must be between $0.01 and outstanding principal {}",
                    self.outstanding_principal
                ),
            ));
        }

        self.outstanding_principal -= amount;
        if self.status == CreditAccountStatus::Exhausted && self.available_balance().is_positive() {
            self.status = CreditAccountStatus::Active;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Applies a payment, principal first.
    ///
    /// ## Status after payment
    /// - `paid` when total debt reaches zero
    /// - `exhausted` when nothing is available and debt remains
    /// - otherwise unchanged
    pub fn record_installment(
        &mut self,
        input: InstallmentInput,
        now: DateTime<Utc>,
    ) -> CoreResult<Installment> {
        self.ensure_usable("record an installment")?;

        let debt = self.total_debt();
        if !input.amount.is_positive() {
            return Err(CoreError::invalid_amount(input.amount, "must be greater than zero"));
        }
        if input.amount > debt {
            return Err(CoreError::invalid_amount(
                input.amount,
                format!("exceeds total debt {}", debt),
            ));
        }

        let principal_portion = if input.amount > self.outstanding_principal {
            self.outstanding_principal
        } else {
            input.amount
        };
        let interest_portion = input.amount - principal_portion;

        self.outstanding_principal -= principal_portion;
        self.accrued_interest -= interest_portion;

        if self.total_debt().is_zero() {
            self.status = CreditAccountStatus::Paid;
        } else if self.available_balance().is_zero() {
            self.status = CreditAccountStatus::Exhausted;
        }

        let installment = Installment {
            id: new_id(),
            amount: input.amount,
            principal_portion,
            interest_portion,
            paid_at: input.paid_at,
            method: input.method,
            proof_reference: normalize_reason(input.proof_reference.as_deref()),
            recorded_at: now,
        };
        self.installments.push(installment.clone());
        self.updated_at = now;
        Ok(installment)
    }

    /// Adds an externally computed interest charge.
    pub fn accrue_interest(&mut self, amount: Money, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_usable("accrue interest")?;
        if !amount.is_positive() {
            return Err(CoreError::invalid_amount(amount, "must be greater than zero"));
        }

        let accrued = self
            .accrued_interest
            .checked_add(amount)
            .filter(|total| total.cents() <= MAX_CREDIT_CENTS)
            .ok_or_else(|| {
                CoreError::invalid_amount(
                    amount,
                    format!("interest balance would exceed {}", Money::from_cents(MAX_CREDIT_CENTS)),
                )
            })?;

        self.accrued_interest = accrued;
        if self.status == CreditAccountStatus::Paid {
            self.status = CreditAccountStatus::Active;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        match self.status {
            CreditAccountStatus::Active | CreditAccountStatus::Exhausted
                if self.total_debt().is_positive() =>
            {
                self.status = CreditAccountStatus::Overdue;
                self.updated_at = now;
                Ok(())
            }
            status => Err(CoreError::invalid_state("mark the account overdue", status)),
        }
    }

    pub fn void(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_usable("void the account")?;
        self.status = CreditAccountStatus::Voided;
        self.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// Credit Request
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl CreditRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditRequestStatus::Pending => "pending",
            CreditRequestStatus::Approved => "approved",
            CreditRequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CreditRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer's application for a credit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreditRequest {
    id: String,
    customer_id: String,
    requested_amount: Money,
    term_months: u32,
    status: CreditRequestStatus,
    approved_amount: Option<Money>,
    rationale: Option<String>,
    credit_account_id: Option<String>,
    #[ts(as = "String")]
    created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    decided_at: Option<DateTime<Utc>>,
}

impl CreditRequest {
    pub fn submit(
        customer_id: &str,
        requested_amount: Money,
        term_months: u32,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if customer_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "customer_id".to_string(),
            }
            .into());
        }
        if !requested_amount.is_positive() {
            return Err(CoreError::invalid_amount(
                requested_amount,
                "requested amount must be greater than zero",
            ));
        }
        if requested_amount.cents() > MAX_CREDIT_CENTS {
            return Err(CoreError::invalid_amount(
                requested_amount,
                format!("requested amount above {}", Money::from_cents(MAX_CREDIT_CENTS)),
            ));
        }
        if term_months == 0 || term_months > MAX_TERM_MONTHS {
            return Err(ValidationError::OutOfRange {
                field: "term_months".to_string(),
                min: 1,
                max: MAX_TERM_MONTHS as i64,
            }
            .into());
        }

        Ok(CreditRequest {
            id: new_id(),
            customer_id: customer_id.trim().to_string(),
            requested_amount,
            term_months,
            status: CreditRequestStatus::Pending,
            approved_amount: None,
            rationale: None,
            credit_account_id: None,
            created_at: now,
            decided_at: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn requested_amount(&self) -> Money {
        self.requested_amount
    }

    pub fn term_months(&self) -> u32 {
        self.term_months
    }

    pub fn status(&self) -> CreditRequestStatus {
        self.status
    }

    pub fn approved_amount(&self) -> Option<Money> {
        self.approved_amount
    }

    pub fn rationale(&self) -> Option<&str> {
        self.rationale.as_deref()
    }

    pub fn credit_account_id(&self) -> Option<&str> {
        self.credit_account_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    fn ensure_pending(&self, operation: &str) -> CoreResult<()> {
        if self.status != CreditRequestStatus::Pending {
            return Err(CoreError::invalid_state(operation, self.status));
        }
        Ok(())
    }

    /// Approves the request and opens the customer's Credit Account.
    pub fn approve(
        &mut self,
        approved_amount: Money,
        rationale: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<CreditAccount> {
        self.ensure_pending("approve the request")?;
        if !approved_amount.is_positive() || approved_amount > self.requested_amount {
            return Err(CoreError::invalid_amount(
                approved_amount,
                format!(
                    "approved amount must be between $0.01 and requested {}",
                    self.requested_amount
                ),
            ));
        }

        let account = CreditAccount::open(&self.customer_id, approved_amount, now)?;

        self.status = CreditRequestStatus::Approved;
        self.approved_amount = Some(approved_amount);
        self.rationale = normalize_reason(rationale);
        self.credit_account_id = Some(account.id().to_string());
        self.decided_at = Some(now);
        Ok(account)
    }

    pub fn reject(&mut self, rationale: Option<&str>, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_pending("reject the request")?;
        let rationale = normalize_reason(rationale).ok_or(CoreError::MissingReason)?;

        self.status = CreditRequestStatus::Rejected;
        self.rationale = Some(rationale);
        self.decided_at = Some(now);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
