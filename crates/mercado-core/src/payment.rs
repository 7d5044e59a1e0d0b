//! # Payment Reconciliation
//!
//! Proof uploads, administrative verification and credit application.
//!
//! Reconciliation only records money facts on the Order. Choosing the next
//! status stays a separate, explicit call to [`Order::transition`];
//! [`suggested_target`] is advisory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::credit::CreditAccount;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::new_id;
use crate::order::{Order, OrderStatus};
use crate::types::PaymentProof;
use crate::validation::validate_proof_reference;

/// How much of an order's total is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Coverage {
    Full,
    Partial { paid: Money, outstanding: Money },
    None,
}

/// Coverage from credit applied plus verified transfers.
pub fn coverage(order: &Order) -> Coverage {
    if order.is_fully_covered() {
        return Coverage::Full;
    }

    let paid = order.credit_applied + order.verified_paid;
    if paid.is_positive() {
        Coverage::Partial {
            paid,
            outstanding: order.total().saturating_sub(paid),
        }
    } else {
        Coverage::None
    }
}

/// The destination an administrator would normally pick after verifying.
///
/// Returns `None` when nothing is covered or the suggested target is not
/// reachable from the current status.
pub fn suggested_target(order: &Order) -> Option<OrderStatus> {
    let target = match coverage(order) {
        Coverage::Full => OrderStatus::Confirmed,
        Coverage::Partial { .. } => OrderStatus::IncompletePayment,
        Coverage::None => return None,
    };
    order.allowed_next().contains(&target).then_some(target)
}

/// Attaches a transfer receipt reference to the order.
///
/// Does not change status.
pub fn submit_proof(
    order: &mut Order,
    reference: &str,
    now: DateTime<Utc>,
) -> CoreResult<PaymentProof> {
    if order.status.is_terminal() {
        return Err(CoreError::TerminalState {
            status: order.status,
        });
    }
    if !matches!(
        order.status,
        OrderStatus::PendingPayment
            | OrderStatus::PendingPaymentTemporary
            | OrderStatus::InVerification
            | OrderStatus::IncompletePayment
    ) {
        return Err(CoreError::invalid_state("submit a payment proof", order.status));
    }
    if order.is_credit_covered() {
        return Err(CoreError::invalid_state(
            "submit a payment proof for a credit-paid order",
            order.status,
        ));
    }
    validate_proof_reference(reference)?;

    let proof = PaymentProof {
        id: new_id(),
        reference: reference.trim().to_string(),
        uploaded_at: now,
    };
    order.proofs.push(proof.clone());
    order.updated_at = now;
    Ok(proof)
}

/// Records an administrator-verified transfer amount.
///
/// Amounts accumulate across verifications; the running total may never
/// exceed the order total. Returns the new running total.
pub fn verify(order: &mut Order, amount: Money, now: DateTime<Utc>) -> CoreResult<Money> {
    if order.status.is_terminal() {
        return Err(CoreError::TerminalState {
            status: order.status,
        });
    }
    if !matches!(
        order.status,
        OrderStatus::InVerification | OrderStatus::IncompletePayment
    ) {
        return Err(CoreError::invalid_state("verify a payment", order.status));
    }
    if !amount.is_positive() {
        return Err(CoreError::invalid_amount(amount, "must be greater than zero"));
    }

    let outstanding = order.total() - order.verified_paid;
    if amount > outstanding {
        return Err(CoreError::invalid_amount(
            amount,
            format!(
                "only {} of order total {} is left to verify",
                outstanding,
                order.total()
            ),
        ));
    }

    let running = order.verified_paid + amount;
    order.verified_paid = running;
    order.updated_at = now;
    Ok(running)
}

/// Pays a pending order in full from a credit account.
///
/// ## Checks (in order, all before any write)
/// 1. `amount > 0` → `InvalidAmount`
/// 2. Order pending and not already credit-paid → `InvalidState`
/// 3. Account not voided → `InvalidState`
/// 4. `amount == order total` → `AmountMismatch`
/// 5. `amount <= available balance` → `InsufficientCredit`
///
/// On success both the account and the order are updated; the caller must
/// persist them together.
pub fn apply_credit(
    order: &mut Order,
    account: &mut CreditAccount,
    amount: Money,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(CoreError::invalid_amount(amount, "must be greater than zero"));
    }
    if !order.status.is_pending() || order.credit_applied.is_positive() {
        return Err(CoreError::invalid_state("apply credit", order.status));
    }
    account.ensure_usable("draw credit")?;

    if amount != order.total() {
        return Err(CoreError::AmountMismatch {
            expected: order.total(),
            actual: amount,
        });
    }
    let available = account.available_balance();
    if amount > available {
        return Err(CoreError::InsufficientCredit {
            available,
            requested: amount,
        });
    }

    account.disburse_for_order(amount, now)?;
    order.credit_applied = amount;
    order.credit_account_id = Some(account.id().to_string());
    order.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::tests::{home, placed, t0};
    use crate::types::Delivery;

    fn account(limit: i64, principal: i64) -> CreditAccount {
        let mut account =
            CreditAccount::open("cust-1", Money::from_major(limit), t0()).unwrap();
        if principal > 0 {
            account
                .disburse_for_order(Money::from_major(principal), t0())
                .unwrap();
        }
        account
    }

    fn in_verification() -> Order {
        let mut order = placed(home());
        submit_proof(&mut order, "s3://proofs/a.jpg", t0()).unwrap();
        order
            .transition(OrderStatus::InVerification, None, t0())
            .unwrap();
        order
    }

    #[test]
    fn test_verify_full_then_confirm() {
        let mut order = in_verification();
        verify(&mut order, Money::from_major(119_000), t0()).unwrap();
        assert_eq!(coverage(&order), Coverage::Full);
        assert_eq!(suggested_target(&order), Some(OrderStatus::Confirmed));

        // Caller error: incomplete after full coverage is rejected, not corrected.
        let err = order
            .transition(OrderStatus::IncompletePayment, None, t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));
        assert_eq!(order.status(), OrderStatus::InVerification);

        order.transition(OrderStatus::Confirmed, None, t0()).unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
    }

    #[test]
    fn test_verify_accumulates() {
        let mut order = in_verification();
        verify(&mut order, Money::from_major(50_000), t0()).unwrap();
        assert_eq!(
            coverage(&order),
            Coverage::Partial {
                paid: Money::from_major(50_000),
                outstanding: Money::from_major(69_000),
            }
        );
        order
            .transition(OrderStatus::IncompletePayment, None, t0())
            .unwrap();

        let running = verify(&mut order, Money::from_major(69_000), t0()).unwrap();
        assert_eq!(running, Money::from_major(119_000));
        order.transition(OrderStatus::Confirmed, None, t0()).unwrap();
    }

    #[test]
    fn test_verify_rejects_overpayment_and_non_positive() {
        let mut order = in_verification();
        assert!(matches!(
            verify(&mut order, Money::zero(), t0()),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert!(matches!(
            verify(&mut order, Money::from_major(119_001), t0()),
            Err(CoreError::InvalidAmount { .. })
        ));
        verify(&mut order, Money::from_major(1), t0()).unwrap();
        assert!(matches!(
            verify(&mut order, Money::from_cents(i64::MAX), t0()),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert_eq!(order.verified_paid(), Money::from_major(1));
    }

    #[test]
    fn test_verify_requires_review_state() {
        let mut order = placed(home());
        assert!(matches!(
            verify(&mut order, Money::from_major(1), t0()),
            Err(CoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_submit_proof_appends_without_status_change() {
        let mut order = placed(Delivery::StorePickup);
        submit_proof(&mut order, "s3://a", t0()).unwrap();
        submit_proof(&mut order, "s3://b", t0()).unwrap();
        assert_eq!(order.proofs().len(), 2);
        assert_eq!(order.status(), OrderStatus::PendingPayment);

        assert!(submit_proof(&mut order, "  ", t0()).is_err());
        assert_eq!(order.proofs().len(), 2);
    }

    #[test]
    fn test_submit_proof_on_terminal_order() {
        let mut order = placed(home());
        order
            .transition(OrderStatus::Cancelled, Some("duplicado"), t0())
            .unwrap();
        assert_eq!(
            submit_proof(&mut order, "s3://late", t0()),
            Err(CoreError::TerminalState {
                status: OrderStatus::Cancelled
            })
        );
    }

    #[test]
    fn test_apply_credit_debits_and_confirms_without_proof() {
        let mut order = placed(home());
        let mut acct = account(500_000, 0);
        let total = order.total();

        apply_credit(&mut order, &mut acct, total, t0()).unwrap();
        assert_eq!(acct.outstanding_principal(), Money::from_major(119_000));
        assert_eq!(acct.available_balance(), Money::from_major(381_000));
        assert!(order.is_credit_covered());
        assert_eq!(order.credit_account_id(), Some(acct.id()));
        assert!(!order.projection().awaiting_proof);

        order.transition(OrderStatus::Confirmed, None, t0()).unwrap();
    }

    #[test]
    fn test_apply_credit_amount_mismatch_both_directions() {
        for amount in [Money::from_major(100_000), Money::from_major(200_000)] {
            let mut order = placed(home());
            let mut acct = account(500_000, 0);
            let before = acct.clone();

            assert_eq!(
                apply_credit(&mut order, &mut acct, amount, t0()),
                Err(CoreError::AmountMismatch {
                    expected: Money::from_major(119_000),
                    actual: amount,
                })
            );
            assert_eq!(acct, before);
            assert_eq!(order.credit_applied(), Money::zero());
        }
    }

    #[test]
    fn test_apply_credit_mismatch_reported_before_balance() {
        let mut order = placed(home());
        let mut acct = account(150_000, 0);
        let before = acct.clone();

        assert_eq!(
            apply_credit(&mut order, &mut acct, Money::from_major(200_000), t0()),
            Err(CoreError::AmountMismatch {
                expected: Money::from_major(119_000),
                actual: Money::from_major(200_000),
            })
        );
        assert_eq!(acct, before);

        let mut drawn = account(150_000, 150_000);
        assert!(matches!(
            drawn.disburse_for_order(Money::from_major(1), t0()),
            Err(CoreError::InsufficientCredit { .. })
        ));
    }

    #[test]
    fn test_apply_credit_insufficient() {
        let mut order = placed(home());
        let mut acct = account(500_000, 450_000);
        let total = order.total();
        let err = apply_credit(&mut order, &mut acct, total, t0()).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientCredit {
                available: Money::from_major(50_000),
                requested: Money::from_major(119_000),
            }
        );
    }

    #[test]
    fn test_apply_credit_twice_rejected() {
        let mut order = placed(home());
        let mut acct = account(500_000, 0);
        let total = order.total();
        apply_credit(&mut order, &mut acct, total, t0()).unwrap();
        assert!(matches!(
            apply_credit(&mut order, &mut acct, total, t0()),
            Err(CoreError::InvalidState { .. })
        ));
        assert_eq!(acct.outstanding_principal(), Money::from_major(119_000));
    }
}
