//! # Credit Service
//!
//! Credit requests, installments, interest accruals and administrative
//! account status changes. A customer holds at most one Credit Account;
//! the `credit_accounts.customer_id` UNIQUE constraint backs that up.

use chrono::{DateTime, Utc};
use tracing::info;

use mercado_core::{
    CoreResult, CreditAccount, CreditRequest, Installment, InstallmentInput, Money,
    ValidationError,
};
use mercado_db::{CreditRepository, DbError};

use crate::error::{EngineError, EngineResult};
use crate::notify::Notification;
use crate::Engine;

fn duplicate_account(customer_id: &str) -> EngineError {
    ValidationError::Duplicate {
        field: "credit_account.customer_id".to_string(),
        value: customer_id.to_string(),
    }
    .into()
}

impl Engine {
    pub async fn submit_credit_request(
        &self,
        customer_id: &str,
        requested_amount: Money,
        term_months: u32,
    ) -> EngineResult<CreditRequest> {
        let request = CreditRequest::submit(customer_id, requested_amount, term_months, self.now())?;

        let mut tx = self.db.begin_write().await?;
        if CreditRepository::find_account_by_customer(tx.conn(), request.customer_id())
            .await?
            .is_some()
        {
            return Err(duplicate_account(request.customer_id()));
        }
        CreditRepository::insert_request(tx.conn(), &request).await?;
        tx.commit().await?;

        info!(
            request_id = %request.id(),
            customer_id = %request.customer_id(),
            amount = %request.requested_amount(),
            term_months,
            "Credit request submitted"
        );
        Ok(request)
    }

    /// Approves a pending request and opens the customer's account.
    pub async fn approve_credit_request(
        &self,
        request_id: &str,
        approved_amount: Money,
        rationale: Option<&str>,
    ) -> EngineResult<CreditAccount> {
        let now = self.now();
        let mut tx = self.db.begin_write().await?;

        let mut request = CreditRepository::find_request(tx.conn(), request_id)
            .await?
            .ok_or_else(|| EngineError::not_found("CreditRequest", request_id))?;

        let account = request.approve(approved_amount, rationale, now)?;

        if CreditRepository::find_account_by_customer(tx.conn(), account.customer_id())
            .await?
            .is_some()
        {
            return Err(duplicate_account(account.customer_id()));
        }
        CreditRepository::insert_account(tx.conn(), &account)
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => duplicate_account(account.customer_id()),
                other => other.into(),
            })?;
        CreditRepository::update_request(tx.conn(), &request).await?;
        tx.commit().await?;

        info!(
            request_id,
            account_id = %account.id(),
            limit = %account.approved_limit(),
            "Credit request approved"
        );
        Ok(account)
    }

    pub async fn reject_credit_request(
        &self,
        request_id: &str,
        rationale: &str,
    ) -> EngineResult<CreditRequest> {
        let now = self.now();
        let mut tx = self.db.begin_write().await?;

        let mut request = CreditRepository::find_request(tx.conn(), request_id)
            .await?
            .ok_or_else(|| EngineError::not_found("CreditRequest", request_id))?;

        request.reject(Some(rationale), now)?;
        CreditRepository::update_request(tx.conn(), &request).await?;
        tx.commit().await?;

        info!(request_id, "Credit request rejected");
        Ok(request)
    }

    /// Applies a customer payment, principal first.
    pub async fn record_installment(
        &self,
        account_id: &str,
        input: InstallmentInput,
    ) -> EngineResult<Installment> {
        let (account, installment) = self
            .mutate_account(account_id, |account, now| {
                account.record_installment(input, now)
            })
            .await?;

        info!(
            account_id,
            installment_id = %installment.id,
            amount = %installment.amount,
            principal = %installment.principal_portion,
            interest = %installment.interest_portion,
            status = %account.status(),
            "Installment recorded"
        );

        self.publish(Notification::InstallmentRecorded {
            account_id: account.id().to_string(),
            installment_id: installment.id.clone(),
            amount: installment.amount,
            remaining_debt: account.total_debt(),
        });
        Ok(installment)
    }

    /// Records an externally computed interest charge.
    pub async fn accrue_interest(
        &self,
        account_id: &str,
        amount: Money,
    ) -> EngineResult<CreditAccount> {
        let (account, ()) = self
            .mutate_account(account_id, |account, now| account.accrue_interest(amount, now))
            .await?;
        info!(account_id, %amount, debt = %account.total_debt(), "Interest accrued");
        Ok(account)
    }

    pub async fn mark_account_overdue(&self, account_id: &str) -> EngineResult<CreditAccount> {
        let (account, ()) = self
            .mutate_account(account_id, |account, now| account.mark_overdue(now))
            .await?;
        info!(account_id, "Credit account marked overdue");
        Ok(account)
    }

    pub async fn void_account(&self, account_id: &str) -> EngineResult<CreditAccount> {
        let (account, ()) = self
            .mutate_account(account_id, |account, now| account.void(now))
            .await?;
        info!(account_id, "Credit account voided");
        Ok(account)
    }

    pub async fn get_credit_account(&self, account_id: &str) -> EngineResult<CreditAccount> {
        self.db
            .credit()
            .get_account(account_id)
            .await?
            .ok_or_else(|| EngineError::not_found("CreditAccount", account_id))
    }

    pub async fn get_credit_account_by_customer(
        &self,
        customer_id: &str,
    ) -> EngineResult<Option<CreditAccount>> {
        Ok(self.db.credit().get_account_by_customer(customer_id).await?)
    }

    pub async fn get_credit_request(&self, request_id: &str) -> EngineResult<CreditRequest> {
        self.db
            .credit()
            .get_request(request_id)
            .await?
            .ok_or_else(|| EngineError::not_found("CreditRequest", request_id))
    }

    /// Newest first.
    pub async fn list_credit_requests(&self, customer_id: &str) -> EngineResult<Vec<CreditRequest>> {
        Ok(self.db.credit().list_requests_by_customer(customer_id).await?)
    }

    /// Load, apply `op`, save, commit. Nothing is written when `op` fails.
    async fn mutate_account<T>(
        &self,
        account_id: &str,
        op: impl FnOnce(&mut CreditAccount, DateTime<Utc>) -> CoreResult<T>,
    ) -> EngineResult<(CreditAccount, T)> {
        let now = self.now();
        let mut tx = self.db.begin_write().await?;

        let mut account = CreditRepository::find_account(tx.conn(), account_id)
            .await?
            .ok_or_else(|| EngineError::not_found("CreditAccount", account_id))?;

        let out = op(&mut account, now)?;

        CreditRepository::update_account(tx.conn(), &account).await?;
        tx.commit().await?;
        Ok((account, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer, drain, engine, new_order};
    use mercado_core::{
        CoreError, CreditAccountStatus, CreditRequestStatus, Delivery, InstallmentMethod,
    };

    fn installment(major: i64) -> InstallmentInput {
        InstallmentInput {
            amount: Money::from_major(major),
            paid_at: Utc::now(),
            method: InstallmentMethod::BankTransfer,
            proof_reference: Some("CONS-118".to_string()),
        }
    }

    async fn approved(engine: &Engine, customer_id: &str, limit: i64) -> CreditAccount {
        let request = engine
            .submit_credit_request(customer_id, Money::from_major(limit), 12)
            .await
            .unwrap();
        engine
            .approve_credit_request(request.id(), Money::from_major(limit), Some("buen historial"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_approve_opens_single_account() {
        let (engine, _rx) = engine().await;
        let account = approved(&engine, "cust-1", 300_000).await;

        assert_eq!(account.status(), CreditAccountStatus::Active);
        assert_eq!(account.available_balance(), Money::from_major(300_000));

        let by_customer = engine.get_credit_account_by_customer("cust-1").await.unwrap();
        assert_eq!(by_customer.as_ref().map(|a| a.id()), Some(account.id()));

        let requests = engine.list_credit_requests("cust-1").await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status(), CreditRequestStatus::Approved);
        assert_eq!(requests[0].credit_account_id(), Some(account.id()));

        let err = engine
            .submit_credit_request("cust-1", Money::from_major(50_000), 6)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_second_pending_request_cannot_open_second_account() {
        let (engine, _rx) = engine().await;
        let first = engine
            .submit_credit_request("cust-2", Money::from_major(100_000), 6)
            .await
            .unwrap();
        let second = engine
            .submit_credit_request("cust-2", Money::from_major(200_000), 6)
            .await
            .unwrap();

        engine
            .approve_credit_request(first.id(), Money::from_major(100_000), None)
            .await
            .unwrap();
        let err = engine
            .approve_credit_request(second.id(), Money::from_major(200_000), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));

        let second = engine.get_credit_request(second.id()).await.unwrap();
        assert_eq!(second.status(), CreditRequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_reject_requires_rationale_and_opens_nothing() {
        let (engine, _rx) = engine().await;
        let request = engine
            .submit_credit_request("cust-3", Money::from_major(100_000), 6)
            .await
            .unwrap();

        let err = engine.reject_credit_request(request.id(), " ").await.unwrap_err();
        assert_eq!(err.as_core(), Some(&CoreError::MissingReason));

        let rejected = engine
            .reject_credit_request(request.id(), "ingresos insuficientes")
            .await
            .unwrap();
        assert_eq!(rejected.status(), CreditRequestStatus::Rejected);
        assert!(engine
            .get_credit_account_by_customer("cust-3")
            .await
            .unwrap()
            .is_none());

        let err = engine
            .approve_credit_request(request.id(), Money::from_major(100_000), None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_installments_principal_first_until_paid() {
        let (engine, mut rx) = engine().await;
        let account = approved(&engine, "cust-4", 119_000).await;

        engine
            .place_order_with_credit(
                new_order(customer("cust-4"), Delivery::StorePickup, false),
                account.id(),
            )
            .await
            .unwrap();
        engine
            .accrue_interest(account.id(), Money::from_major(1_000))
            .await
            .unwrap();
        drain(&mut rx);

        let first = engine
            .record_installment(account.id(), installment(100_000))
            .await
            .unwrap();
        assert_eq!(first.principal_portion, Money::from_major(100_000));
        assert_eq!(first.interest_portion, Money::zero());

        let second = engine
            .record_installment(account.id(), installment(20_000))
            .await
            .unwrap();
        assert_eq!(second.principal_portion, Money::from_major(19_000));
        assert_eq!(second.interest_portion, Money::from_major(1_000));

        let account = engine.get_credit_account(account.id()).await.unwrap();
        assert_eq!(account.status(), CreditAccountStatus::Paid);
        assert_eq!(account.total_debt(), Money::zero());
        assert_eq!(account.installments().len(), 2);

        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[1],
            Notification::InstallmentRecorded { remaining_debt, .. } if remaining_debt.is_zero()
        ));
    }

    #[tokio::test]
    async fn test_overpayment_and_drawn_account_rejected() {
        let (engine, _rx) = engine().await;
        let account = approved(&engine, "cust-5", 119_000).await;

        let err = engine
            .record_installment(account.id(), installment(1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::InvalidAmount { .. })));

        engine
            .place_order_with_credit(
                new_order(customer("cust-5"), Delivery::StorePickup, false),
                account.id(),
            )
            .await
            .unwrap();

        let err = engine
            .place_order_with_credit(
                new_order(customer("cust-5"), Delivery::StorePickup, false),
                account.id(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.as_core(),
            Some(&CoreError::InsufficientCredit {
                available: Money::zero(),
                requested: Money::from_major(119_000),
            })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_draw_balance_once() {
        let (engine, _rx) = engine().await;
        let account = approved(&engine, "cust-8", 200_000).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                let account_id = account.id().to_string();
                tokio::spawn(async move {
                    engine
                        .place_order_with_credit(
                            new_order(customer("cust-8"), Delivery::StorePickup, false),
                            &account_id,
                        )
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) if matches!(e.as_core(), Some(CoreError::InsufficientCredit { .. })) => {
                    refused += 1
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, refused), (1, 1));

        let stored = engine.get_credit_account(account.id()).await.unwrap();
        assert_eq!(stored.outstanding_principal(), Money::from_major(119_000));
        assert_eq!(engine.list_customer_orders("cust-8").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_checkout_racing_installment_keeps_both() {
        let (engine, _rx) = engine().await;
        let account = approved(&engine, "cust-9", 300_000).await;
        engine
            .place_order_with_credit(
                new_order(customer("cust-9"), Delivery::StorePickup, false),
                account.id(),
            )
            .await
            .unwrap();

        let checkout = {
            let engine = engine.clone();
            let account_id = account.id().to_string();
            tokio::spawn(async move {
                engine
                    .place_order_with_credit(
                        new_order(customer("cust-9"), Delivery::StorePickup, false),
                        &account_id,
                    )
                    .await
            })
        };
        let payment = {
            let engine = engine.clone();
            let account_id = account.id().to_string();
            tokio::spawn(async move {
                engine
                    .record_installment(&account_id, installment(50_000))
                    .await
            })
        };
        checkout.await.unwrap().unwrap();
        payment.await.unwrap().unwrap();

        let stored = engine.get_credit_account(account.id()).await.unwrap();
        assert_eq!(stored.outstanding_principal(), Money::from_major(188_000));
        assert_eq!(stored.installments().len(), 1);
    }

    #[tokio::test]
    async fn test_overdue_and_void() {
        let (engine, _rx) = engine().await;
        let account = approved(&engine, "cust-6", 500_000).await;

        // Nothing owed yet.
        let err = engine.mark_account_overdue(account.id()).await.unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::InvalidState { .. })));

        engine
            .accrue_interest(account.id(), Money::from_major(5_000))
            .await
            .unwrap();
        let overdue = engine.mark_account_overdue(account.id()).await.unwrap();
        assert_eq!(overdue.status(), CreditAccountStatus::Overdue);

        let voided = engine.void_account(account.id()).await.unwrap();
        assert_eq!(voided.status(), CreditAccountStatus::Voided);

        let err = engine
            .accrue_interest(account.id(), Money::from_major(1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::InvalidState { .. })));

        let stored = engine.get_credit_account(account.id()).await.unwrap();
        assert_eq!(stored.accrued_interest(), Money::from_major(5_000));
    }
}
