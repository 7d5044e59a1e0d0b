//! # Order Service
//!
//! Checkout, proof upload, payment verification and status transitions.
//!
//! ## Credit checkout
//! ```text
//!   begin_write
//!     ├── find credit account (must belong to the order's customer)
//!     ├── Order::place
//!     ├── payment::apply_credit(order, account, total)
//!     ├── insert order + "created" history row
//!     └── update account
//!   commit                        ← order and debit land together
//! ```
//!
//! A credit-covered order stays pending; the `→ confirmed` shortcut is then
//! available without any proof. Cancelling it gives the debit back to the
//! account inside the same transaction.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use mercado_core::payment;
use mercado_core::{
    CoreError, InactivityOutcome, Money, NewOrder, Order, OrderProjection, OrderStatus,
    PaymentProof, StatusChange,
};
use mercado_db::{CreditRepository, OrderRepository, WriteTx};

use crate::error::{EngineError, EngineResult};
use crate::notify::Notification;
use crate::Engine;

impl Engine {
    /// Direct checkout without credit.
    pub async fn place_order(&self, new: NewOrder) -> EngineResult<Order> {
        let order = Order::place(new, self.now())?;

        let mut tx = self.db.begin_write().await?;
        OrderRepository::insert(tx.conn(), &order).await?;
        OrderRepository::append_history(tx.conn(), &StatusChange::created(&order)).await?;
        tx.commit().await?;

        info!(order_id = %order.id(), status = %order.status(), total = %order.total(), "Order placed");
        self.publish_change(&StatusChange::created(&order));
        Ok(order)
    }

    /// Direct checkout paid in full from the customer's credit account.
    pub async fn place_order_with_credit(
        &self,
        new: NewOrder,
        account_id: &str,
    ) -> EngineResult<Order> {
        let now = self.now();
        let mut order = Order::place(new, now)?;

        let mut tx = self.db.begin_write().await?;
        let mut account = CreditRepository::find_account(tx.conn(), account_id)
            .await?
            .ok_or_else(|| EngineError::not_found("CreditAccount", account_id))?;

        if order.holder().customer_id() != Some(account.customer_id()) {
            return Err(
                CoreError::invalid_state("pay with another customer's credit", account.status())
                    .into(),
            );
        }

        let total = order.total();
        payment::apply_credit(&mut order, &mut account, total, now)?;

        OrderRepository::insert(tx.conn(), &order).await?;
        OrderRepository::append_history(tx.conn(), &StatusChange::created(&order)).await?;
        CreditRepository::update_account(tx.conn(), &account).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id(),
            account_id = %account.id(),
            amount = %order.credit_applied(),
            available = %account.available_balance(),
            "Order placed on credit"
        );
        self.publish_change(&StatusChange::created(&order));
        Ok(order)
    }

    /// Attaches a transfer receipt and, where the edge exists, moves the
    /// order to `in_verification`.
    pub async fn submit_proof(&self, order_id: &str, reference: &str) -> EngineResult<PaymentProof> {
        let now = self.now();
        let mut tx = self.db.begin_write().await?;
        let mut order = Self::load_order(&mut tx, order_id).await?;

        let proof = payment::submit_proof(&mut order, reference, now)?;

        let change = if order.status() != OrderStatus::InVerification
            && order.allowed_next().contains(&OrderStatus::InVerification)
        {
            Some(order.transition(OrderStatus::InVerification, None, now)?)
        } else {
            None
        };

        OrderRepository::update(tx.conn(), &order).await?;
        if let Some(change) = &change {
            OrderRepository::append_history(tx.conn(), change).await?;
        }
        tx.commit().await?;

        debug!(order_id, proof_id = %proof.id, "Payment proof attached");
        if let Some(change) = &change {
            self.publish_change(change);
        }
        Ok(proof)
    }

    /// Records a verified transfer amount. Returns the running total.
    ///
    /// The status is left alone; the administrator decides with
    /// [`Engine::transition_order`].
    pub async fn verify_payment(&self, order_id: &str, amount: Money) -> EngineResult<Money> {
        let now = self.now();
        let mut tx = self.db.begin_write().await?;
        let mut order = Self::load_order(&mut tx, order_id).await?;

        let running = payment::verify(&mut order, amount, now)?;

        OrderRepository::update(tx.conn(), &order).await?;
        tx.commit().await?;

        info!(order_id, %amount, verified = %running, total = %order.total(), "Payment verified");
        Ok(running)
    }

    /// Moves an order to `target`.
    ///
    /// Cancelling a credit-covered order reverses the debit on its account
    /// in the same transaction.
    pub async fn transition_order(
        &self,
        order_id: &str,
        target: OrderStatus,
        reason: Option<&str>,
    ) -> EngineResult<Order> {
        let now = self.now();
        let mut tx = self.db.begin_write().await?;
        let mut order = Self::load_order(&mut tx, order_id).await?;

        let change = order.transition(target, reason, now)?;

        if target == OrderStatus::Cancelled {
            Self::reverse_credit(&mut tx, &order, now).await?;
        }

        OrderRepository::update(tx.conn(), &order).await?;
        OrderRepository::append_history(tx.conn(), &change).await?;
        tx.commit().await?;

        info!(
            order_id,
            from = ?change.from,
            to = %change.to,
            reason = change.reason.as_deref().unwrap_or(""),
            "Order status changed"
        );
        self.publish_change(&change);
        Ok(order)
    }

    pub async fn cancel_order(&self, order_id: &str, reason: &str) -> EngineResult<Order> {
        self.transition_order(order_id, OrderStatus::Cancelled, Some(reason))
            .await
    }

    /// Scheduler entry point; safe to call repeatedly on the same order.
    pub async fn expire_inactive_order(&self, order_id: &str) -> EngineResult<InactivityOutcome> {
        let now = self.now();
        let mut tx = self.db.begin_write().await?;
        let mut order = Self::load_order(&mut tx, order_id).await?;

        let outcome = order.expire_for_inactivity(now);
        if let InactivityOutcome::Expired(change) = &outcome {
            OrderRepository::update(tx.conn(), &order).await?;
            OrderRepository::append_history(tx.conn(), change).await?;
            tx.commit().await?;

            info!(order_id, "Order cancelled for inactivity");
            self.publish_change(change);
        }
        Ok(outcome)
    }

    pub async fn get_order(&self, order_id: &str) -> EngineResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))
    }

    /// A registered customer's orders, newest first.
    pub async fn list_customer_orders(&self, customer_id: &str) -> EngineResult<Vec<Order>> {
        Ok(self.db.orders().list_by_customer(customer_id).await?)
    }

    pub async fn order_projection(&self, order_id: &str) -> EngineResult<OrderProjection> {
        Ok(self.get_order(order_id).await?.projection())
    }

    /// Audit trail, oldest first.
    pub async fn order_history(&self, order_id: &str) -> EngineResult<Vec<StatusChange>> {
        // Distinguish "unknown order" from "no history".
        self.get_order(order_id).await?;
        Ok(self.db.orders().history(order_id).await?)
    }

    async fn load_order(tx: &mut WriteTx, order_id: &str) -> EngineResult<Order> {
        OrderRepository::find(tx.conn(), order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))
    }

    async fn reverse_credit(
        tx: &mut WriteTx,
        order: &Order,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let Some(account_id) = order.credit_account_id() else {
            return Ok(());
        };
        if !order.credit_applied().is_positive() {
            return Ok(());
        }

        let mut account = CreditRepository::find_account(tx.conn(), account_id)
            .await?
            .ok_or_else(|| EngineError::not_found("CreditAccount", account_id))?;

        let principal = account.outstanding_principal();
        let amount = order.credit_applied().min(principal);
        if amount < order.credit_applied() {
            warn!(
                order_id = %order.id(),
                account_id,
                applied = %order.credit_applied(),
                reversed = %amount,
                "Credit reversal capped at outstanding principal"
            );
        }
        if amount.is_positive() {
            account.reverse_disbursement(amount, now)?;
            CreditRepository::update_account(tx.conn(), &account).await?;
            info!(order_id = %order.id(), account_id, %amount, "Credit debit reversed");
        }
        Ok(())
    }

    fn publish_change(&self, change: &StatusChange) {
        self.publish(Notification::OrderStatusChanged {
            order_id: change.order_id.clone(),
            from: change.from,
            to: change.to,
            reason: change.reason.clone(),
        });
    }
}
