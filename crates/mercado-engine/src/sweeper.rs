//! # Inactivity Sweeper
//!
//! Cancels `pending_payment_temporary` orders whose 60-minute hold ran out.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Sweeper Loop                                         │
//! │                                                                         │
//! │  every interval_secs:                                                  │
//! │    1. SELECT id FROM orders                                            │
//! │         WHERE status = 'pending_payment_temporary'                     │
//! │         ORDER BY created_at LIMIT batch_size                           │
//! │    2. for each id: Engine::expire_inactive_order                       │
//! │         (own write transaction, re-checks status, proofs, deadline)    │
//! │    3. log SweepReport                                                  │
//! │                                                                         │
//! │  shutdown: SweeperHandle::shutdown() ends the loop between ticks       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each order is re-read inside its own transaction, so a proof uploaded
//! between the listing and the expiry wins.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mercado_core::{InactivityOutcome, OrderStatus};

use crate::config::SweeperSettings;
use crate::error::EngineResult;
use crate::Engine;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    pub not_due: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Engine {
    /// One pass over the oldest temporary holds.
    pub async fn sweep_inactive_orders(&self, batch_size: u32) -> EngineResult<SweepReport> {
        let ids = self
            .db
            .orders()
            .list_ids_by_status(OrderStatus::PendingPaymentTemporary, batch_size)
            .await?;

        let mut report = SweepReport {
            examined: ids.len(),
            ..SweepReport::default()
        };

        for id in &ids {
            match self.expire_inactive_order(id).await {
                Ok(InactivityOutcome::Expired(_)) => report.expired += 1,
                Ok(InactivityOutcome::NotDue { .. }) => report.not_due += 1,
                Ok(InactivityOutcome::Skipped { .. }) => report.skipped += 1,
                Err(e) => {
                    warn!(order_id = %id, error = %e, "Failed to expire order");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Handle for stopping a running sweeper.
#[derive(Debug, Clone)]
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

pub struct InactivitySweeper {
    engine: Engine,
    settings: SweeperSettings,
    shutdown_rx: mpsc::Receiver<()>,
}

impl InactivitySweeper {
    pub fn new(engine: Engine, settings: SweeperSettings) -> (Self, SweeperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sweeper = InactivitySweeper {
            engine,
            settings,
            shutdown_rx,
        };
        (sweeper, SweeperHandle { shutdown_tx })
    }

    /// Runs until [`SweeperHandle::shutdown`] is called or every handle is
    /// dropped. Spawn it as a background task.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.settings.interval_secs,
            batch_size = self.settings.batch_size,
            "Inactivity sweeper starting"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(self.settings.interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.sweep_once().await,

                _ = self.shutdown_rx.recv() => {
                    info!("Inactivity sweeper shutting down");
                    break;
                }
            }
        }

        info!("Inactivity sweeper stopped");
    }

    async fn sweep_once(&self) {
        match self.engine.sweep_inactive_orders(self.settings.batch_size).await {
            Ok(report) if report.examined == 0 => debug!("No temporary holds to sweep"),
            Ok(report) => info!(
                examined = report.examined,
                expired = report.expired,
                not_due = report.not_due,
                skipped = report.skipped,
                failed = report.failed,
                "Sweep finished"
            ),
            Err(e) => warn!(error = %e, "Sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine, guest, new_order};
    use chrono::{Duration as ChronoDuration, Utc};
    use mercado_core::{Delivery, Order};
    use mercado_db::OrderRepository;

    async fn insert_aged(engine: &Engine, minutes: i64) -> Order {
        let order = Order::place(
            new_order(guest(), Delivery::StorePickup, true),
            Utc::now() - ChronoDuration::minutes(minutes),
        )
        .unwrap();
        let mut tx = engine.database().begin_write().await.unwrap();
        OrderRepository::insert(tx.conn(), &order).await.unwrap();
        tx.commit().await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_sweep_expires_only_due_holds() {
        let (engine, _rx) = engine().await;
        let stale = insert_aged(&engine, 90).await;
        let fresh = insert_aged(&engine, 5).await;
        engine
            .place_order(new_order(guest(), Delivery::StorePickup, false))
            .await
            .unwrap();

        let report = engine.sweep_inactive_orders(100).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                examined: 2,
                expired: 1,
                not_due: 1,
                ..SweepReport::default()
            }
        );

        let stale = engine.get_order(stale.id()).await.unwrap();
        assert_eq!(stale.status(), OrderStatus::CancelledForInactivity);
        assert!(stale.cancellation_reason().is_some());
        let fresh = engine.get_order(fresh.id()).await.unwrap();
        assert_eq!(fresh.status(), OrderStatus::PendingPaymentTemporary);

        let again = engine.sweep_inactive_orders(100).await.unwrap();
        assert_eq!(again.examined, 1);
        assert_eq!(again.expired, 0);
    }

    #[tokio::test]
    async fn test_proof_upload_protects_hold() {
        let (engine, _rx) = engine().await;
        let order = insert_aged(&engine, 120).await;
        engine.submit_proof(order.id(), "TRX-88").await.unwrap();

        let report = engine.sweep_inactive_orders(100).await.unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(
            engine.get_order(order.id()).await.unwrap().status(),
            OrderStatus::InVerification
        );
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let (engine, _rx) = engine().await;
        let stale = insert_aged(&engine, 61).await;

        let settings = SweeperSettings {
            enabled: true,
            interval_secs: 1,
            batch_size: 10,
        };
        let (sweeper, handle) = InactivitySweeper::new(engine.clone(), settings);
        let task = tokio::spawn(sweeper.run());

        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;
        task.await.unwrap();

        assert_eq!(
            engine.get_order(stale.id()).await.unwrap().status(),
            OrderStatus::CancelledForInactivity
        );
    }
}
