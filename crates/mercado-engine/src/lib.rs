//! # mercado-engine: Lifecycle Orchestration
//!
//! The only mutation surface for quotes, orders and credit accounts.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Every mutating call                                │
//! │                                                                         │
//! │  1. db.begin_write()           ← one writer at a time                  │
//! │  2. load aggregate(s) in tx    ← fresh state, never a stale snapshot   │
//! │  3. mercado-core operation     ← all checks before any write           │
//! │  4. save aggregate(s) + audit                                          │
//! │  5. commit                     ← all-or-nothing across aggregates      │
//! │  6. publish notification       ← failures logged and swallowed         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A core error at step 3 drops the transaction, so the stored aggregate is
//! exactly what it was before the call.
//!
//! ## Modules
//! - [`quotes`] - create, read and convert quotes
//! - [`orders`] - checkout, proofs, verification, transitions
//! - [`credit`] - credit requests, installments, interest
//! - [`sweeper`] - inactivity timeouts for temporary holds
//! - [`config`] - TOML + environment configuration
//! - [`notify`] - notification seam
//! - [`telemetry`] - tracing bootstrap

pub mod config;
pub mod credit;
pub mod error;
pub mod notify;
pub mod orders;
pub mod quotes;
pub mod sweeper;
pub mod telemetry;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::warn;

use mercado_db::Database;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use notify::{
    ChannelNotifier, DisabledNotifier, Notification, Notifier, NotifyError, TracingNotifier,
};
pub use quotes::QuoteView;
pub use sweeper::{InactivitySweeper, SweepReport, SweeperHandle};

/// Shared handle to the lifecycle services. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    db: Database,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>) -> Self {
        Engine { db, notifier }
    }

    /// Builds the notifier the configuration asks for.
    ///
    /// With notifications enabled, events go into a channel holding
    /// `notifications.channel_capacity` of them and the receiver is handed
    /// back for the mailer to drain.
    pub fn from_config(
        db: Database,
        config: &EngineConfig,
    ) -> (Self, Option<mpsc::Receiver<Notification>>) {
        if config.notifications.enabled {
            let (notifier, rx) = ChannelNotifier::new(config.notifications.channel_capacity);
            (Engine::new(db, Arc::new(notifier)), Some(rx))
        } else {
            (Engine::new(db, Arc::new(DisabledNotifier)), None)
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Post-commit, best effort.
    fn publish(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification) {
            warn!(kind = notification.kind(), error = %e, "Notification dropped");
        }
    }
}


#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use mercado_core::{
        Delivery, GuestContact, Holder, LineItemInput, Money, NewOrder,
    };
    use mercado_db::DbConfig;

    pub async fn engine() -> (Engine, mpsc::Receiver<Notification>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (notifier, rx) = ChannelNotifier::new(64);
        (Engine::new(db, Arc::new(notifier)), rx)
    }

    pub fn guest() -> Holder {
        Holder::Guest(GuestContact {
            name: "Camila Ruiz".to_string(),
            email: "camila@correo.co".to_string(),
            phone: Some("3115550000".to_string()),
            document: Some("52123456".to_string()),
        })
    }

    pub fn customer(id: &str) -> Holder {
        Holder::Customer {
            customer_id: id.to_string(),
        }
    }

    /// One line of 100,000.00; total 119,000.00 with VAT.
    pub fn lines() -> Vec<LineItemInput> {
        vec![LineItemInput {
            product_ref: "TAL-01".to_string(),
            name: "Taladro percutor".to_string(),
            quantity: 1,
            unit_price_cents: Money::from_major(100_000).cents(),
        }]
    }

    pub fn new_order(holder: Holder, delivery: Delivery, temporary_hold: bool) -> NewOrder {
        NewOrder {
            holder,
            lines: lines(),
            delivery,
            temporary_hold,
        }
    }

    pub fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }
}
