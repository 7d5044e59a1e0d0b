//! # Notifications
//!
//! Fire-and-forget messages for the email collaborator.
//!
//! ```text
//!   commit() ──► Engine::publish(notification)
//!                    │
//!                    ▼
//!              dyn Notifier ── Err ──► warn!, swallowed
//!                    │
//!          ┌─────────┴──────────┐
//!          ▼                    ▼
//!   TracingNotifier       ChannelNotifier ──try_send──► mailer task
//! ```
//!
//! Notifications are published only after the transaction committed. A
//! failed notification never undoes or retries the state change.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use mercado_core::{Money, OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// A guest needs the access link to reopen their quote.
    QuoteCreated {
        quote_id: String,
        access_token: String,
        email: Option<String>,
        expires_at: DateTime<Utc>,
    },
    OrderStatusChanged {
        order_id: String,
        from: Option<OrderStatus>,
        to: OrderStatus,
        reason: Option<String>,
    },
    InstallmentRecorded {
        account_id: String,
        installment_id: String,
        amount: Money,
        remaining_debt: Money,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::QuoteCreated { .. } => "quote_created",
            Notification::OrderStatusChanged { .. } => "order_status_changed",
            Notification::InstallmentRecorded { .. } => "installment_recorded",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Notification channel is full")]
    ChannelFull,

    #[error("Notification channel is closed")]
    ChannelClosed,
}

/// Delivery seam for the notification collaborator.
///
/// Implementations must not block: they run on the request path right
/// after commit.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Logs every notification.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification).unwrap_or_default();
        info!(kind = notification.kind(), %payload, "Notification");
        Ok(())
    }
}

/// Drops every notification (notifications disabled).
#[derive(Debug, Default, Clone)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Hands notifications to a mailer task over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ChannelNotifier { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.tx
            .try_send(notification.clone())
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => NotifyError::ChannelFull,
                mpsc::error::TrySendError::Closed(_) => NotifyError::ChannelClosed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_changed() -> Notification {
        Notification::OrderStatusChanged {
            order_id: "o-1".to_string(),
            from: Some(OrderStatus::InVerification),
            to: OrderStatus::Confirmed,
            reason: None,
        }
    }

    #[test]
    fn test_serializes_with_event_tag() {
        let json = serde_json::to_value(status_changed()).unwrap();
        assert_eq!(json["event"], "order_status_changed");
        assert_eq!(json["to"], "confirmed");
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers_and_reports_full() {
        let (notifier, mut rx) = ChannelNotifier::new(1);
        notifier.notify(&status_changed()).unwrap();
        assert_eq!(notifier.notify(&status_changed()), Err(NotifyError::ChannelFull));

        assert_eq!(rx.recv().await, Some(status_changed()));

        drop(rx);
        assert_eq!(notifier.notify(&status_changed()), Err(NotifyError::ChannelClosed));
    }
}
