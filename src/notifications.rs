//! Outbound notification events and sinks.
//!
//! Notifications are fire-and-forget: delivery failure is not rolled back
//! and nothing here retries. A durable deployment that needs guaranteed
//! delivery should sit an outbox table behind [`NotificationSink`]; the
//! domain layer already marks idempotence via the `sent_*_alert` flags on
//! `Auction`, so redelivery of the same alert is safe to skip.

use log::info;

/// An event the auction engine wants delivered to a user. The core treats
/// the transport as opaque — HTTP push, email, a message queue, whatever
/// the deployment wires up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    NewTopBid {
        item_id: String,
        seller_user_id: String,
        amount_in_cents: i64,
    },
    Outbid {
        item_id: String,
        bidder_user_id: String,
        amount_in_cents: i64,
    },
    StartSoon {
        item_id: String,
        seller_user_id: String,
        message: String,
    },
    EndSoon {
        item_id: String,
        seller_user_id: String,
        message: String,
    },
}

/// A sink that notifications are handed to. Implementations are expected to
/// be cheap and non-blocking; the service calls this while holding its
/// mutex.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Default sink: logs at info level. Mirrors the original program's
/// `alertSeller`/`alertBidder` stubs, which did nothing but log.
#[derive(Default)]
pub struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::NewTopBid {
                item_id,
                seller_user_id,
                amount_in_cents,
            } => info!(
                "[auction {}] notifying seller {}: new top bid of {} cents",
                item_id, seller_user_id, amount_in_cents
            ),
            Notification::Outbid {
                item_id,
                bidder_user_id,
                amount_in_cents,
            } => info!(
                "[auction {}] notifying bidder {}: outbid, new top is {} cents",
                item_id, bidder_user_id, amount_in_cents
            ),
            Notification::StartSoon {
                item_id,
                seller_user_id,
                message,
            } => info!("[auction {}] notifying seller {}: {}", item_id, seller_user_id, message),
            Notification::EndSoon {
                item_id,
                seller_user_id,
                message,
            } => info!("[auction {}] notifying seller {}: {}", item_id, seller_user_id, message),
        }
    }
}

#[cfg(test)]
pub mod test_util {
    use super::*;
    use std::sync::Mutex;

    /// Captures every notification it receives, for assertions in tests.
    #[derive(Default)]
    pub struct RecordingNotificationSink {
        pub received: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for RecordingNotificationSink {
        fn notify(&self, notification: Notification) {
            self.received.lock().unwrap().push(notification);
        }
    }
}
