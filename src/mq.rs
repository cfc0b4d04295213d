//! Message-queue surface (spec §6.3). The core treats the broker as an
//! external adapter — no AMQP/Kafka crate appears anywhere in the retrieval
//! pack, so this module stops at the message shape and the single entry
//! point a consumer would call, rather than fabricating a broker binding.

use chrono::{DateTime, Utc};
use serde_derive::Deserialize;

use crate::service::{AuctionService, LockPoisoned, ProcessBidOutcome, ProcessBidResult};

/// Shape of an inbound bid delivered off the `notifications` queue (spec
/// §6.3's logical name; the concrete broker and topic are a deployment
/// concern).
#[derive(Debug, Clone, Deserialize)]
pub struct InboundBidMessage {
    pub item_id: String,
    pub bidder_user_id: String,
    pub time_received: DateTime<Utc>,
    pub amount_in_cents: i64,
}

/// The single point a queue consumer calls per message. Each message is
/// processed once and auto-acknowledged by the (external) consumer
/// regardless of outcome — failures are logged by the caller, not retried,
/// per spec §6.3.
pub fn process_inbound_bid(
    service: &AuctionService,
    message: InboundBidMessage,
) -> Result<ProcessBidResult, LockPoisoned> {
    service.process_new_bid(
        &message.item_id,
        &message.bidder_user_id,
        message.time_received,
        message.amount_in_cents,
    )
}

#[allow(dead_code)]
fn describe_outcome(result: &ProcessBidResult) -> &'static str {
    match result.outcome {
        ProcessBidOutcome::AuctionNotExist => "auction does not exist",
        ProcessBidOutcome::NegativeAmount => "bid amount must be nonnegative",
        ProcessBidOutcome::Processed => "processed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_util::FixedClock;
    use crate::notifications::test_util::RecordingNotificationSink;
    use crate::repository::{InMemoryAuctionRepository, InMemoryBidRepository};
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn process_inbound_bid_delegates_to_the_service() {
        let now = "2020-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let bid_repo = Arc::new(InMemoryBidRepository::new("mq"));
        let service = AuctionService::new(
            bid_repo.clone(),
            Arc::new(InMemoryAuctionRepository::new(bid_repo)),
            Arc::new(FixedClock::new(now - Duration::hours(1))),
            Arc::new(RecordingNotificationSink::default()),
        );
        service.create_auction("i1", "seller", now, now + Duration::hours(1), 100).unwrap();

        let result = process_inbound_bid(
            &service,
            InboundBidMessage {
                item_id: "i1".to_string(),
                bidder_user_id: "bidder".to_string(),
                time_received: now + Duration::minutes(1),
                amount_in_cents: 200,
            },
        )
        .unwrap();
        assert!(result.was_new_top_bid);
    }
}
