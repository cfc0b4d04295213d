//! The auction aggregate: owns an [`Item`], its bid history, and its
//! lifecycle records. All admission logic described in spec §4 lives here.

use chrono::{DateTime, Duration, Utc};

use crate::domain::bid::Bid;
use crate::domain::cancellation::Cancellation;
use crate::domain::errors::{AuctionState, BidRejection, LifecycleRejection};
use crate::domain::finalization::Finalization;
use crate::domain::item::Item;
use crate::notifications::Notification;

/// Outcome of [`Auction::process_new_bid`]. `state` is reported regardless
/// of outcome (callers use it to render a rejection message); `result`
/// carries the notifications to emit on acceptance or the spec §7 rejection
/// reason otherwise.
pub struct BidOutcome {
    pub state: AuctionState,
    pub result: Result<Vec<Notification>, BidRejection>,
}

impl BidOutcome {
    pub fn accepted(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct Auction {
    pub item: Item,
    pub(crate) bids: Vec<Bid>,
    cancellation: Option<Cancellation>,
    finalization: Option<Finalization>,
    sent_start_soon_alert: bool,
    sent_end_soon_alert: bool,
}

impl Auction {
    pub fn new(
        item: Item,
        bids: Vec<Bid>,
        cancellation: Option<Cancellation>,
        sent_start_soon_alert: bool,
        sent_end_soon_alert: bool,
        finalization: Option<Finalization>,
    ) -> Self {
        Self {
            item,
            bids,
            cancellation,
            finalization,
            sent_start_soon_alert,
            sent_end_soon_alert,
        }
    }

    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn has_cancellation(&self) -> bool {
        self.cancellation.is_some()
    }

    pub fn has_finalization(&self) -> bool {
        self.finalization.is_some()
    }

    pub fn cancellation(&self) -> Option<Cancellation> {
        self.cancellation
    }

    pub fn finalization(&self) -> Option<Finalization> {
        self.finalization
    }

    pub fn sent_start_soon_alert(&self) -> bool {
        self.sent_start_soon_alert
    }

    pub fn sent_end_soon_alert(&self) -> bool {
        self.sent_end_soon_alert
    }

    /// Six-branch derivation of lifecycle state at an instant. Start/end are
    /// inclusive in ACTIVE; cancellation/finalization instants are inclusive
    /// in their respective post-states; PENDING requires strict `t <
    /// start_time`. Any other configuration is an invariant violation.
    pub fn state_at(&self, t: DateTime<Utc>) -> AuctionState {
        if let Some(finalization) = self.finalization {
            if t >= finalization.time_received {
                return AuctionState::Finalized;
            }
        }
        if let Some(cancellation) = self.cancellation {
            if t >= cancellation.time_received {
                return AuctionState::Canceled;
            }
        }
        if t < self.item.start_time {
            return AuctionState::Pending;
        }
        if t >= self.item.start_time && t <= self.item.end_time {
            return AuctionState::Active;
        }
        if t > self.item.end_time {
            return AuctionState::Over;
        }
        unreachable!("Auction::state_at could not determine a lifecycle state");
    }

    /// Walks the bid sequence newest-to-oldest and returns the first active
    /// bid. Because accepted bids are strictly monotonic in amount, this is
    /// also the maximum-amount active bid.
    pub fn highest_active_bid(&self) -> Option<&Bid> {
        self.bids.iter().rev().find(|bid| bid.is_active())
    }

    pub fn has_active_bid(&self) -> bool {
        self.bids.iter().any(Bid::is_active)
    }

    /// Implements spec §4.2. Appends the bid on acceptance and returns the
    /// notifications the caller should hand to a `NotificationSink`, or the
    /// `BidRejection` reason spec §7 calls for otherwise.
    pub fn process_new_bid(&mut self, incoming: Bid) -> BidOutcome {
        if self.has_finalization() {
            return BidOutcome {
                state: AuctionState::Finalized,
                result: Err(BidRejection::Finalized),
            };
        }

        let state = self.state_at(incoming.time_received);
        match state {
            AuctionState::Pending => BidOutcome {
                state,
                result: Err(BidRejection::Pending),
            },
            AuctionState::Canceled => BidOutcome {
                state,
                result: Err(BidRejection::Canceled),
            },
            AuctionState::Over => BidOutcome {
                state,
                result: Err(BidRejection::Over),
            },
            AuctionState::Active => match self.highest_active_bid() {
                None => {
                    if incoming.amount_in_cents >= self.item.start_price_in_cents {
                        let notifications = vec![Notification::NewTopBid {
                            item_id: self.item.item_id.clone(),
                            seller_user_id: self.item.seller_user_id.clone(),
                            amount_in_cents: incoming.amount_in_cents,
                        }];
                        self.bids.push(incoming);
                        BidOutcome {
                            state: AuctionState::Active,
                            result: Ok(notifications),
                        }
                    } else {
                        BidOutcome {
                            state: AuctionState::Active,
                            result: Err(BidRejection::NotNewTopBid),
                        }
                    }
                }
                Some(top) => {
                    if incoming.outbids(top) {
                        let mut notifications = vec![Notification::NewTopBid {
                            item_id: self.item.item_id.clone(),
                            seller_user_id: self.item.seller_user_id.clone(),
                            amount_in_cents: incoming.amount_in_cents,
                        }];
                        notifications.push(Notification::Outbid {
                            item_id: self.item.item_id.clone(),
                            bidder_user_id: top.bidder_user_id.clone(),
                            amount_in_cents: incoming.amount_in_cents,
                        });
                        self.bids.push(incoming);
                        BidOutcome {
                            state: AuctionState::Active,
                            result: Ok(notifications),
                        }
                    } else {
                        BidOutcome {
                            state: AuctionState::Active,
                            result: Err(BidRejection::NotNewTopBid),
                        }
                    }
                }
            },
            AuctionState::Finalized | AuctionState::Unknown => {
                unreachable!("finalized auctions are rejected above; Unknown is not derivable from state_at")
            }
        }
    }

    /// Flips the `active` flag on every bid matching `user_id`, regardless
    /// of each bid's own `time_received`. `t` only gates *permission* to
    /// mutate — rejected only when the auction is finalized at `t`. Returns
    /// the bids whose flag actually changed, for the caller to persist.
    pub fn deactivate_user_bids(&mut self, user_id: &str, t: DateTime<Utc>) -> (Vec<Bid>, bool) {
        if self.state_at(t) == AuctionState::Finalized {
            return (vec![], false);
        }
        let mut changed = vec![];
        for bid in self.bids.iter_mut().filter(|b| b.bidder_user_id == user_id) {
            if bid.deactivate() {
                changed.push(bid.clone());
            }
        }
        (changed, true)
    }

    pub fn activate_user_bids(&mut self, user_id: &str, t: DateTime<Utc>) -> (Vec<Bid>, bool) {
        if self.state_at(t) == AuctionState::Finalized {
            return (vec![], false);
        }
        let mut changed = vec![];
        for bid in self.bids.iter_mut().filter(|b| b.bidder_user_id == user_id) {
            if bid.activate() {
                changed.push(bid.clone());
            }
        }
        (changed, true)
    }

    pub fn is_over_or_canceled_at(&self, t: DateTime<Utc>) -> bool {
        matches!(self.state_at(t), AuctionState::Over | AuctionState::Canceled)
    }

    /// Seller-initiated cancellation. Admissible iff no prior cancellation,
    /// no finalization, and either PENDING, or ACTIVE with no active bid —
    /// a seller may not walk away from a live, contested auction.
    pub fn cancel(&mut self, t: DateTime<Utc>) -> Result<(), LifecycleRejection> {
        if self.has_finalization() {
            return Err(LifecycleRejection::AlreadyFinalized);
        }
        if self.has_cancellation() {
            return Err(LifecycleRejection::AlreadyCanceled);
        }
        match self.state_at(t) {
            AuctionState::Pending => {
                self.cancellation = Some(Cancellation::new(t));
                Ok(())
            }
            AuctionState::Active if !self.has_active_bid() => {
                self.cancellation = Some(Cancellation::new(t));
                Ok(())
            }
            AuctionState::Active => Err(LifecycleRejection::ActiveWithBid),
            _ => Err(LifecycleRejection::AlreadyOver),
        }
    }

    /// Administrator-initiated cancellation. Admissible whenever PENDING or
    /// ACTIVE, bids notwithstanding — administrative intervention overrides
    /// bidder protection.
    pub fn stop(&mut self, t: DateTime<Utc>) -> Result<(), LifecycleRejection> {
        if self.has_finalization() {
            return Err(LifecycleRejection::AlreadyFinalized);
        }
        if self.has_cancellation() {
            return Err(LifecycleRejection::AlreadyCanceled);
        }
        match self.state_at(t) {
            AuctionState::Pending | AuctionState::Active => {
                self.cancellation = Some(Cancellation::new(t));
                Ok(())
            }
            _ => Err(LifecycleRejection::AlreadyOver),
        }
    }

    /// Admissible iff no prior finalization and state is CANCELED or OVER.
    pub fn finalize(&mut self, t: DateTime<Utc>) -> Result<(), LifecycleRejection> {
        if self.has_finalization() {
            return Err(LifecycleRejection::AlreadyFinalized);
        }
        match self.state_at(t) {
            AuctionState::Canceled | AuctionState::Over => {
                self.finalization = Some(Finalization::new(t));
                Ok(())
            }
            _ => Err(LifecycleRejection::InvalidState),
        }
    }

    pub fn overlaps_with(&self, left_bound: DateTime<Utc>, right_bound: DateTime<Utc>) -> bool {
        !(self.item.end_time < left_bound) && !(self.item.start_time > right_bound)
    }

    /// Spec §4.7. Returns whether the flag was (just now, or previously)
    /// latched, and a notification to emit the first time it latches.
    pub fn send_start_soon_alert_if_applicable(&mut self, now: DateTime<Utc>) -> (bool, Option<Notification>) {
        if self.sent_start_soon_alert {
            return (false, None);
        }
        let message = match self.state_at(now) {
            AuctionState::Pending => {
                let time_until_start = self.item.start_time - now;
                if time_until_start < Duration::hours(1) {
                    Some(format!("starts in {}", format_duration(time_until_start)))
                } else {
                    None
                }
            }
            AuctionState::Active => {
                let time_since_start = now - self.item.start_time;
                Some(format!("started {} ago", format_duration(time_since_start)))
            }
            AuctionState::Over | AuctionState::Canceled | AuctionState::Finalized => {
                Some(String::new())
            }
            AuctionState::Unknown => unreachable!("Unknown is not derivable from state_at"),
        };

        match message {
            None => (false, None),
            Some(msg) => {
                self.sent_start_soon_alert = true;
                let notification = if msg.is_empty() {
                    None
                } else {
                    Some(Notification::StartSoon {
                        item_id: self.item.item_id.clone(),
                        seller_user_id: self.item.seller_user_id.clone(),
                        message: msg,
                    })
                };
                (true, notification)
            }
        }
    }

    /// Spec §4.7, keyed off `end_time`.
    pub fn send_end_soon_alert_if_applicable(&mut self, now: DateTime<Utc>) -> (bool, Option<Notification>) {
        if self.sent_end_soon_alert {
            return (false, None);
        }
        let message = match self.state_at(now) {
            AuctionState::Active => {
                let time_until_end = self.item.end_time - now;
                if time_until_end < Duration::hours(1) {
                    Some(format!("ends in {}", format_duration(time_until_end)))
                } else {
                    None
                }
            }
            AuctionState::Over => {
                let since = now - self.item.end_time;
                Some(format!("ended {} ago", format_duration(since)))
            }
            AuctionState::Canceled => {
                let since = now
                    - self
                        .cancellation
                        .expect("CANCELED state implies a cancellation record")
                        .time_received;
                Some(format!("was canceled {} ago", format_duration(since)))
            }
            AuctionState::Finalized => {
                let since = now
                    - self
                        .finalization
                        .expect("FINALIZED state implies a finalization record")
                        .time_received;
                Some(format!("was finalized {} ago", format_duration(since)))
            }
            AuctionState::Pending => None,
            AuctionState::Unknown => unreachable!("Unknown is not derivable from state_at"),
        };

        match message {
            None => (false, None),
            Some(msg) => {
                self.sent_end_soon_alert = true;
                (
                    true,
                    Some(Notification::EndSoon {
                        item_id: self.item.item_id.clone(),
                        seller_user_id: self.item.seller_user_id.clone(),
                        message: msg,
                    }),
                )
            }
        }
    }
}

fn format_duration(d: Duration) -> String {
    let mins = d.num_minutes().abs();
    if mins < 60 {
        format!("{} minutes", mins)
    } else {
        format!("{} hours", d.num_hours().abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bid::Bid;

    fn make_auction(start: DateTime<Utc>, end: DateTime<Utc>, start_price: i64) -> Auction {
        let item = Item::new("item-1", "seller-1", start, end, start_price);
        Auction::new(item, vec![], None, false, false, None)
    }

    fn bid(id: &str, bidder: &str, t: DateTime<Utc>, amount: i64) -> Bid {
        Bid::new(id, "item-1", bidder, t, amount, true)
    }

    #[test]
    fn monotone_ladder_scenario() {
        let start = "2014-02-04T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = start + Duration::minutes(30);
        let mut auction = make_auction(start, end, 2000);

        let r1 = auction.process_new_bid(bid("b1", "u1", start + Duration::microseconds(1), 2000));
        assert!(r1.accepted());
        let r2 = auction.process_new_bid(bid("b2", "u2", start + Duration::minutes(1), 2500));
        assert!(r2.accepted());
        let r3 = auction.process_new_bid(bid("b3", "u3", start + Duration::minutes(2), 2225));
        assert!(!r3.accepted());
        assert_eq!(r3.result, Err(BidRejection::NotNewTopBid));
        let r4 = auction.process_new_bid(bid("b4", "u4", end, 3000));
        assert!(r4.accepted());
        let r5 = auction.process_new_bid(bid("b5", "u5", end + Duration::microseconds(1), 30000));
        assert!(!r5.accepted());
        assert_eq!(r5.state, AuctionState::Over);
        assert_eq!(r5.result, Err(BidRejection::Over));

        assert_eq!(auction.bids().len(), 3);
        assert_eq!(auction.highest_active_bid().unwrap().bid_id, "b4");
    }

    #[test]
    fn cancel_during_active_with_no_bids_succeeds() {
        let start = "2014-02-04T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = start + Duration::minutes(30);
        let mut auction = make_auction(start, end, 2000);

        assert!(auction.cancel(start + Duration::minutes(5)).is_ok());
        let r = auction.process_new_bid(bid("b1", "u1", start + Duration::minutes(10), 2000));
        assert!(!r.accepted());
        assert_eq!(r.state, AuctionState::Canceled);
    }

    #[test]
    fn cancel_denied_with_active_bid_but_stop_succeeds() {
        let start = "2014-02-04T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = start + Duration::minutes(30);
        let mut auction = make_auction(start, end, 2000);

        let r = auction.process_new_bid(bid("b1", "u1", start + Duration::minutes(5), 2000));
        assert!(r.accepted());

        assert_eq!(
            auction.cancel(start + Duration::minutes(10)),
            Err(LifecycleRejection::ActiveWithBid)
        );
        assert_eq!(auction.state_at(start + Duration::minutes(10)), AuctionState::Active);
        assert!(auction.stop(start + Duration::minutes(10)).is_ok());
    }

    #[test]
    fn finalize_timing() {
        let start = "2014-02-04T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = start + Duration::minutes(30);
        let mut auction = make_auction(start, end, 2000);

        assert!(auction.finalize(end + Duration::microseconds(1)).is_ok());
        assert_eq!(
            auction.finalize(end + Duration::microseconds(2)),
            Err(LifecycleRejection::AlreadyFinalized)
        );

        let r = auction.process_new_bid(bid("b1", "u1", end + Duration::microseconds(3), 5000));
        assert!(!r.accepted());
        assert_eq!(r.state, AuctionState::Finalized);
        assert_eq!(r.result, Err(BidRejection::Finalized));
    }

    #[test]
    fn deactivate_and_reactivate_user_bids() {
        let start = "2014-02-04T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = start + Duration::minutes(30);
        let mut auction = make_auction(start, end, 2000);

        auction.process_new_bid(bid("b1", "U", start + Duration::minutes(1), 2100));
        auction.process_new_bid(bid("b2", "U", start + Duration::minutes(2), 2200));
        auction.process_new_bid(bid("b3", "U", start + Duration::minutes(3), 2300));
        auction.process_new_bid(bid("b4", "V", start + Duration::minutes(4), 2400));

        let (changed, ok) = auction.deactivate_user_bids("U", start + Duration::minutes(5));
        assert!(ok);
        assert_eq!(changed.len(), 3);
        assert_eq!(auction.highest_active_bid().unwrap().bidder_user_id, "V");

        let (changed, ok) = auction.activate_user_bids("U", start + Duration::minutes(6));
        assert!(ok);
        assert_eq!(changed.len(), 3);
        assert_eq!(auction.highest_active_bid().unwrap().bid_id, "b3");
    }

    #[test]
    fn deactivate_rejected_once_finalized() {
        let start = "2014-02-04T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = start + Duration::minutes(30);
        let mut auction = make_auction(start, end, 2000);
        auction.process_new_bid(bid("b1", "U", start + Duration::minutes(1), 2100));
        assert!(auction.finalize(end + Duration::microseconds(1)).is_ok());

        let (changed, ok) = auction.deactivate_user_bids("U", end + Duration::microseconds(2));
        assert!(!ok);
        assert!(changed.is_empty());
    }

    #[test]
    fn alerts_are_idempotent_after_first_true() {
        let start = "2014-02-04T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = start + Duration::minutes(30);
        let mut auction = make_auction(start, end, 2000);

        let (fired, _) = auction.send_start_soon_alert_if_applicable(start - Duration::minutes(30));
        assert!(fired);
        let (fired_again, note) = auction.send_start_soon_alert_if_applicable(start - Duration::minutes(10));
        assert!(!fired_again);
        assert!(note.is_none());
    }

    #[test]
    fn overlap_matches_spec_definition() {
        let start = "2014-02-04T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = start + Duration::minutes(30);
        let auction = make_auction(start, end, 2000);

        assert!(auction.overlaps_with(start - Duration::hours(1), start + Duration::minutes(1)));
        assert!(!auction.overlaps_with(end + Duration::minutes(1), end + Duration::hours(1)));
        assert!(!auction.overlaps_with(start - Duration::hours(2), start - Duration::hours(1)));
    }
}
