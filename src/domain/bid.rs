//! A single offer to pay for an item.

use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bid {
    pub bid_id: String,
    pub item_id: String,
    pub bidder_user_id: String,
    pub time_received: DateTime<Utc>,
    pub amount_in_cents: i64,
    active: bool,
}

impl Bid {
    pub fn new(
        bid_id: impl Into<String>,
        item_id: impl Into<String>,
        bidder_user_id: impl Into<String>,
        time_received: DateTime<Utc>,
        amount_in_cents: i64,
        active: bool,
    ) -> Self {
        Self {
            bid_id: bid_id.into(),
            item_id: item_id.into(),
            bidder_user_id: bidder_user_id.into(),
            time_received,
            amount_in_cents,
            active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True iff `self` arrived strictly later than `other` and bid a
    /// strictly higher amount. Ties favor the incumbent.
    pub fn outbids(&self, other: &Bid) -> bool {
        self.time_received > other.time_received && self.amount_in_cents > other.amount_in_cents
    }

    /// Returns whether the flag actually flipped.
    pub fn activate(&mut self) -> bool {
        if self.active {
            false
        } else {
            self.active = true;
            true
        }
    }

    /// Returns whether the flag actually flipped.
    pub fn deactivate(&mut self) -> bool {
        if self.active {
            self.active = false;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bid_at(mins: i64, amount: i64) -> Bid {
        let base = Utc::now();
        Bid::new("b", "item", "bidder", base + Duration::minutes(mins), amount, true)
    }

    #[test]
    fn outbids_requires_strictly_later_and_strictly_greater() {
        let earlier = bid_at(0, 100);
        let later_higher = bid_at(1, 200);
        let later_lower = bid_at(1, 50);
        let same_time_higher = bid_at(0, 200);

        assert!(later_higher.outbids(&earlier));
        assert!(!later_lower.outbids(&earlier));
        assert!(!same_time_higher.outbids(&earlier));
    }

    #[test]
    fn activate_deactivate_are_idempotent_and_report_change() {
        let mut bid = bid_at(0, 100);
        assert!(bid.is_active());
        assert!(bid.deactivate());
        assert!(!bid.is_active());
        assert!(!bid.deactivate());
        assert!(bid.activate());
        assert!(bid.is_active());
        assert!(!bid.activate());
    }
}
