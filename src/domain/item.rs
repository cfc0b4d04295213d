//! Immutable item being auctioned.

use chrono::{DateTime, Utc};

/// The thing being sold. Immutable once an auction is created around it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub item_id: String,
    pub seller_user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Currency stored as integer cents; never floating point.
    pub start_price_in_cents: i64,
}

impl Item {
    /// Panics if `end_time <= start_time`; callers (the service layer) are
    /// expected to validate this ahead of time and report a rejection
    /// instead of letting this panic fire.
    pub fn new(
        item_id: impl Into<String>,
        seller_user_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        start_price_in_cents: i64,
    ) -> Self {
        assert!(end_time > start_time, "item end_time must be after start_time");
        assert!(start_price_in_cents >= 0, "start price must be nonnegative");
        Self {
            item_id: item_id.into(),
            seller_user_id: seller_user_id.into(),
            start_time,
            end_time,
            start_price_in_cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_accepts_well_ordered_times() {
        let start = Utc::now();
        let item = Item::new("item-1", "seller-1", start, start + Duration::minutes(30), 2000);
        assert_eq!(item.start_price_in_cents, 2000);
    }

    #[test]
    #[should_panic]
    fn new_panics_on_bad_time_order() {
        let start = Utc::now();
        Item::new("item-1", "seller-1", start, start, 2000);
    }
}
