use chrono::{DateTime, Utc};

/// Records that an auction was called off before its natural end.
/// At most one per auction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancellation {
    pub time_received: DateTime<Utc>,
}

impl Cancellation {
    pub fn new(time_received: DateTime<Utc>) -> Self {
        Self { time_received }
    }
}
