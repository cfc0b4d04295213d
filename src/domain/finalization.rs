use chrono::{DateTime, Utc};

/// Records that an auction was terminally archived. Once present, the
/// auction accepts no further mutations. At most one per auction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Finalization {
    pub time_received: DateTime<Utc>,
}

impl Finalization {
    pub fn new(time_received: DateTime<Utc>) -> Self {
        Self { time_received }
    }
}
