//! Storage seams. A concrete persistence backend is an external-adapter
//! concern; this crate ships one in-memory realization (`in_memory`) so the
//! service actually runs, but the façade only ever depends on these traits.

use chrono::{DateTime, Utc};

use crate::domain::{Auction, Bid};

pub trait AuctionRepository: Send + Sync {
    fn get_auction(&self, item_id: &str) -> Option<Auction>;

    /// Auctions whose item window overlaps `[left_bound, right_bound]`,
    /// per `Auction::overlaps_with`.
    fn get_auctions(&self, left_bound: DateTime<Utc>, right_bound: DateTime<Utc>) -> Vec<Auction>;

    /// Upsert by `item_id`.
    fn save_auction(&self, auction: Auction);

    fn num_auctions_saved(&self) -> usize;
}

pub trait BidRepository: Send + Sync {
    fn get_bid(&self, bid_id: &str) -> Option<Bid>;

    fn get_bids_by_user_id(&self, user_id: &str) -> Vec<Bid>;

    fn get_bids_by_item_id(&self, item_id: &str) -> Vec<Bid>;

    /// Upsert by `bid_id`.
    fn save_bid(&self, bid: Bid);

    fn save_bids(&self, bids: Vec<Bid>);

    fn delete_bid(&self, bid_id: &str);

    /// A fresh id, unique within this repository's lifetime.
    fn next_bid_id(&self) -> String;
}
