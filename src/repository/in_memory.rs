//! In-process repository implementations, grounded in
//! `inMemoryAuctionRepository.go` / `inMemoryBidRepository.go`: linear scans
//! over a map, suitable for a single-process deployment or tests, not for
//! durability across restarts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::domain::{Auction, Bid};
use crate::repository::traits::{AuctionRepository, BidRepository};

/// Holds an `Arc<dyn BidRepository>` so every `get_auction`/`get_auctions`
/// can hydrate the returned `Auction` with its current bids (spec §6.1:
/// "must hydrate the auction with its bids, cancellation, and
/// finalization") instead of trusting whatever bid snapshot was last saved
/// alongside it.
pub struct InMemoryAuctionRepository {
    auctions: Mutex<HashMap<String, Auction>>,
    bid_repo: Arc<dyn BidRepository>,
}

impl InMemoryAuctionRepository {
    pub fn new(bid_repo: Arc<dyn BidRepository>) -> Self {
        Self {
            auctions: Mutex::new(HashMap::new()),
            bid_repo,
        }
    }

    fn hydrate(&self, mut auction: Auction) -> Auction {
        let mut bids = self.bid_repo.get_bids_by_item_id(&auction.item.item_id);
        bids.sort_by_key(|bid| bid.time_received);
        auction.bids = bids;
        auction
    }
}

impl AuctionRepository for InMemoryAuctionRepository {
    fn get_auction(&self, item_id: &str) -> Option<Auction> {
        let auction = self
            .auctions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(item_id)
            .cloned()?;
        Some(self.hydrate(auction))
    }

    fn get_auctions(&self, left_bound: DateTime<Utc>, right_bound: DateTime<Utc>) -> Vec<Auction> {
        let matched: Vec<Auction> = self
            .auctions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|auction| auction.overlaps_with(left_bound, right_bound))
            .cloned()
            .collect();
        matched.into_iter().map(|auction| self.hydrate(auction)).collect()
    }

    fn save_auction(&self, auction: Auction) {
        self.auctions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(auction.item.item_id.clone(), auction);
    }

    fn num_auctions_saved(&self) -> usize {
        self.auctions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// `next_bid_id` combines a process-unique prefix with a monotonic counter
/// instead of a random/blockchain-derived id: deterministic within a
/// process, collision-free across processes sharing the same repository
/// instance, and reproducible in tests when seeded explicitly.
pub struct InMemoryBidRepository {
    bids: Mutex<HashMap<String, Bid>>,
    id_prefix: String,
    id_counter: AtomicU64,
}

impl InMemoryBidRepository {
    pub fn new(id_prefix: impl Into<String>) -> Self {
        Self {
            bids: Mutex::new(HashMap::new()),
            id_prefix: id_prefix.into(),
            id_counter: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryBidRepository {
    fn default() -> Self {
        Self::new("bid")
    }
}

impl BidRepository for InMemoryBidRepository {
    fn get_bid(&self, bid_id: &str) -> Option<Bid> {
        self.bids.lock().unwrap_or_else(|e| e.into_inner()).get(bid_id).cloned()
    }

    fn get_bids_by_user_id(&self, user_id: &str) -> Vec<Bid> {
        self.bids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|bid| bid.bidder_user_id == user_id)
            .cloned()
            .collect()
    }

    fn get_bids_by_item_id(&self, item_id: &str) -> Vec<Bid> {
        self.bids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|bid| bid.item_id == item_id)
            .cloned()
            .collect()
    }

    fn save_bid(&self, bid: Bid) {
        self.bids.lock().unwrap_or_else(|e| e.into_inner()).insert(bid.bid_id.clone(), bid);
    }

    fn save_bids(&self, bids: Vec<Bid>) {
        let mut guard = self.bids.lock().unwrap_or_else(|e| e.into_inner());
        for bid in bids {
            guard.insert(bid.bid_id.clone(), bid);
        }
    }

    fn delete_bid(&self, bid_id: &str) {
        self.bids.lock().unwrap_or_else(|e| e.into_inner()).remove(bid_id);
    }

    fn next_bid_id(&self) -> String {
        let n = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.id_prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Item;
    use chrono::Duration;

    fn auction_at(item_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Auction {
        Auction::new(
            Item::new(item_id, "seller", start, end, 100),
            vec![],
            None,
            false,
            false,
            None,
        )
    }

    #[test]
    fn save_auction_upserts_by_item_id() {
        let repo = InMemoryAuctionRepository::new(Arc::new(InMemoryBidRepository::new("test")));
        let start = Utc::now();
        let end = start + Duration::minutes(30);
        repo.save_auction(auction_at("item-1", start, end));
        repo.save_auction(auction_at("item-1", start, end));
        assert_eq!(repo.num_auctions_saved(), 1);
    }

    #[test]
    fn get_auction_hydrates_fresh_bids_from_the_bid_repository() {
        let bid_repo = Arc::new(InMemoryBidRepository::new("test"));
        let repo = InMemoryAuctionRepository::new(bid_repo.clone());
        let start = Utc::now();
        let end = start + Duration::minutes(30);
        repo.save_auction(auction_at("item-1", start, end));

        bid_repo.save_bid(Bid::new("b1", "item-1", "u1", start + Duration::minutes(1), 100, true));
        bid_repo.save_bid(Bid::new("b2", "item-1", "u2", start + Duration::minutes(2), 200, true));

        let hydrated = repo.get_auction("item-1").unwrap();
        assert_eq!(hydrated.bids.len(), 2);
        assert_eq!(hydrated.bids[0].bid_id, "b1");
        assert_eq!(hydrated.bids[1].bid_id, "b2");
    }

    #[test]
    fn get_auctions_filters_by_overlap() {
        let repo = InMemoryAuctionRepository::new(Arc::new(InMemoryBidRepository::new("test")));
        let start = Utc::now();
        let end = start + Duration::minutes(30);
        repo.save_auction(auction_at("item-1", start, end));

        assert_eq!(repo.get_auctions(start - Duration::hours(1), start).len(), 1);
        assert_eq!(
            repo.get_auctions(end + Duration::hours(1), end + Duration::hours(2)).len(),
            0
        );
    }

    #[test]
    fn save_bid_upserts_by_bid_id() {
        let repo = InMemoryBidRepository::new("t");
        let bid = Bid::new("b1", "item-1", "u1", Utc::now(), 100, true);
        repo.save_bid(bid.clone());
        let mut updated = bid;
        updated.deactivate();
        repo.save_bid(updated);

        let stored = repo.get_bid("b1").unwrap();
        assert!(!stored.is_active());
    }

    #[test]
    fn next_bid_id_is_unique_and_monotonic() {
        let repo = InMemoryBidRepository::new("t");
        let a = repo.next_bid_id();
        let b = repo.next_bid_id();
        assert_ne!(a, b);
    }
}
