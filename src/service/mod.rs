//! `AuctionService`: the process-wide façade spec §4.8 describes. Caches
//! live auctions, serializes every mutation behind one coarse mutex (spec
//! §5), and applies the admission rules that sit above the `Auction`
//! aggregate itself (duplicate-item checks, requester-identity checks,
//! cache placement) before delegating to it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::info;
use thiserror::Error;

use crate::clock::Clock;
use crate::domain::{Auction, AuctionState, Bid, Item, LifecycleRejection};
use crate::notifications::NotificationSink;
use crate::repository::{AuctionRepository, BidRepository};

/// Raised when the service's cache mutex was found poisoned (a prior holder
/// panicked while it was locked). Grounded in the teacher's
/// `farm-rpc/src/json_rpc.rs` lock-acquisition idiom
/// (`.lock().map_err(|e| NotFound(e.to_string()))?`): every mutating
/// operation propagates this via `?` instead of unwrapping and taking the
/// whole request down with it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("auction service lock was poisoned by a panicking thread")]
pub struct LockPoisoned;

/// Outcome of [`AuctionService::create_auction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateAuctionOutcome {
    Created,
    BadTime,
    StartsInPast,
    StartsTooSoon,
    NegativeStartPrice,
    AlreadyCreated,
}

/// Outcome of [`AuctionService::cancel_auction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelAuctionOutcome {
    Canceled,
    AuctionNotExist,
    RequesterIsNotSeller,
    AlreadyFinalized,
    AlreadyCanceled,
    AlreadyOver,
    /// Seller tried to cancel a live auction with an active bid (spec §4.5);
    /// distinct from `AlreadyOver` because the auction is still ACTIVE.
    ActiveWithBid,
}

/// Outcome of [`AuctionService::stop_auction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopAuctionOutcome {
    Stopped,
    AuctionNotExist,
    AlreadyFinalized,
    AlreadyCanceled,
    AlreadyOver,
}

/// Outcome of [`AuctionService::process_new_bid`]. Mirrors the original's
/// `(AuctionInteractionOutcome, AuctionState, bool)` triple: `auctionNotExist`
/// is the only rejection a bid can get at the service boundary, everything
/// else (pending/over/canceled/finalized/not-new-top) is reported through
/// `state` + `was_new_top_bid` instead, exactly as spec §4.8 describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessBidOutcome {
    AuctionNotExist,
    NegativeAmount,
    Processed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessBidResult {
    pub outcome: ProcessBidOutcome,
    pub state: AuctionState,
    pub was_new_top_bid: bool,
}

/// The minimum lead time a newly created auction must have before its start.
const MIN_LEAD_TIME: Duration = Duration::minutes(5);

pub struct AuctionService {
    bid_repo: Arc<dyn BidRepository>,
    auction_repo: Arc<dyn AuctionRepository>,
    clock: Arc<dyn Clock>,
    notifications: Arc<dyn NotificationSink>,
    cache: Mutex<HashMap<String, Auction>>,
}

impl AuctionService {
    pub fn new(
        bid_repo: Arc<dyn BidRepository>,
        auction_repo: Arc<dyn AuctionRepository>,
        clock: Arc<dyn Clock>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            bid_repo,
            auction_repo,
            clock,
            notifications,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Grounded in the teacher's `farm-rpc/src/json_rpc.rs` lock-acquisition
    /// idiom: a poisoned cache mutex is reported to the caller via `?`
    /// instead of taking the whole request down with an `unwrap()` panic.
    fn lock_cache(&self) -> Result<MutexGuard<'_, HashMap<String, Auction>>, LockPoisoned> {
        self.cache.lock().map_err(|_| LockPoisoned)
    }

    pub fn create_auction(
        &self,
        item_id: &str,
        seller_user_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        start_price_in_cents: i64,
    ) -> Result<CreateAuctionOutcome, LockPoisoned> {
        let mut cache = self.lock_cache()?;

        if end_time <= start_time {
            return Ok(CreateAuctionOutcome::BadTime);
        }
        if start_price_in_cents < 0 {
            return Ok(CreateAuctionOutcome::NegativeStartPrice);
        }

        let now = self.clock.now();
        if now > start_time {
            return Ok(CreateAuctionOutcome::StartsInPast);
        }
        if start_time - now <= MIN_LEAD_TIME {
            return Ok(CreateAuctionOutcome::StartsTooSoon);
        }
        if self.auction_repo.get_auction(item_id).is_some() {
            return Ok(CreateAuctionOutcome::AlreadyCreated);
        }

        let item = Item::new(item_id, seller_user_id, start_time, end_time, start_price_in_cents);
        let auction = Auction::new(item, vec![], None, false, false, None);
        self.auction_repo.save_auction(auction.clone());
        cache.insert(item_id.to_string(), auction);
        info!("[AuctionService] created auction (item_id={})", item_id);
        Ok(CreateAuctionOutcome::Created)
    }

    /// Seller-initiated. Deliberately does not cache on success — the
    /// auction is moving toward a terminal state and will not be revisited
    /// by request traffic, only by the session manager's finalize pass,
    /// which reads straight from the repository.
    pub fn cancel_auction(&self, item_id: &str, requester_user_id: &str) -> Result<CancelAuctionOutcome, LockPoisoned> {
        let cache = self.lock_cache()?;
        let now = self.clock.now();

        let mut auction = match self.locate(&cache, item_id) {
            Some(a) => a,
            None => return Ok(CancelAuctionOutcome::AuctionNotExist),
        };

        if auction.item.seller_user_id != requester_user_id {
            return Ok(CancelAuctionOutcome::RequesterIsNotSeller);
        }

        Ok(match auction.cancel(now) {
            Ok(()) => {
                self.auction_repo.save_auction(auction);
                CancelAuctionOutcome::Canceled
            }
            Err(LifecycleRejection::AlreadyFinalized) => CancelAuctionOutcome::AlreadyFinalized,
            Err(LifecycleRejection::AlreadyCanceled) => CancelAuctionOutcome::AlreadyCanceled,
            Err(LifecycleRejection::ActiveWithBid) => CancelAuctionOutcome::ActiveWithBid,
            Err(_) => CancelAuctionOutcome::AlreadyOver,
        })
    }

    /// Administrator-initiated. Caches on success — a stopped auction still
    /// awaits finalization and will be visited by the session manager.
    pub fn stop_auction(&self, item_id: &str) -> Result<StopAuctionOutcome, LockPoisoned> {
        let mut cache = self.lock_cache()?;
        let now = self.clock.now();

        let mut auction = match self.locate(&cache, item_id) {
            Some(a) => a,
            None => return Ok(StopAuctionOutcome::AuctionNotExist),
        };

        Ok(match auction.stop(now) {
            Ok(()) => {
                self.auction_repo.save_auction(auction.clone());
                cache.insert(item_id.to_string(), auction);
                StopAuctionOutcome::Stopped
            }
            Err(LifecycleRejection::AlreadyFinalized) => StopAuctionOutcome::AlreadyFinalized,
            Err(LifecycleRejection::AlreadyCanceled) => StopAuctionOutcome::AlreadyCanceled,
            Err(_) => StopAuctionOutcome::AlreadyOver,
        })
    }

    pub fn process_new_bid(
        &self,
        item_id: &str,
        bidder_user_id: &str,
        time_received: DateTime<Utc>,
        amount_in_cents: i64,
    ) -> Result<ProcessBidResult, LockPoisoned> {
        if amount_in_cents < 0 {
            return Ok(ProcessBidResult {
                outcome: ProcessBidOutcome::NegativeAmount,
                state: AuctionState::Unknown,
                was_new_top_bid: false,
            });
        }

        let mut cache = self.lock_cache()?;
        let bid_id = self.bid_repo.next_bid_id();
        let incoming = Bid::new(bid_id, item_id, bidder_user_id, time_received, amount_in_cents, true);

        let mut auction = match self.locate(&cache, item_id) {
            Some(a) => a,
            None => {
                return Ok(ProcessBidResult {
                    outcome: ProcessBidOutcome::AuctionNotExist,
                    state: AuctionState::Unknown,
                    was_new_top_bid: false,
                })
            }
        };

        let outcome = auction.process_new_bid(incoming.clone());
        let accepted = outcome.accepted();
        if let Ok(notifications) = outcome.result {
            self.bid_repo.save_bid(incoming);
            cache.insert(item_id.to_string(), auction);
            for notification in notifications {
                self.notifications.notify(notification);
            }
        }

        Ok(ProcessBidResult {
            outcome: ProcessBidOutcome::Processed,
            state: outcome.state,
            was_new_top_bid: accepted,
        })
    }

    /// Read-only; does not take the service mutex (spec §5 allowance).
    pub fn get_items_user_has_bids_on(&self, user_id: &str) -> Vec<String> {
        distinct_item_ids(&self.bid_repo.get_bids_by_user_id(user_id))
    }

    /// Read-only; queries the repository directly for auctions overlapping
    /// `[now, now]`, matching the original's `GetAuctions(now, now)` — the
    /// overlap test collapses to "currently active" when both bounds equal
    /// `now`.
    pub fn get_active_auctions(&self) -> Vec<Auction> {
        let now = self.clock.now();
        self.auction_repo.get_auctions(now, now)
    }

    pub fn activate_user_bids(&self, user_id: &str) -> Result<(usize, usize), LockPoisoned> {
        self.mutate_user_bids(user_id, Auction::activate_user_bids)
    }

    pub fn deactivate_user_bids(&self, user_id: &str) -> Result<(usize, usize), LockPoisoned> {
        self.mutate_user_bids(user_id, Auction::deactivate_user_bids)
    }

    /// Query the repository for auctions whose item window overlaps
    /// `[since, up_to]`; cache any not already cached and not finalized.
    pub fn load_auctions_into_memory(&self, since: DateTime<Utc>, up_to: DateTime<Utc>) -> Result<(), LockPoisoned> {
        let mut cache = self.lock_cache()?;
        let auctions = self.auction_repo.get_auctions(since, up_to);
        let mut brought_into_memory = 0u64;
        for auction in auctions {
            if !auction.has_finalization() && !cache.contains_key(&auction.item.item_id) {
                cache.insert(auction.item.item_id.clone(), auction);
                brought_into_memory += 1;
            }
        }
        info!(
            "[AuctionService] loaded {} new auctions into memory ({} in memory; {} in repository)",
            brought_into_memory,
            cache.len(),
            self.auction_repo.num_auctions_saved()
        );
        Ok(())
    }

    pub fn send_out_lifecycle_alerts(&self) -> Result<(), LockPoisoned> {
        let mut cache = self.lock_cache()?;
        let now = self.clock.now();
        for auction in cache.values_mut() {
            let (start_fired, start_notification) = auction.send_start_soon_alert_if_applicable(now);
            let (end_fired, end_notification) = auction.send_end_soon_alert_if_applicable(now);
            if start_fired || end_fired {
                self.auction_repo.save_auction(auction.clone());
            }
            for notification in start_notification.into_iter().chain(end_notification) {
                self.notifications.notify(notification);
            }
        }
        Ok(())
    }

    /// Spec §4.9: `finalize_delay` defers finalization until
    /// `now - end_time >= finalize_delay`, absorbing in-flight bids or
    /// alerts from systems coming back online after downtime.
    pub fn finalize_any_past_auctions(&self, finalize_delay: Duration) -> Result<(), LockPoisoned> {
        let mut cache = self.lock_cache()?;
        let now = self.clock.now();
        for auction in cache.values_mut() {
            if now - auction.item.end_time < finalize_delay {
                continue;
            }
            if auction.finalize(now).is_ok() {
                self.auction_repo.save_auction(auction.clone());
            }
        }
        Ok(())
    }

    /// Cache, falling back to the repository without caching the result —
    /// shared by the operations that must not promote a fetched auction
    /// into the cache on their own (cancel, (de)activate).
    fn locate(&self, cache: &HashMap<String, Auction>, item_id: &str) -> Option<Auction> {
        cache.get(item_id).cloned().or_else(|| self.auction_repo.get_auction(item_id))
    }

    fn mutate_user_bids(
        &self,
        user_id: &str,
        op: fn(&mut Auction, &str, DateTime<Utc>) -> (Vec<Bid>, bool),
    ) -> Result<(usize, usize), LockPoisoned> {
        let mut cache = self.lock_cache()?;
        let now = self.clock.now();
        let item_ids = distinct_item_ids(&self.bid_repo.get_bids_by_user_id(user_id));

        let mut changed_bids = Vec::new();
        let mut auctions_touched = 0usize;

        for item_id in item_ids {
            if let Some(auction) = cache.get_mut(&item_id) {
                let (bids, _) = op(auction, user_id, now);
                changed_bids.extend(bids);
                auctions_touched += 1;
                continue;
            }
            if let Some(mut fetched) = self.auction_repo.get_auction(&item_id) {
                let (bids, _) = op(&mut fetched, user_id, now);
                changed_bids.extend(bids);
                auctions_touched += 1;
            }
        }

        let num_bids_changed = changed_bids.len();
        if !changed_bids.is_empty() {
            self.bid_repo.save_bids(changed_bids);
        }
        Ok((num_bids_changed, auctions_touched))
    }
}

fn distinct_item_ids(bids: &[Bid]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut item_ids = Vec::new();
    for bid in bids {
        if seen.insert(bid.item_id.clone()) {
            item_ids.push(bid.item_id.clone());
        }
    }
    item_ids
}
