//! Rejection reasons returned by the auction aggregate and the service
//! façade above it.

use thiserror::Error;

/// Lifecycle state an auction can be observed in at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuctionState {
    /// Has not yet started.
    Pending,
    /// Is happening now.
    Active,
    Canceled,
    /// Is over but not yet archived.
    Over,
    /// Over and archived; terminal.
    Finalized,
    /// No auction exists for the queried id.
    Unknown,
}

/// Why a submitted bid was rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BidRejection {
    #[error("auction does not exist")]
    AuctionNotExist,
    #[error("auction has not started yet")]
    Pending,
    #[error("auction has already ended")]
    Over,
    #[error("auction has been canceled")]
    Canceled,
    #[error("auction has been finalized")]
    Finalized,
    #[error("bid does not outbid the current top bid")]
    NotNewTopBid,
    #[error("bid amount must be nonnegative")]
    NegativeAmount,
}

/// Why a lifecycle-mutating request (create/cancel/stop/finalize) was
/// rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleRejection {
    #[error("auction does not exist")]
    AuctionNotExist,
    #[error("end time must be after start time")]
    BadTimeSpecified,
    #[error("auction would start in the past")]
    StartsInPast,
    #[error("auction starts too soon (must be more than 5 minutes out)")]
    StartsTooSoon,
    #[error("an auction already exists for this item")]
    AlreadyCreated,
    #[error("requester is not the auction's seller")]
    RequesterIsNotSeller,
    #[error("cannot cancel a live auction with an active bid")]
    ActiveWithBid,
    #[error("auction has already been canceled")]
    AlreadyCanceled,
    #[error("auction has already been finalized")]
    AlreadyFinalized,
    #[error("auction is already over")]
    AlreadyOver,
    #[error("auction is not in a cancelable/finalizable state")]
    InvalidState,
}
