pub mod in_memory;
pub mod traits;

pub use in_memory::{InMemoryAuctionRepository, InMemoryBidRepository};
pub use traits::{AuctionRepository, BidRepository};
