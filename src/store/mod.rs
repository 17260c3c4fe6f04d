use async_trait::async_trait;

use crate::models::{Listing, PriceHistoryEntry, Subscriber};
use crate::utils::error::Result;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Persistence contract for tracked listings.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Listing>>;

    /// Persist the listing's new state, together with the optional history
    /// snapshot, as one atomic unit. A crash can never leave the history
    /// row visible without the matching listing update (or vice versa).
    async fn save(&self, listing: &Listing, history: Option<&PriceHistoryEntry>) -> Result<()>;

    /// One keyset-paginated page of listings due for a check: status `New`
    /// or `Active` with at least one verified subscriber, ordered by id,
    /// starting strictly after `after_id`.
    async fn eligible_chunk(&self, after_id: Option<&str>, limit: u32) -> Result<Vec<Listing>>;
}

/// Read projection over subscriptions; only verified recipients are visible
/// to the check pipeline.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn verified_subscribers_of(&self, listing_id: &str) -> Result<Vec<Subscriber>>;
}
