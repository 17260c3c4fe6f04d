use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

pub mod email;

pub use email::EmailNotifier;

/// Payload delivered to each verified subscriber when a listing's price
/// moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceChangeEvent {
    pub listing_url: String,
    pub old_price: i64,
    pub old_currency: String,
    pub new_price: i64,
    pub new_currency: String,
}

/// Delivery channel for price change notices. Fire-and-forget from the
/// caller's perspective: a failed delivery is reported back but carries no
/// retry obligation here.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify(&self, email: &str, event: &PriceChangeEvent) -> Result<()>;
}
