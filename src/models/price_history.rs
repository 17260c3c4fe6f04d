use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::generate_id;

/// Frozen copy of a listing's price fields taken immediately before an
/// overwrite. Append-only; never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PriceHistoryEntry {
    pub id: String,
    pub listing_id: String,
    pub price: i64,
    pub currency: String,
    pub change_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PriceHistoryEntry {
    pub fn new(
        listing_id: impl Into<String>,
        price: i64,
        currency: impl Into<String>,
        change_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: generate_id(),
            listing_id: listing_id.into(),
            price,
            currency: currency.into(),
            change_date,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_freezes_superseded_values() {
        let superseded_at = Some(Utc::now());
        let entry = PriceHistoryEntry::new("listing1", 1000, "PLN", superseded_at);

        assert_eq!(entry.listing_id, "listing1");
        assert_eq!(entry.price, 1000);
        assert_eq!(entry.currency, "PLN");
        assert_eq!(entry.change_date, superseded_at);
        assert_eq!(entry.id.len(), 32);
    }

    #[test]
    fn test_entries_get_distinct_ids() {
        let a = PriceHistoryEntry::new("listing1", 1000, "PLN", None);
        let b = PriceHistoryEntry::new("listing1", 1000, "PLN", None);
        assert_ne!(a.id, b.id);
    }
}
