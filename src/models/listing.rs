use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{generate_id, ListingStatus};

/// A tracked marketplace advertisement. The URL is the unique key; `price`
/// and `currency` are either both set or both absent, and `change_date`
/// records the last price assignment, not the last check.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Listing {
    pub id: String,
    pub url: String,
    pub status: ListingStatus,
    pub price: Option<i64>,
    pub currency: Option<String>,
    pub change_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            url: url.into(),
            status: ListingStatus::New,
            price: None,
            currency: None,
            change_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a previous check already stored a price. Drives the
    /// first-fill vs price-change branch regardless of the current status,
    /// so a listing recovers from any error state without special-casing.
    pub fn has_price(&self) -> bool {
        self.price.is_some() && self.currency.is_some()
    }

    pub fn formatted_price(&self) -> String {
        match (self.price, self.currency.as_deref()) {
            (Some(price), Some(currency)) => format!("{} {}", price, currency),
            _ => "N/A".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_listing_defaults() {
        let listing = Listing::new("https://www.olx.pl/d/oferta/test-ad-IDabc.html");

        assert_eq!(listing.status, ListingStatus::New);
        assert!(listing.price.is_none());
        assert!(listing.currency.is_none());
        assert!(listing.change_date.is_none());
        assert!(!listing.has_price());
        assert_eq!(listing.id.len(), 32);
    }

    #[test]
    fn test_has_price_requires_both_fields() {
        let mut listing = Listing::new("https://www.olx.pl/d/oferta/test-ad-IDabc.html");
        assert!(!listing.has_price());

        listing.price = Some(1000);
        listing.currency = Some("PLN".to_string());
        assert!(listing.has_price());
    }

    #[test]
    fn test_formatted_price() {
        let mut listing = Listing::new("https://www.olx.pl/d/oferta/test-ad-IDabc.html");
        assert_eq!(listing.formatted_price(), "N/A");

        listing.price = Some(2500);
        listing.currency = Some("zł".to_string());
        assert_eq!(listing.formatted_price(), "2500 zł");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let listing = Listing::new("https://www.olx.pl/d/oferta/test-ad-IDabc.html");
        let serialized = serde_json::to_string(&listing).unwrap();
        let deserialized: Listing = serde_json::from_str(&serialized).unwrap();
        assert_eq!(listing, deserialized);
    }
}
