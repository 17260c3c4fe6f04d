use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod listing;
pub mod price_history;
pub mod subscriber;

// Re-exports for convenience
pub use listing::*;
pub use price_history::*;
pub use subscriber::*;

/// Classification of the last completed check for a listing.
///
/// A closed set: every transition site matches exhaustively, so adding a
/// variant forces a review of the whole table. None of the non-`New` states
/// is locked; each check re-evaluates from whatever currently holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum ListingStatus {
    #[serde(rename = "new")]
    #[sqlx(rename = "new")]
    New,
    #[serde(rename = "active")]
    #[sqlx(rename = "active")]
    Active,
    #[serde(rename = "error")]
    #[sqlx(rename = "error")]
    ParseError,
    #[serde(rename = "not_found")]
    #[sqlx(rename = "not_found")]
    NotFound,
    #[serde(rename = "no_price")]
    #[sqlx(rename = "no_price")]
    NoPrice,
}

// Helper function to generate row ids in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ListingStatus::New).unwrap(),
            "\"new\""
        );
        assert_eq!(
            serde_json::to_string(&ListingStatus::ParseError).unwrap(),
            "\"error\""
        );
        assert_eq!(
            serde_json::to_string(&ListingStatus::NotFound).unwrap(),
            "\"not_found\""
        );
        assert_eq!(
            serde_json::to_string(&ListingStatus::NoPrice).unwrap(),
            "\"no_price\""
        );
    }

    #[test]
    fn test_status_roundtrip() {
        let values = vec![
            ListingStatus::New,
            ListingStatus::Active,
            ListingStatus::ParseError,
            ListingStatus::NotFound,
            ListingStatus::NoPrice,
        ];
        for value in values {
            let serialized = serde_json::to_string(&value).unwrap();
            let deserialized: ListingStatus = serde_json::from_str(&serialized).unwrap();
            assert_eq!(value, deserialized);
        }
    }

    #[test]
    fn test_generate_id() {
        let id1 = generate_id();
        let id2 = generate_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 32); // UUID simple format is 32 chars
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
