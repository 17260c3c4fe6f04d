use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::generate_id;

/// A subscription to price changes of one listing. Verification is owned by
/// the subscription flow; the check pipeline only reads the verified
/// projection to decide notification eligibility.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Subscriber {
    pub id: String,
    pub listing_id: String,
    pub email: String,
    pub verification_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscriber {
    pub fn new(listing_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            listing_id: listing_id.into(),
            email: email.into(),
            verification_token: None,
            token_expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// Verified means no outstanding verification token.
    pub fn is_verified(&self) -> bool {
        self.verification_token.is_none()
    }

    pub fn is_token_expired(&self) -> bool {
        if self.verification_token.is_none() {
            return false;
        }
        match self.token_expires_at {
            Some(expires_at) => expires_at < Utc::now(),
            None => false,
        }
    }
}
