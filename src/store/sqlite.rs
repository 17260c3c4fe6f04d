use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{Listing, PriceHistoryEntry, Subscriber};
use crate::store::{ListingStore, SubscriberDirectory};
use crate::utils::error::{AppError, Result};

/// SQLite-backed store for listings, their price history and subscribers.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                id          TEXT PRIMARY KEY,
                url         TEXT NOT NULL UNIQUE,
                status      TEXT NOT NULL DEFAULT 'new',
                price       INTEGER,
                currency    TEXT,
                change_date TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listing_history (
                id          TEXT PRIMARY KEY,
                listing_id  TEXT NOT NULL REFERENCES listings(id),
                price       INTEGER NOT NULL,
                currency    TEXT NOT NULL,
                change_date TEXT,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscribers (
                id                 TEXT PRIMARY KEY,
                listing_id         TEXT NOT NULL REFERENCES listings(id),
                email              TEXT NOT NULL,
                verification_token TEXT,
                token_expires_at   TEXT,
                created_at         TEXT NOT NULL,
                UNIQUE (listing_id, email)
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Register a new listing; the subscription flow calls this, the check
    /// pipeline never does.
    pub async fn insert_listing(&self, listing: &Listing) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO listings (id, url, status, price, currency, change_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&listing.id)
        .bind(&listing.url)
        .bind(listing.status)
        .bind(listing.price)
        .bind(&listing.currency)
        .bind(listing.change_date)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_subscriber(&self, subscriber: &Subscriber) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (id, listing_id, email, verification_token, token_expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&subscriber.id)
        .bind(&subscriber.listing_id)
        .bind(&subscriber.email)
        .bind(&subscriber.verification_token)
        .bind(subscriber.token_expires_at)
        .bind(subscriber.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn history_of(&self, listing_id: &str) -> Result<Vec<PriceHistoryEntry>> {
        let entries = sqlx::query_as::<_, PriceHistoryEntry>(
            r#"
            SELECT id, listing_id, price, currency, change_date, created_at
            FROM listing_history
            WHERE listing_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

#[async_trait]
impl ListingStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(
            r#"
            SELECT id, url, status, price, currency, change_date, created_at, updated_at
            FROM listings
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(listing)
    }

    async fn save(&self, listing: &Listing, history: Option<&PriceHistoryEntry>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(entry) = history {
            sqlx::query(
                r#"
                INSERT INTO listing_history (id, listing_id, price, currency, change_date, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.listing_id)
            .bind(entry.price)
            .bind(&entry.currency)
            .bind(entry.change_date)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE listings
            SET status = ?, price = ?, currency = ?, change_date = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(listing.status)
        .bind(listing.price)
        .bind(&listing.currency)
        .bind(listing.change_date)
        .bind(listing.updated_at)
        .bind(&listing.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Internal(format!(
                "listing {} does not exist",
                listing.id
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn eligible_chunk(&self, after_id: Option<&str>, limit: u32) -> Result<Vec<Listing>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT l.id, l.url, l.status, l.price, l.currency, l.change_date, l.created_at, l.updated_at
            FROM listings l
            WHERE l.status IN ('new', 'active')
              AND l.id > ?
              AND EXISTS (
                  SELECT 1 FROM subscribers s
                  WHERE s.listing_id = l.id AND s.verification_token IS NULL
              )
            ORDER BY l.id
            LIMIT ?
            "#,
        )
        .bind(after_id.unwrap_or(""))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }
}

#[async_trait]
impl SubscriberDirectory for SqliteStore {
    async fn verified_subscribers_of(&self, listing_id: &str) -> Result<Vec<Subscriber>> {
        let subscribers = sqlx::query_as::<_, Subscriber>(
            r#"
            SELECT id, listing_id, email, verification_token, token_expires_at, created_at
            FROM subscribers
            WHERE listing_id = ? AND verification_token IS NULL
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscribers)
    }
}
