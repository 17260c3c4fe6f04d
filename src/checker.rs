use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::extractor::{Extractor, PriceData};
use crate::fetcher::{FetchError, Fetcher};
use crate::models::{Listing, ListingStatus, PriceHistoryEntry};
use crate::notify::{ChangeNotifier, PriceChangeEvent};
use crate::store::{ListingStore, SubscriberDirectory};
use crate::utils::error::Result;

/// Classified result of one fetch-and-extract round against a listing URL.
///
/// `PageUnavailable` is the upstream saying the resource is gone;
/// `ParseFailed` covers both connectivity exhaustion and markup neither
/// strategy could read. From the listing's perspective the distinction that
/// matters is gone vs could-not-determine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Price(PriceData),
    PageUnavailable,
    ParseFailed,
}

/// Where observed prices come from. The production implementation is
/// fetch + extract over HTTP; tests substitute scripted observations.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn observe(&self, url: &str) -> Extraction;
}

pub struct HttpPriceSource {
    fetcher: Fetcher,
    extractor: Extractor,
}

impl HttpPriceSource {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            extractor: Extractor::new(),
        }
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn observe(&self, url: &str) -> Extraction {
        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(FetchError::Unavailable { status }) => {
                debug!("{}: upstream answered {}", url, status);
                return Extraction::PageUnavailable;
            }
            Err(e @ FetchError::RetriesExhausted { .. }) => {
                warn!("{}: {}", url, e);
                return Extraction::ParseFailed;
            }
        };

        match self.extractor.extract(&body) {
            Some(data) => Extraction::Price(data),
            None => Extraction::ParseFailed,
        }
    }
}

/// What one check did to a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub listing_id: String,
    pub status: ListingStatus,
    pub price_changed: bool,
    pub notified: usize,
    pub notify_failures: usize,
}

/// Runs one price check for one listing: observes the page, applies the
/// status transition, persists the mutation atomically and fans out change
/// notices to verified subscribers.
pub struct PriceChecker {
    source: Arc<dyn PriceSource>,
    store: Arc<dyn ListingStore>,
    subscribers: Arc<dyn SubscriberDirectory>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl PriceChecker {
    pub fn new(
        source: Arc<dyn PriceSource>,
        store: Arc<dyn ListingStore>,
        subscribers: Arc<dyn SubscriberDirectory>,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        Self {
            source,
            store,
            subscribers,
            notifier,
        }
    }

    pub async fn run(&self, listing: &Listing) -> Result<CheckOutcome> {
        debug!("checking listing {} ({})", listing.id, listing.url);

        match self.source.observe(&listing.url).await {
            Extraction::PageUnavailable => self.mark(listing, ListingStatus::NotFound).await,
            Extraction::ParseFailed => self.mark(listing, ListingStatus::ParseError).await,
            Extraction::Price(data) => self.apply_price(listing, data).await,
        }
    }

    // Status-only transition: price, currency and change_date stay exactly
    // as they were.
    async fn mark(&self, listing: &Listing, status: ListingStatus) -> Result<CheckOutcome> {
        let mut updated = listing.clone();
        updated.status = status;
        updated.updated_at = Utc::now();
        self.store.save(&updated, None).await?;

        Ok(CheckOutcome {
            listing_id: listing.id.clone(),
            status,
            price_changed: false,
            notified: 0,
            notify_failures: 0,
        })
    }

    async fn apply_price(&self, listing: &Listing, data: PriceData) -> Result<CheckOutcome> {
        if data.is_blank() {
            // The page loaded and parsed but carries no values; usually an
            // expired listing still answering 200.
            warn!("no price present on {}", listing.url);
            return self.mark(listing, ListingStatus::NoPrice).await;
        }

        let Ok(price) = data.price.parse::<i64>() else {
            // Digits that overflow the column are as unusable as none.
            warn!("unusable price {:?} on {}", data.price, listing.url);
            return self.mark(listing, ListingStatus::NoPrice).await;
        };
        let currency = data.currency.trim().to_string();

        match (listing.price, listing.currency.as_deref()) {
            // The discriminator is "has a stored price", not the previous
            // status, so a listing recovers from any error state uniformly.
            (Some(old_price), Some(old_currency)) => {
                if old_price == price && old_currency == currency {
                    // Steady state: nothing written, nothing sent.
                    return Ok(CheckOutcome {
                        listing_id: listing.id.clone(),
                        status: listing.status,
                        price_changed: false,
                        notified: 0,
                        notify_failures: 0,
                    });
                }
                self.record_change(listing, old_price, old_currency, price, currency)
                    .await
            }
            _ => self.first_fill(listing, price, currency).await,
        }
    }

    // First observation fills the fields. Not a change: no history row, no
    // notification.
    async fn first_fill(
        &self,
        listing: &Listing,
        price: i64,
        currency: String,
    ) -> Result<CheckOutcome> {
        let now = Utc::now();
        let mut updated = listing.clone();
        updated.price = Some(price);
        updated.currency = Some(currency);
        updated.change_date = Some(now);
        updated.status = ListingStatus::Active;
        updated.updated_at = now;
        self.store.save(&updated, None).await?;

        Ok(CheckOutcome {
            listing_id: listing.id.clone(),
            status: ListingStatus::Active,
            price_changed: false,
            notified: 0,
            notify_failures: 0,
        })
    }

    async fn record_change(
        &self,
        listing: &Listing,
        old_price: i64,
        old_currency: &str,
        price: i64,
        currency: String,
    ) -> Result<CheckOutcome> {
        let snapshot =
            PriceHistoryEntry::new(&listing.id, old_price, old_currency, listing.change_date);

        let now = Utc::now();
        let mut updated = listing.clone();
        updated.price = Some(price);
        updated.currency = Some(currency.clone());
        updated.change_date = Some(now);
        updated.status = ListingStatus::Active;
        updated.updated_at = now;

        // History insert and listing update land together or not at all.
        self.store.save(&updated, Some(&snapshot)).await?;

        info!(
            "Price changed for {} - old: {} {}, new: {} {}",
            listing.url, old_price, old_currency, price, currency
        );

        let event = PriceChangeEvent {
            listing_url: listing.url.clone(),
            old_price,
            old_currency: old_currency.to_string(),
            new_price: price,
            new_currency: currency,
        };
        let (notified, notify_failures) = self.fan_out(&listing.id, &event).await?;

        Ok(CheckOutcome {
            listing_id: listing.id.clone(),
            status: ListingStatus::Active,
            price_changed: true,
            notified,
            notify_failures,
        })
    }

    // Best-effort, unordered: one send per verified subscriber, and one
    // refused mailbox never blocks the others. The price mutation is already
    // durable by the time this runs.
    async fn fan_out(&self, listing_id: &str, event: &PriceChangeEvent) -> Result<(usize, usize)> {
        let recipients = self.subscribers.verified_subscribers_of(listing_id).await?;

        let sends = recipients.into_iter().map(|subscriber| {
            let notifier = Arc::clone(&self.notifier);
            let event = event.clone();
            async move {
                let result = notifier.notify(&subscriber.email, &event).await;
                (subscriber.email, result)
            }
        });

        let mut notified = 0;
        let mut failures = 0;
        for (email, result) in join_all(sends).await {
            match result {
                Ok(()) => notified += 1,
                Err(e) => {
                    warn!("failed to notify {}: {}", email, e);
                    failures += 1;
                }
            }
        }

        Ok((notified, failures))
    }
}
