use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::checker::PriceChecker;
use crate::config::DispatcherConfig;
use crate::store::ListingStore;
use crate::utils::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub checked: usize,
    pub changed: usize,
    pub failed: usize,
}

/// Walks every listing due for a check and runs the checker over each, a
/// chunk at a time with bounded concurrency. Listings are independent units
/// of work; nothing here coordinates beyond the concurrency cap.
pub struct Dispatcher {
    checker: Arc<PriceChecker>,
    store: Arc<dyn ListingStore>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        checker: Arc<PriceChecker>,
        store: Arc<dyn ListingStore>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            checker,
            store,
            config,
        }
    }

    pub async fn run_cycle(&self) -> Result<DispatchSummary> {
        info!("Starting price check cycle");

        let mut summary = DispatchSummary::default();
        let mut after_id: Option<String> = None;

        loop {
            let chunk = self
                .store
                .eligible_chunk(after_id.as_deref(), self.config.chunk_size)
                .await?;
            let Some(last) = chunk.last() else {
                break;
            };
            after_id = Some(last.id.clone());
            let chunk_len = chunk.len();

            let results: Vec<_> = stream::iter(chunk)
                .map(|listing| {
                    let checker = Arc::clone(&self.checker);
                    async move { checker.run(&listing).await }
                })
                .buffer_unordered(self.config.max_concurrent_checks)
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(outcome) => {
                        summary.checked += 1;
                        if outcome.price_changed {
                            summary.changed += 1;
                        }
                    }
                    Err(e) => {
                        error!("price check failed: {}", e);
                        summary.failed += 1;
                    }
                }
            }

            info!("Checked {} listings so far", summary.checked);

            if chunk_len < self.config.chunk_size as usize {
                break;
            }
        }

        info!(
            "Finished cycle: {} checked, {} changed, {} failed",
            summary.checked, summary.changed, summary.failed
        );
        Ok(summary)
    }
}
