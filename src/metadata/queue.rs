//! Background enrichment queue for asynchronously processing items.
//!
//! The [`EnrichmentQueue`] accepts [`EnrichmentJob`] submissions and processes
//! them in a spawned background task, rate-limiting passes and broadcasting an
//! [`EnrichmentEvent`] for each finished job.
//!
//! # Example
//!
//! ```rust,ignore
//! let (event_tx, mut events) = broadcast::channel(64);
//! let queue = EnrichmentQueue::from_config(&config.enrichment, enricher, event_tx);
//! queue.submit(EnrichmentJob::new(item.clone())).await?;
//! ```

use std::sync::Arc;

use anyhow::Result;
use marquee_common::ItemId;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::config::EnrichmentConfig;

use super::enrichment::{Enricher, SharedItem};
use super::resolver::EnrichmentReport;

/// Channel capacity for the enrichment job queue.
const QUEUE_CAPACITY: usize = 100;

/// A request to enrich a single item.
#[derive(Debug, Clone)]
pub struct EnrichmentJob {
    /// The item to enrich.
    pub item: SharedItem,
    /// Consult providers that already populated the item.
    pub force: bool,
}

impl EnrichmentJob {
    /// A regular, non-forced job for `item`.
    pub fn new(item: SharedItem) -> Self {
        Self { item, force: false }
    }

    /// A forced job for `item`.
    pub fn forced(item: SharedItem) -> Self {
        Self { item, force: true }
    }
}

/// Broadcast after each processed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnrichmentEvent {
    /// The pass changed the item.
    ItemEnriched {
        item_id: ItemId,
        report: EnrichmentReport,
    },
    /// The pass finished without changing the item.
    ItemUnchanged { item_id: ItemId },
    /// The item could not be enriched.
    ItemRejected { item_id: ItemId, reason: String },
}

impl EnrichmentEvent {
    /// The item this event is about.
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::ItemEnriched { item_id, .. }
            | Self::ItemUnchanged { item_id }
            | Self::ItemRejected { item_id, .. } => *item_id,
        }
    }
}

/// Handle to a background enrichment processing queue.
///
/// Submit jobs via [`submit`](Self::submit); they are processed sequentially by
/// a spawned Tokio task with a delay between jobs. The background task runs
/// until every [`EnrichmentQueue`] handle is dropped, at which point the
/// channel closes and the task exits.
pub struct EnrichmentQueue {
    sender: mpsc::Sender<EnrichmentJob>,
    rate_limit: Duration,
}

impl EnrichmentQueue {
    /// Create a new enrichment queue and spawn its background processing task.
    pub fn new(
        enricher: Arc<Enricher>,
        event_tx: broadcast::Sender<EnrichmentEvent>,
        rate_limit: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);

        tokio::spawn(process_jobs(receiver, enricher, event_tx, rate_limit));

        Self { sender, rate_limit }
    }

    /// Create a queue paced by `config.queue_rate_limit_ms`.
    pub fn from_config(
        config: &EnrichmentConfig,
        enricher: Arc<Enricher>,
        event_tx: broadcast::Sender<EnrichmentEvent>,
    ) -> Self {
        Self::new(enricher, event_tx, Duration::from_millis(config.queue_rate_limit_ms))
    }

    /// Delay between jobs.
    pub fn rate_limit(&self) -> Duration {
        self.rate_limit
    }

    /// Submit an enrichment job to the background queue.
    ///
    /// Returns an error if the background processing task has stopped (channel closed).
    pub async fn submit(&self, job: EnrichmentJob) -> Result<()> {
        info!(
            item_id = %job.item.id(),
            force = job.force,
            "Submitting enrichment job to queue"
        );

        self.sender
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("Enrichment queue is closed"))?;

        Ok(())
    }
}

/// Background loop that drains the job channel, enriches each item, and
/// broadcasts events.
async fn process_jobs(
    mut receiver: mpsc::Receiver<EnrichmentJob>,
    enricher: Arc<Enricher>,
    event_tx: broadcast::Sender<EnrichmentEvent>,
    rate_limit: Duration,
) {
    info!("Enrichment queue worker started");

    while let Some(job) = receiver.recv().await {
        let item_id = job.item.id();

        info!(item_id = %item_id, "Processing enrichment job");

        let event = match enricher.enrich(&job.item, job.force).await {
            Ok(report) if report.changed() => {
                info!(item_id = %item_id, "Enrichment changed item");
                EnrichmentEvent::ItemEnriched { item_id, report }
            }
            Ok(_) => EnrichmentEvent::ItemUnchanged { item_id },
            Err(e) => {
                warn!(
                    item_id = %item_id,
                    error = %e,
                    "Enrichment failed; continuing with next job"
                );
                EnrichmentEvent::ItemRejected {
                    item_id,
                    reason: e.to_string(),
                }
            }
        };

        // No subscribers is fine.
        let _ = event_tx.send(event);

        sleep(rate_limit).await;
    }

    info!("Enrichment queue worker stopped (channel closed)");
}
