use serde::Serialize;
use tracing::{error, info};

use crate::blob::{self, StoreFactory};
use crate::config::MirrorConfig;
use crate::domain::{CatalogEntry, PipelineOutcome, PipelineReport};
use crate::error::MirrorError;
use crate::figshare::CatalogClient;
use crate::pipeline::{self, PipelineSettings};
use crate::pool;

/// Partition of the catalog into entries already mirrored and entries still
/// to transfer. Pure function of the remote listing state.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorPlan {
    pub skipped: Vec<String>,
    pub pending: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub skipped: Vec<String>,
    pub reports: Vec<PipelineReport>,
}

impl RunSummary {
    pub fn failed_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome.is_failed())
            .count()
    }
}

pub struct Mirror<C: CatalogClient, F: StoreFactory> {
    catalog: C,
    factory: F,
    config: MirrorConfig,
}

impl<C: CatalogClient, F: StoreFactory> Mirror<C, F> {
    pub fn new(catalog: C, factory: F, config: MirrorConfig) -> Self {
        Self {
            catalog,
            factory,
            config,
        }
    }

    /// Fetch the catalog and decide what still needs transferring.
    ///
    /// Catalog and listing failures are fatal here, in deliberate contrast
    /// with the downloader's aggressive per-file retry policy. An entry is
    /// skipped when any object already exists under its namespace.
    pub fn plan(&self) -> Result<MirrorPlan, MirrorError> {
        let entries = self.catalog.fetch_catalog(&self.config.article)?;
        info!(files = entries.len(), article = %self.config.article, "fetched catalog");

        let store = self.factory.connect()?;
        let mut skipped = Vec::new();
        let mut pending = Vec::new();
        for entry in entries {
            if blob::already_mirrored(store.as_ref(), &self.config.base_prefix, &entry.name)? {
                info!(
                    file = entry.name.as_str(),
                    "blobs already uploaded; skipping"
                );
                skipped.push(entry.name);
            } else {
                info!(file = entry.name.as_str(), "queued for transfer");
                pending.push(entry);
            }
        }
        Ok(MirrorPlan { skipped, pending })
    }

    /// Plan, transfer every pending entry over the bounded worker pool and
    /// summarize. Individual pipeline failures do not stop the batch; the
    /// reports come back in submission order.
    pub fn run(&self) -> Result<RunSummary, MirrorError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let plan = self.plan()?;

        let settings = PipelineSettings {
            base_prefix: self.config.base_prefix.clone(),
            retry: self.config.retry,
            ca_bundle: self.config.ca_bundle.clone(),
            extract: crate::archive::ExtractOptions {
                skip_existing: self.config.skip_existing_extraction,
            },
        };
        let reports = pool::map_bounded(self.config.transfer_workers, plan.pending, |entry| {
            pipeline::mirror_file(&entry, &self.factory, &settings)
        });

        for report in &reports {
            match report.outcome {
                PipelineOutcome::Uploaded(count) => {
                    info!(
                        file = report.file_name.as_str(),
                        blobs = count,
                        "uploaded"
                    );
                }
                PipelineOutcome::Failed => {
                    error!(
                        file = report.file_name.as_str(),
                        "transfer failed; see earlier logs for the error"
                    );
                }
            }
        }
        info!("all transfers completed");

        Ok(RunSummary {
            started_at,
            skipped: plan.skipped,
            reports,
        })
    }
}
