use futures::FutureExt;
use harbor_core::FileRecord;
use harbor_processing::{PipelineOutcome, VariantPipeline};
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

pub const DEFAULT_MAX_WORKERS: usize = 3;
/// Variant generation is CPU-bound; more workers than this only thrash.
pub const MAX_WORKERS: usize = 5;

/// Aggregate result of one batch. Skipped files count as succeeded, so
/// `total == succeeded + failed` always holds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<PipelineOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(results: Vec<PipelineOutcome>) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..Default::default()
        };
        for outcome in &results {
            if outcome.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            if outcome.is_skipped() {
                summary.skipped += 1;
            }
        }
        summary.results = results;
        summary
    }

    pub fn outcome(&self, file_id: Uuid) -> Option<&PipelineOutcome> {
        self.results.iter().find(|o| o.file_id == file_id)
    }
}

/// Runs the variant pipeline over many files with at most `max_workers` in
/// flight. One file's failure, including a panic, never affects siblings.
#[derive(Clone)]
pub struct BatchCoordinator {
    pipeline: VariantPipeline,
    max_workers: usize,
}

impl BatchCoordinator {
    pub fn new(pipeline: VariantPipeline, max_workers: usize) -> Self {
        Self {
            pipeline,
            max_workers: max_workers.clamp(1, MAX_WORKERS),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn pipeline(&self) -> &VariantPipeline {
        &self.pipeline
    }

    /// Process every record and wait for all of them. Completion order is
    /// unspecified; results follow completion order.
    #[tracing::instrument(skip(self, records), fields(total = records.len(), max_workers = self.max_workers))]
    pub async fn process_many(&self, records: Vec<FileRecord>) -> BatchSummary {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();
        let expected: Vec<Uuid> = records.iter().map(|r| r.id).collect();

        for record in records {
            let pipeline = self.pipeline.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let file_id = record.id;
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();

                match AssertUnwindSafe(pipeline.process_one(&record))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::error!(file_id = %file_id, "Variant pipeline panicked");
                        PipelineOutcome::failed(file_id, "Variant pipeline panicked")
                    }
                }
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => results.push(outcome),
                Err(e) => tracing::error!(error = %e, "Batch task aborted"),
            }
        }
        account_for_lost_tasks(&expected, &mut results);

        let summary = BatchSummary::from_outcomes(results);
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Variant batch completed"
        );
        summary
    }
}

/// Record a failure for every expected file whose task never reported back.
fn account_for_lost_tasks(expected: &[Uuid], results: &mut Vec<PipelineOutcome>) {
    let mut reported: HashMap<Uuid, usize> = HashMap::new();
    for outcome in results.iter() {
        *reported.entry(outcome.file_id).or_default() += 1;
    }
    for &file_id in expected {
        match reported.get_mut(&file_id) {
            Some(count) if *count > 0 => *count -= 1,
            _ => {
                tracing::error!(file_id = %file_id, "Variant task lost before reporting");
                results.push(PipelineOutcome::failed(file_id, "Variant task aborted"));
            }
        }
    }
}
