//! The collection cycle: fetch, consolidate, persist.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use chainfeed_core::provider::TargetRequest;
use chainfeed_core::{
    CollectionTarget, DataProvider, Frame, ProviderError, ProviderErrorKind, ProviderRegistry,
    RetryPolicy, UtcDateTime,
};
use chainfeed_store::{CollectionRecord, RunRecord, Store, StoreError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Phases of one collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Collecting,
    Consolidating,
    Closed,
}

impl CycleState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Consolidating => "consolidating",
            Self::Closed => "closed",
        }
    }
}

/// Outcome of one (provider, dataset) target within a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    pub provider: String,
    pub dataset: String,
    pub fetched_at: UtcDateTime,
    pub latency_ms: u64,
    pub rows: u64,
    pub success: bool,
    pub error_kind: Option<ProviderErrorKind>,
    pub error: Option<String>,
    pub raw_file: Option<PathBuf>,
    #[serde(skip)]
    frame: Option<Frame>,
}

impl CollectionResult {
    fn succeeded(provider: &str, dataset: &str, latency_ms: u64, frame: Frame) -> Self {
        Self {
            provider: provider.to_owned(),
            dataset: dataset.to_owned(),
            fetched_at: UtcDateTime::now(),
            latency_ms,
            rows: frame.row_count() as u64,
            success: true,
            error_kind: None,
            error: None,
            raw_file: None,
            frame: Some(frame),
        }
    }

    fn failed(provider: &str, dataset: &str, latency_ms: u64, error: &ProviderError) -> Self {
        Self {
            provider: provider.to_owned(),
            dataset: dataset.to_owned(),
            fetched_at: UtcDateTime::now(),
            latency_ms,
            rows: 0,
            success: false,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
            raw_file: None,
            frame: None,
        }
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRun {
    pub run_id: Uuid,
    pub started_at: UtcDateTime,
    pub finished_at: UtcDateTime,
    pub state: CycleState,
    pub success_count: u32,
    pub failure_count: u32,
    pub total_rows: u64,
    pub results: Vec<CollectionResult>,
    pub consolidated_files: Vec<PathBuf>,
}

/// Knobs for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Hard wall for each individual provider call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    /// Timeframe label in processed file names.
    pub timeframe: String,
    /// Feature-type label in processed file names.
    pub feature_type: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::exponential(3),
            timeframe: String::from("1h"),
            feature_type: String::from("consolidated"),
        }
    }
}

/// Drives registered providers through collection cycles.
pub struct Pipeline {
    registry: Arc<RwLock<ProviderRegistry>>,
    store: Store,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(registry: ProviderRegistry, store: Store, options: PipelineOptions) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            store,
            options,
        }
    }

    pub fn registry(&self) -> Arc<RwLock<ProviderRegistry>> {
        Arc::clone(&self.registry)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Runs one full cycle: Collecting → Consolidating → Closed.
    ///
    /// Provider failures are isolated into their `CollectionResult`;
    /// only storage failures abort the cycle.
    pub async fn run_data_collection(&self) -> Result<CollectionRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = UtcDateTime::now();
        info!(run_id = %run_id, "collection cycle starting");

        // Collecting: active providers in registration order, one
        // result per (provider, dataset) target.
        let providers = self.registry.read().await.active();
        if providers.is_empty() {
            warn!(run_id = %run_id, "no active providers; run health checks first");
        }

        let mut results = Vec::new();
        for (name, provider) in providers {
            for target in provider.collection_targets() {
                results.push(self.collect_target(&name, provider.as_ref(), &target).await);
            }
        }

        // Consolidating: group schema-compatible successes, tagged
        // with their lineage.
        let consolidated = consolidate(&results);

        // Closed: persist raw pulls, consolidated groups, and the run
        // summary. Any storage error is fatal to the cycle.
        let finished_at = UtcDateTime::now();
        for result in &mut results {
            if let Some(frame) = result.frame.take() {
                let path =
                    self.store
                        .write_raw(&frame, &result.provider, &result.dataset, result.fetched_at)?;
                result.raw_file = Some(path);
            }
        }

        let mut consolidated_files = Vec::new();
        for (index, group) in consolidated.iter().enumerate() {
            // Additional schema groups get an index suffix so their
            // files never collide with the primary dataset.
            let feature_type = if index == 0 {
                self.options.feature_type.clone()
            } else {
                format!("{}_{index}", self.options.feature_type)
            };
            let path =
                self.store
                    .write_processed(group, &feature_type, &self.options.timeframe, finished_at)?;
            consolidated_files.push(path);
        }

        let success_count = results.iter().filter(|r| r.success).count() as u32;
        let failure_count = results.len() as u32 - success_count;
        let total_rows = results.iter().map(|r| r.rows).sum();

        let run = CollectionRun {
            run_id,
            started_at,
            finished_at,
            state: CycleState::Closed,
            success_count,
            failure_count,
            total_rows,
            results,
            consolidated_files,
        };
        self.store.append_run(&run_record(&run), &collection_records(&run))?;

        info!(
            run_id = %run_id,
            successes = run.success_count,
            failures = run.failure_count,
            rows = run.total_rows,
            "collection cycle closed"
        );
        Ok(run)
    }

    async fn collect_target(
        &self,
        provider_name: &str,
        provider: &dyn DataProvider,
        target: &CollectionTarget,
    ) -> CollectionResult {
        let started = Instant::now();
        let outcome = self.fetch_with_retries(provider, target).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(frame) => {
                info!(
                    provider = provider_name,
                    dataset = %target.dataset,
                    rows = frame.row_count(),
                    latency_ms,
                    "target collected"
                );
                CollectionResult::succeeded(provider_name, &target.dataset, latency_ms, frame)
            }
            Err(err) => {
                error!(
                    provider = provider_name,
                    dataset = %target.dataset,
                    code = err.code(),
                    latency_ms,
                    "target failed: {err}"
                );
                CollectionResult::failed(provider_name, &target.dataset, latency_ms, &err)
            }
        }
    }

    /// One target call with a per-attempt timeout; only errors the
    /// provider marks retryable are retried.
    async fn fetch_with_retries(
        &self,
        provider: &dyn DataProvider,
        target: &CollectionTarget,
    ) -> Result<Frame, ProviderError> {
        let mut attempt = 0;
        loop {
            let call = match &target.request {
                TargetRequest::MarketData(request) => provider.market_data(request.clone()),
                TargetRequest::Raw(spec) => provider.fetch_raw(spec.clone()),
            };

            let outcome = match tokio::time::timeout(self.options.call_timeout, call).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::timeout(format!(
                    "call exceeded {}ms",
                    self.options.call_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(frame) => return Ok(frame),
                Err(err) if err.retryable() && attempt < self.options.retry.max_retries => {
                    let delay = self.options.retry.backoff.delay(attempt);
                    warn!(
                        code = err.code(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after failure: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Groups successful frames by schema compatibility, each tagged with
/// its source and dataset lineage before stacking.
fn consolidate(results: &[CollectionResult]) -> Vec<Frame> {
    let mut groups: Vec<Frame> = Vec::new();
    for result in results {
        let Some(frame) = result.frame.as_ref() else {
            continue;
        };

        // Frames already carrying lineage columns go in untagged.
        let tagged = frame
            .with_lineage(&result.provider, &result.dataset)
            .unwrap_or_else(|_| frame.clone());

        match groups.iter_mut().find(|group| group.compatible_with(&tagged)) {
            Some(group) => {
                group
                    .vstack(&tagged)
                    .expect("compatibility checked before stacking");
            }
            None => groups.push(tagged),
        }
    }
    groups
}

fn run_record(run: &CollectionRun) -> RunRecord {
    RunRecord {
        run_id: run.run_id.to_string(),
        started_at: run.started_at.format_rfc3339(),
        finished_at: run.finished_at.format_rfc3339(),
        state: run.state.as_str().to_owned(),
        success_count: run.success_count,
        failure_count: run.failure_count,
        total_rows: run.total_rows,
    }
}

fn collection_records(run: &CollectionRun) -> Vec<CollectionRecord> {
    run.results
        .iter()
        .map(|result| CollectionRecord {
            run_id: run.run_id.to_string(),
            provider: result.provider.clone(),
            dataset: result.dataset.clone(),
            fetched_at: result.fetched_at.format_rfc3339(),
            latency_ms: result.latency_ms,
            rows: result.rows,
            success: result.success,
            error_kind: result.error_kind.map(|kind| kind.as_str().to_owned()),
            error: result.error.clone(),
            raw_file: result
                .raw_file
                .as_ref()
                .map(|path| path.display().to_string()),
        })
        .collect()
}
