//! Pipeline orchestrator.
//!
//! [`Orchestrator::submit`] validates a request, allocates a job and
//! returns immediately. The rest of the job runs on a detached tokio task
//! (the *continuation*) which is the only writer of that job's record:
//!
//! ```text
//! initializing -> searching -> processing -> completed
//!                     |            |  \
//!                     v            v   -> generating -> completed
//!                   failed       failed        \-> failed
//! ```
//!
//! Continuations acquire a permit from a shared semaphore before doing any
//! work, so at most `max_concurrent_jobs` run at once; queued jobs remain
//! visible as `searching`. Failures of any kind, panics included, end in
//! `failed` for that job only.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use kura_core::assets::asset_url;
use kura_core::category::detect_category;
use kura_core::error::CoreError;
use kura_core::image::ReferenceImage;
use kura_core::job::{
    GenerationResult, Job, JobInput, JobStatus, JobUpdate, ResultMetadata, PROVIDER_LOCAL_IMAGES,
    RESULT_STATUS_COMPLETED,
};
use kura_core::prompt::{create_generation_prompts, enhance_prompt_with_context, validate_prompt};
use kura_core::types::{new_job_id, JobId};
use tokio::sync::Semaphore;

use crate::generation::GenerationProvider;
use crate::locator::{ImageLocator, LocatorError, MAX_REFERENCE_IMAGES};
use crate::store::JobStore;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Progress checkpoints reported to polling clients.
pub const PROGRESS_ACCEPTED: u8 = 5;
pub const PROGRESS_SEARCH_STARTED: u8 = 10;
pub const PROGRESS_REFERENCES_FOUND: u8 = 20;
pub const PROGRESS_PROCESSING: u8 = 50;
/// Progress reached once every generation batch has finished.
pub const PROGRESS_GENERATED: u8 = 95;

/// Number of generations run concurrently within one job.
pub const GENERATION_BATCH_SIZE: usize = 5;

pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 16;

pub const NO_REFERENCES_MESSAGE: &str = "No reference images found";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How located references become results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineMode {
    /// Return the located references directly as results.
    #[default]
    Reference,
    /// Run each reference through the generation provider.
    MockAi,
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(PipelineMode::Reference),
            "mock-ai" | "mock_ai" => Ok(PipelineMode::MockAi),
            other => Err(format!(
                "unknown pipeline mode '{other}' (expected 'reference' or 'mock-ai')"
            )),
        }
    }
}

/// Static settings for an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Root directory located image paths are relative to.
    pub asset_root: PathBuf,
    /// URL path the asset root is served under (e.g. `/images`).
    pub asset_url_prefix: String,
    pub max_concurrent_jobs: usize,
}

impl OrchestratorSettings {
    pub fn new(asset_root: impl Into<PathBuf>, asset_url_prefix: impl Into<String>) -> Self {
        Self {
            asset_root: asset_root.into(),
            asset_url_prefix: asset_url_prefix.into(),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Ways a continuation can end without completing its job.
#[derive(Debug, thiserror::Error)]
enum PipelineError {
    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("No reference images found")]
    NoReferences,

    #[error("All generations failed")]
    GenerationFailed(Vec<String>),

    #[error(transparent)]
    Store(#[from] CoreError),
}

impl PipelineError {
    /// Messages recorded in the job's `errors` list.
    fn messages(&self) -> Vec<String> {
        match self {
            PipelineError::GenerationFailed(messages) if !messages.is_empty() => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Allocates jobs and drives them to completion in the background.
///
/// Cheap to clone; every clone shares the same store, collaborators and
/// concurrency limit.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<JobStore>,
    locator: Arc<dyn ImageLocator>,
    generator: Option<Arc<dyn GenerationProvider>>,
    permits: Arc<Semaphore>,
    settings: Arc<OrchestratorSettings>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<JobStore>,
        locator: Arc<dyn ImageLocator>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            locator,
            generator: None,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1))),
            settings: Arc::new(settings),
        }
    }

    /// Enable [`PipelineMode::MockAi`] with the given provider.
    pub fn with_generator(mut self, generator: Arc<dyn GenerationProvider>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn mode(&self) -> PipelineMode {
        if self.generator.is_some() {
            PipelineMode::MockAi
        } else {
            PipelineMode::Reference
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Validate `input`, allocate a job and start its continuation.
    ///
    /// Returns the job as it stands when the caller is answered (status
    /// `searching`). An invalid prompt is rejected before any job exists.
    pub async fn submit(&self, mut input: JobInput) -> Result<Job, CoreError> {
        input.text_prompt = validate_prompt(&input.text_prompt)?;

        let id = new_job_id();
        self.store.create(id.clone(), input.clone()).await?;
        let job = self
            .store
            .update(
                &id,
                JobUpdate::status(JobStatus::Searching).with_progress(PROGRESS_ACCEPTED),
            )
            .await?;

        tracing::info!(job_id = %id, prompt = %input.text_prompt, "Job accepted");

        self.spawn_continuation(id, input);
        Ok(job)
    }

    /// Current snapshot of a job. Never waits on its continuation.
    pub async fn status(&self, id: &str) -> Result<Job, CoreError> {
        self.store.get(id).await
    }

    fn spawn_continuation(&self, id: JobId, input: JobInput) {
        let this = self.clone();
        tokio::spawn(async move {
            let permit = match Arc::clone(&this.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    this.record_failure(&id, vec!["Pipeline is shutting down".to_string()])
                        .await;
                    return;
                }
            };

            // Run on an inner task so a panic surfaces as a JoinError here
            // instead of leaving the job stuck.
            let runner = this.clone();
            let job_id = id.clone();
            let outcome = tokio::spawn(async move { runner.run(&job_id, input).await }).await;
            drop(permit);

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(PipelineError::Store(CoreError::Conflict(msg)))) => {
                    // Someone else (the watchdog) already finished this job.
                    tracing::warn!(job_id = %id, reason = %msg, "Continuation abandoned");
                }
                Ok(Err(e)) => {
                    tracing::error!(job_id = %id, error = %e, "Pipeline failed");
                    this.record_failure(&id, e.messages()).await;
                }
                Err(join_err) => {
                    tracing::error!(job_id = %id, error = %join_err, "Pipeline task panicked");
                    this.record_failure(&id, vec![format!("Unexpected pipeline failure: {join_err}")])
                        .await;
                }
            }
        });
    }

    async fn record_failure(&self, id: &str, errors: Vec<String>) {
        if let Err(e) = self.store.update(id, JobUpdate::failed(errors)).await {
            tracing::warn!(job_id = %id, error = %e, "Could not record job failure");
        }
    }

    /// The continuation body. Returns `Ok` only after writing `completed`.
    async fn run(&self, id: &str, input: JobInput) -> Result<(), PipelineError> {
        let category = detect_category(&input.text_prompt);
        self.store
            .update(
                id,
                JobUpdate::status(JobStatus::Searching)
                    .with_progress(PROGRESS_SEARCH_STARTED)
                    .with_category(category.key),
            )
            .await?;

        tracing::info!(job_id = %id, category = category.key, "Searching for reference images");

        let mut references = self.locator.locate(&category).await?;
        references.truncate(MAX_REFERENCE_IMAGES);
        if references.is_empty() {
            return Err(PipelineError::NoReferences);
        }

        self.store
            .update(
                id,
                JobUpdate::status(JobStatus::Searching)
                    .with_progress(PROGRESS_REFERENCES_FOUND)
                    .with_reference_images(references.len()),
            )
            .await?;
        self.store
            .update(
                id,
                JobUpdate::status(JobStatus::Processing).with_progress(PROGRESS_PROCESSING),
            )
            .await?;

        tracing::info!(job_id = %id, count = references.len(), "Processing reference images");

        let update = match &self.generator {
            None => JobUpdate::completed(self.reference_results(&input, &references)),
            Some(generator) => self.generate(id, &input, &references, generator.as_ref()).await?,
        };
        let job = self.store.update(id, update).await?;

        tracing::info!(job_id = %id, results = job.results.len(), "Job completed");
        Ok(())
    }

    /// Results for [`PipelineMode::Reference`]: one per located image.
    fn reference_results(&self, input: &JobInput, references: &[ReferenceImage]) -> Vec<GenerationResult> {
        let now = Utc::now();
        let enhanced = enhance_prompt_with_context(
            &input.text_prompt,
            references.iter().map(|r| r.style.as_str()),
        );
        references
            .iter()
            .enumerate()
            .map(|(index, reference)| GenerationResult {
                generated_image_url: self.url_for(reference),
                status: RESULT_STATUS_COMPLETED.to_string(),
                prompt: input.text_prompt.clone(),
                enhanced_prompt: Some(enhanced.clone()),
                index,
                timestamp: now,
                provider: PROVIDER_LOCAL_IMAGES.to_string(),
                metadata: ResultMetadata {
                    image: reference.metadata.clone(),
                    style: reference.style.clone(),
                },
            })
            .collect()
    }

    /// [`PipelineMode::MockAi`]: generate in batches, reporting progress
    /// after each batch, and build the terminal update.
    async fn generate(
        &self,
        id: &str,
        input: &JobInput,
        references: &[ReferenceImage],
        generator: &dyn GenerationProvider,
    ) -> Result<JobUpdate, PipelineError> {
        let prompts = create_generation_prompts(input, references);
        let total = prompts.len();
        let total_steps = step_count(total);

        self.store
            .update(
                id,
                JobUpdate::status(JobStatus::Generating)
                    .with_progress(PROGRESS_PROCESSING)
                    .with_steps(0, total_steps),
            )
            .await?;

        let mut results = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut attempted = 0;

        for (batch_no, batch) in prompts.chunks(GENERATION_BATCH_SIZE).enumerate() {
            tracing::debug!(
                job_id = %id,
                batch = batch_no + 1,
                batches = total.div_ceil(GENERATION_BATCH_SIZE),
                "Generating batch",
            );

            let outcomes = join_all(batch.iter().map(|prompt| generator.generate(prompt))).await;
            for (prompt, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(image) => results.push(GenerationResult {
                        generated_image_url: image.url,
                        status: RESULT_STATUS_COMPLETED.to_string(),
                        prompt: input.text_prompt.clone(),
                        enhanced_prompt: Some(prompt.text.clone()),
                        index: prompt.index,
                        timestamp: Utc::now(),
                        provider: image.provider,
                        metadata: ResultMetadata {
                            image: image.metadata,
                            style: image.style,
                        },
                    }),
                    Err(e) => {
                        tracing::warn!(job_id = %id, index = prompt.index, error = %e, "Generation failed");
                        failures.push(format!("Generation {} failed: {e}", prompt.index));
                    }
                }
            }

            attempted += batch.len();
            self.store
                .update(
                    id,
                    JobUpdate::status(JobStatus::Generating)
                        .with_progress(generation_progress(attempted, total))
                        .with_steps(step_count(results.len()), total_steps),
                )
                .await?;
        }

        if results.is_empty() {
            return Err(PipelineError::GenerationFailed(failures));
        }

        let succeeded = step_count(results.len());
        Ok(JobUpdate::completed(results).with_steps(succeeded, total_steps))
    }

    /// Public URL for a located image, or its raw path when it does not
    /// live under the asset root.
    fn url_for(&self, reference: &ReferenceImage) -> String {
        asset_url(
            &self.settings.asset_root,
            &self.settings.asset_url_prefix,
            &reference.path,
        )
        .unwrap_or_else(|| reference.path.display().to_string())
    }
}

fn step_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Linear progress between [`PROGRESS_PROCESSING`] and
/// [`PROGRESS_GENERATED`].
fn generation_progress(attempted: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_GENERATED;
    }
    let span = usize::from(PROGRESS_GENERATED - PROGRESS_PROCESSING);
    let done = attempted.min(total);
    PROGRESS_PROCESSING + u8::try_from(span * done / total).unwrap_or(0)
}
