//! Job record, status state machine, and partial updates.
//!
//! A [`Job`] is only ever mutated through [`Job::apply`], which enforces the
//! lifecycle rules:
//!
//! - status moves forward only (`initializing → searching → processing →
//!   generating → completed | failed`), and never leaves a terminal state;
//! - `results` may be non-empty only in `completed`;
//! - `errors` may be non-empty only in `failed`;
//! - `progress` never decreases and is clamped to 100.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::image::ImageMetadata;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Unit-of-work budget assumed until the real reference count is known.
pub const DEFAULT_TOTAL_STEPS: u32 = 30;

/// Upper bound for `progress`.
pub const MAX_PROGRESS: u8 = 100;

/// Provider tag for results that are the located references themselves.
pub const PROVIDER_LOCAL_IMAGES: &str = "local-images";

/// Status string carried by each successful result record.
pub const RESULT_STATUS_COMPLETED: &str = "completed";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Initializing,
    Searching,
    Processing,
    Generating,
    Completed,
    Failed,
}

impl JobStatus {
    /// Position in the forward-only ordering. Both terminal states share
    /// the highest rank.
    fn rank(self) -> u8 {
        match self {
            JobStatus::Initializing => 0,
            JobStatus::Searching => 1,
            JobStatus::Processing => 2,
            JobStatus::Generating => 3,
            JobStatus::Completed | JobStatus::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a record currently in `self` may be written with `next`.
    ///
    /// Re-asserting the current non-terminal status is allowed so progress
    /// can be bumped without a state change.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Initializing => "initializing",
            JobStatus::Searching => "searching",
            JobStatus::Processing => "processing",
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The normalized request a job was created from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    pub text_prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fonts: Vec<String>,
    /// URLs of auxiliary images uploaded with the request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl JobInput {
    pub fn new(text_prompt: impl Into<String>) -> Self {
        Self {
            text_prompt: text_prompt.into(),
            ..Default::default()
        }
    }
}

/// Metadata attached to each result: image facts plus the style it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(flatten)]
    pub image: ImageMetadata,
    pub style: String,
}

/// One output of a completed job.
///
/// `generated_image_url` keeps its snake_case key; polling clients read it
/// under that name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    #[serde(rename = "generated_image_url")]
    pub generated_image_url: String,
    pub status: String,
    /// The original text prompt the job was submitted with.
    pub prompt: String,
    /// Decorated prompt actually sent to a generation provider, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_prompt: Option<String>,
    pub index: usize,
    pub timestamp: Timestamp,
    pub provider: String,
    pub metadata: ResultMetadata,
}

/// A generation job and everything a polling client needs to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub total_steps: u32,
    pub completed_steps: u32,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
    pub results: Vec<GenerationResult>,
    pub errors: Vec<String>,
    pub input: JobInput,
    /// Category key detected from the prompt, once searching has begun.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Number of reference images located.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_images: Option<usize>,
}

impl Job {
    /// A fresh record in `initializing` with the default step budget.
    pub fn new(id: JobId, input: JobInput, now: Timestamp) -> Self {
        Self {
            id,
            status: JobStatus::Initializing,
            progress: 0,
            total_steps: DEFAULT_TOTAL_STEPS,
            completed_steps: 0,
            started_at: now,
            updated_at: now,
            results: Vec::new(),
            errors: Vec::new(),
            input,
            category: None,
            reference_images: None,
        }
    }

    /// Merge `update` into this record, stamping `updated_at` with `now`.
    ///
    /// The update is validated in full before any field is written, so a
    /// rejected update leaves the record untouched.
    pub fn apply(&mut self, update: JobUpdate, now: Timestamp) -> Result<(), CoreError> {
        let next_status = update.status.unwrap_or(self.status);

        if !self.status.can_transition_to(next_status) {
            return Err(CoreError::Conflict(format!(
                "Job {} cannot move from {} to {}",
                self.id, self.status, next_status
            )));
        }

        let has_results = match &update.results {
            Some(results) => !results.is_empty(),
            None => !self.results.is_empty(),
        };
        if has_results && next_status != JobStatus::Completed {
            return Err(CoreError::Validation(format!(
                "Job {} may only carry results when completed (status {next_status})",
                self.id
            )));
        }

        let has_errors = match &update.errors {
            Some(errors) => !errors.is_empty(),
            None => !self.errors.is_empty(),
        };
        if has_errors && next_status != JobStatus::Failed {
            return Err(CoreError::Validation(format!(
                "Job {} may only carry errors when failed (status {next_status})",
                self.id
            )));
        }

        self.status = next_status;
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(MAX_PROGRESS));
        }
        if let Some(total) = update.total_steps {
            self.total_steps = total;
        }
        if let Some(completed) = update.completed_steps {
            self.completed_steps = completed;
        }
        if let Some(results) = update.results {
            self.results = results;
        }
        if let Some(errors) = update.errors {
            self.errors = errors;
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        if let Some(count) = update.reference_images {
            self.reference_images = Some(count);
        }
        self.updated_at = now;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

/// A partial set of fields to merge into a [`Job`].
///
/// Unset fields keep their current value. Built with the constructors and
/// `with_*` methods below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub total_steps: Option<u32>,
    pub completed_steps: Option<u32>,
    pub results: Option<Vec<GenerationResult>>,
    pub errors: Option<Vec<String>>,
    pub category: Option<String>,
    pub reference_images: Option<usize>,
}

impl JobUpdate {
    /// Move to `status` without touching anything else.
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Terminal success: the full result batch in a single write.
    pub fn completed(results: Vec<GenerationResult>) -> Self {
        let count = u32::try_from(results.len()).unwrap_or(u32::MAX);
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(MAX_PROGRESS),
            total_steps: Some(count),
            completed_steps: Some(count),
            results: Some(results),
            errors: Some(Vec::new()),
            ..Default::default()
        }
    }

    /// Terminal failure with one or more messages.
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            errors: Some(errors),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_steps(mut self, completed: u32, total: u32) -> Self {
        self.completed_steps = Some(completed);
        self.total_steps = Some(total);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_reference_images(mut self, count: usize) -> Self {
        self.reference_images = Some(count);
        self
    }
}
