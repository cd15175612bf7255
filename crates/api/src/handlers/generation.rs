//! Handlers for prompt submission and job status polling.
//!
//! Routes:
//! - `POST /api/generate`          : start a job (JSON, urlencoded or multipart body)
//! - `GET  /api/status/{job_id}`   : current job snapshot

use std::path::Path;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Path as UrlPath, Request, State};
use axum::http::{header, StatusCode};
use axum::{Form, Json};
use kura_core::job::{Job, JobInput};
use kura_core::prompt::{extract_colors, validate_prompt, ColorInput};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::routes::assets::UPLOADS_PATH;
use crate::state::AppState;

/// Status reported to the submitter; the job itself is `searching` by then.
const ACCEPTED_STATUS: &str = "processing";

/// Longest file extension kept on an uploaded file name.
const MAX_EXTENSION_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /api/generate`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub text_prompt: Option<String>,
    /// Older clients send the prompt as `text`.
    pub text: Option<String>,
    pub colors: Option<ColorInput>,
    /// Same shapes as `colors`: a comma-separated string or a list.
    pub fonts: Option<ColorInput>,
}

impl GenerateRequest {
    /// `textPrompt`, or `text` when `textPrompt` is absent or blank.
    pub fn prompt(&self) -> &str {
        self.text_prompt
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.text.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub job_id: String,
    pub status: &'static str,
    pub message: &'static str,
    pub status_url: String,
}

/// A file part of a multipart submission, held in memory until the prompt
/// has been validated.
#[derive(Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub data: Bytes,
}

/// Submission extracted from any of the accepted body encodings.
#[derive(Debug)]
pub struct GenerateForm {
    pub request: GenerateRequest,
    pub files: Vec<UploadedFile>,
}

impl FromRequest<AppState> for GenerateForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return read_multipart(multipart).await;
        }

        let request = if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(request) = Form::<GenerateRequest>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            request
        } else {
            let Json(request) = Json::<GenerateRequest>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            request
        };

        Ok(Self {
            request,
            files: Vec::new(),
        })
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<GenerateForm, AppError> {
    let mut request = GenerateRequest::default();
    let mut colors = Vec::new();
    let mut fonts = Vec::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            // Browsers send an empty part for an unused file input.
            if !data.is_empty() {
                files.push(UploadedFile {
                    field: name,
                    file_name,
                    data,
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "textPrompt" => request.text_prompt = Some(value),
            "text" => request.text = Some(value),
            "colors" | "colors[]" => colors.push(value),
            "fonts" | "fonts[]" => fonts.push(value),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    if !colors.is_empty() {
        request.colors = Some(ColorInput::Text(colors.join(",")));
    }
    if !fonts.is_empty() {
        request.fonts = Some(ColorInput::Text(fonts.join(",")));
    }

    Ok(GenerateForm { request, files })
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/generate
///
/// Validates the prompt, stores any uploaded files and starts a job.
/// Answers 202 before any pipeline work has run; the client then polls
/// `statusUrl`.
pub async fn submit(
    State(state): State<AppState>,
    form: GenerateForm,
) -> AppResult<(StatusCode, Json<GenerateResponse>)> {
    let GenerateForm { request, files } = form;

    let mut input = JobInput::new(validate_prompt(request.prompt())?);
    input.colors = request.colors.as_ref().map(extract_colors).unwrap_or_default();
    input.fonts = request.fonts.as_ref().map(extract_colors).unwrap_or_default();
    input.attachments = save_uploads(&state.config.upload_dir, files).await?;

    let job = state.orchestrator.submit(input).await?;

    tracing::info!(
        job_id = %job.id,
        attachments = job.input.attachments.len(),
        "Generation started"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            status_url: format!("/api/status/{}", job.id),
            job_id: job.id,
            status: ACCEPTED_STATUS,
            message: "Generation started",
        }),
    ))
}

/// Write uploads to `dir` and return the URLs they are served under.
async fn save_uploads(dir: &Path, files: Vec<UploadedFile>) -> AppResult<Vec<String>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload dir: {e}")))?;

    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        let name = upload_name(&file.field, &file.file_name);
        tokio::fs::write(dir.join(&name), &file.data)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to store upload {name}: {e}")))?;

        tracing::debug!(file = %name, bytes = file.data.len(), "Stored upload");
        urls.push(format!("{UPLOADS_PATH}/{name}"));
    }

    Ok(urls)
}

/// `<field>-<millis>-<random><.ext>`, restricted to URL-safe characters.
fn upload_name(field: &str, original: &str) -> String {
    let field: String = field
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let field = if field.is_empty() { "file".to_string() } else { field };

    let extension = Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();

    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);

    format!("{field}-{millis}-{suffix}{extension}")
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/status/{job_id}
///
/// Returns the job as currently stored. Never waits on the pipeline.
pub async fn get_status(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> AppResult<Json<Job>> {
    let job = state.orchestrator.status(&job_id).await?;
    Ok(Json(job))
}
