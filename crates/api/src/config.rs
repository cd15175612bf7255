use std::path::PathBuf;
use std::str::FromStr;

use kura_pipeline::generation::DEFAULT_FAILURE_RATE;
use kura_pipeline::orchestrator::{PipelineMode, DEFAULT_MAX_CONCURRENT_JOBS};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Invalid values
/// panic at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory holding one subdirectory of reference images per category.
    pub asset_root: PathBuf,
    /// Where multipart uploads are written.
    pub upload_dir: PathBuf,
    pub pipeline_mode: PipelineMode,
    /// Upper bound on job continuations running at once.
    pub max_concurrent_jobs: usize,
    /// Simulated locator lookup delay bounds, in milliseconds.
    pub locator_delay_min_ms: u64,
    pub locator_delay_max_ms: u64,
    /// Mock generation delay bounds, in milliseconds (mock-ai mode only).
    pub generation_delay_min_ms: u64,
    pub generation_delay_max_ms: u64,
    /// Chance in `[0, 1]` that one mock generation attempt fails.
    pub generation_failure_rate: f64,
    /// Non-terminal jobs idle for longer than this are failed.
    pub job_timeout_secs: u64,
    /// Terminal jobs are evicted this long after their last update.
    pub job_retention_secs: u64,
    pub job_sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3001`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `ASSET_ROOT`              | `./TrainingImages`      |
    /// | `UPLOAD_DIR`              | `./uploads`             |
    /// | `PIPELINE_MODE`           | `reference`             |
    /// | `MAX_CONCURRENT_JOBS`     | `16`                    |
    /// | `LOCATOR_DELAY_MIN_MS`    | `500`                   |
    /// | `LOCATOR_DELAY_MAX_MS`    | `1500`                  |
    /// | `GENERATION_DELAY_MIN_MS` | `1500`                  |
    /// | `GENERATION_DELAY_MAX_MS` | `3500`                  |
    /// | `GENERATION_FAILURE_RATE` | `0.15`                  |
    /// | `JOB_TIMEOUT_SECS`        | `300`                   |
    /// | `JOB_RETENTION_SECS`      | `3600`                  |
    /// | `JOB_SWEEP_INTERVAL_SECS` | `60`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let asset_root = std::env::var("ASSET_ROOT")
            .unwrap_or_else(|_| "./TrainingImages".into())
            .into();
        let upload_dir = std::env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "./uploads".into())
            .into();

        let pipeline_mode = std::env::var("PIPELINE_MODE")
            .unwrap_or_else(|_| "reference".into())
            .parse()
            .unwrap_or_else(|e| panic!("PIPELINE_MODE is invalid: {e}"));

        Self {
            host,
            port: env_or("PORT", 3001),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            asset_root,
            upload_dir,
            pipeline_mode,
            max_concurrent_jobs: env_or("MAX_CONCURRENT_JOBS", DEFAULT_MAX_CONCURRENT_JOBS),
            locator_delay_min_ms: env_or("LOCATOR_DELAY_MIN_MS", 500),
            locator_delay_max_ms: env_or("LOCATOR_DELAY_MAX_MS", 1500),
            generation_delay_min_ms: env_or("GENERATION_DELAY_MIN_MS", 1500),
            generation_delay_max_ms: env_or("GENERATION_DELAY_MAX_MS", 3500),
            generation_failure_rate: env_or("GENERATION_FAILURE_RATE", DEFAULT_FAILURE_RATE),
            job_timeout_secs: env_or("JOB_TIMEOUT_SECS", 300),
            job_retention_secs: env_or("JOB_RETENTION_SECS", 3600),
            job_sweep_interval_secs: env_or("JOB_SWEEP_INTERVAL_SECS", 60),
        }
    }
}

/// Parse `name` from the environment, falling back to `default` when unset.
///
/// Panics when the variable is set but does not parse.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
