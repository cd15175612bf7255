use uuid::Uuid;

/// Jobs are keyed by an opaque string token (`job-<uuid>`).
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh job identifier.
///
/// UUIDv7 keeps ids roughly ordered by creation time, which makes log
/// output easier to follow. Ids are never reused within a process.
pub fn new_job_id() -> JobId {
    format!("job-{}", Uuid::now_v7().simple())
}
