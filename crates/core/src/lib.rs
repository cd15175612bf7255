//! Domain types and pure logic for the Kura reference-image pipeline.
//!
//! Nothing in this crate performs network I/O or spawns tasks; the job
//! store, locator and orchestrator live in `kura-pipeline`.

pub mod assets;
pub mod category;
pub mod error;
pub mod image;
pub mod job;
pub mod prompt;
pub mod types;
