//! Job orchestration for the Kura reference-image pipeline.
//!
//! [`store::JobStore`] owns every job record. [`orchestrator::Orchestrator`]
//! allocates jobs and drives each one to a terminal state on its own tokio
//! task, calling an [`locator::ImageLocator`] and, optionally, a
//! [`generation::GenerationProvider`] along the way.

pub mod generation;
pub mod latency;
pub mod locator;
pub mod orchestrator;
pub mod store;
