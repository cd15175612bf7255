//! Wiring of the job pipeline from server configuration.

use std::sync::Arc;

use kura_pipeline::generation::MockGenerationProvider;
use kura_pipeline::latency::SimulatedLatency;
use kura_pipeline::locator::LocalImageLocator;
use kura_pipeline::orchestrator::{Orchestrator, OrchestratorSettings, PipelineMode};
use kura_pipeline::store::JobStore;

use crate::config::ServerConfig;
use crate::routes::assets::IMAGES_PATH;

/// Build the orchestrator for `config`, backed by a fresh job store.
///
/// Located images are reported under [`IMAGES_PATH`], which is where the
/// asset root is served.
pub fn build_orchestrator(config: &ServerConfig) -> Orchestrator {
    let latency = SimulatedLatency::new(config.locator_delay_min_ms, config.locator_delay_max_ms);
    let locator = LocalImageLocator::new(&config.asset_root, latency);

    let settings = OrchestratorSettings::new(&config.asset_root, IMAGES_PATH)
        .with_max_concurrent_jobs(config.max_concurrent_jobs);

    let orchestrator = Orchestrator::new(Arc::new(JobStore::new()), Arc::new(locator), settings);

    match config.pipeline_mode {
        PipelineMode::Reference => orchestrator,
        PipelineMode::MockAi => {
            let latency =
                SimulatedLatency::new(config.generation_delay_min_ms, config.generation_delay_max_ms);
            let provider = MockGenerationProvider::new(latency, config.generation_failure_rate);
            orchestrator.with_generator(Arc::new(provider))
        }
    }
}
