//! settleseg-is entry point

use settleseg_common::config::ServiceConfig;
use settleseg_is::inference::EngineLoader;
use settleseg_is::services::{GeoTiffTileReader, ModelCache};
use settleseg_is::{build_router, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("settleseg_is=info,settleseg_common=info,tower_http=info")),
        )
        .init();

    info!("Starting settleseg-is v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::resolve();
    config.ensure_directories()?;
    info!(
        bind = %config.bind_address,
        model_dir = %config.model_dir.display(),
        results_dir = %config.results_dir.display(),
        target_crs = %config.target_crs,
        "Configuration resolved"
    );

    let models = Arc::new(ModelCache::new(config.model_dir.clone(), engine_loader()));
    let state = AppState::new(config, models, Arc::new(GeoTiffTileReader));
    let bind_address = state.config.bind_address.clone();

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on {}", bind_address);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

#[cfg(feature = "onnx")]
fn engine_loader() -> Arc<dyn EngineLoader> {
    Arc::new(settleseg_is::inference::OnnxEngineLoader::default())
}

#[cfg(not(feature = "onnx"))]
fn engine_loader() -> Arc<dyn EngineLoader> {
    use settleseg_is::error::PipelineError;
    use settleseg_is::inference::InferenceEngine;
    use settleseg_is::models::ModelSpec;
    use std::path::Path;

    /// Stand-in for builds without an inference backend; every job fails at
    /// model-load time with a clear message.
    struct DisabledLoader;

    impl EngineLoader for DisabledLoader {
        fn load(
            &self,
            _spec: &ModelSpec,
            _weights_path: &Path,
        ) -> Result<Arc<dyn InferenceEngine>, PipelineError> {
            Err(PipelineError::ModelConfig(
                "service was built without an inference backend".to_string(),
            ))
        }
    }

    Arc::new(DisabledLoader)
}
