//! Model registry listing

use crate::models::model_registry;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct ModelInfo {
    pub model_type: &'static str,
    pub modality: crate::models::Modality,
    pub channels: usize,
    /// Whether the weights artifact is present in the model directory
    pub available: bool,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = model_registry()
        .iter()
        .map(|spec| ModelInfo {
            model_type: spec.key,
            modality: spec.modality,
            channels: spec.modality.channels(),
            available: state.config.model_dir.join(spec.weights_file).exists(),
        })
        .collect();
    Json(ModelsResponse { models })
}
