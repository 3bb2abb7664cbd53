//! Model cache
//!
//! Lazily loads and memoizes one inference engine per model-type key.
//! Cache hits take a read lock only; a miss takes the write lock, re-checks
//! under it (double-checked pattern, so racing requests trigger exactly one
//! load), constructs the engine from its weights artifact and inserts it.
//! Entries are immutable after insertion.

use crate::error::PipelineError;
use crate::inference::{EngineLoader, InferenceEngine};
use crate::models::{resolve_model, ModelSpec};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Cached engine plus the immutable configuration it was built from
pub struct CachedModel {
    pub spec: &'static ModelSpec,
    pub engine: Arc<dyn InferenceEngine>,
}

/// Engine cache keyed by model type
pub struct ModelCache {
    model_dir: PathBuf,
    loader: Arc<dyn EngineLoader>,
    entries: RwLock<HashMap<String, Arc<CachedModel>>>,
    loads: AtomicUsize,
}

impl ModelCache {
    pub fn new(model_dir: PathBuf, loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            model_dir,
            loader,
            entries: RwLock::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Fetch the engine for `model_type`, loading it on first use
    pub fn get_or_load(&self, model_type: &str) -> Result<Arc<CachedModel>, PipelineError> {
        {
            let entries = self.entries.read().expect("model cache lock poisoned");
            if let Some(cached) = entries.get(model_type) {
                return Ok(Arc::clone(cached));
            }
        }

        let mut entries = self.entries.write().expect("model cache lock poisoned");
        // Re-check: another caller may have loaded while we waited
        if let Some(cached) = entries.get(model_type) {
            return Ok(Arc::clone(cached));
        }

        let spec = resolve_model(model_type).ok_or_else(|| {
            PipelineError::ModelConfig(format!(
                "Unknown model type: {}. Available types: {:?}",
                model_type,
                crate::models::model_registry()
                    .iter()
                    .map(|m| m.key)
                    .collect::<Vec<_>>()
            ))
        })?;

        let weights_path = self.model_dir.join(spec.weights_file);
        if !weights_path.exists() {
            return Err(PipelineError::ModelNotFound(weights_path));
        }

        let engine = self.loader.load(spec, &weights_path)?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        info!(
            model_type = %model_type,
            weights = %weights_path.display(),
            "Loaded inference engine"
        );

        let cached = Arc::new(CachedModel { spec, engine });
        entries.insert(model_type.to_string(), Arc::clone(&cached));
        Ok(cached)
    }

    /// Number of engine constructions performed so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use std::path::Path;
    use tempfile::TempDir;

    struct FakeEngine;

    impl InferenceEngine for FakeEngine {
        fn infer(&self, input: &Array3<f32>) -> Result<Array2<f32>, PipelineError> {
            let (_, h, w) = input.dim();
            Ok(Array2::from_elem((h, w), 1.0))
        }
    }

    /// Loader that counts constructions and can simulate slow loads
    struct FakeLoader {
        delay: std::time::Duration,
    }

    impl EngineLoader for FakeLoader {
        fn load(
            &self,
            _spec: &ModelSpec,
            _weights_path: &Path,
        ) -> Result<Arc<dyn InferenceEngine>, PipelineError> {
            std::thread::sleep(self.delay);
            Ok(Arc::new(FakeEngine))
        }
    }

    fn cache_with_weights(dir: &TempDir, delay_ms: u64) -> Arc<ModelCache> {
        for spec in crate::models::model_registry() {
            std::fs::write(dir.path().join(spec.weights_file), b"weights").unwrap();
        }
        Arc::new(ModelCache::new(
            dir.path().to_path_buf(),
            Arc::new(FakeLoader {
                delay: std::time::Duration::from_millis(delay_ms),
            }),
        ))
    }

    #[test]
    fn unknown_model_type_is_config_error() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_weights(&dir, 0);
        assert!(matches!(
            cache.get_or_load("resnet50"),
            Err(PipelineError::ModelConfig(_))
        ));
        assert_eq!(cache.load_count(), 0);
    }

    #[test]
    fn missing_weights_is_not_found() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(ModelCache::new(
            dir.path().to_path_buf(),
            Arc::new(FakeLoader {
                delay: std::time::Duration::ZERO,
            }),
        ));
        assert!(matches!(
            cache.get_or_load("settlenet"),
            Err(PipelineError::ModelNotFound(_))
        ));
    }

    #[test]
    fn second_fetch_hits_cache() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_weights(&dir, 0);
        cache.get_or_load("settlenet").unwrap();
        cache.get_or_load("settlenet").unwrap();
        assert_eq!(cache.load_count(), 1);

        // A different key loads separately
        cache.get_or_load("convnext_all").unwrap();
        assert_eq!(cache.load_count(), 2);
    }

    #[test]
    fn concurrent_requests_trigger_exactly_one_load() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_weights(&dir, 25);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_load("settlenet").map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(cache.load_count(), 1);
    }
}
