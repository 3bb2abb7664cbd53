//! Configuration loading and resolution for settleseg services
//!
//! Multi-tier resolution with ENV → TOML → compiled-default priority. Every
//! field can be overridden individually through a `SETTLESEG_*` environment
//! variable.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Optional on-disk configuration, loaded from `settleseg.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub bind_address: Option<String>,
    pub model_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub target_crs: Option<String>,
    pub default_threshold: Option<f32>,
    pub max_concurrent_jobs: Option<usize>,
    pub max_upload_mb: Option<u64>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Socket address the HTTP server binds to
    pub bind_address: String,
    /// Directory holding model weight files
    pub model_dir: PathBuf,
    /// Scratch directory for per-job workspaces
    pub work_dir: PathBuf,
    /// Directory for persisted composite rasters, served at `/results`
    pub results_dir: PathBuf,
    /// CRS the composite is reprojected into for web-map display
    pub target_crs: String,
    /// Detection threshold applied to probability maps when the client
    /// does not supply one
    pub default_threshold: f32,
    /// Upper bound on simultaneously executing jobs
    pub max_concurrent_jobs: usize,
    /// Upload size cap in bytes
    pub max_upload_bytes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            model_dir: PathBuf::from("trained_models"),
            work_dir: std::env::temp_dir().join("settleseg"),
            results_dir: PathBuf::from("results"),
            target_crs: "EPSG:3857".to_string(),
            default_threshold: 0.5,
            max_concurrent_jobs: 2,
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Resolve configuration with ENV → TOML → default priority
    pub fn resolve() -> Self {
        let toml_config = match load_toml_config() {
            Ok(Some((path, config))) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Ok(None) => TomlConfig::default(),
            Err(e) => {
                warn!("Ignoring unreadable configuration file: {}", e);
                TomlConfig::default()
            }
        };
        Self::from_tiers(&toml_config)
    }

    fn from_tiers(toml_config: &TomlConfig) -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_string("SETTLESEG_BIND")
                .or_else(|| toml_config.bind_address.clone())
                .unwrap_or(defaults.bind_address),
            model_dir: env_path("SETTLESEG_MODEL_DIR")
                .or_else(|| toml_config.model_dir.clone())
                .unwrap_or(defaults.model_dir),
            work_dir: env_path("SETTLESEG_WORK_DIR")
                .or_else(|| toml_config.work_dir.clone())
                .unwrap_or(defaults.work_dir),
            results_dir: env_path("SETTLESEG_RESULTS_DIR")
                .or_else(|| toml_config.results_dir.clone())
                .unwrap_or(defaults.results_dir),
            target_crs: env_string("SETTLESEG_TARGET_CRS")
                .or_else(|| toml_config.target_crs.clone())
                .unwrap_or(defaults.target_crs),
            default_threshold: env_parse("SETTLESEG_DEFAULT_THRESHOLD")
                .or(toml_config.default_threshold)
                .unwrap_or(defaults.default_threshold),
            max_concurrent_jobs: env_parse("SETTLESEG_MAX_JOBS")
                .or(toml_config.max_concurrent_jobs)
                .unwrap_or(defaults.max_concurrent_jobs),
            max_upload_bytes: env_parse::<u64>("SETTLESEG_MAX_UPLOAD_MB")
                .or(toml_config.max_upload_mb)
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.max_upload_bytes),
        }
    }

    /// Create the work and results directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(&self.results_dir)?;
        Ok(())
    }
}

/// Locate and parse `settleseg.toml`, following the priority order:
/// 1. `SETTLESEG_CONFIG` environment variable
/// 2. `./settleseg.toml` in the working directory
/// 3. Platform config directory (`~/.config/settleseg/config.toml` on Linux)
fn load_toml_config() -> Result<Option<(PathBuf, TomlConfig)>> {
    let candidates: Vec<PathBuf> = [
        std::env::var("SETTLESEG_CONFIG").ok().map(PathBuf::from),
        Some(PathBuf::from("settleseg.toml")),
        dirs::config_dir().map(|d| d.join("settleseg").join("config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect();

    for path in candidates {
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config = toml::from_str::<TomlConfig>(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            return Ok(Some((path, config)));
        }
    }
    Ok(None)
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_string(name).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    match env_string(name) {
        Some(v) => match v.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!("Ignoring unparseable environment override {}={}", name, v);
                None
            }
        },
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1:8000");
        assert_eq!(config.target_crs, "EPSG:3857");
        assert!(config.default_threshold > 0.0 && config.default_threshold < 1.0);
        assert!(config.max_concurrent_jobs >= 1);
    }

    #[test]
    fn toml_overrides_defaults() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            bind_address = "0.0.0.0:9100"
            target_crs = "EPSG:4326"
            max_concurrent_jobs = 4
            "#,
        )
        .unwrap();
        let config = ServiceConfig::from_tiers(&toml_config);
        assert_eq!(config.bind_address, "0.0.0.0:9100");
        assert_eq!(config.target_crs, "EPSG:4326");
        assert_eq!(config.max_concurrent_jobs, 4);
        // untouched fields keep their defaults
        assert_eq!(config.default_threshold, 0.5);
    }
}
