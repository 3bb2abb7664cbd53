//! Model registry and modality configuration
//!
//! Each model type maps to a weights artifact, the input modality it was
//! trained on, and the normalization statistics that must match training.

use serde::{Deserialize, Serialize};

/// Input modality a model consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// RGB satellite imagery
    Satellite,
    /// Building-count raster
    BuildingCount,
    /// Building-height raster
    BuildingHeight,
    /// Satellite + building count stacked
    SatelliteBuildingCount,
    /// All three modalities stacked
    All,
}

impl Modality {
    /// Source subdirectories this modality requires inside an uploaded
    /// tile set, in channel-stacking order
    pub fn required_dirs(&self) -> &'static [&'static str] {
        match self {
            Modality::Satellite => &["satellite-256"],
            Modality::BuildingCount => &["bc-256"],
            Modality::BuildingHeight => &["bh-256"],
            Modality::SatelliteBuildingCount => &["satellite-256", "bc-256"],
            Modality::All => &["satellite-256", "bc-256", "bh-256"],
        }
    }

    /// Total input channels after stacking
    pub fn channels(&self) -> usize {
        match self {
            Modality::Satellite => 3,
            Modality::BuildingCount | Modality::BuildingHeight => 1,
            Modality::SatelliteBuildingCount => 4,
            Modality::All => 5,
        }
    }

    /// Preferred reference directory for tile enumeration: primary imagery
    /// when present, otherwise the first required directory
    pub fn reference_dir(&self) -> &'static str {
        self.required_dirs()
            .iter()
            .find(|d| **d == "satellite-256")
            .copied()
            .unwrap_or(self.required_dirs()[0])
    }
}

// Normalization statistics, matching the training setup. Satellite bands are
// scaled to [0, 1] before these are applied; bc/bh rasters are raw floats.
const RGB_MEAN: [f32; 3] = [0.339_693_13, 0.352_394_91, 0.281_354_68];
const RGB_STD: [f32; 3] = [0.235_945_16, 0.203_536_60, 0.203_147_76];
const BC_MEAN: f32 = 0.000_943_623_1;
const BC_STD: f32 = 0.001_719_754_4;
const BH_MEAN: f32 = 3.086_625_3;
const BH_STD: f32 = 5.610_204_7;

/// Immutable configuration of one model type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Registry key, as selected by the client
    pub key: &'static str,
    /// Weights artifact filename inside the model directory
    pub weights_file: &'static str,
    pub modality: Modality,
}

impl ModelSpec {
    /// Per-channel normalization means in stacking order
    pub fn mean(&self) -> Vec<f32> {
        stack_stats(self.modality, &RGB_MEAN, BC_MEAN, BH_MEAN)
    }

    /// Per-channel normalization standard deviations in stacking order
    pub fn std(&self) -> Vec<f32> {
        stack_stats(self.modality, &RGB_STD, BC_STD, BH_STD)
    }
}

fn stack_stats(modality: Modality, rgb: &[f32; 3], bc: f32, bh: f32) -> Vec<f32> {
    match modality {
        Modality::Satellite => rgb.to_vec(),
        Modality::BuildingCount => vec![bc],
        Modality::BuildingHeight => vec![bh],
        Modality::SatelliteBuildingCount => {
            let mut v = rgb.to_vec();
            v.push(bc);
            v
        }
        Modality::All => {
            let mut v = rgb.to_vec();
            v.push(bc);
            v.push(bh);
            v
        }
    }
}

/// All model types this service can load
pub fn model_registry() -> &'static [ModelSpec] {
    &[
        ModelSpec {
            key: "convnext_satellite",
            weights_file: "convnext-sat.onnx",
            modality: Modality::Satellite,
        },
        ModelSpec {
            key: "convnext_bc",
            weights_file: "convnext-bc.onnx",
            modality: Modality::BuildingCount,
        },
        ModelSpec {
            key: "convnext_bh",
            weights_file: "convnext-bh.onnx",
            modality: Modality::BuildingHeight,
        },
        ModelSpec {
            key: "convnext_all",
            weights_file: "convnext-all.onnx",
            modality: Modality::All,
        },
        // Plain-decoder UNet variant; same inputs as convnext_all, the
        // architecture difference lives in the exported weights
        ModelSpec {
            key: "convnext_unet_all",
            weights_file: "convnext-unet-all.onnx",
            modality: Modality::All,
        },
        ModelSpec {
            key: "settlenet",
            weights_file: "settlenet.onnx",
            modality: Modality::All,
        },
    ]
}

/// Look up a model spec by registry key
pub fn resolve_model(model_type: &str) -> Option<&'static ModelSpec> {
    model_registry().iter().find(|m| m.key == model_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        let spec = resolve_model("convnext_all").unwrap();
        assert_eq!(spec.modality, Modality::All);
        assert!(resolve_model("resnet").is_none());
    }

    #[test]
    fn registry_offers_both_all_modality_convnext_variants() {
        let unet = resolve_model("convnext_unet_all").unwrap();
        assert_eq!(unet.modality, Modality::All);
        assert_eq!(unet.weights_file, "convnext-unet-all.onnx");
        // Distinct weights from the fused-decoder variant
        assert_ne!(
            unet.weights_file,
            resolve_model("convnext_all").unwrap().weights_file
        );
        assert_eq!(model_registry().len(), 6);
    }

    #[test]
    fn stats_match_channel_counts() {
        for spec in model_registry() {
            assert_eq!(spec.mean().len(), spec.modality.channels(), "{}", spec.key);
            assert_eq!(spec.std().len(), spec.modality.channels(), "{}", spec.key);
        }
    }

    #[test]
    fn reference_dir_prefers_satellite() {
        assert_eq!(Modality::All.reference_dir(), "satellite-256");
        assert_eq!(Modality::BuildingCount.reference_dir(), "bc-256");
    }
}
