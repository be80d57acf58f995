//! Persistent render configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{Error, Result};
use crate::bvh::{BvhLimits, SplitAxis, DEFAULT_BOX_EPSILON};
use crate::frame::{Extent2d, QueueRouting};

/// Knobs consumed by the builder and the frame orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    // Frame pipeline
    pub frames_in_flight: usize,
    pub width: u32,
    pub height: u32,
    pub queue_routing: QueueRouting,

    // Fixed-capacity GPU arrays
    pub max_primitives: usize,
    pub max_nodes: usize,

    // BVH build
    pub split_axis: SplitAxis,
    pub split_seed: Option<u64>,
    pub box_epsilon: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            width: 1280,
            height: 720,
            queue_routing: QueueRouting::Split,
            max_primitives: 500,
            max_nodes: 1024,
            split_axis: SplitAxis::Random,
            split_seed: None,
            box_epsilon: DEFAULT_BOX_EPSILON,
        }
    }
}

impl RenderConfig {
    /// Default config file location
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("hybrid-raytracer");
            p.push("config.json");
            p
        })
    }

    /// Load from the platform config dir, falling back to defaults.
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config as pretty JSON.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Save to the platform config dir (best effort).
    pub fn save(&self) {
        if let Some(path) = Self::path() {
            if let Err(e) = self.save_to(&path) {
                tracing::warn!("failed to save config to {}: {}", path.display(), e);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::config("frames_in_flight must be at least 1"));
        }
        if self.max_primitives == 0 || self.max_nodes == 0 {
            return Err(Error::config("max_primitives and max_nodes must be non-zero"));
        }
        if !(self.box_epsilon >= 0.0 && self.box_epsilon.is_finite()) {
            return Err(Error::config(format!(
                "box_epsilon must be finite and non-negative, got {}",
                self.box_epsilon
            )));
        }
        Ok(())
    }

    pub fn limits(&self) -> BvhLimits {
        BvhLimits {
            max_primitives: self.max_primitives,
            max_nodes: self.max_nodes,
        }
    }

    pub fn extent(&self) -> Extent2d {
        Extent2d::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = RenderConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert!(config.validate().is_ok());
        assert!(config.limits().max_nodes >= 2 * config.max_primitives - 1);
    }

    #[test]
    fn test_roundtrip_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("config.json");

        let config = RenderConfig {
            frames_in_flight: 3,
            split_axis: SplitAxis::LongestExtent,
            split_seed: Some(7),
            queue_routing: QueueRouting::Unified,
            ..Default::default()
        };
        config.save_to(&path).expect("Failed to save config");

        let loaded = RenderConfig::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "width": 640, "split_axis": "longest_extent" }"#).unwrap();

        let loaded = RenderConfig::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded.width, 640);
        assert_eq!(loaded.height, 720);
        assert_eq!(loaded.split_axis, SplitAxis::LongestExtent);
    }

    #[test]
    fn test_rejects_zero_frames_in_flight() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "frames_in_flight": 0 }"#).unwrap();

        let err = RenderConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RenderConfig::load_from(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
