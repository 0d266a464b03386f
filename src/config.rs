//! Graphics subsystem configuration.
//!
//! The host front-end hands configuration across the JS boundary as JSON,
//! so everything here deserializes with serde and every field has a
//! default. Limits are deliberately conservative: the store treats them as
//! hard budgets, not hints.

use serde::{Deserialize, Serialize};

use crate::error::GraphicsError;

/// Default memory quota: 320 MiB.
const DEFAULT_QUOTA_BYTES: usize = 320 * 1024 * 1024;

/// Default cap on a single decoded image: 64 MiB.
const DEFAULT_MAX_IMAGE_BYTES: usize = 64 * 1024 * 1024;

/// Limits for the image store and manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Maximum number of stored images before LRU eviction kicks in.
    pub max_images: usize,
    /// Total byte budget for all decoded images.
    pub quota_bytes: usize,
    /// Per-image byte cap; larger images are refused outright.
    pub max_image_bytes: usize,
    /// Maximum simultaneous placements.
    pub max_placements: usize,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            max_images: 1000,
            quota_bytes: DEFAULT_QUOTA_BYTES,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_placements: 1024,
        }
    }
}

impl GraphicsConfig {
    /// Parse a host-provided JSON config. Unknown fields are ignored;
    /// missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, GraphicsError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphicsConfig::default();
        assert_eq!(config.max_images, 1000);
        assert_eq!(config.quota_bytes, 320 * 1024 * 1024);
        assert_eq!(config.max_image_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn test_from_json_partial() {
        let config = GraphicsConfig::from_json(r#"{"max_images": 12}"#).unwrap();
        assert_eq!(config.max_images, 12);
        assert_eq!(config.quota_bytes, 320 * 1024 * 1024);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(GraphicsConfig::from_json("not json").is_err());
    }
}
