//! Extraction configuration
//!
//! Holds the tunables of the extraction layer: where the spatial index cache
//! lives, how far outside the site envelope a coordinate may fall before it is
//! rejected, and how sparse site lists are split into read runs.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default sanity bound, in degrees, beyond the site coordinate envelope
pub const DEFAULT_LAT_LON_TOLERANCE: f64 = 0.5;

/// Default maximum gap between consecutive site ids within one read run
pub const DEFAULT_MAX_SITE_GAP: usize = 1000;

const DEFAULT_CACHE_DIR_NAME: &str = "rextract-trees";

/// Configuration for extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Spatial index cache directory, `None` for the system temp directory
    pub cache_dir: Option<PathBuf>,
    /// Degrees a probe coordinate may lie outside the site envelope
    pub lat_lon_tolerance: f64,
    /// Maximum id gap between consecutive requested sites in one read
    pub max_site_gap: usize,
    /// Persist built spatial indices to the cache directory
    pub use_index_cache: bool,
}

impl ExtractConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            cache_dir: None,
            lat_lon_tolerance: DEFAULT_LAT_LON_TOLERANCE,
            max_site_gap: DEFAULT_MAX_SITE_GAP,
            use_index_cache: true,
        }
    }

    /// Load a configuration from a JSON file, missing keys take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "Loaded extraction config");
        Ok(config)
    }

    /// Use a specific cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Use a specific sanity bound in degrees
    pub fn with_tolerance(mut self, degrees: f64) -> Self {
        self.lat_lon_tolerance = degrees;
        self
    }

    /// Use a specific site run gap
    pub fn with_max_site_gap(mut self, gap: usize) -> Self {
        self.max_site_gap = gap;
        self
    }

    /// Build spatial indices in memory only
    pub fn without_index_cache(mut self) -> Self {
        self.use_index_cache = false;
        self
    }

    /// Resolved cache directory
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME))
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self::new()
    }
}
