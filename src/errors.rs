//! Centralized error handling for rextract
//!
//! Errors fall into four groups:
//!
//! - configuration errors, raised while a source set is assembled
//! - not-found errors for unknown datasets and unmatched timestamps
//! - value-domain errors for coordinates outside the dataset envelope and
//!   malformed timestamps or slices
//! - wrapped failures from the underlying stores, the filesystem and the cache
//!
//! Empty region and box matches are not errors; they produce zero-column results.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for extraction operations
#[derive(Debug, Error)]
pub enum ExtractError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// JSON (de)serialization of configuration or cache artifacts
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed source composition detected at open time
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A dataset is claimed by more than one store of a file set
    #[error("Dataset '{dataset}' is present in both '{first}' and '{second}'")]
    AmbiguousDataset {
        dataset: String,
        first: String,
        second: String,
    },

    /// Two stores cover overlapping parts of the time axis
    #[error("Time axis of '{second}' overlaps the time axis of '{first}'")]
    OverlappingTimeAxis { first: String, second: String },

    /// Stores disagree on the number of sites
    #[error("Store '{source_name}' has {found} sites, expected {expected}")]
    SiteCountMismatch {
        source_name: String,
        expected: usize,
        found: usize,
    },

    /// A site table column is not present
    #[error("Column '{column}' not found in site table")]
    ColumnNotFound { column: String },

    /// Dataset name unknown to every store
    #[error("Dataset '{dataset}' not found")]
    DatasetNotFound { dataset: String },

    /// Timestamp with no exact match on the time axis
    #[error("Timestamp '{timestamp}' does not match any time step")]
    TimestampNotFound { timestamp: String },

    /// Time interval with no covered time step
    #[error("No time steps between '{start}' and '{end}'")]
    TimeRangeNotCovered { start: String, end: String },

    /// Coordinates outside the dataset envelope plus tolerance
    #[error(
        "Coordinates ({lat}, {lon}) are more than {tolerance} degrees outside the dataset extent"
    )]
    OutOfBounds { lat: f64, lon: f64, tolerance: f64 },

    /// Timestamp text in no accepted format
    #[error("Cannot parse '{value}' as a timestamp")]
    InvalidTimestamp { value: String },

    /// Invalid slice specification
    #[error("Invalid slice specification: {message}")]
    InvalidSlice { message: String },

    /// Spatial index cache failure
    #[error("Index cache error at {path:?}: {message}")]
    Cache {
        path: Option<PathBuf>,
        message: String,
    },
}

impl ExtractError {
    /// Shorthand for a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for an invalid slice error
    pub fn invalid_slice(message: impl Into<String>) -> Self {
        Self::InvalidSlice {
            message: message.into(),
        }
    }

    /// True for errors raised while assembling a source set
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::AmbiguousDataset { .. }
                | Self::OverlappingTimeAxis { .. }
                | Self::SiteCountMismatch { .. }
                | Self::ColumnNotFound { .. }
        )
    }

    /// True for unknown dataset names and unmatched time selections
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DatasetNotFound { .. }
                | Self::TimestampNotFound { .. }
                | Self::TimeRangeNotCovered { .. }
        )
    }
}

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = ExtractError::DatasetNotFound {
            dataset: "ghi".to_string(),
        };
        assert_eq!(err.to_string(), "Dataset 'ghi' not found");
        assert!(err.is_not_found());

        let err = ExtractError::AmbiguousDataset {
            dataset: "dni".to_string(),
            first: "a.nc".to_string(),
            second: "b.nc".to_string(),
        };
        assert!(err.to_string().contains("'dni'"));
        assert!(err.to_string().contains("b.nc"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_out_of_bounds_is_neither_config_nor_not_found() {
        let err = ExtractError::OutOfBounds {
            lat: 90.0,
            lon: 0.0,
            tolerance: 0.5,
        };
        assert!(!err.is_configuration());
        assert!(!err.is_not_found());
    }
}
