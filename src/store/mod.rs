//! Resource store abstraction
//!
//! A resource store is one read-only array container: a time axis, a site table
//! and a set of named datasets laid out as `(time, [extra dims...], site)`.
//! Everything above this layer addresses stores only through the
//! [`ResourceStore`] trait, so the composition strategies in
//! [`source`](crate::source) work the same over NetCDF files and in-memory data.

pub mod memory;
pub mod netcdf;

pub use self::memory::MemoryStore;
pub use self::netcdf::{NetCdfStore, NetCdfStoreWriter};

use crate::errors::Result;
use crate::site_table::SiteTable;
use crate::time_axis::TimeAxis;
use ndarray::ArrayD;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Names that describe the collection rather than hold resource data
pub const RESERVED_NAMES: [&str; 5] = ["time_index", "meta", "coordinates", "latitude", "longitude"];

/// Who a store is: a display label and, for file-backed stores, its path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreIdentity {
    pub label: String,
    pub path: Option<PathBuf>,
}

impl StoreIdentity {
    /// Identity of a file-backed store, labelled by its file name
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            label,
            path: Some(path.to_path_buf()),
        }
    }

    /// Identity of a store with no backing file
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: None,
        }
    }
}

impl fmt::Display for StoreIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "{}", self.label),
        }
    }
}

/// Shape and descriptive metadata of one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetProperties {
    pub name: String,
    /// Full shape, time first and site last
    pub shape: Vec<usize>,
    pub dimensions: Vec<String>,
    pub dtype: String,
    pub units: Option<String>,
    pub attributes: HashMap<String, JsonValue>,
}

impl DatasetProperties {
    /// Number of axes
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Names of the axes between time and site
    pub fn extra_dimensions(&self) -> &[String] {
        match self.dimensions.len() {
            0..=2 => &[],
            n => &self.dimensions[1..n - 1],
        }
    }

    /// Lengths of the axes between time and site
    pub fn extra_shape(&self) -> &[usize] {
        match self.shape.len() {
            0..=2 => &[],
            n => &self.shape[1..n - 1],
        }
    }
}

/// Read-only array container keyed by dataset name, time and site
pub trait ResourceStore {
    /// Label and optional backing path
    fn identity(&self) -> StoreIdentity;

    /// Resource datasets held by this store, reserved names excluded
    fn dataset_names(&self) -> Vec<String>;

    /// Time axis shared by every dataset of the store
    fn time_index(&self) -> Result<TimeAxis>;

    /// Site coordinates and administrative attributes
    fn site_table(&self) -> Result<SiteTable>;

    /// Shape, dimension names and attributes of a dataset
    fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties>;

    /// Coordinate values of an extra dimension (e.g. frequency bins)
    fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>>;

    /// Read one contiguous block, one range per axis of the dataset
    fn read(&self, dataset: &str, ranges: &[Range<usize>]) -> Result<ArrayD<f32>>;

    /// True when the store holds the dataset
    fn contains(&self, dataset: &str) -> bool {
        self.dataset_names().iter().any(|d| d == dataset)
    }
}

impl<T: ResourceStore + ?Sized> ResourceStore for Box<T> {
    fn identity(&self) -> StoreIdentity {
        (**self).identity()
    }

    fn dataset_names(&self) -> Vec<String> {
        (**self).dataset_names()
    }

    fn time_index(&self) -> Result<TimeAxis> {
        (**self).time_index()
    }

    fn site_table(&self) -> Result<SiteTable> {
        (**self).site_table()
    }

    fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
        (**self).dataset_properties(dataset)
    }

    fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>> {
        (**self).coordinate_values(dimension)
    }

    fn read(&self, dataset: &str, ranges: &[Range<usize>]) -> Result<ArrayD<f32>> {
        (**self).read(dataset, ranges)
    }

    fn contains(&self, dataset: &str) -> bool {
        (**self).contains(dataset)
    }
}

/// Check a block request against a dataset shape
pub(crate) fn check_ranges(dataset: &str, shape: &[usize], ranges: &[Range<usize>]) -> Result<()> {
    if ranges.len() != shape.len() {
        return Err(crate::errors::ExtractError::invalid_slice(format!(
            "Dataset '{}' has {} dimensions but {} ranges were given",
            dataset,
            shape.len(),
            ranges.len()
        )));
    }
    for (axis, (range, &len)) in ranges.iter().zip(shape).enumerate() {
        if range.start > range.end || range.end > len {
            return Err(crate::errors::ExtractError::invalid_slice(format!(
                "Invalid range {}..{} on axis {} of '{}' (dimension size: {})",
                range.start, range.end, axis, dataset, len
            )));
        }
    }
    Ok(())
}
