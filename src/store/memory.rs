//! In-memory resource store
//!
//! Holds every dataset as an owned [`ArrayD`]. Useful for fixtures, for data
//! assembled by the caller, and for carving one collection into the per-file,
//! per-year or per-chunk pieces the multi-source strategies compose.

use super::{check_ranges, DatasetProperties, ResourceStore, StoreIdentity};
use crate::errors::{ExtractError, Result};
use crate::site_table::SiteTable;
use crate::time_axis::TimeAxis;
use ndarray::{ArrayD, Axis, Slice};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

#[derive(Debug, Clone)]
struct MemoryDataset {
    data: ArrayD<f32>,
    dimensions: Vec<String>,
    units: Option<String>,
    attributes: HashMap<String, JsonValue>,
}

/// Resource store backed by owned arrays
#[derive(Debug, Clone)]
pub struct MemoryStore {
    identity: StoreIdentity,
    time_index: TimeAxis,
    sites: SiteTable,
    datasets: BTreeMap<String, MemoryDataset>,
    coordinates: HashMap<String, Vec<f64>>,
}

impl MemoryStore {
    /// Create an empty store over a time axis and site table
    pub fn new(label: impl Into<String>, time_index: TimeAxis, sites: SiteTable) -> Self {
        Self {
            identity: StoreIdentity::named(label),
            time_index,
            sites,
            datasets: BTreeMap::new(),
            coordinates: HashMap::new(),
        }
    }

    /// Add a `(time, site)` or higher-rank dataset with default dimension names
    pub fn with_dataset(self, name: impl Into<String>, data: ArrayD<f32>) -> Result<Self> {
        let dimensions = default_dimensions(data.ndim());
        self.with_dataset_dims(name, data, dimensions)
    }

    /// Add a dataset with explicit dimension names
    pub fn with_dataset_dims(
        mut self,
        name: impl Into<String>,
        data: ArrayD<f32>,
        dimensions: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        let shape = data.shape();
        if data.ndim() < 2 || dimensions.len() != data.ndim() {
            return Err(ExtractError::configuration(format!(
                "Dataset '{}' needs at least (time, site) axes with one name each, got shape {:?} and dimensions {:?}",
                name, shape, dimensions
            )));
        }
        if shape[0] != self.time_index.len() || shape[shape.len() - 1] != self.sites.len() {
            return Err(ExtractError::configuration(format!(
                "Dataset '{}' has shape {:?}, expected ({}, ..., {})",
                name,
                shape,
                self.time_index.len(),
                self.sites.len()
            )));
        }
        self.datasets.insert(
            name,
            MemoryDataset {
                data,
                dimensions,
                units: None,
                attributes: HashMap::new(),
            },
        );
        Ok(self)
    }

    /// Set the units of an existing dataset
    pub fn with_units(mut self, dataset: &str, units: impl Into<String>) -> Result<Self> {
        let entry = self
            .datasets
            .get_mut(dataset)
            .ok_or_else(|| ExtractError::DatasetNotFound {
                dataset: dataset.to_string(),
            })?;
        let units = units.into();
        entry
            .attributes
            .insert("units".to_string(), JsonValue::String(units.clone()));
        entry.units = Some(units);
        Ok(self)
    }

    /// Register coordinate values for an extra dimension
    pub fn with_coordinate(mut self, dimension: impl Into<String>, values: Vec<f64>) -> Self {
        self.coordinates.insert(dimension.into(), values);
        self
    }

    /// A new store holding only the time steps in `range`
    pub fn time_subset(&self, label: impl Into<String>, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.time_index.len() {
            return Err(ExtractError::invalid_slice(format!(
                "Time range {}..{} is invalid for {} time steps",
                range.start,
                range.end,
                self.time_index.len()
            )));
        }
        let steps = self.time_index.as_slice()[range.clone()].to_vec();
        let mut subset = Self::new(label, TimeAxis::new(steps)?, self.sites.clone());
        subset.coordinates = self.coordinates.clone();
        for (name, dataset) in &self.datasets {
            let data = dataset
                .data
                .slice_axis(Axis(0), Slice::from(range.clone()))
                .to_owned();
            subset.datasets.insert(
                name.clone(),
                MemoryDataset {
                    data,
                    ..dataset.clone()
                },
            );
        }
        Ok(subset)
    }

    /// A new store holding only the named datasets
    pub fn dataset_subset(&self, label: impl Into<String>, names: &[&str]) -> Result<Self> {
        let mut subset = Self::new(label, self.time_index.clone(), self.sites.clone());
        subset.coordinates = self.coordinates.clone();
        for &name in names {
            let dataset = self.dataset(name)?;
            subset.datasets.insert(name.to_string(), dataset.clone());
        }
        Ok(subset)
    }

    fn dataset(&self, name: &str) -> Result<&MemoryDataset> {
        self.datasets
            .get(name)
            .ok_or_else(|| ExtractError::DatasetNotFound {
                dataset: name.to_string(),
            })
    }
}

fn default_dimensions(rank: usize) -> Vec<String> {
    let mut dims = vec!["time".to_string()];
    dims.extend((1..rank.saturating_sub(1)).map(|i| format!("dim_{i}")));
    dims.push("gid".to_string());
    dims
}

impl ResourceStore for MemoryStore {
    fn identity(&self) -> StoreIdentity {
        self.identity.clone()
    }

    fn dataset_names(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    fn time_index(&self) -> Result<TimeAxis> {
        Ok(self.time_index.clone())
    }

    fn site_table(&self) -> Result<SiteTable> {
        Ok(self.sites.clone())
    }

    fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
        let entry = self.dataset(dataset)?;
        Ok(DatasetProperties {
            name: dataset.to_string(),
            shape: entry.data.shape().to_vec(),
            dimensions: entry.dimensions.clone(),
            dtype: "float32".to_string(),
            units: entry.units.clone(),
            attributes: entry.attributes.clone(),
        })
    }

    fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>> {
        self.coordinates
            .get(dimension)
            .cloned()
            .ok_or_else(|| ExtractError::DatasetNotFound {
                dataset: dimension.to_string(),
            })
    }

    fn read(&self, dataset: &str, ranges: &[Range<usize>]) -> Result<ArrayD<f32>> {
        let entry = self.dataset(dataset)?;
        check_ranges(dataset, entry.data.shape(), ranges)?;
        let block = entry
            .data
            .slice_each_axis(|ax| Slice::from(ranges[ax.axis.index()].clone()));
        Ok(block.to_owned())
    }

    fn contains(&self, dataset: &str) -> bool {
        self.datasets.contains_key(dataset)
    }
}
