//! NetCDF-backed resource store
//!
//! File layout:
//!
//! - dimensions `time` and `gid`, plus any extra dimensions such as
//!   `frequency` and `direction`
//! - `time_index`: `i64` over `time`, seconds since 1970-01-01 UTC
//! - `latitude`/`longitude`: `f64` over `gid` (also `lat`, `lon`, `long`), or a
//!   `coordinates` variable over `(gid, 2)` holding (lat, lon) pairs
//! - administrative columns: `i32` codes over `gid` with a `categories`
//!   string-list attribute, code `-1` meaning missing
//! - datasets: every other variable whose first dimension is `time` and whose
//!   last dimension is `gid`

use super::{check_ranges, DatasetProperties, ResourceStore, StoreIdentity, RESERVED_NAMES};
use crate::errors::{ExtractError, Result};
use crate::site_table::{find_coordinate_columns, SiteTable};
use crate::time_axis::TimeAxis;
use chrono::Utc;
use ndarray::{Array1, ArrayD};
use ::netcdf::{AttributeValue, File, FileMut, Variable};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::ops::Range;
use std::fs;
use std::path::{Path, PathBuf};

pub const TIME_DIM: &str = "time";
pub const SITE_DIM: &str = "gid";
pub const TIME_INDEX_VAR: &str = "time_index";
pub const CATEGORIES_ATTR: &str = "categories";
const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";

fn dimension_names(var: &Variable) -> Vec<String> {
    var.dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect()
}

fn dimension_lengths(var: &Variable) -> Vec<usize> {
    var.dimensions().iter().map(|d| d.len()).collect()
}

fn attribute_value(var: &Variable, name: &str) -> Option<AttributeValue> {
    var.attribute(name)?.value().ok()
}

fn string_list(value: AttributeValue) -> Option<Vec<String>> {
    match value {
        AttributeValue::Strs(values) => Some(values),
        AttributeValue::Str(value) => Some(vec![value]),
        _ => None,
    }
}

fn attribute_to_json(value: AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Str(s) => JsonValue::from(s),
        AttributeValue::Strs(ss) => JsonValue::from(ss),
        AttributeValue::Float(f) => JsonValue::from(f),
        AttributeValue::Floats(fs) => JsonValue::from(fs),
        AttributeValue::Double(d) => JsonValue::from(d),
        AttributeValue::Doubles(ds) => JsonValue::from(ds),
        AttributeValue::Int(i) => JsonValue::from(i),
        AttributeValue::Ints(is) => JsonValue::from(is),
        AttributeValue::Short(s) => JsonValue::from(s),
        AttributeValue::Shorts(ss) => JsonValue::from(ss),
        AttributeValue::Uchar(u) => JsonValue::from(u),
        AttributeValue::Uchars(us) => JsonValue::from(us),
        AttributeValue::Ushort(u) => JsonValue::from(u),
        AttributeValue::Ushorts(us) => JsonValue::from(us),
        AttributeValue::Uint(u) => JsonValue::from(u),
        AttributeValue::Uints(us) => JsonValue::from(us),
        other => JsonValue::from(format!("{:?}", other)),
    }
}

/// Read-only resource store over one NetCDF file
pub struct NetCdfStore {
    path: PathBuf,
    file: File,
}

impl std::fmt::Debug for NetCdfStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetCdfStore").field("path", &self.path).finish()
    }
}

impl NetCdfStore {
    /// Open a NetCDF file read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = ::netcdf::open(&path)?;
        tracing::debug!(path = %path.display(), "Opened NetCDF store");
        Ok(Self { path, file })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File-level attributes
    pub fn global_attributes(&self) -> HashMap<String, JsonValue> {
        self.file
            .attributes()
            .filter_map(|attr| {
                let value = attr.value().ok()?;
                Some((attr.name().to_string(), attribute_to_json(value)))
            })
            .collect()
    }

    fn variable(&self, name: &str) -> Result<Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| ExtractError::DatasetNotFound {
                dataset: name.to_string(),
            })
    }

    fn is_dataset(var: &Variable) -> bool {
        let dims = dimension_names(var);
        let name = var.name();
        dims.len() >= 2
            && dims[0] == TIME_DIM
            && dims[dims.len() - 1] == SITE_DIM
            && !RESERVED_NAMES.iter().any(|r| name == *r)
    }

    /// One-dimensional variables over `gid`
    fn site_variables(&self) -> Vec<Variable<'_>> {
        self.file
            .variables()
            .filter(|v| dimension_names(v) == [SITE_DIM])
            .collect()
    }

    fn read_coordinates(&self, site_vars: &[Variable<'_>]) -> Result<(Vec<f64>, Vec<f64>)> {
        let names: Vec<String> = site_vars.iter().map(|v| v.name().to_string()).collect();
        if let Some((lat_name, lon_name)) = find_coordinate_columns(&names) {
            let lat = self.variable(&lat_name)?.get_values::<f64, _>(..)?;
            let lon = self.variable(&lon_name)?.get_values::<f64, _>(..)?;
            return Ok((lat, lon));
        }

        if let Some(coords) = self.file.variable("coordinates") {
            if dimension_lengths(&coords).get(1) == Some(&2) {
                let pairs = coords.get_values::<f64, _>(..)?;
                let lat = pairs.iter().step_by(2).copied().collect();
                let lon = pairs.iter().skip(1).step_by(2).copied().collect();
                return Ok((lat, lon));
            }
        }

        Err(ExtractError::ColumnNotFound {
            column: "latitude".to_string(),
        })
    }
}

impl ResourceStore for NetCdfStore {
    fn identity(&self) -> StoreIdentity {
        StoreIdentity::from_path(&self.path)
    }

    fn dataset_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .file
            .variables()
            .filter(Self::is_dataset)
            .map(|v| v.name().to_string())
            .collect();
        names.sort();
        names
    }

    fn time_index(&self) -> Result<TimeAxis> {
        let var = self
            .file
            .variable(TIME_INDEX_VAR)
            .ok_or_else(|| ExtractError::configuration(format!(
                "'{}' has no '{}' variable",
                self.path.display(),
                TIME_INDEX_VAR
            )))?;
        let seconds = var.get_values::<i64, _>(..)?;
        TimeAxis::from_epoch_seconds(&seconds)
    }

    fn site_table(&self) -> Result<SiteTable> {
        let site_vars = self.site_variables();
        let (lat, lon) = self.read_coordinates(&site_vars)?;
        let mut table = SiteTable::new(lat, lon)?;

        for var in &site_vars {
            let Some(categories) = attribute_value(var, CATEGORIES_ATTR).and_then(string_list)
            else {
                continue;
            };
            let codes = var.get_values::<i32, _>(..)?;
            let values = codes
                .iter()
                .map(|&code| {
                    usize::try_from(code)
                        .ok()
                        .and_then(|c| categories.get(c))
                        .filter(|v| !v.is_empty())
                        .cloned()
                })
                .collect();
            table = table.with_column(var.name().to_string(), values)?;
        }

        Ok(table)
    }

    fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
        let var = self.variable(dataset)?;
        if !Self::is_dataset(&var) {
            return Err(ExtractError::DatasetNotFound {
                dataset: dataset.to_string(),
            });
        }

        let mut attributes = HashMap::new();
        for attr in var.attributes() {
            if let Ok(value) = attr.value() {
                attributes.insert(attr.name().to_string(), attribute_to_json(value));
            }
        }
        let units = match attribute_value(&var, "units") {
            Some(AttributeValue::Str(units)) => Some(units),
            _ => None,
        };

        Ok(DatasetProperties {
            name: dataset.to_string(),
            shape: dimension_lengths(&var),
            dimensions: dimension_names(&var),
            dtype: format!("{:?}", var.vartype()).to_lowercase(),
            units,
            attributes,
        })
    }

    fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>> {
        let var = self.variable(dimension)?;
        Ok(var.get_values::<f64, _>(..)?)
    }

    fn read(&self, dataset: &str, ranges: &[Range<usize>]) -> Result<ArrayD<f32>> {
        let var = self.variable(dataset)?;
        let shape = dimension_lengths(&var);
        check_ranges(dataset, &shape, ranges)?;

        let block_shape: Vec<usize> = ranges.iter().map(|r| r.end - r.start).collect();
        if block_shape.iter().any(|&len| len == 0) {
            return Ok(ArrayD::zeros(block_shape));
        }

        let r = ranges;
        let values: Vec<f32> = match r.len() {
            2 => var.get_values::<f32, _>((r[0].clone(), r[1].clone()))?,
            3 => var.get_values::<f32, _>((r[0].clone(), r[1].clone(), r[2].clone()))?,
            4 => var.get_values::<f32, _>((
                r[0].clone(),
                r[1].clone(),
                r[2].clone(),
                r[3].clone(),
            ))?,
            _ => {
                return Err(ExtractError::invalid_slice(
                    "Unsupported number of dimensions for slicing (2 to 4)",
                ))
            }
        };

        tracing::trace!(dataset, ?block_shape, "Read NetCDF block");
        Ok(ArrayD::from_shape_vec(block_shape, values)?)
    }
}

/// Writes resource stores in the layout [`NetCdfStore`] reads
pub struct NetCdfStoreWriter {
    path: PathBuf,
    file: FileMut,
    time_len: usize,
    site_len: usize,
}

impl NetCdfStoreWriter {
    /// Create a file with the time axis and site table written, replacing any existing file
    pub fn create(path: impl AsRef<Path>, time_index: &TimeAxis, sites: &SiteTable) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            fs::remove_file(&path)?;
        }

        let mut file = ::netcdf::create(&path)?;
        file.add_dimension(TIME_DIM, time_index.len())?;
        file.add_dimension(SITE_DIM, sites.len())?;

        {
            let mut var = file.add_variable::<i64>(TIME_INDEX_VAR, &[TIME_DIM])?;
            var.put_attribute("units", TIME_UNITS)?;
            let seconds = Array1::from(time_index.to_epoch_seconds());
            var.put(seconds.view(), ..)?;
        }

        for (name, values) in [("latitude", sites.latitude()), ("longitude", sites.longitude())] {
            let mut var = file.add_variable::<f64>(name, &[SITE_DIM])?;
            var.put_attribute("units", "degrees")?;
            let values = Array1::from(values.to_vec());
            var.put(values.view(), ..)?;
        }

        for column in sites.column_names() {
            let values = sites.column(column)?;
            let mut categories: Vec<String> = Vec::new();
            let codes: Vec<i32> = values
                .iter()
                .map(|value| match value {
                    Some(v) => {
                        let pos = categories.iter().position(|c| c == v).unwrap_or_else(|| {
                            categories.push(v.clone());
                            categories.len() - 1
                        });
                        pos as i32
                    }
                    None => -1,
                })
                .collect();
            if categories.is_empty() {
                categories.push(String::new());
            }

            let mut var = file.add_variable::<i32>(column, &[SITE_DIM])?;
            var.put_attribute(CATEGORIES_ATTR, categories)?;
            let codes = Array1::from(codes);
            var.put(codes.view(), ..)?;
        }

        Ok(Self {
            path,
            file,
            time_len: time_index.len(),
            site_len: sites.len(),
        })
    }

    /// Add an extra dimension with its coordinate values
    pub fn add_coordinate(&mut self, name: &str, values: &[f64]) -> Result<()> {
        self.file.add_dimension(name, values.len())?;
        let mut var = self.file.add_variable::<f64>(name, &[name])?;
        let values = Array1::from(values.to_vec());
        var.put(values.view(), ..)?;
        Ok(())
    }

    /// Add a dataset; `dimensions` must start with `time` and end with `gid`
    pub fn add_dataset(
        &mut self,
        name: &str,
        data: &ArrayD<f32>,
        dimensions: &[&str],
        units: Option<&str>,
    ) -> Result<()> {
        let shape = data.shape();
        if dimensions.len() != shape.len()
            || dimensions.first() != Some(&TIME_DIM)
            || dimensions.last() != Some(&SITE_DIM)
            || shape[0] != self.time_len
            || shape[shape.len() - 1] != self.site_len
        {
            return Err(ExtractError::configuration(format!(
                "Dataset '{}' with shape {:?} and dimensions {:?} does not fit ({}, ..., {})",
                name, shape, dimensions, self.time_len, self.site_len
            )));
        }

        let mut var = self.file.add_variable::<f32>(name, dimensions)?;
        if let Some(units) = units {
            var.put_attribute("units", units)?;
        }
        var.put(data.view(), ..)?;
        Ok(())
    }

    /// Stamp the history attribute and close the file
    pub fn finish(mut self) -> Result<PathBuf> {
        self.file.add_attribute(
            "history",
            format!("Created by rextract on {}", Utc::now().to_rfc3339()),
        )?;
        tracing::debug!(path = %self.path.display(), "Wrote NetCDF store");
        Ok(self.path)
    }

    /// Copy every dataset of another store into a new NetCDF file
    pub fn write_store(path: impl AsRef<Path>, store: &dyn ResourceStore) -> Result<PathBuf> {
        let mut writer = Self::create(path, &store.time_index()?, &store.site_table()?)?;
        let mut written_dims: Vec<String> = Vec::new();

        for name in store.dataset_names() {
            let props = store.dataset_properties(&name)?;
            for dim in props.extra_dimensions() {
                if !written_dims.contains(dim) {
                    writer.add_coordinate(dim, &store.coordinate_values(dim)?)?;
                    written_dims.push(dim.clone());
                }
            }
            let full: Vec<Range<usize>> = props.shape.iter().map(|&len| 0..len).collect();
            let data = store.read(&name, &full)?;
            let dims: Vec<&str> = props.dimensions.iter().map(String::as_str).collect();
            writer.add_dataset(&name, &data, &dims, props.units.as_deref())?;
        }

        writer.finish()
    }
}
