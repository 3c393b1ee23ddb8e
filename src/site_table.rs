//! Site metadata table
//!
//! The [`SiteTable`] is the ordered list of sites of a resource collection.
//! A site's position in the table is its site id (gid), the sole key into every
//! time-series array. Each site carries a latitude, a longitude and any number
//! of administrative attributes such as country, state and county.

use crate::errors::{ExtractError, Result};
use std::collections::{BTreeMap, BTreeSet};

pub const COUNTRY: &str = "country";
pub const STATE: &str = "state";
pub const COUNTY: &str = "county";

const LATITUDE_NAMES: [&str; 2] = ["lat", "latitude"];
const LONGITUDE_NAMES: [&str; 3] = ["lon", "long", "longitude"];

/// Pick the latitude and longitude columns out of a list of column names.
///
/// Matching is case-insensitive; `lat`/`latitude` and `lon`/`long`/`longitude`
/// are recognised. Returns `None` if either is missing.
pub fn find_coordinate_columns<S: AsRef<str>>(names: &[S]) -> Option<(String, String)> {
    let find = |candidates: &[&str]| {
        names
            .iter()
            .map(AsRef::as_ref)
            .find(|n| candidates.contains(&n.to_lowercase().as_str()))
            .map(str::to_string)
    };
    Some((find(&LATITUDE_NAMES)?, find(&LONGITUDE_NAMES)?))
}

/// Bounding envelope of the site coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Envelope {
    /// True when the point lies within the envelope grown by `tolerance` degrees
    pub fn contains(&self, lat: f64, lon: f64, tolerance: f64) -> bool {
        lat >= self.min_lat - tolerance
            && lat <= self.max_lat + tolerance
            && lon >= self.min_lon - tolerance
            && lon <= self.max_lon + tolerance
    }

    /// Lower-left corner as (lat, lon)
    pub fn low(&self) -> (f64, f64) {
        (self.min_lat, self.min_lon)
    }

    /// Upper-right corner as (lat, lon)
    pub fn high(&self) -> (f64, f64) {
        (self.max_lat, self.max_lon)
    }
}

/// Ordered site records: coordinates plus administrative columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiteTable {
    latitude: Vec<f64>,
    longitude: Vec<f64>,
    columns: BTreeMap<String, Vec<Option<String>>>,
}

impl SiteTable {
    /// Create a table from coordinate columns
    pub fn new(latitude: Vec<f64>, longitude: Vec<f64>) -> Result<Self> {
        if latitude.len() != longitude.len() {
            return Err(ExtractError::configuration(format!(
                "Latitude has {} entries but longitude has {}",
                latitude.len(),
                longitude.len()
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            columns: BTreeMap::new(),
        })
    }

    /// Create a table from (lat, lon) pairs
    pub fn from_lat_lon(pairs: &[(f64, f64)]) -> Self {
        Self {
            latitude: pairs.iter().map(|p| p.0).collect(),
            longitude: pairs.iter().map(|p| p.1).collect(),
            columns: BTreeMap::new(),
        }
    }

    /// Attach an administrative column
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<String>>,
    ) -> Result<Self> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(ExtractError::configuration(format!(
                "Column '{}' has {} entries, expected {}",
                name,
                values.len(),
                self.len()
            )));
        }
        self.columns.insert(name, values);
        Ok(self)
    }

    /// Number of sites
    pub fn len(&self) -> usize {
        self.latitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_empty()
    }

    pub fn latitude(&self) -> &[f64] {
        &self.latitude
    }

    pub fn longitude(&self) -> &[f64] {
        &self.longitude
    }

    /// (lat, lon) of a site
    pub fn coordinates(&self, gid: usize) -> Option<(f64, f64)> {
        Some((*self.latitude.get(gid)?, *self.longitude.get(gid)?))
    }

    /// All (lat, lon) pairs in site order
    pub fn lat_lon(&self) -> Vec<[f64; 2]> {
        self.latitude
            .iter()
            .zip(&self.longitude)
            .map(|(&lat, &lon)| [lat, lon])
            .collect()
    }

    /// Names of the administrative columns
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// An administrative column by name
    pub fn column(&self, name: &str) -> Result<&[Option<String>]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ExtractError::ColumnNotFound {
                column: name.to_string(),
            })
    }

    /// Sorted distinct non-missing values of a column
    pub fn distinct_values(&self, name: &str) -> Result<Vec<String>> {
        let values: BTreeSet<&String> = self.column(name)?.iter().flatten().collect();
        Ok(values.into_iter().cloned().collect())
    }

    pub fn countries(&self) -> Result<Vec<String>> {
        self.distinct_values(COUNTRY)
    }

    pub fn states(&self) -> Result<Vec<String>> {
        self.distinct_values(STATE)
    }

    pub fn counties(&self) -> Result<Vec<String>> {
        self.distinct_values(COUNTY)
    }

    /// Coordinate envelope, `None` for an empty table
    pub fn envelope(&self) -> Option<Envelope> {
        if self.is_empty() {
            return None;
        }
        let fold = |values: &[f64]| {
            values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                })
        };
        let (min_lat, max_lat) = fold(&self.latitude);
        let (min_lon, max_lon) = fold(&self.longitude);
        Some(Envelope {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// True when both tables hold the same coordinates in the same order
    pub fn same_sites(&self, other: &SiteTable) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}
