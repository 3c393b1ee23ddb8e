//! Labeled-table output forms
//!
//! [`QueryResult`](crate::query::QueryResult) is the array-like form: an
//! `ArrayD` with time labels and site ids alongside. The types here are the
//! labeled-table form: a 2-D value matrix with a row index and site-id columns.
//! Datasets with extra dimensions get a compound row index of
//! (time, extra-1, extra-2, ...) in time-major order.

use crate::errors::{ExtractError, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayD, ArrayView1};
use serde::Serialize;

/// Name and coordinate values of an axis between time and site
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraDimension {
    pub name: String,
    pub values: Vec<f64>,
}

impl ExtraDimension {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One row of a compound index
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundLabel {
    pub time: DateTime<Utc>,
    /// One coordinate value per extra dimension
    pub extra: Vec<f64>,
}

/// Row labels of a [`LabeledTable`]
#[derive(Debug, Clone, PartialEq)]
pub enum RowIndex {
    Time(Vec<DateTime<Utc>>),
    Compound {
        /// `time` followed by the extra dimension names
        names: Vec<String>,
        labels: Vec<CompoundLabel>,
    },
}

impl RowIndex {
    pub fn len(&self) -> usize {
        match self {
            RowIndex::Time(times) => times.len(),
            RowIndex::Compound { labels, .. } => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Level names, `["time"]` for a plain time index
    pub fn names(&self) -> Vec<String> {
        match self {
            RowIndex::Time(_) => vec!["time".to_string()],
            RowIndex::Compound { names, .. } => names.clone(),
        }
    }

    /// Timestamp of a row
    pub fn time(&self, row: usize) -> Option<DateTime<Utc>> {
        match self {
            RowIndex::Time(times) => times.get(row).copied(),
            RowIndex::Compound { labels, .. } => labels.get(row).map(|l| l.time),
        }
    }
}

/// Values with a row index and one column per site id
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTable {
    pub rows: RowIndex,
    pub columns: Vec<usize>,
    pub values: Array2<f32>,
}

impl LabeledTable {
    /// Flatten a `(time, [extra...], site)` array into rows and site columns
    pub fn from_parts(
        time_index: &[DateTime<Utc>],
        extra_dimensions: &[ExtraDimension],
        gids: &[usize],
        data: &ArrayD<f32>,
    ) -> Result<Self> {
        let mut expected = vec![time_index.len()];
        expected.extend(extra_dimensions.iter().map(ExtraDimension::len));
        expected.push(gids.len());
        if data.shape() != expected.as_slice() {
            return Err(ExtractError::invalid_slice(format!(
                "Data shape {:?} does not match labels {:?}",
                data.shape(),
                expected
            )));
        }

        let rows = if extra_dimensions.is_empty() {
            RowIndex::Time(time_index.to_vec())
        } else {
            let mut names = vec!["time".to_string()];
            names.extend(extra_dimensions.iter().map(|d| d.name.clone()));
            RowIndex::Compound {
                names,
                labels: compound_labels(time_index, extra_dimensions),
            }
        };

        let values = Array2::from_shape_vec((rows.len(), gids.len()), data.iter().copied().collect())?;
        Ok(Self {
            rows,
            columns: gids.to_vec(),
            values,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    /// Column of a site id, the first one if the id repeats
    pub fn column(&self, gid: usize) -> Option<ArrayView1<'_, f32>> {
        let pos = self.columns.iter().position(|&g| g == gid)?;
        Some(self.values.column(pos))
    }

    pub fn row(&self, row: usize) -> Option<ArrayView1<'_, f32>> {
        (row < self.n_rows()).then(|| self.values.row(row))
    }
}

/// Cartesian product of time and extra coordinates, last dimension fastest
fn compound_labels(time_index: &[DateTime<Utc>], extra: &[ExtraDimension]) -> Vec<CompoundLabel> {
    let per_time: usize = extra.iter().map(ExtraDimension::len).product();
    let mut labels = Vec::with_capacity(time_index.len() * per_time);
    for &time in time_index {
        for flat in 0..per_time {
            let mut rem = flat;
            let mut coords = vec![0.0; extra.len()];
            for (slot, dim) in coords.iter_mut().zip(extra).rev() {
                *slot = dim.values[rem % dim.len()];
                rem /= dim.len();
            }
            labels.push(CompoundLabel {
                time,
                extra: coords,
            });
        }
    }
    labels
}

/// One site of a time-step cross-section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapRow {
    pub gid: usize,
    pub longitude: f64,
    pub latitude: f64,
    pub value: f32,
}

/// Value per site at one time step, joined with coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct MapTable {
    pub dataset: String,
    pub timestamp: DateTime<Utc>,
    pub rows: Vec<MapRow>,
}

impl MapTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn gids(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.gid).collect()
    }

    /// The value column
    pub fn values(&self) -> Vec<f32> {
        self.rows.iter().map(|r| r.value).collect()
    }

    /// Rows as JSON objects keyed `gid`, `longitude`, `latitude`, `value`
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.rows)?)
    }
}
