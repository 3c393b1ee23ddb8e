//! One store per calendar year, joined along time

use super::partition::TimePartition;
use super::{open_all, SourceKind, SourceSet};
use crate::errors::{ExtractError, Result};
use crate::site_table::SiteTable;
use crate::store::{DatasetProperties, ResourceStore, StoreIdentity};
use crate::time_axis::TimeAxis;
use chrono::Datelike;
use ndarray::ArrayD;
use std::ops::Range;
use std::path::Path;

/// Four-digit year embedded in a store label, e.g. `ri_100_nsrdb_2012.nc`.
///
/// The last standalone run of exactly four digits in 1900..=2100 wins.
pub fn year_from_label(label: &str) -> Option<i32> {
    let bytes = label.as_bytes();
    let mut found = None;
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i - start == 4 {
            if let Ok(year) = label[start..i].parse::<i32>() {
                if (1900..=2100).contains(&year) {
                    found = Some(year);
                }
            }
        }
    }
    found
}

/// Year a store holds: from its label, else from its first timestamp
fn infer_year(identity: &StoreIdentity, axis: &TimeAxis) -> Result<i32> {
    year_from_label(&identity.label)
        .or_else(|| axis.first().map(|t| t.year()))
        .ok_or_else(|| {
            ExtractError::configuration(format!(
                "Cannot infer the year of '{}': no year in its name and no time steps",
                identity
            ))
        })
}

/// Source set over per-year stores in chronological order
pub struct YearSetSource {
    partition: TimePartition,
    years: Vec<i32>,
}

impl YearSetSource {
    /// Compose per-year stores given in any order
    pub fn new(stores: Vec<Box<dyn ResourceStore>>) -> Result<Self> {
        let mut entries = Vec::with_capacity(stores.len());
        for store in stores {
            let axis = store.time_index()?;
            let sites = store.site_table()?;
            let year = infer_year(&store.identity(), &axis)?;
            entries.push((year, store, axis, sites));
        }
        entries.sort_by_key(|(year, _, axis, _)| (*year, axis.first()));

        for pair in entries.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(ExtractError::configuration(format!(
                    "Year {} is provided by both '{}' and '{}'",
                    pair[0].0,
                    pair[0].1.identity(),
                    pair[1].1.identity()
                )));
            }
        }

        let years: Vec<i32> = entries.iter().map(|e| e.0).collect();
        let mut stores = Vec::with_capacity(entries.len());
        let mut axes = Vec::with_capacity(entries.len());
        let mut tables = Vec::with_capacity(entries.len());
        for (_, store, axis, sites) in entries {
            stores.push(store);
            axes.push(axis);
            tables.push(sites);
        }

        let partition = TimePartition::assemble(stores, axes, tables)?;
        if years.windows(2).any(|w| w[1] != w[0] + 1) {
            tracing::info!(?years, "Year set is not contiguous");
        }
        tracing::info!(
            ?years,
            datasets = partition.datasets().len(),
            time_steps = partition.axis().len(),
            sites = partition.sites().len(),
            "Assembled year-set source"
        );
        Ok(Self { partition, years })
    }

    /// Open NetCDF files and compose them
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        Self::new(open_all(paths)?)
    }

    /// Years in chronological order
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Logical time range of one year
    pub fn year_range(&self, year: i32) -> Option<Range<usize>> {
        let pos = self.years.iter().position(|&y| y == year)?;
        self.partition.store_ranges().into_iter().nth(pos)
    }
}

impl SourceSet for YearSetSource {
    fn kind(&self) -> SourceKind {
        SourceKind::YearSet
    }

    fn identities(&self) -> Vec<StoreIdentity> {
        self.partition.identities()
    }

    fn dataset_names(&self) -> Vec<String> {
        self.partition.datasets().to_vec()
    }

    fn time_axis(&self) -> &TimeAxis {
        self.partition.axis()
    }

    fn site_table(&self) -> &SiteTable {
        self.partition.sites()
    }

    fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
        self.partition.dataset_properties(dataset)
    }

    fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>> {
        self.partition.coordinate_values(dimension)
    }

    fn read_block(
        &self,
        dataset: &str,
        time: Range<usize>,
        sites: Range<usize>,
    ) -> Result<ArrayD<f32>> {
        self.partition.read_block(dataset, time, sites)
    }
}
