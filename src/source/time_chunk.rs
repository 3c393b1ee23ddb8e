//! Arbitrary time chunks of one continuous axis

use super::partition::TimePartition;
use super::{open_all, SourceKind, SourceSet};
use crate::errors::Result;
use crate::site_table::SiteTable;
use crate::store::{DatasetProperties, ResourceStore, StoreIdentity};
use crate::time_axis::TimeAxis;
use ndarray::ArrayD;
use std::ops::Range;
use std::path::Path;

/// Source set over time chunks given in any order and of any size.
///
/// Chunks are sorted by their first timestamp. Overlapping chunks are a
/// configuration error; gaps between chunks are simply absent from the
/// logical axis.
pub struct TimeChunkSource {
    partition: TimePartition,
}

impl TimeChunkSource {
    pub fn new(stores: Vec<Box<dyn ResourceStore>>) -> Result<Self> {
        let mut entries = Vec::with_capacity(stores.len());
        for store in stores {
            let axis = store.time_index()?;
            if axis.is_empty() {
                tracing::warn!(store = %store.identity(), "Skipping time chunk with no time steps");
                continue;
            }
            let sites = store.site_table()?;
            entries.push((store, axis, sites));
        }
        entries.sort_by_key(|(_, axis, _)| axis.first());

        for pair in entries.windows(2) {
            let (prev, next) = (&pair[0].1, &pair[1].1);
            let (Some(end), Some(start)) = (prev.last(), next.first()) else {
                continue;
            };
            let step = match (prev.get(0), prev.get(1)) {
                (Some(a), Some(b)) => b - a,
                _ => continue,
            };
            if start - end > step {
                tracing::info!(
                    after = %pair[0].0.identity(),
                    before = %pair[1].0.identity(),
                    gap_start = %end,
                    gap_end = %start,
                    "Gap between time chunks"
                );
            }
        }

        let mut stores = Vec::with_capacity(entries.len());
        let mut axes = Vec::with_capacity(entries.len());
        let mut tables = Vec::with_capacity(entries.len());
        for (store, axis, sites) in entries {
            stores.push(store);
            axes.push(axis);
            tables.push(sites);
        }

        let partition = TimePartition::assemble(stores, axes, tables)?;
        tracing::info!(
            chunks = partition.store_count(),
            datasets = partition.datasets().len(),
            time_steps = partition.axis().len(),
            sites = partition.sites().len(),
            "Assembled time-chunk source"
        );
        Ok(Self { partition })
    }

    /// Open NetCDF files and compose them
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        Self::new(open_all(paths)?)
    }

    /// Logical time range of each chunk, in time order
    pub fn chunk_ranges(&self) -> Vec<Range<usize>> {
        self.partition.store_ranges()
    }
}

impl SourceSet for TimeChunkSource {
    fn kind(&self) -> SourceKind {
        SourceKind::TimeChunk
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
