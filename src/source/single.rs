//! Passthrough to one store

use super::{block_ranges, validate_ownership, SourceDescriptor, SourceKind, SourceSet};
use crate::errors::Result;
use crate::site_table::SiteTable;
use crate::store::{DatasetProperties, NetCdfStore, ResourceStore, StoreIdentity};
use crate::time_axis::TimeAxis;
use ndarray::ArrayD;
use std::ops::Range;
use std::path::Path;

/// Source set over exactly one store
pub struct SingleSource {
    store: Box<dyn ResourceStore>,
    time_axis: TimeAxis,
    sites: SiteTable,
}

impl SingleSource {
    pub fn new(store: Box<dyn ResourceStore>) -> Result<Self> {
        let time_axis = store.time_index()?;
        let sites = store.site_table()?;
        validate_ownership(&[SourceDescriptor::describe(store.as_ref(), &time_axis)])?;

        tracing::info!(
            store = %store.identity(),
            time_steps = time_axis.len(),
            sites = sites.len(),
            "Opened single source"
        );
        Ok(Self {
            store,
            time_axis,
            sites,
        })
    }

    /// Open a NetCDF file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Box::new(NetCdfStore::open(path)?))
    }

    /// The underlying store
    pub fn store(&self) -> &dyn ResourceStore {
        self.store.as_ref()
    }
}

impl SourceSet for SingleSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Single
    }

    fn identities(&self) -> Vec<StoreIdentity> {
        vec![self.store.identity()]
    }

    fn dataset_names(&self) -> Vec<String> {
        self.store.dataset_names()
    }

    fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    fn site_table(&self) -> &SiteTable {
        &self.sites
    }

    fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
        self.store.dataset_properties(dataset)
    }

    fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>> {
        self.store.coordinate_values(dimension)
    }

    fn read_block(
        &self,
        dataset: &str,
        time: Range<usize>,
        sites: Range<usize>,
    ) -> Result<ArrayD<f32>> {
        let props = self.store.dataset_properties(dataset)?;
        self.store
            .read(dataset, &block_ranges(time, props.extra_shape(), sites))
    }

    fn contains(&self, dataset: &str) -> bool {
        self.store.contains(dataset)
    }
}
