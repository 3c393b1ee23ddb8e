//! One store per group of datasets over a shared time axis

use super::{
    block_ranges, check_site_counts, open_all, validate_ownership, SourceDescriptor, SourceKind,
    SourceSet,
};
use crate::errors::{ExtractError, Result};
use crate::site_table::SiteTable;
use crate::store::{DatasetProperties, ResourceStore, StoreIdentity};
use crate::time_axis::TimeAxis;
use ndarray::ArrayD;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

/// Source set routing each dataset to the one store that holds it
pub struct FileSetSource {
    stores: Vec<Box<dyn ResourceStore>>,
    owners: BTreeMap<String, usize>,
    time_axis: TimeAxis,
    sites: SiteTable,
}

impl FileSetSource {
    /// Compose stores whose dataset names are disjoint.
    ///
    /// A dataset held by two stores, differing time axes or differing site
    /// counts are rejected here rather than at query time.
    pub fn new(stores: Vec<Box<dyn ResourceStore>>) -> Result<Self> {
        if stores.is_empty() {
            return Err(ExtractError::configuration("No resource stores to compose"));
        }

        let axes = stores
            .iter()
            .map(|s| s.time_index())
            .collect::<Result<Vec<_>>>()?;
        let tables = stores
            .iter()
            .map(|s| s.site_table())
            .collect::<Result<Vec<_>>>()?;

        for (store, axis) in stores.iter().zip(&axes).skip(1) {
            if axis != &axes[0] {
                return Err(ExtractError::configuration(format!(
                    "Time axis of '{}' differs from the time axis of '{}'",
                    store.identity(),
                    stores[0].identity()
                )));
            }
        }

        let descriptors: Vec<SourceDescriptor> = stores
            .iter()
            .zip(&axes)
            .map(|(store, axis)| SourceDescriptor::describe(store.as_ref(), axis))
            .collect();
        validate_ownership(&descriptors)?;
        check_site_counts(&stores, &tables)?;

        let mut owners = BTreeMap::new();
        for (i, descriptor) in descriptors.iter().enumerate() {
            for dataset in &descriptor.datasets {
                owners.insert(dataset.clone(), i);
            }
        }

        let time_axis = axes.into_iter().next().unwrap_or_default();
        let sites = tables.into_iter().next().unwrap_or_default();
        tracing::info!(
            stores = stores.len(),
            datasets = owners.len(),
            time_steps = time_axis.len(),
            sites = sites.len(),
            "Assembled file-set source"
        );

        Ok(Self {
            stores,
            owners,
            time_axis,
            sites,
        })
    }

    /// Open NetCDF files and compose them
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        Self::new(open_all(paths)?)
    }

    /// Store answering for a dataset
    pub fn owner(&self, dataset: &str) -> Result<&dyn ResourceStore> {
        self.owners
            .get(dataset)
            .map(|&i| self.stores[i].as_ref())
            .ok_or_else(|| ExtractError::DatasetNotFound {
                dataset: dataset.to_string(),
            })
    }
}

impl SourceSet for FileSetSource {
    fn kind(&self) -> SourceKind {
        SourceKind::FileSet
    }

    fn identities(&self) -> Vec<StoreIdentity> {
        self.stores.iter().map(|s| s.identity()).collect()
    }

    fn dataset_names(&self) -> Vec<String> {
        self.owners.keys().cloned().collect()
    }

    fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    fn site_table(&self) -> &SiteTable {
        &self.sites
    }

    fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
        self.owner(dataset)?.dataset_properties(dataset)
    }

    fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>> {
        let mut last_err = None;
        for store in &self.stores {
            match store.coordinate_values(dimension) {
                Ok(values) => return Ok(values),
                Err(e @ ExtractError::DatasetNotFound { .. }) => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ExtractError::DatasetNotFound {
            dataset: dimension.to_string(),
        }))
    }

    fn read_block(
        &self,
        dataset: &str,
        time: Range<usize>,
        sites: Range<usize>,
    ) -> Result<ArrayD<f32>> {
        let store = self.owner(dataset)?;
        let props = store.dataset_properties(dataset)?;
        store.read(dataset, &block_ranges(time, props.extra_shape(), sites))
    }

    fn contains(&self, dataset: &str) -> bool {
        self.owners.contains_key(dataset)
    }
}
