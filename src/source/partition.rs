//! Stores joined end to end along the time axis

use super::{block_ranges, check_site_counts, concat_blocks, validate_ownership, SourceDescriptor};
use crate::errors::{ExtractError, Result};
use crate::site_table::SiteTable;
use crate::store::{DatasetProperties, ResourceStore, StoreIdentity};
use crate::time_axis::TimeAxis;
use ndarray::{ArrayD, Axis};
use std::collections::BTreeSet;
use std::ops::Range;

/// Chronologically ordered stores, each owning one contiguous piece of the logical axis
pub(crate) struct TimePartition {
    stores: Vec<Box<dyn ResourceStore>>,
    starts: Vec<usize>,
    lengths: Vec<usize>,
    axis: TimeAxis,
    sites: SiteTable,
    datasets: Vec<String>,
}

impl TimePartition {
    /// Join stores already sorted by time; `axes` and `tables` are per store
    pub fn assemble(
        stores: Vec<Box<dyn ResourceStore>>,
        axes: Vec<TimeAxis>,
        tables: Vec<SiteTable>,
    ) -> Result<Self> {
        if stores.is_empty() {
            return Err(ExtractError::configuration("No resource stores to compose"));
        }

        let descriptors: Vec<SourceDescriptor> = stores
            .iter()
            .zip(&axes)
            .map(|(store, axis)| SourceDescriptor::describe(store.as_ref(), axis))
            .collect();
        validate_ownership(&descriptors)?;
        check_site_counts(&stores, &tables)?;

        let axis = TimeAxis::concat(&axes).map_err(|_| {
            ExtractError::configuration(
                "Time axes of the composed stores are not in strictly increasing order",
            )
        })?;

        let mut starts = Vec::with_capacity(axes.len());
        let mut offset = 0;
        for a in &axes {
            starts.push(offset);
            offset += a.len();
        }
        let lengths = axes.iter().map(TimeAxis::len).collect();

        let mut common: BTreeSet<String> = descriptors[0].datasets.clone();
        let mut every: BTreeSet<String> = BTreeSet::new();
        for d in &descriptors {
            common = common.intersection(&d.datasets).cloned().collect();
            every.extend(d.datasets.iter().cloned());
        }
        for missing in every.difference(&common) {
            tracing::warn!(
                dataset = %missing,
                "Dataset is missing from some stores and will not be available"
            );
        }

        let sites = tables.into_iter().next().unwrap_or_default();
        Ok(Self {
            stores,
            starts,
            lengths,
            axis,
            sites,
            datasets: common.into_iter().collect(),
        })
    }

    pub fn axis(&self) -> &TimeAxis {
        &self.axis
    }

    pub fn sites(&self) -> &SiteTable {
        &self.sites
    }

    pub fn datasets(&self) -> &[String] {
        &self.datasets
    }

    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// Logical time range owned by each store
    pub fn store_ranges(&self) -> Vec<Range<usize>> {
        self.starts
            .iter()
            .zip(&self.lengths)
            .map(|(&s, &l)| s..s + l)
            .collect()
    }

    pub fn identities(&self) -> Vec<StoreIdentity> {
        self.stores.iter().map(|s| s.identity()).collect()
    }

    fn check_dataset(&self, dataset: &str) -> Result<()> {
        if self.datasets.iter().any(|d| d == dataset) {
            Ok(())
        } else {
            Err(ExtractError::DatasetNotFound {
                dataset: dataset.to_string(),
            })
        }
    }

    /// Per-store local ranges covering a logical time range, in time order
    pub fn locate(&self, time: &Range<usize>) -> Vec<(usize, Range<usize>)> {
        self.starts
            .iter()
            .zip(&self.lengths)
            .enumerate()
            .filter_map(|(i, (&start, &len))| {
                let lo = time.start.max(start);
                let hi = time.end.min(start + len);
                (lo < hi).then(|| (i, lo - start..hi - start))
            })
            .collect()
    }

    pub fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
        self.check_dataset(dataset)?;
        let mut props = self.stores[0].dataset_properties(dataset)?;
        if let Some(len) = props.shape.first_mut() {
            *len = self.axis.len();
        }
        Ok(props)
    }

    pub fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>> {
        self.stores[0].coordinate_values(dimension)
    }

    pub fn read_block(
        &self,
        dataset: &str,
        time: Range<usize>,
        sites: Range<usize>,
    ) -> Result<ArrayD<f32>> {
        let props = self.dataset_properties(dataset)?;
        if time.end > self.axis.len() || time.start > time.end {
            return Err(ExtractError::invalid_slice(format!(
                "Time range {}..{} is invalid for {} time steps",
                time.start,
                time.end,
                self.axis.len()
            )));
        }

        let pieces = self.locate(&time);
        if pieces.is_empty() {
            let mut shape = vec![0];
            shape.extend_from_slice(props.extra_shape());
            shape.push(sites.end.saturating_sub(sites.start));
            return Ok(ArrayD::zeros(shape));
        }

        let mut blocks = Vec::with_capacity(pieces.len());
        for (i, local) in pieces {
            let ranges = block_ranges(local, props.extra_shape(), sites.clone());
            blocks.push(self.stores[i].read(dataset, &ranges)?);
        }
        concat_blocks(Axis(0), blocks)
    }
}
