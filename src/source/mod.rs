//! Composition of resource stores into one logical dataset view
//!
//! Four strategies implement [`SourceSet`]:
//!
//! - [`SingleSource`]: passthrough to one store
//! - [`FileSetSource`]: disjoint dataset names per store, identical time axes
//! - [`YearSetSource`]: one year of every dataset per store, joined along time
//! - [`TimeChunkSource`]: arbitrary time chunks, sorted and joined along time
//!
//! Strategies only answer contiguous block reads. Arbitrary time and site
//! selections are decomposed into contiguous runs by [`SourceSet::slice`], read
//! run by run and gathered back into the caller's order.

pub mod file_set;
mod partition;
pub mod single;
pub mod time_chunk;
pub mod year_set;

pub use self::file_set::FileSetSource;
pub use self::single::SingleSource;
pub use self::time_chunk::TimeChunkSource;
pub use self::year_set::YearSetSource;

use crate::config::DEFAULT_MAX_SITE_GAP;
use crate::errors::{ExtractError, Result};
use crate::query::QueryResult;
use crate::site_table::SiteTable;
use crate::store::{DatasetProperties, NetCdfStore, ResourceStore, StoreIdentity};
use crate::table::ExtraDimension;
use crate::time_axis::{TimeAxis, TimeSelector};
use chrono::{DateTime, Utc};
use ndarray::{ArrayD, Axis};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Composition strategy tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Single,
    FileSet,
    YearSet,
    TimeChunk,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Single => "single",
            SourceKind::FileSet => "file-set",
            SourceKind::YearSet => "year-set",
            SourceKind::TimeChunk => "time-chunk",
        };
        f.write_str(name)
    }
}

/// Which sites to extract
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SiteSelector {
    /// Every site, in site table order
    #[default]
    All,
    /// A single site id
    Index(usize),
    /// A half-open range of site ids
    Range(Range<usize>),
    /// Arbitrary site ids, output follows this order
    Indices(Vec<usize>),
}

impl SiteSelector {
    /// Resolve to site ids in output order
    pub fn resolve(&self, site_count: usize) -> Result<Vec<usize>> {
        let check = |gid: usize| {
            if gid >= site_count {
                Err(ExtractError::invalid_slice(format!(
                    "Site {gid} is out of range for {site_count} sites"
                )))
            } else {
                Ok(gid)
            }
        };
        match self {
            SiteSelector::All => Ok((0..site_count).collect()),
            SiteSelector::Index(gid) => Ok(vec![check(*gid)?]),
            SiteSelector::Range(range) => {
                if range.start > range.end || range.end > site_count {
                    return Err(ExtractError::invalid_slice(format!(
                        "Site range {}..{} is invalid for {} sites",
                        range.start, range.end, site_count
                    )));
                }
                Ok(range.clone().collect())
            }
            SiteSelector::Indices(gids) => gids.iter().map(|&g| check(g)).collect(),
        }
    }
}

impl From<usize> for SiteSelector {
    fn from(gid: usize) -> Self {
        SiteSelector::Index(gid)
    }
}

impl From<Range<usize>> for SiteSelector {
    fn from(range: Range<usize>) -> Self {
        SiteSelector::Range(range)
    }
}

impl From<Vec<usize>> for SiteSelector {
    fn from(gids: Vec<usize>) -> Self {
        SiteSelector::Indices(gids)
    }
}

impl From<&[usize]> for SiteSelector {
    fn from(gids: &[usize]) -> Self {
        SiteSelector::Indices(gids.to_vec())
    }
}

/// One store and the (datasets, time span) it answers for
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub identity: StoreIdentity,
    pub datasets: BTreeSet<String>,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

impl SourceDescriptor {
    pub fn describe(store: &dyn ResourceStore, time_index: &TimeAxis) -> Self {
        Self {
            identity: store.identity(),
            datasets: store.dataset_names().into_iter().collect(),
            first: time_index.first(),
            last: time_index.last(),
        }
    }

    fn same_span(&self, other: &Self) -> bool {
        self.first == other.first && self.last == other.last
    }

    /// Two empty spans count as the same span
    fn overlaps(&self, other: &Self) -> bool {
        match (self.first, self.last, other.first, other.last) {
            (Some(a0), Some(a1), Some(b0), Some(b1)) => a0 <= b1 && b0 <= a1,
            (None, None, None, None) => true,
            _ => false,
        }
    }
}

/// Reject compositions where two stores claim the same (dataset, time) pair.
///
/// Stores with identical time spans are reported as ambiguous dataset
/// ownership, otherwise as overlapping time axes.
pub fn validate_ownership(descriptors: &[SourceDescriptor]) -> Result<()> {
    for (i, a) in descriptors.iter().enumerate() {
        for b in &descriptors[i + 1..] {
            let Some(shared) = a.datasets.intersection(&b.datasets).next() else {
                continue;
            };
            if !a.overlaps(b) {
                continue;
            }
            if a.same_span(b) {
                return Err(ExtractError::AmbiguousDataset {
                    dataset: shared.clone(),
                    first: a.identity.to_string(),
                    second: b.identity.to_string(),
                });
            }
            return Err(ExtractError::OverlappingTimeAxis {
                first: a.identity.to_string(),
                second: b.identity.to_string(),
            });
        }
    }
    Ok(())
}

/// Check every store against the first store's site count
pub(crate) fn check_site_counts(
    stores: &[Box<dyn ResourceStore>],
    tables: &[SiteTable],
) -> Result<()> {
    let Some(reference) = tables.first() else {
        return Ok(());
    };
    for (store, table) in stores.iter().zip(tables).skip(1) {
        if table.len() != reference.len() {
            return Err(ExtractError::SiteCountMismatch {
                source_name: store.identity().to_string(),
                expected: reference.len(),
                found: table.len(),
            });
        }
        if !table.same_sites(reference) {
            tracing::warn!(
                store = %store.identity(),
                "Site coordinates differ from the first store, using the first store's site table"
            );
        }
    }
    Ok(())
}

/// Open every path as a NetCDF store.
///
/// If any open fails, the stores already opened are closed before the error
/// is returned.
pub fn open_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Box<dyn ResourceStore>>> {
    open_all_with(paths, |path| {
        NetCdfStore::open(path).map(|s| Box::new(s) as Box<dyn ResourceStore>)
    })
}

/// [`open_all`] with a caller-supplied opener
pub(crate) fn open_all_with<P, F>(paths: &[P], mut open: F) -> Result<Vec<Box<dyn ResourceStore>>>
where
    P: AsRef<Path>,
    F: FnMut(&Path) -> Result<Box<dyn ResourceStore>>,
{
    let mut opened: Vec<Box<dyn ResourceStore>> = Vec::with_capacity(paths.len());
    for path in paths {
        match open(path.as_ref()) {
            Ok(store) => opened.push(store),
            Err(e) => {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    rolled_back = opened.len(),
                    "Failed to open store, closing stores already opened"
                );
                drop(opened);
                return Err(e);
            }
        }
    }
    Ok(opened)
}

/// Expand a file pattern with a single `*` in its file name, sorted by path
pub fn expand_pattern(pattern: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let pattern = pattern.as_ref();
    let file_pattern = pattern
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ExtractError::configuration(format!("Invalid file pattern '{}'", pattern.display())))?;

    if !file_pattern.contains('*') {
        return Ok(if pattern.is_file() {
            vec![pattern.to_path_buf()]
        } else {
            Vec::new()
        });
    }
    let (prefix, suffix) = match file_pattern.split_once('*') {
        Some((p, s)) if !s.contains('*') => (p, s),
        _ => {
            return Err(ExtractError::configuration(format!(
                "File pattern '{}' may contain only one '*'",
                pattern.display()
            )))
        }
    };

    let directory = match pattern.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(&directory)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| {
                n.len() >= prefix.len() + suffix.len() && n.starts_with(prefix) && n.ends_with(suffix)
            });
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    tracing::debug!(pattern = %pattern.display(), matched = paths.len(), "Expanded file pattern");
    Ok(paths)
}

/// Uniform slicing over one logical (time, [extra...], site) collection
pub trait SourceSet {
    /// Composition strategy
    fn kind(&self) -> SourceKind;

    /// Identities of the underlying stores, in composition order
    fn identities(&self) -> Vec<StoreIdentity>;

    /// Dataset names answerable by this view
    fn dataset_names(&self) -> Vec<String>;

    /// Logical time axis
    fn time_axis(&self) -> &TimeAxis;

    /// Site table shared by every store
    fn site_table(&self) -> &SiteTable;

    /// Dataset properties with the shape of the logical view
    fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties>;

    /// Coordinate values of an extra dimension
    fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>>;

    /// Read a contiguous block: a logical time range, every extra index, a site range
    fn read_block(
        &self,
        dataset: &str,
        time: Range<usize>,
        sites: Range<usize>,
    ) -> Result<ArrayD<f32>>;

    fn contains(&self, dataset: &str) -> bool {
        self.dataset_names().iter().any(|d| d == dataset)
    }

    /// Slice with the default site run gap
    fn slice(
        &self,
        dataset: &str,
        time: &TimeSelector,
        sites: &SiteSelector,
    ) -> Result<QueryResult> {
        self.slice_with_gap(dataset, time, sites, DEFAULT_MAX_SITE_GAP)
    }

    /// Slice arbitrary time and site selections, output in caller order
    fn slice_with_gap(
        &self,
        dataset: &str,
        time: &TimeSelector,
        sites: &SiteSelector,
        max_site_gap: usize,
    ) -> Result<QueryResult> {
        let props = self.dataset_properties(dataset)?;
        let time_idx = self.time_axis().resolve(time)?;
        let gids = sites.resolve(self.site_table().len())?;
        let data = gather(self, dataset, props.extra_shape(), &time_idx, &gids, max_site_gap)?;

        let extra_dimensions = props
            .extra_dimensions()
            .iter()
            .zip(props.extra_shape())
            .map(|(name, &len)| {
                let values = match self.coordinate_values(name) {
                    Ok(values) if values.len() == len => values,
                    // No coordinate variable, or one of another length: label by position
                    Ok(_) | Err(ExtractError::DatasetNotFound { .. }) => {
                        (0..len).map(|i| i as f64).collect()
                    }
                    Err(e) => return Err(e),
                };
                Ok(ExtraDimension::new(name.clone(), values))
            })
            .collect::<Result<Vec<_>>>()?;
        let sites_table = self.site_table();
        let coordinates = gids
            .iter()
            .filter_map(|&g| sites_table.coordinates(g))
            .collect();

        Ok(QueryResult {
            dataset: dataset.to_string(),
            data,
            time_index: self.time_axis().labels(&time_idx),
            gids,
            coordinates,
            extra_dimensions,
        })
    }
}

impl<T: SourceSet + ?Sized> SourceSet for Box<T> {
    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    fn identities(&self) -> Vec<StoreIdentity> {
        (**self).identities()
    }

    fn dataset_names(&self) -> Vec<String> {
        (**self).dataset_names()
    }

    fn time_axis(&self) -> &TimeAxis {
        (**self).time_axis()
    }

    fn site_table(&self) -> &SiteTable {
        (**self).site_table()
    }

    fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
        (**self).dataset_properties(dataset)
    }

    fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>> {
        (**self).coordinate_values(dimension)
    }

    fn read_block(
        &self,
        dataset: &str,
        time: Range<usize>,
        sites: Range<usize>,
    ) -> Result<ArrayD<f32>> {
        (**self).read_block(dataset, time, sites)
    }

    fn contains(&self, dataset: &str) -> bool {
        (**self).contains(dataset)
    }
}

/// Block ranges for a full-extent read of the extra axes
pub(crate) fn block_ranges(
    time: Range<usize>,
    extra_shape: &[usize],
    sites: Range<usize>,
) -> Vec<Range<usize>> {
    let mut ranges = Vec::with_capacity(extra_shape.len() + 2);
    ranges.push(time);
    ranges.extend(extra_shape.iter().map(|&len| 0..len));
    ranges.push(sites);
    ranges
}

/// Concatenate blocks along an axis, skipping the copy for a single block
pub(crate) fn concat_blocks(axis: Axis, mut blocks: Vec<ArrayD<f32>>) -> Result<ArrayD<f32>> {
    if blocks.len() == 1 {
        if let Some(block) = blocks.pop() {
            return Ok(block);
        }
    }
    let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
    Ok(ndarray::concatenate(axis, &views)?)
}

/// Sorted distinct values, plus the position of each input value among them
fn sorted_unique(indices: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut unique = indices.to_vec();
    unique.sort_unstable();
    unique.dedup();
    let positions = indices
        .iter()
        .filter_map(|i| unique.binary_search(i).ok())
        .collect();
    (unique, positions)
}

/// Split sorted values into runs where consecutive values differ by at most `max_gap`
fn split_runs(sorted: &[usize], max_gap: usize) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..sorted.len() {
        if sorted[i] - sorted[i - 1] > max_gap {
            runs.push(start..i);
            start = i;
        }
    }
    if !sorted.is_empty() {
        runs.push(start..sorted.len());
    }
    runs
}

fn is_identity(positions: &[usize], len: usize) -> bool {
    positions.len() == len && positions.iter().enumerate().all(|(i, &p)| i == p)
}

/// Read the requested time steps and sites run by run and gather them in caller order
fn gather<S: SourceSet + ?Sized>(
    source: &S,
    dataset: &str,
    extra_shape: &[usize],
    time_idx: &[usize],
    gids: &[usize],
    max_site_gap: usize,
) -> Result<ArrayD<f32>> {
    let site_axis = Axis(extra_shape.len() + 1);
    if time_idx.is_empty() || gids.is_empty() {
        let mut shape = vec![time_idx.len()];
        shape.extend_from_slice(extra_shape);
        shape.push(gids.len());
        return Ok(ArrayD::zeros(shape));
    }

    let (times, time_pos) = sorted_unique(time_idx);
    let (sites, site_pos) = sorted_unique(gids);
    let time_runs = split_runs(&times, 1);
    let site_runs = split_runs(&sites, max_site_gap.max(1));
    tracing::debug!(
        dataset,
        time_steps = time_idx.len(),
        sites = gids.len(),
        time_runs = time_runs.len(),
        site_runs = site_runs.len(),
        "Slicing dataset"
    );

    let mut columns = Vec::with_capacity(site_runs.len());
    for run in site_runs {
        let run_sites = &sites[run];
        let lo = run_sites[0];
        let hi = run_sites[run_sites.len() - 1] + 1;

        let mut blocks = Vec::with_capacity(time_runs.len());
        for t in &time_runs {
            let steps = &times[t.clone()];
            let range = steps[0]..steps[steps.len() - 1] + 1;
            blocks.push(source.read_block(dataset, range, lo..hi)?);
        }
        let block = concat_blocks(Axis(0), blocks)?;

        if run_sites.len() == hi - lo {
            columns.push(block);
        } else {
            let local: Vec<usize> = run_sites.iter().map(|g| g - lo).collect();
            columns.push(block.select(site_axis, &local));
        }
    }
    let mut data = concat_blocks(site_axis, columns)?;

    if !is_identity(&time_pos, times.len()) {
        data = data.select(Axis(0), &time_pos);
    }
    if !is_identity(&site_pos, sites.len()) {
        data = data.select(site_axis, &site_pos);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::time_axis::parse_timestamp;
    use chrono::Duration;
    use ndarray::Array2;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn source() -> SingleSource {
        let axis = TimeAxis::regular(
            parse_timestamp("2012-01-01").unwrap(),
            Duration::hours(1),
            10,
        )
        .unwrap();
        let sites = SiteTable::from_lat_lon(&(0..50).map(|i| (i as f64, 0.0)).collect::<Vec<_>>());
        let data = Array2::from_shape_fn((10, 50), |(t, s)| (t * 100 + s) as f32).into_dyn();
        let store = MemoryStore::new("mem", axis, sites).with_dataset("ghi", data).unwrap();
        SingleSource::new(Box::new(store)).unwrap()
    }

    #[test]
    fn test_split_runs() {
        assert_eq!(split_runs(&[1, 2, 3, 7, 8, 20], 1), vec![0..3, 3..5, 5..6]);
        assert_eq!(split_runs(&[1, 2, 3, 7, 8, 20], 5), vec![0..5, 5..6]);
        assert!(split_runs(&[], 1).is_empty());
    }

    #[test]
    fn test_sorted_unique_positions() {
        let (unique, pos) = sorted_unique(&[9, 2, 9, 4]);
        assert_eq!(unique, vec![2, 4, 9]);
        assert_eq!(pos, vec![2, 0, 2, 1]);
    }

    #[test]
    fn test_slice_preserves_caller_order_and_duplicates() {
        let src = source();
        for gap in [1, 3, 1000] {
            let result = src
                .slice_with_gap(
                    "ghi",
                    &TimeSelector::Indices(vec![7, 2, 3]),
                    &SiteSelector::Indices(vec![40, 5, 6, 5, 0]),
                    gap,
                )
                .unwrap();
            assert_eq!(result.data.shape(), &[3, 5]);
            for (r, &t) in [7usize, 2, 3].iter().enumerate() {
                for (c, &s) in [40usize, 5, 6, 5, 0].iter().enumerate() {
                    assert_eq!(result.data[[r, c]], (t * 100 + s) as f32);
                }
            }
        }
    }

    #[test]
    fn test_empty_site_selection_is_zero_width() {
        let result = source()
            .slice("ghi", &TimeSelector::All, &SiteSelector::Indices(Vec::new()))
            .unwrap();
        assert_eq!(result.data.shape(), &[10, 0]);
        assert_eq!(result.time_index.len(), 10);
    }

    #[test]
    fn test_out_of_range_site_rejected() {
        assert!(source()
            .slice("ghi", &TimeSelector::All, &SiteSelector::Index(50))
            .is_err());
    }

    fn descriptor(label: &str, datasets: &[&str], first: &str, last: &str) -> SourceDescriptor {
        SourceDescriptor {
            identity: StoreIdentity::named(label),
            datasets: datasets.iter().map(|d| d.to_string()).collect(),
            first: Some(parse_timestamp(first).unwrap()),
            last: Some(parse_timestamp(last).unwrap()),
        }
    }

    #[test]
    fn test_validate_ownership() {
        let ok = [
            descriptor("a", &["ghi"], "2012-01-01", "2012-12-31"),
            descriptor("b", &["dni"], "2012-01-01", "2012-12-31"),
            descriptor("c", &["ghi"], "2013-01-01", "2013-12-31"),
        ];
        assert!(validate_ownership(&ok).is_ok());

        let ambiguous = [
            descriptor("a", &["ghi", "dni"], "2012-01-01", "2012-12-31"),
            descriptor("b", &["dni"], "2012-01-01", "2012-12-31"),
        ];
        assert!(matches!(
            validate_ownership(&ambiguous),
            Err(ExtractError::AmbiguousDataset { dataset, .. }) if dataset == "dni"
        ));

        let overlapping = [
            descriptor("a", &["ghi"], "2012-01-01", "2012-07-01"),
            descriptor("b", &["ghi"], "2012-06-01", "2012-12-31"),
        ];
        assert!(matches!(
            validate_ownership(&overlapping),
            Err(ExtractError::OverlappingTimeAxis { .. })
        ));
    }

    #[test]
    fn test_expand_pattern() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ri_2013.nc", "ri_2012.nc", "other_2012.nc", "ri_2012.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let found = expand_pattern(dir.path().join("ri_*.nc")).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ri_2012.nc", "ri_2013.nc"]);
        assert!(expand_pattern(dir.path().join("*_*.nc")).is_err());
    }

    #[test]
    fn test_open_all_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_all(&[dir.path().join("missing.nc")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_spans_still_claim_datasets() {
        let empty = |label: &str| SourceDescriptor {
            identity: StoreIdentity::named(label),
            datasets: ["ghi".to_string()].into_iter().collect(),
            first: None,
            last: None,
        };
        assert!(matches!(
            validate_ownership(&[empty("a"), empty("b")]),
            Err(ExtractError::AmbiguousDataset { dataset, .. }) if dataset == "ghi"
        ));
    }

    /// Store that counts live instances
    struct Tracked {
        inner: MemoryStore,
        live: Arc<AtomicUsize>,
    }

    impl Tracked {
        fn new(live: &Arc<AtomicUsize>) -> Self {
            live.fetch_add(1, Ordering::SeqCst);
            let axis = TimeAxis::regular(
                parse_timestamp("2012-01-01").unwrap(),
                Duration::hours(1),
                2,
            )
            .unwrap();
            Self {
                inner: MemoryStore::new("tracked", axis, SiteTable::from_lat_lon(&[(0.0, 0.0)])),
                live: Arc::clone(live),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl ResourceStore for Tracked {
        fn identity(&self) -> StoreIdentity {
            self.inner.identity()
        }
        fn dataset_names(&self) -> Vec<String> {
            self.inner.dataset_names()
        }
        fn time_index(&self) -> Result<TimeAxis> {
            self.inner.time_index()
        }
        fn site_table(&self) -> Result<SiteTable> {
            self.inner.site_table()
        }
        fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
            self.inner.dataset_properties(dataset)
        }
        fn coordinate_values(&self, dimension: &str) -> Result<Vec<f64>> {
            self.inner.coordinate_values(dimension)
        }
        fn read(&self, dataset: &str, ranges: &[Range<usize>]) -> Result<ArrayD<f32>> {
            self.inner.read(dataset, ranges)
        }
    }

    #[test]
    fn test_partial_open_releases_opened_stores() {
        let live = Arc::new(AtomicUsize::new(0));
        let paths = ["a.nc", "b.nc", "missing.nc", "d.nc"];
        let mut attempts = 0;
        let result = open_all_with(&paths, |path| {
            attempts += 1;
            if path.ends_with("missing.nc") {
                assert_eq!(live.load(Ordering::SeqCst), 2);
                return Err(ExtractError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such file",
                )));
            }
            Ok(Box::new(Tracked::new(&live)) as Box<dyn ResourceStore>)
        });
        assert!(matches!(result, Err(ExtractError::Io(_))));
        assert_eq!(attempts, 3);
        assert_eq!(live.load(Ordering::SeqCst), 0);

        let stores = open_all_with(&paths[..2], |_| {
            Ok(Box::new(Tracked::new(&live)) as Box<dyn ResourceStore>)
        })
        .unwrap();
        assert_eq!(stores.len(), 2);
        assert_eq!(live.load(Ordering::SeqCst), 2);
        drop(stores);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    /// Spectral store whose coordinate lookup fails with `error`
    struct BrokenCoordinates {
        inner: MemoryStore,
        error: fn() -> ExtractError,
    }

    impl BrokenCoordinates {
        fn new(error: fn() -> ExtractError) -> Self {
            let axis = TimeAxis::regular(
                parse_timestamp("2012-01-01").unwrap(),
                Duration::hours(1),
                2,
            )
            .unwrap();
            let sites = SiteTable::from_lat_lon(&[(0.0, 0.0), (1.0, 1.0)]);
            let data = ndarray::Array3::<f32>::zeros((2, 3, 2)).into_dyn();
            let inner = MemoryStore::new("spectral", axis, sites)
                .with_dataset_dims(
                    "spectrum",
                    data,
                    vec!["time".into(), "frequency".into(), "gid".into()],
                )
                .unwrap();
            Self { inner, error }
        }
    }

    impl ResourceStore for BrokenCoordinates {
        fn identity(&self) -> StoreIdentity {
            self.inner.identity()
        }
        fn dataset_names(&self) -> Vec<String> {
            self.inner.dataset_names()
        }
        fn time_index(&self) -> Result<TimeAxis> {
            self.inner.time_index()
        }
        fn site_table(&self) -> Result<SiteTable> {
            self.inner.site_table()
        }
        fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
            self.inner.dataset_properties(dataset)
        }
        fn coordinate_values(&self, _dimension: &str) -> Result<Vec<f64>> {
            Err((self.error)())
        }
        fn read(&self, dataset: &str, ranges: &[Range<usize>]) -> Result<ArrayD<f32>> {
            self.inner.read(dataset, ranges)
        }
    }

    #[test]
    fn test_coordinate_read_failure_is_returned() {
        let failing = SingleSource::new(Box::new(BrokenCoordinates::new(|| {
            ExtractError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk read failed",
            ))
        })))
        .unwrap();
        assert!(matches!(
            failing.slice("spectrum", &TimeSelector::All, &SiteSelector::All),
            Err(ExtractError::Io(_))
        ));

        let unlabeled = SingleSource::new(Box::new(BrokenCoordinates::new(|| {
            ExtractError::DatasetNotFound {
                dataset: "frequency".to_string(),
            }
        })))
        .unwrap();
        let result = unlabeled
            .slice("spectrum", &TimeSelector::All, &SiteSelector::All)
            .unwrap();
        assert_eq!(result.extra_dimensions[0].values, vec![0.0, 1.0, 2.0]);
    }
}
