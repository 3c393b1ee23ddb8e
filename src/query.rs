//! Query facade
//!
//! [`QueryEngine`] turns point, region, box and full-extent requests into site
//! ids and delegates the read to its [`SourceSet`]. Results come back as a
//! [`QueryResult`] (array plus labels) which converts into a
//! [`LabeledTable`] on request.
//!
//! Filters and lookups treat absence differently: a region or box matching no
//! sites yields a zero-column result, while a point outside the site envelope
//! is an [`OutOfBounds`](ExtractError::OutOfBounds) error.

use crate::config::ExtractConfig;
use crate::errors::{ExtractError, Result};
use crate::region::RegionResolver;
use crate::site_table::SiteTable;
use crate::source::{
    FileSetSource, SingleSource, SiteSelector, SourceKind, SourceSet, TimeChunkSource,
    YearSetSource,
};
use crate::spatial::{Fingerprint, IndexCache, KdTree};
use crate::store::DatasetProperties;
use crate::table::{ExtraDimension, LabeledTable};
use crate::time_axis::{TimeAxis, TimeSelector};
use chrono::{DateTime, Utc};
use ndarray::{ArrayD, ArrayView1, Axis, Ix2};
use std::cell::OnceCell;
use std::path::Path;

/// A slice with its labels
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub dataset: String,
    /// `(time, [extra...], site)` values
    pub data: ArrayD<f32>,
    pub time_index: Vec<DateTime<Utc>>,
    /// Site id of each column
    pub gids: Vec<usize>,
    /// (lat, lon) of each column
    pub coordinates: Vec<(f64, f64)>,
    pub extra_dimensions: Vec<ExtraDimension>,
}

impl QueryResult {
    /// (time steps, sites) for 2-D results; the full shape is on `data`
    pub fn shape(&self) -> (usize, usize) {
        (self.time_index.len(), self.gids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time series of the `n`th column of a 2-D result
    pub fn column(&self, n: usize) -> Option<ArrayView1<'_, f32>> {
        let view = self.data.view().into_dimensionality::<Ix2>().ok()?;
        (n < view.ncols()).then(|| view.index_axis_move(Axis(1), n))
    }

    /// Convert to the labeled-table form
    pub fn to_table(&self) -> Result<LabeledTable> {
        LabeledTable::from_parts(
            &self.time_index,
            &self.extra_dimensions,
            &self.gids,
            &self.data,
        )
    }
}

/// Geographic and temporal extraction over one source set
pub struct QueryEngine {
    source: Box<dyn SourceSet>,
    config: ExtractConfig,
    cache: IndexCache,
    tree: OnceCell<KdTree>,
}

impl QueryEngine {
    /// Engine with the index cache described by `config`
    pub fn new(source: Box<dyn SourceSet>, config: ExtractConfig) -> Self {
        let cache = IndexCache::from_config(&config);
        Self::with_cache(source, config, cache)
    }

    /// Engine with an explicit index cache
    pub fn with_cache(source: Box<dyn SourceSet>, config: ExtractConfig, cache: IndexCache) -> Self {
        Self {
            source,
            config,
            cache,
            tree: OnceCell::new(),
        }
    }

    pub fn open_single(path: impl AsRef<Path>, config: ExtractConfig) -> Result<Self> {
        Ok(Self::new(Box::new(SingleSource::open(path)?), config))
    }

    pub fn open_file_set<P: AsRef<Path>>(paths: &[P], config: ExtractConfig) -> Result<Self> {
        Ok(Self::new(Box::new(FileSetSource::open(paths)?), config))
    }

    pub fn open_year_set<P: AsRef<Path>>(paths: &[P], config: ExtractConfig) -> Result<Self> {
        Ok(Self::new(Box::new(YearSetSource::open(paths)?), config))
    }

    pub fn open_time_chunks<P: AsRef<Path>>(paths: &[P], config: ExtractConfig) -> Result<Self> {
        Ok(Self::new(Box::new(TimeChunkSource::open(paths)?), config))
    }

    pub fn source(&self) -> &dyn SourceSet {
        self.source.as_ref()
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    pub fn index_cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Cache key of this composition's spatial index
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.source.identities(), &self.site_table().lat_lon())
    }

    /// Spatial index, loaded from cache or built on first use
    pub fn spatial_index(&self) -> &KdTree {
        self.tree.get_or_init(|| {
            let points = self.site_table().lat_lon();
            let key = Fingerprint::compute(&self.source.identities(), &points);
            let start = std::time::Instant::now();
            let tree = self.cache.get_or_build(&key, &points);
            tracing::debug!(
                sites = tree.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Spatial index ready"
            );
            tree
        })
    }

    pub fn datasets(&self) -> Vec<String> {
        self.source.dataset_names()
    }

    pub fn time_index(&self) -> &TimeAxis {
        self.source.time_axis()
    }

    pub fn site_table(&self) -> &SiteTable {
        self.source.site_table()
    }

    /// (time steps, sites)
    pub fn shape(&self) -> (usize, usize) {
        (self.time_index().len(), self.site_table().len())
    }

    pub fn dataset_properties(&self, dataset: &str) -> Result<DatasetProperties> {
        self.source.dataset_properties(dataset)
    }

    pub fn units(&self, dataset: &str) -> Result<Option<String>> {
        Ok(self.dataset_properties(dataset)?.units)
    }

    /// All (lat, lon) pairs in site order
    pub fn lat_lon(&self) -> Vec<[f64; 2]> {
        self.site_table().lat_lon()
    }

    pub fn distinct_values(&self, column: &str) -> Result<Vec<String>> {
        self.site_table().distinct_values(column)
    }

    pub fn countries(&self) -> Result<Vec<String>> {
        self.site_table().countries()
    }

    pub fn states(&self) -> Result<Vec<String>> {
        self.site_table().states()
    }

    pub fn counties(&self) -> Result<Vec<String>> {
        self.site_table().counties()
    }

    fn check_bounds(&self, lat: f64, lon: f64) -> Result<()> {
        let tolerance = self.config.lat_lon_tolerance;
        let inside = self
            .site_table()
            .envelope()
            .is_some_and(|env| env.contains(lat, lon, tolerance));
        if inside {
            Ok(())
        } else {
            Err(ExtractError::OutOfBounds {
                lat,
                lon,
                tolerance,
            })
        }
    }

    /// Nearest site to a (lat, lon) point
    pub fn lat_lon_gid(&self, point: (f64, f64)) -> Result<usize> {
        let (lat, lon) = point;
        self.check_bounds(lat, lon)?;
        self.spatial_index()
            .nearest(lat, lon)
            .ok_or(ExtractError::OutOfBounds {
                lat,
                lon,
                tolerance: self.config.lat_lon_tolerance,
            })
    }

    /// Nearest site to each point, in input order
    pub fn lat_lon_gids(&self, points: &[(f64, f64)]) -> Result<Vec<usize>> {
        points.iter().map(|&p| self.lat_lon_gid(p)).collect()
    }

    /// Up to `k` nearest sites, closest first
    pub fn nearest_sites(&self, point: (f64, f64), k: usize) -> Result<Vec<usize>> {
        let (lat, lon) = point;
        self.check_bounds(lat, lon)?;
        Ok(self.spatial_index().nearest_k(lat, lon, k))
    }

    /// Site ids whose administrative `attribute` equals `value`
    pub fn region_gids(&self, attribute: &str, value: &str) -> Result<Vec<usize>> {
        RegionResolver::new(self.site_table()).resolve(attribute, value)
    }

    /// Site ids inside the inclusive box spanned by two (lat, lon) corners
    pub fn box_gids(&self, corner_a: (f64, f64), corner_b: (f64, f64)) -> Vec<usize> {
        self.spatial_index().within_box(corner_a, corner_b)
    }

    /// Arbitrary time and site selection
    pub fn slice(
        &self,
        dataset: &str,
        time: &TimeSelector,
        sites: &SiteSelector,
    ) -> Result<QueryResult> {
        self.source
            .slice_with_gap(dataset, time, sites, self.config.max_site_gap)
    }

    /// Full time series of explicit site ids, in the given order
    pub fn by_sites(&self, dataset: &str, gids: &[usize]) -> Result<QueryResult> {
        self.slice(dataset, &TimeSelector::All, &SiteSelector::from(gids))
    }

    /// Full time series of the site nearest to a point
    pub fn by_point(&self, dataset: &str, point: (f64, f64)) -> Result<QueryResult> {
        self.check_dataset(dataset)?;
        let gid = self.lat_lon_gid(point)?;
        tracing::debug!(dataset, lat = point.0, lon = point.1, gid, "Resolved point");
        self.by_sites(dataset, &[gid])
    }

    /// One column per point, in input order
    pub fn by_points(&self, dataset: &str, points: &[(f64, f64)]) -> Result<QueryResult> {
        self.check_dataset(dataset)?;
        let gids = self.lat_lon_gids(points)?;
        self.by_sites(dataset, &gids)
    }

    /// Every site of an administrative region, in site order
    pub fn by_region(&self, dataset: &str, attribute: &str, value: &str) -> Result<QueryResult> {
        let gids = self.region_gids(attribute, value)?;
        self.by_sites(dataset, &gids)
    }

    /// Every site inside a box, in site order
    pub fn by_box(
        &self,
        dataset: &str,
        corner_a: (f64, f64),
        corner_b: (f64, f64),
    ) -> Result<QueryResult> {
        self.check_dataset(dataset)?;
        let gids = self.box_gids(corner_a, corner_b);
        tracing::debug!(dataset, matched = gids.len(), "Resolved bounding box");
        self.by_sites(dataset, &gids)
    }

    /// Every site
    pub fn full_extent(&self, dataset: &str) -> Result<QueryResult> {
        self.slice(dataset, &TimeSelector::All, &SiteSelector::All)
    }

    fn check_dataset(&self, dataset: &str) -> Result<()> {
        if self.source.contains(dataset) {
            Ok(())
        } else {
            Err(ExtractError::DatasetNotFound {
                dataset: dataset.to_string(),
            })
        }
    }
}
