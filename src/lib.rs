//! rextract: geographic and temporal extraction of renewable-energy resource data
//!
//! Resource data (solar irradiance, wind speed, wave spectra) is stored as
//! gridded arrays keyed by a fixed site list and a time axis. rextract resolves
//! points, bounding boxes and administrative regions to site ids, and presents
//! one file or a collection of files as a single logical dataset that slices the
//! same way however it is partitioned on disk.
//!
//! ## Key Features
//!
//! - **Spatial Index**: balanced k-d tree over site coordinates, cached on disk
//!   under a fingerprint of the source collection
//! - **Source Composition**: single store, per-dataset file sets, per-year file
//!   sets and arbitrary time chunks behind one [`SourceSet`](source::SourceSet) trait
//! - **Queries**: point, multi-point, region, bounding box, full extent and
//!   direct site-id extraction
//! - **Time-Step Maps**: value-per-site cross-sections, with compound row labels
//!   for spectral datasets
//!
//! ## Module Organization
//!
//! - [`store`]: the resource store capability, NetCDF and in-memory adapters
//! - [`source`]: composition strategies and run-decomposed slicing
//! - [`spatial`]: k-d tree, fingerprint and index cache
//! - [`query`]: the [`QueryEngine`](query::QueryEngine) facade
//! - [`map`]: time-step cross-sections
//! - [`table`]: labeled-table output forms
//! - [`site_table`], [`region`], [`time_axis`]: site and time metadata
//! - [`config`], [`errors`]: configuration and error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rextract::prelude::*;
//!
//! let paths = expand_pattern("/data/nsrdb/ri_100_nsrdb_*.nc").unwrap();
//! let engine = QueryEngine::open_year_set(&paths, ExtractConfig::default()).unwrap();
//!
//! // Hourly GHI for every site in one county
//! let county = engine.by_region("ghi", "county", "Washington").unwrap();
//! println!("{:?}", county.data.shape());
//!
//! // Cross-section at one hour
//! let map = MapBuilder::new(&engine)
//!     .timestep_map("ghi", "2012-07-04 12:00:00", Some(&MapSites::region("county", "Washington")))
//!     .unwrap();
//! ```

pub mod config;
pub mod errors;
pub mod map;
pub mod query;
pub mod region;
pub mod site_table;
pub mod source;
pub mod spatial;
pub mod store;
pub mod table;
pub mod time_axis;

pub use errors::*;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::ExtractConfig;
    pub use crate::errors::{ExtractError, Result};
    pub use crate::map::{MapBuilder, MapSites, TimestepMap};
    pub use crate::query::{QueryEngine, QueryResult};
    pub use crate::region::RegionResolver;
    pub use crate::site_table::SiteTable;
    pub use crate::source::{
        expand_pattern, FileSetSource, SingleSource, SiteSelector, SourceKind, SourceSet,
        TimeChunkSource, YearSetSource,
    };
    pub use crate::spatial::{IndexCache, KdTree};
    pub use crate::store::{MemoryStore, NetCdfStore, NetCdfStoreWriter, ResourceStore};
    pub use crate::table::{LabeledTable, MapTable};
    pub use crate::time_axis::{TimeAxis, TimeSelector};
}
