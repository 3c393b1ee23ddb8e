#![allow(dead_code)]

use chrono::Duration;
use ndarray::{Array2, Array4};
use rextract::site_table::{COUNTRY, COUNTY, STATE};
use rextract::time_axis::parse_timestamp;

pub use rextract::prelude::*;

/// Sites whose county is "Washington"
pub const WASHINGTON: [usize; 7] = [3, 14, 27, 45, 58, 71, 96];

pub const SITES: usize = 100;

pub const HOURS: usize = 8760;

/// Value stored at (t, gid) for `ghi`
pub fn ghi_value(t: usize, gid: usize) -> f32 {
    (t * 100 + gid) as f32
}

pub fn hourly_axis(start: &str, len: usize) -> TimeAxis {
    TimeAxis::regular(
        parse_timestamp(start).expect("Failed to parse start"),
        Duration::hours(1),
        len,
    )
    .expect("Failed to build time axis")
}

/// 100 sites on a 10 x 10 grid with country, state and county columns
pub fn site_table(n: usize) -> SiteTable {
    let pairs: Vec<(f64, f64)> = (0..n)
        .map(|i| (41.0 + (i / 10) as f64 * 0.1, -71.9 + (i % 10) as f64 * 0.1))
        .collect();
    let others = ["Kent", "Providence", "Bristol", "Newport"];
    let county = (0..n)
        .map(|i| {
            if WASHINGTON.contains(&i) {
                Some("Washington".to_string())
            } else {
                Some(others[i % others.len()].to_string())
            }
        })
        .collect();
    SiteTable::from_lat_lon(&pairs)
        .with_column(COUNTY, county)
        .expect("Failed to add county")
        .with_column(STATE, vec![Some("Rhode Island".to_string()); n])
        .expect("Failed to add state")
        .with_column(COUNTRY, vec![Some("United States".to_string()); n])
        .expect("Failed to add country")
}

/// One year of hourly `ghi` and `dni` over `sites` sites
pub fn resource_store(label: &str, start: &str, hours: usize, sites: usize) -> MemoryStore {
    let ghi = Array2::from_shape_fn((hours, sites), |(t, s)| ghi_value(t, s)).into_dyn();
    let dni = ghi.mapv(|v| v + 0.25);
    MemoryStore::new(label, hourly_axis(start, hours), site_table(sites))
        .with_dataset("ghi", ghi)
        .expect("Failed to add ghi")
        .with_units("ghi", "W/m2")
        .expect("Failed to set units")
        .with_dataset("dni", dni)
        .expect("Failed to add dni")
}

/// Spectral store shaped (time, frequency, direction, gid)
pub fn spectral_store(label: &str, hours: usize, sites: usize) -> MemoryStore {
    let spectrum = Array4::from_shape_fn((hours, 3, 4, sites), |(t, f, d, s)| {
        (t * 1000 + f * 100 + d * 10 + s) as f32
    })
    .into_dyn();
    MemoryStore::new(label, hourly_axis("2010-01-01", hours), site_table(sites))
        .with_dataset_dims(
            "directional_wave_spectrum",
            spectrum,
            vec![
                "time".to_string(),
                "frequency".to_string(),
                "direction".to_string(),
                "gid".to_string(),
            ],
        )
        .expect("Failed to add spectrum")
        .with_units("directional_wave_spectrum", "m2/Hz/deg")
        .expect("Failed to set units")
        .with_coordinate("frequency", vec![0.05, 0.1, 0.2])
        .with_coordinate("direction", vec![0.0, 90.0, 180.0, 270.0])
}

/// Engine with an in-memory index cache
pub fn engine(source: Box<dyn SourceSet>) -> QueryEngine {
    QueryEngine::with_cache(
        source,
        ExtractConfig::default(),
        IndexCache::new(Box::new(rextract::spatial::MemoryCacheBackend::new())),
    )
}
