//! Time-step cross-sections

use crate::errors::{ExtractError, Result};
use crate::query::QueryEngine;
use crate::source::SiteSelector;
use crate::table::{LabeledTable, MapRow, MapTable};
use crate::time_axis::{parse_timestamp, TimeSelector};
use chrono::{DateTime, Utc};

/// Restriction of a time-step map to part of the site table
#[derive(Debug, Clone, PartialEq)]
pub enum MapSites {
    /// Sites whose administrative `attribute` equals `value`
    Region { attribute: String, value: String },
    /// Explicit site ids; output still follows site table order
    Sites(Vec<usize>),
}

impl MapSites {
    pub fn region(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        MapSites::Region {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Cross-section at one time step
#[derive(Debug, Clone, PartialEq)]
pub enum TimestepMap {
    /// One (longitude, latitude, value) row per site, for `(time, site)` datasets
    Flat(MapTable),
    /// Compound (time, extra...) rows crossed with site columns, for higher ranks
    Compound(LabeledTable),
}

impl TimestepMap {
    pub fn as_flat(&self) -> Option<&MapTable> {
        match self {
            TimestepMap::Flat(table) => Some(table),
            TimestepMap::Compound(_) => None,
        }
    }

    pub fn into_flat(self) -> Option<MapTable> {
        match self {
            TimestepMap::Flat(table) => Some(table),
            TimestepMap::Compound(_) => None,
        }
    }

    pub fn into_compound(self) -> Option<LabeledTable> {
        match self {
            TimestepMap::Compound(table) => Some(table),
            TimestepMap::Flat(_) => None,
        }
    }
}

/// Builds value-per-site tables at a single timestamp
#[derive(Clone, Copy)]
pub struct MapBuilder<'a> {
    engine: &'a QueryEngine,
}

impl<'a> MapBuilder<'a> {
    pub fn new(engine: &'a QueryEngine) -> Self {
        Self { engine }
    }

    /// Map at a timestamp given as text, e.g. `2012-07-04 12:00:00`
    pub fn timestep_map(
        &self,
        dataset: &str,
        timestamp: &str,
        sites: Option<&MapSites>,
    ) -> Result<TimestepMap> {
        self.timestep_map_at(dataset, &parse_timestamp(timestamp)?, sites)
    }

    /// Map at an exact time step; no interpolation between steps
    pub fn timestep_map_at(
        &self,
        dataset: &str,
        timestamp: &DateTime<Utc>,
        sites: Option<&MapSites>,
    ) -> Result<TimestepMap> {
        let props = self.engine.dataset_properties(dataset)?;
        let step = self.engine.time_index().locate(timestamp)?;
        let gids = self.resolve_sites(sites)?;
        tracing::debug!(
            dataset,
            timestamp = %timestamp,
            step,
            sites = gids.len(),
            rank = props.rank(),
            "Building time-step map"
        );

        let result = self.engine.slice(
            dataset,
            &TimeSelector::Index(step),
            &SiteSelector::Indices(gids),
        )?;

        if props.rank() > 2 {
            return Ok(TimestepMap::Compound(result.to_table()?));
        }

        let rows = result
            .gids
            .iter()
            .zip(&result.coordinates)
            .zip(result.data.iter())
            .map(|((&gid, &(latitude, longitude)), &value)| MapRow {
                gid,
                longitude,
                latitude,
                value,
            })
            .collect();

        Ok(TimestepMap::Flat(MapTable {
            dataset: dataset.to_string(),
            timestamp: *timestamp,
            rows,
        }))
    }

    /// Site ids of a restriction, in site table order
    fn resolve_sites(&self, sites: Option<&MapSites>) -> Result<Vec<usize>> {
        let site_count = self.engine.site_table().len();
        match sites {
            None => Ok((0..site_count).collect()),
            Some(MapSites::Region { attribute, value }) => self.engine.region_gids(attribute, value),
            Some(MapSites::Sites(gids)) => {
                if let Some(&bad) = gids.iter().find(|&&g| g >= site_count) {
                    return Err(ExtractError::invalid_slice(format!(
                        "Site {bad} is out of range for {site_count} sites"
                    )));
                }
                let mut gids = gids.clone();
                gids.sort_unstable();
                gids.dedup();
                Ok(gids)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractConfig;
    use crate::site_table::{SiteTable, STATE};
    use crate::source::SingleSource;
    use crate::spatial::{IndexCache, NoOpCacheBackend};
    use crate::store::MemoryStore;
    use crate::time_axis::TimeAxis;
    use chrono::Duration;
    use ndarray::{Array2, Array4};

    fn engine() -> QueryEngine {
        let axis = TimeAxis::regular(
            parse_timestamp("2012-01-01").unwrap(),
            Duration::hours(1),
            6,
        )
        .unwrap();
        let sites = SiteTable::from_lat_lon(&[(10.0, 20.0), (11.0, 21.0), (12.0, 22.0)])
            .with_column(
                STATE,
                vec![Some("A".into()), Some("B".into()), Some("A".into())],
            )
            .unwrap();
        let ghi = Array2::from_shape_fn((6, 3), |(t, s)| (t * 10 + s) as f32).into_dyn();
        let spectrum =
            Array4::from_shape_fn((6, 2, 2, 3), |(t, f, d, s)| (t * 1000 + f * 100 + d * 10 + s) as f32)
                .into_dyn();
        let store = MemoryStore::new("mem", axis, sites)
            .with_dataset("ghi", ghi)
            .unwrap()
            .with_dataset_dims(
                "directional_wave_spectrum",
                spectrum,
                vec![
                    "time".into(),
                    "frequency".into(),
                    "direction".into(),
                    "gid".into(),
                ],
            )
            .unwrap()
            .with_coordinate("frequency", vec![0.05, 0.1])
            .with_coordinate("direction", vec![0.0, 180.0]);
        QueryEngine::with_cache(
            Box::new(SingleSource::new(Box::new(store)).unwrap()),
            ExtractConfig::new(),
            IndexCache::new(Box::new(NoOpCacheBackend)),
        )
    }

    #[test]
    fn test_flat_map_joins_coordinates() {
        let e = engine();
        let map = MapBuilder::new(&e)
            .timestep_map("ghi", "2012-01-01 03:00:00", None)
            .unwrap()
            .into_flat()
            .unwrap();
        assert_eq!(map.gids(), vec![0, 1, 2]);
        assert_eq!(map.values(), vec![30.0, 31.0, 32.0]);
        assert_eq!(map.rows[1].longitude, 21.0);
        assert_eq!(map.rows[1].latitude, 11.0);
    }

    #[test]
    fn test_restriction_keeps_site_order() {
        let e = engine();
        let builder = MapBuilder::new(&e);
        let by_set = builder
            .timestep_map("ghi", "2012-01-01 01:00", Some(&MapSites::Sites(vec![2, 0, 2])))
            .unwrap()
            .into_flat()
            .unwrap();
        assert_eq!(by_set.gids(), vec![0, 2]);

        let by_region = builder
            .timestep_map("ghi", "2012-01-01 01:00", Some(&MapSites::region(STATE, "A")))
            .unwrap()
            .into_flat()
            .unwrap();
        assert_eq!(by_region, by_set);
    }

    #[test]
    fn test_unmatched_timestamp_is_error() {
        let e = engine();
        assert!(matches!(
            MapBuilder::new(&e).timestep_map("ghi", "2012-01-01 01:30:00", None),
            Err(ExtractError::TimestampNotFound { .. })
        ));
        assert!(matches!(
            MapBuilder::new(&e).timestep_map("ghi", "July 4th", None),
            Err(ExtractError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_spectral_dataset_uses_compound_rows() {
        let e = engine();
        let table = MapBuilder::new(&e)
            .timestep_map("directional_wave_spectrum", "2012-01-01 02:00:00", Some(&MapSites::Sites(vec![1])))
            .unwrap()
            .into_compound()
            .unwrap();
        assert_eq!(table.n_rows(), 4);
        assert_eq!(table.columns, vec![1]);
        assert_eq!(
            table.rows.names(),
            vec!["time", "frequency", "direction"]
        );
        assert_eq!(table.values.column(0).to_vec(), vec![2001.0, 2011.0, 2101.0, 2111.0]);
    }
}
