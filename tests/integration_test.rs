mod common;

use common::*;
use ndarray::{Axis, Ix2};
use rextract::site_table::COUNTY;
use rextract::time_axis::parse_timestamp;

fn one_year() -> MemoryStore {
    resource_store("ri_100_nsrdb_2012", "2012-01-01", HOURS, SITES)
}

/// The same one-year collection behind each composition strategy
fn strategies() -> Vec<(&'static str, QueryEngine)> {
    let full = one_year();

    let single = SingleSource::new(Box::new(full.clone())).expect("Failed to open single source");
    let file_set = FileSetSource::new(vec![
        Box::new(full.dataset_subset("ri_ghi", &["ghi"]).expect("subset")),
        Box::new(full.dataset_subset("ri_dni", &["dni"]).expect("subset")),
    ])
    .expect("Failed to assemble file set");
    let year_set = YearSetSource::new(vec![Box::new(full.clone())]).expect("Failed to assemble year set");
    let chunks = TimeChunkSource::new(vec![
        Box::new(full.time_subset("chunk_c", 5000..HOURS).expect("chunk")),
        Box::new(full.time_subset("chunk_a", 0..1000).expect("chunk")),
        Box::new(full.time_subset("chunk_b", 1000..5000).expect("chunk")),
    ])
    .expect("Failed to assemble time chunks");

    vec![
        ("single", engine(Box::new(single))),
        ("file-set", engine(Box::new(file_set))),
        ("year-set", engine(Box::new(year_set))),
        ("time-chunk", engine(Box::new(chunks))),
    ]
}

#[test]
fn test_washington_region_scenario() {
    for (name, engine) in strategies() {
        let region = engine
            .by_region("ghi", COUNTY, "Washington")
            .expect("Failed to extract region");
        assert_eq!(region.data.shape(), &[HOURS, 7], "{name}");
        assert_eq!(region.gids, WASHINGTON.to_vec(), "{name}");

        // Columns equal the individually resolved site series, in site order
        for (col, &gid) in WASHINGTON.iter().enumerate() {
            let single = engine.by_sites("ghi", &[gid]).expect("Failed to fetch site");
            assert_eq!(
                region.data.index_axis(Axis(1), col),
                single.data.index_axis(Axis(1), 0),
                "{name}: column {col}"
            );
        }

        // The map at one hour equals that hour's row of the region result
        let map = MapBuilder::new(&engine)
            .timestep_map(
                "ghi",
                "2012-07-04 12:00:00",
                Some(&MapSites::region(COUNTY, "Washington")),
            )
            .expect("Failed to build map")
            .into_flat()
            .expect("ghi is two-dimensional");
        let hour = engine
            .time_index()
            .locate(&parse_timestamp("2012-07-04 12:00:00").unwrap())
            .expect("Timestamp not on axis");
        assert_eq!(hour, 4452);
        assert_eq!(map.len(), 7, "{name}");
        assert_eq!(
            map.values(),
            region.data.index_axis(Axis(0), hour).iter().copied().collect::<Vec<f32>>(),
            "{name}"
        );
        assert_eq!(map.values()[0], ghi_value(4452, 3));
    }
}

#[test]
fn test_regions_partition_site_table() {
    let engine = engine(Box::new(SingleSource::new(Box::new(one_year())).unwrap()));
    let mut seen = Vec::new();
    for county in engine.counties().expect("No county column") {
        let gids = engine.region_gids(COUNTY, &county).unwrap();
        assert!(gids.windows(2).all(|w| w[0] < w[1]));
        seen.extend(gids);
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..SITES).collect::<Vec<_>>());
}

#[test]
fn test_box_over_envelope_equals_full_extent() {
    for (name, engine) in strategies() {
        let envelope = engine.site_table().envelope().expect("No sites");
        let boxed = engine
            .by_box("dni", envelope.high(), envelope.low())
            .expect("Failed to extract box");
        let full = engine.full_extent("dni").expect("Failed to extract full extent");
        assert_eq!(boxed.gids, full.gids, "{name}");
        assert_eq!(boxed.data, full.data, "{name}");
    }
}

#[test]
fn test_empty_box_is_zero_columns() {
    let engine = engine(Box::new(SingleSource::new(Box::new(one_year())).unwrap()));
    let result = engine
        .by_box("ghi", (10.0, 10.0), (11.0, 11.0))
        .expect("Empty box must not fail");
    assert_eq!(result.data.shape(), &[HOURS, 0]);
    assert!(result.is_empty());
}

#[test]
fn test_point_at_site_equals_direct_fetch() {
    let store = one_year();
    let engine = engine(Box::new(SingleSource::new(Box::new(store.clone())).unwrap()));
    let gid = 42;
    let (lat, lon) = engine.site_table().coordinates(gid).unwrap();

    let by_point = engine.by_point("ghi", (lat, lon)).expect("Failed point query");
    assert_eq!(by_point.gids, vec![gid]);
    let direct = store.read("ghi", &[0..HOURS, gid..gid + 1]).unwrap();
    assert_eq!(by_point.data, direct);
}

#[test]
fn test_self_lookup_is_exact_for_every_site() {
    for (name, engine) in strategies() {
        for (gid, [lat, lon]) in engine.lat_lon().into_iter().enumerate() {
            assert_eq!(engine.lat_lon_gid((lat, lon)).unwrap(), gid, "{name}");
        }
    }
}

#[test]
fn test_bad_lat_lon_is_rejected() {
    let engine = engine(Box::new(SingleSource::new(Box::new(one_year())).unwrap()));
    let envelope = engine.site_table().envelope().unwrap();
    let probe = (envelope.max_lat + 1.0, envelope.max_lon + 1.0);
    assert!(matches!(
        engine.by_point("ghi", probe),
        Err(ExtractError::OutOfBounds { .. })
    ));
    assert!(matches!(
        engine.by_point("wind", (41.0, -71.0)),
        Err(ExtractError::DatasetNotFound { .. })
    ));
}

#[test]
fn test_by_points_follow_input_order() {
    let engine = engine(Box::new(SingleSource::new(Box::new(one_year())).unwrap()));
    let points: Vec<(f64, f64)> = [77, 5, 77, 0]
        .iter()
        .map(|&g| engine.site_table().coordinates(g).unwrap())
        .collect();
    let result = engine.by_points("ghi", &points).unwrap();
    assert_eq!(result.gids, vec![77, 5, 77, 0]);
    let data = result.data.into_dimensionality::<Ix2>().unwrap();
    assert_eq!(data[[10, 0]], ghi_value(10, 77));
    assert_eq!(data[[10, 3]], ghi_value(10, 0));
}

#[test]
fn test_year_set_composition_is_lossless() {
    let y2012 = resource_store("ri_100_nsrdb_2012", "2012-01-01", 48, 20);
    let y2013 = resource_store("ri_100_nsrdb_2013", "2013-01-01", 24, 20);
    let set = YearSetSource::new(vec![Box::new(y2013.clone()), Box::new(y2012.clone())])
        .expect("Failed to assemble year set");

    let full = set
        .slice("ghi", &TimeSelector::All, &SiteSelector::All)
        .unwrap();
    let by_hand = ndarray::concatenate(
        Axis(0),
        &[
            y2012.read("ghi", &[0..48, 0..20]).unwrap().view(),
            y2013.read("ghi", &[0..24, 0..20]).unwrap().view(),
        ],
    )
    .unwrap();
    assert_eq!(full.data, by_hand);

    // A range across the year boundary with a sparse site list
    let sparse = set
        .slice(
            "ghi",
            &TimeSelector::Range(40..56),
            &SiteSelector::Indices(vec![19, 2, 3]),
        )
        .unwrap();
    assert_eq!(sparse.data.shape(), &[16, 3]);
    let data = sparse.data.into_dimensionality::<Ix2>().unwrap();
    assert_eq!(data[[0, 0]], ghi_value(40, 19));
    assert_eq!(data[[8, 1]], ghi_value(0, 2));
    assert_eq!(data[[15, 2]], ghi_value(7, 3));

    let years = set
        .slice("ghi", &TimeSelector::Years(vec![2013, 2020]), &SiteSelector::Index(0))
        .unwrap();
    assert_eq!(years.data.shape(), &[24, 1]);
}

#[test]
fn test_time_chunk_composition_matches_single() {
    let full = resource_store("full", "2012-01-01", 100, 30);
    let chunks = TimeChunkSource::new(vec![
        Box::new(full.time_subset("c3", 61..100).unwrap()),
        Box::new(full.time_subset("c1", 0..7).unwrap()),
        Box::new(full.time_subset("c2", 7..61).unwrap()),
    ])
    .unwrap();
    let single = SingleSource::new(Box::new(full)).unwrap();

    let time = TimeSelector::Indices(vec![99, 0, 6, 7, 60, 61]);
    let sites = SiteSelector::Indices(vec![29, 0, 15]);
    assert_eq!(
        chunks.slice("dni", &time, &sites).unwrap(),
        single.slice("dni", &time, &sites).unwrap()
    );
}

#[test]
fn test_overlapping_chunks_and_ambiguous_files_fail_at_assembly() {
    let full = resource_store("full", "2012-01-01", 48, 10);
    let overlap = TimeChunkSource::new(vec![
        Box::new(full.time_subset("a", 0..30).unwrap()),
        Box::new(full.time_subset("b", 20..48).unwrap()),
    ]);
    assert!(matches!(overlap, Err(ExtractError::OverlappingTimeAxis { .. })));

    let ambiguous = FileSetSource::new(vec![
        Box::new(full.dataset_subset("a", &["ghi"]).unwrap()),
        Box::new(full.dataset_subset("b", &["ghi", "dni"]).unwrap()),
    ]);
    assert!(matches!(ambiguous, Err(ExtractError::AmbiguousDataset { .. })));

    let fewer_sites = FileSetSource::new(vec![
        Box::new(full.dataset_subset("a", &["ghi"]).unwrap()),
        Box::new(resource_store("b", "2012-01-01", 48, 9).dataset_subset("b", &["dni"]).unwrap()),
    ]);
    assert!(matches!(fewer_sites, Err(ExtractError::SiteCountMismatch { .. })));
}

#[test]
fn test_labeled_table_form() {
    let engine = engine(Box::new(SingleSource::new(Box::new(one_year())).unwrap()));
    let result = engine.by_region("ghi", COUNTY, "Washington").unwrap();
    let table = result.to_table().unwrap();
    assert_eq!(table.n_rows(), HOURS);
    assert_eq!(table.columns, WASHINGTON.to_vec());
    assert_eq!(table.column(45).unwrap()[100], ghi_value(100, 45));
    assert_eq!(
        table.rows.time(4452),
        Some(parse_timestamp("2012-07-04 12:00:00").unwrap())
    );
}
