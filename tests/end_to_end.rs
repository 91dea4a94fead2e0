//! Join, choropleth and cluster-map scenarios driven through the public API.

use geo::{polygon, MultiPolygon};
use school_cluster_atlas::choropleth::ChoroplethRenderer;
use school_cluster_atlas::clusters::{self, ClusterPointFilter};
use school_cluster_atlas::join::join;
use image::Rgba;
use school_cluster_atlas::palette::SequentialPalette;
use school_cluster_atlas::render::FigureSize;
use school_cluster_atlas::types::{ClusterId, MetricTable, PointRecord, RegionBoundary};
use school_cluster_atlas::MapError;

const KEY: &str = "PROVINCE";
const METRIC_KEY: &str = "school.province";
const VALUE: &str = "student_teacher_ratio";

fn square(x: f64, y: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x, y: y),
        (x: x + 0.5, y: y),
        (x: x + 0.5, y: y + 0.5),
        (x: x, y: y + 0.5),
    ]])
}

fn abc() -> RegionBoundary {
    RegionBoundary::from_named(
        KEY,
        vec![("A", square(120.0, 14.0)), ("B", square(120.5, 14.0)), ("C", square(121.0, 14.0))],
    )
}

fn luminance(c: Rgba<u8>) -> f64 {
    0.2126 * c[0] as f64 + 0.7152 * c[1] as f64 + 0.0722 * c[2] as f64
}

fn renderer() -> ChoroplethRenderer {
    ChoroplethRenderer::new(FigureSize { width: 320, height: 200 })
}

#[test]
fn test_full_join_renders_gradient() {
    let metrics = MetricTable::from_pairs(METRIC_KEY, VALUE, vec![("A", 10.0), ("B", 20.0), ("C", 30.0)]);
    let joined = join(&abc(), &metrics, KEY, METRIC_KEY).unwrap();
    assert_eq!(joined.len(), 3);

    let figure = renderer().render(&joined, VALUE, "Average Student-Teacher Ratio Per Province").unwrap();
    assert_eq!(figure.color_bar_range(), Some((10.0, 30.0)));

    let fills = figure.region_fills();
    let c = fills.iter().find(|f| f.region_name == "C").unwrap();
    assert!(fills
        .iter()
        .filter(|f| f.region_name != "C")
        .all(|f| luminance(f.color) > luminance(c.color)));
    assert_eq!(c.color, *SequentialPalette::oranges().stops().last().unwrap());
}

#[test]
fn test_partial_join_collapses_range() {
    let metrics = MetricTable::from_pairs(METRIC_KEY, VALUE, vec![("A", 10.0), ("D", 99.0)]);
    let joined = join(&abc(), &metrics, KEY, METRIC_KEY).unwrap();
    assert_eq!(joined.region_names(), vec!["A"]);
    assert_eq!(joined.values(VALUE).unwrap(), vec![10.0]);

    let figure = renderer().render(&joined, VALUE, "Degenerate").unwrap();
    assert_eq!(figure.color_bar_range(), Some((10.0, 10.0)));
    assert_eq!(figure.region_fills().len(), 1);
}

#[test]
fn test_join_never_exceeds_smaller_side() {
    let boundaries = RegionBoundary::from_named(
        KEY,
        (0..6).map(|i| (format!("P{}", i % 4), square(120.0 + i as f64, 10.0))),
    );
    let metrics = MetricTable::from_pairs(
        METRIC_KEY,
        VALUE,
        vec![("P0", 1.0), ("P1", 2.0), ("P9", 3.0)],
    );
    let joined = join(&boundaries, &metrics, KEY, METRIC_KEY).unwrap();
    assert!(joined.len() <= boundaries.len().min(metrics.len()));
    assert_eq!(joined.region_names(), vec!["P0", "P1"]);
}

#[test]
fn test_render_succeeds_on_varied_finite_data() {
    let values = [0.0, -3.5, 1e6, 42.0, 42.0, 0.001];
    for n in 1..=values.len() {
        let names: Vec<String> = (0..n).map(|i| format!("R{}", i)).collect();
        let boundaries = RegionBoundary::from_named(
            KEY,
            names.iter().enumerate().map(|(i, name)| (name.clone(), square(i as f64, 0.0))),
        );
        let metrics = MetricTable::from_pairs(
            METRIC_KEY,
            VALUE,
            names.iter().cloned().zip(values.iter().copied()).collect(),
        );
        let joined = join(&boundaries, &metrics, KEY, METRIC_KEY).unwrap();
        let figure = renderer().render(&joined, VALUE, "varied").unwrap();
        assert_eq!(figure.region_fills().len(), n);
    }
}

#[test]
fn test_cluster_filter_scenario() {
    let points = vec![
        PointRecord::new(121.0, 14.5, 0),
        PointRecord::new(121.1, 14.6, 1),
        PointRecord::new(121.2, 14.7, 0),
    ];
    assert_eq!(clusters::select(&points, ClusterId::new(0).unwrap()).len(), 2);
    assert!(clusters::select(&points, ClusterId::new(2).unwrap()).is_empty());

    let filter = ClusterPointFilter::new(FigureSize { width: 240, height: 240 });
    let first = filter.render(&abc(), &points, 0).unwrap();
    assert_eq!(first.title, "Map of Schools in Cluster 1");
    assert_eq!(first.markers().unwrap().points.len(), 2);

    let empty = filter.render(&abc(), &points, 2).unwrap();
    assert!(empty.markers().unwrap().points.is_empty());
    assert!(!empty.to_png().unwrap().is_empty());

    assert!(matches!(filter.render(&abc(), &points, 3), Err(MapError::Range { .. })));
}
