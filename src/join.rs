use crate::error::{MapError, Result};
use crate::types::{JoinedRegionMetric, JoinedRow, MetricTable, RegionBoundary};
use std::collections::HashMap;
use tracing::debug;

/// Inner equi-join of boundary features to metric rows.
///
/// Rows without a partner on the other side are dropped without error. Boundary
/// features sharing a key are merged into one multipolygon and a repeated metric
/// key keeps its first row, so the result has one row per matched key.
pub fn join(
    boundaries: &RegionBoundary,
    metrics: &MetricTable,
    boundary_key: &str,
    metric_key: &str,
) -> Result<JoinedRegionMetric> {
    // A FeatureCollection with no features declares no columns to check against.
    let schemaless = boundaries.fields.is_empty() && boundaries.is_empty();
    if !schemaless && !boundaries.has_field(boundary_key) {
        return Err(MapError::schema("boundary file", boundary_key));
    }
    let key_idx = metrics
        .column_index(metric_key)
        .ok_or_else(|| MapError::schema("metric table", metric_key))?;

    let mut metric_rows: HashMap<&str, &Vec<String>> = HashMap::with_capacity(metrics.len());
    for row in &metrics.rows {
        if let Some(key) = row.get(key_idx) {
            metric_rows.entry(key.as_str()).or_insert(row);
        }
    }

    let mut rows: Vec<JoinedRow> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unmatched_regions = 0usize;

    for region in &boundaries.regions {
        let Some(name) = region.attributes.get(boundary_key) else {
            unmatched_regions += 1;
            continue;
        };
        let Some(cells) = metric_rows.get(name.as_str()) else {
            unmatched_regions += 1;
            continue;
        };

        match position.get(name) {
            Some(&i) => rows[i]
                .geometry
                .0
                .extend(region.geometry.0.iter().cloned()),
            None => {
                position.insert(name.clone(), rows.len());
                rows.push(JoinedRow {
                    region_name: name.clone(),
                    geometry: region.geometry.clone(),
                    cells: (*cells).clone(),
                });
            }
        }
    }

    let unmatched_metrics = metric_rows
        .keys()
        .filter(|k| !position.contains_key(**k))
        .count();
    debug!(
        matched = rows.len(),
        unmatched_regions,
        unmatched_metrics,
        boundary_key,
        metric_key,
        "Joined boundaries to metric table"
    );

    Ok(JoinedRegionMetric {
        columns: metrics.columns.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(x: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: 0.0),
            (x: x + 1.0, y: 0.0),
            (x: x + 1.0, y: 1.0),
            (x: x, y: 1.0),
        ]])
    }

    fn provinces(names: &[&str]) -> RegionBoundary {
        RegionBoundary::from_named(
            "PROVINCE",
            names.iter().enumerate().map(|(i, n)| (*n, square(i as f64))),
        )
    }

    #[test]
    fn keeps_only_matching_keys() {
        let metrics = MetricTable::from_pairs("school.province", "ratio", vec![("A", 10.0), ("D", 99.0)]);
        let joined = join(&provinces(&["A", "B", "C"]), &metrics, "PROVINCE", "school.province").unwrap();

        assert_eq!(joined.region_names(), vec!["A"]);
        assert_eq!(joined.values("ratio").unwrap(), vec![10.0]);
    }

    #[test]
    fn missing_key_columns_are_schema_errors() {
        let metrics = MetricTable::from_pairs("school.province", "ratio", vec![("A", 1.0)]);
        let boundaries = provinces(&["A"]);

        assert!(matches!(
            join(&boundaries, &metrics, "REGION", "school.province"),
            Err(MapError::Schema { .. })
        ));
        assert!(matches!(
            join(&boundaries, &metrics, "PROVINCE", "province"),
            Err(MapError::Schema { .. })
        ));
    }

    #[test]
    fn no_overlap_gives_empty_result() {
        let metrics = MetricTable::from_pairs("name", "ratio", vec![("X", 1.0)]);
        let joined = join(&provinces(&["A", "B"]), &metrics, "PROVINCE", "name").unwrap();
        assert!(joined.is_empty());
    }

    #[test]
    fn empty_boundary_file_joins_to_nothing() {
        let metrics = MetricTable::from_pairs("name", "ratio", vec![("A", 1.0)]);
        let joined = join(&RegionBoundary::new(Vec::new(), Vec::new()), &metrics, "PROVINCE", "name").unwrap();
        assert!(joined.is_empty());

        let declared = RegionBoundary::new(vec!["PROVINCE".to_string()], Vec::new());
        assert!(join(&declared, &metrics, "PROVINCE", "name").unwrap().is_empty());
        assert!(matches!(
            join(&declared, &metrics, "REGION", "name"),
            Err(MapError::Schema { .. })
        ));
    }

    #[test]
    fn duplicate_keys_do_not_multiply_rows() {
        let boundaries = provinces(&["A", "A", "B"]);
        let metrics = MetricTable::from_pairs("name", "ratio", vec![("A", 1.0), ("A", 5.0), ("B", 2.0)]);
        let joined = join(&boundaries, &metrics, "PROVINCE", "name").unwrap();

        assert_eq!(joined.len(), 2);
        assert!(joined.len() <= boundaries.len().min(metrics.len()));
        assert_eq!(joined.rows[0].geometry.0.len(), 2);
        assert_eq!(joined.values("ratio").unwrap(), vec![1.0, 2.0]);
    }
}
