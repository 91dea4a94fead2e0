use crate::error::{MapError, Result};
use crate::types::{CategoryCount, CategoryCountTable, MetricTable, PointRecord, Region, RegionBoundary};
use csv::{ReaderBuilder, StringRecord};
use geo::MultiPolygon;
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Reads polygon features from a Shapefile or GeoJSON FeatureCollection.
pub fn load_boundaries(path: &Path) -> Result<RegionBoundary> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| MapError::UnsupportedFormat(format!("{:?} has no extension", path)))?;

    let boundaries = match extension.as_str() {
        "shp" => load_shapefile(path)?,
        "json" | "geojson" => load_geojson(path)?,
        _ => return Err(MapError::UnsupportedFormat(extension)),
    };

    info!(regions = boundaries.len(), path = ?path, "Loaded boundaries");
    Ok(boundaries)
}

fn load_shapefile(path: &Path) -> Result<RegionBoundary> {
    let shp_err = |source| MapError::Shapefile {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = Reader::from_path(path).map_err(shp_err)?;

    // Columns come from the dBase header so they survive files with no polygons.
    let fields: Vec<String> = shapefile::dbase::Reader::from_path(path.with_extension("dbf"))
        .map_err(|e| shp_err(e.into()))?
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    let mut regions = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.map_err(shp_err)?;

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| MapError::InvalidGeometry(format!("{:?}", e)))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| MapError::InvalidGeometry(format!("{:?}", e)))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| MapError::InvalidGeometry(format!("{:?}", e)))?,
            _ => continue, // Skip non-polygon shapes
        };

        let mut attributes = HashMap::new();
        for (name, value) in HashMap::<String, FieldValue>::from(record) {
            if let Some(text) = field_text(value) {
                attributes.insert(name, text);
            }
        }

        regions.push(Region { geometry, attributes });
    }

    Ok(RegionBoundary::new(fields, regions))
}

/// dBase cell as text; null cells yield `None` so they never match a join key.
fn field_text(value: FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(s) => s.map(|s| s.trim().to_string()),
        FieldValue::Numeric(n) => n.map(|n| n.to_string()),
        FieldValue::Float(f) => f.map(|f| f.to_string()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Double(d) => Some(d.to_string()),
        FieldValue::Logical(b) => b.map(|b| b.to_string()),
        FieldValue::Memo(s) => Some(s),
        _ => None,
    }
}

fn load_geojson(path: &Path) -> Result<RegionBoundary> {
    use geojson::GeoJson;

    let file = File::open(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let geojson_err = |e: geojson::Error| MapError::GeoJson {
        path: path.to_path_buf(),
        source: Box::new(e),
    };

    let geojson = GeoJson::from_reader(BufReader::new(file)).map_err(|e| geojson_err(e.into()))?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => {
            return Err(MapError::UnsupportedFormat(
                "GeoJSON must be a FeatureCollection".to_string(),
            ))
        }
    };

    let mut fields: Vec<String> = Vec::new();
    let mut regions = Vec::new();

    for feature in collection.features {
        for name in feature.properties.iter().flat_map(|p| p.keys()) {
            if !fields.contains(name) {
                fields.push(name.clone());
            }
        }
        let Some(geom) = feature.geometry else {
            continue;
        };
        let geometry: geo::Geometry<f64> = geom
            .value
            .try_into()
            .map_err(|e| MapError::InvalidGeometry(format!("{:?}", e)))?;
        let geometry = match geometry {
            geo::Geometry::MultiPolygon(mp) => mp,
            geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            _ => continue, // Skip points/lines
        };

        let mut attributes = HashMap::new();
        for (name, value) in feature.properties.into_iter().flatten() {
            let text = match value {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Bool(b) => Some(b.to_string()),
                _ => None,
            };
            if let Some(text) = text {
                attributes.insert(name, text);
            }
        }

        regions.push(Region { geometry, attributes });
    }

    Ok(RegionBoundary::new(fields, regions))
}

struct CsvFile {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl CsvFile {
    fn read(path: &Path) -> Result<Self> {
        let csv_err = |source| MapError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut rdr = ReaderBuilder::new().from_reader(file);
        let headers = rdr.headers().map_err(csv_err)?.clone();
        let records = rdr
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(csv_err)?;
        debug!(rows = records.len(), path = ?path, "Read CSV");
        Ok(Self { headers, records })
    }

    fn column(&self, path: &Path, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| MapError::schema(path.display().to_string(), name))
    }
}

/// Reads a metric CSV, keeping every cell as text.
pub fn load_metric_table(path: &Path) -> Result<MetricTable> {
    let csv = CsvFile::read(path)?;
    let columns = csv.headers.iter().map(str::to_string).collect();
    let rows = csv
        .records
        .iter()
        .map(|r| r.iter().map(str::to_string).collect())
        .collect();
    Ok(MetricTable::new(columns, rows))
}

fn parse_cell<T: std::str::FromStr>(record: &StringRecord, idx: usize, column: &str, line: usize) -> Result<T> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse().map_err(|_| {
        MapError::Value(format!("row {}: '{}' in column '{}' is not a number", line, raw, column))
    })
}

/// Reads the clustered school locations.
pub fn load_points(path: &Path, lon_column: &str, lat_column: &str, label_column: &str) -> Result<Vec<PointRecord>> {
    let csv = CsvFile::read(path)?;
    let lon = csv.column(path, lon_column)?;
    let lat = csv.column(path, lat_column)?;
    let label = csv.column(path, label_column)?;

    csv.records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let line = i + 2;
            let longitude: f64 = parse_cell(r, lon, lon_column, line)?;
            let latitude: f64 = parse_cell(r, lat, lat_column, line)?;
            // Labels may be written as floats ("1.0") by the upstream pipeline.
            let cluster: f64 = parse_cell(r, label, label_column, line)?;
            if !longitude.is_finite() || !latitude.is_finite() || cluster.fract() != 0.0 {
                return Err(MapError::Value(format!("row {}: invalid point or cluster label", line)));
            }
            Ok(PointRecord::new(longitude, latitude, cluster as i64))
        })
        .collect()
}

/// Reads a per-cluster count table; without a category column every row is one series.
pub fn load_category_counts(
    path: &Path,
    cluster_column: &str,
    category_column: Option<&str>,
    value_column: &str,
) -> Result<CategoryCountTable> {
    let csv = CsvFile::read(path)?;
    let cluster = csv.column(path, cluster_column)?;
    let category = category_column.map(|c| csv.column(path, c)).transpose()?;
    let value = csv.column(path, value_column)?;

    let rows = csv
        .records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let line = i + 2;
            Ok(CategoryCount {
                cluster: parse_cell(r, cluster, cluster_column, line)?,
                category: category.map(|idx| r.get(idx).unwrap_or("").to_string()),
                value: parse_cell(r, value, value_column, line)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CategoryCountTable {
        category_label: category_column.map(str::to_string),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::join;
    use shapefile::dbase::{self, FieldName};
    use shapefile::{Point, Polygon, PolygonRing};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn csv_file(contents: &str) -> NamedTempFile {
        temp_file(".csv", contents)
    }

    fn square(x: f64) -> Polygon {
        Polygon::new(PolygonRing::Outer(vec![
            Point::new(x, 14.0),
            Point::new(x, 14.5),
            Point::new(x + 0.5, 14.5),
            Point::new(x + 0.5, 14.0),
            Point::new(x, 14.0),
        ]))
    }

    fn province_record(name: Option<&str>) -> dbase::Record {
        let mut record = dbase::Record::default();
        record.insert(
            "PROVINCE".to_string(),
            dbase::FieldValue::Character(name.map(str::to_string)),
        );
        record
    }

    fn write_provinces(path: &Path, names: &[Option<&str>]) {
        let table = dbase::TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("PROVINCE").unwrap(), 20);
        let mut writer = shapefile::Writer::from_path(path, table).unwrap();
        for (i, name) in names.iter().enumerate() {
            writer
                .write_shape_and_record(&square(120.0 + i as f64), &province_record(*name))
                .unwrap();
        }
    }

    #[test]
    fn points_accept_float_labels() {
        let file = csv_file("Longitude,Latitude,clusters\n121.0,14.5,0.0\n121.1,14.6,2\n");
        let points = load_points(file.path(), "Longitude", "Latitude", "clusters").unwrap();
        assert_eq!(points, vec![PointRecord::new(121.0, 14.5, 0), PointRecord::new(121.1, 14.6, 2)]);
    }

    #[test]
    fn points_missing_column_is_schema_error() {
        let file = csv_file("lon,lat,clusters\n121.0,14.5,0\n");
        assert!(matches!(
            load_points(file.path(), "Longitude", "Latitude", "clusters"),
            Err(MapError::Schema { .. })
        ));
    }

    #[test]
    fn points_reject_garbage_numbers() {
        let file = csv_file("Longitude,Latitude,clusters\nabc,14.5,0\n");
        assert!(matches!(
            load_points(file.path(), "Longitude", "Latitude", "clusters"),
            Err(MapError::Value(_))
        ));
    }

    #[test]
    fn metric_table_keeps_all_columns() {
        let file = csv_file("school.province,student_teacher_ratio,student_per_rm\nRizal,40.1,50.2\nCebu,38.0,44.9\n");
        let table = load_metric_table(file.path()).unwrap();
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.rows[1][0], "Cebu");
    }

    #[test]
    fn category_counts_with_and_without_category() {
        let file = csv_file("clusters,school.classification2,total_count\n0,DepEd,120\n1,Other,4\n");
        let table =
            load_category_counts(file.path(), "clusters", Some("school.classification2"), "total_count").unwrap();
        assert_eq!(table.rows[0].category.as_deref(), Some("DepEd"));
        assert_eq!(table.rows[1].value, 4.0);

        let plain = load_category_counts(file.path(), "clusters", None, "total_count").unwrap();
        assert!(plain.rows.iter().all(|r| r.category.is_none()));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_metric_table(Path::new("/nonexistent/df_st_ratio.csv")).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn shapefile_attributes_are_trimmed_and_joinable() {
        let dir = tempfile::tempdir().unwrap();
        let shp = dir.path().join("map_data_clean.shp");
        write_provinces(&shp, &[Some("  Rizal  "), Some("Cavite"), None]);

        let boundaries = load_boundaries(&shp).unwrap();
        assert_eq!(boundaries.len(), 3);
        assert!(boundaries.has_field("PROVINCE"));
        assert_eq!(boundaries.regions[0].attributes["PROVINCE"], "Rizal");
        assert!(!boundaries.regions[2].attributes.contains_key("PROVINCE"));
        assert_eq!(boundaries.regions[1].geometry.0.len(), 1);

        let metrics = csv_file("school.province,student_teacher_ratio\nRizal,41.2\nCavite,38.9\n,12.0\n");
        let table = load_metric_table(metrics.path()).unwrap();
        let joined = join(&boundaries, &table, "PROVINCE", "school.province").unwrap();
        assert_eq!(joined.region_names(), vec!["Rizal", "Cavite"]);
        assert_eq!(joined.values("student_teacher_ratio").unwrap(), vec![41.2, 38.9]);
    }

    #[test]
    fn shapefile_without_polygons_keeps_header_columns() {
        let dir = tempfile::tempdir().unwrap();
        let shp = dir.path().join("empty.shp");
        write_provinces(&shp, &[]);

        let boundaries = load_boundaries(&shp).unwrap();
        assert!(boundaries.is_empty());
        assert!(boundaries.has_field("PROVINCE"));
    }

    #[test]
    fn malformed_geojson_is_input_error() {
        let file = temp_file(".geojson", "{\"type\": \"FeatureCollection\", \"features\": [");
        let err = load_boundaries(file.path()).unwrap_err();
        assert!(matches!(err, MapError::GeoJson { .. }));
        assert!(err.is_input_error());
    }

    #[test]
    fn empty_feature_collection_joins_to_nothing() {
        let file = temp_file(".geojson", r#"{"type": "FeatureCollection", "features": []}"#);
        let boundaries = load_boundaries(file.path()).unwrap();
        assert!(boundaries.is_empty());

        let metrics = MetricTable::from_pairs("school.province", "ratio", vec![("Rizal", 1.0)]);
        let joined = join(&boundaries, &metrics, "PROVINCE", "school.province").unwrap();
        assert!(joined.is_empty());
    }

    #[test]
    fn geojson_columns_include_skipped_features() {
        let file = temp_file(
            ".geojson",
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"PROVINCE": "Rizal", "CAPITAL": "Antipolo"},
                 "geometry": {"type": "Point", "coordinates": [121.2, 14.6]}},
                {"type": "Feature", "properties": {"PROVINCE": "Cavite"},
                 "geometry": {"type": "Polygon", "coordinates": [[[120.5, 14.0], [121.0, 14.0], [121.0, 14.5], [120.5, 14.0]]]}}
            ]}"#,
        );
        let boundaries = load_boundaries(file.path()).unwrap();
        assert_eq!(boundaries.len(), 1);
        assert!(boundaries.has_field("CAPITAL"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = csv_file("x\n");
        assert!(matches!(load_boundaries(file.path()), Err(MapError::UnsupportedFormat(_))));
    }
}
