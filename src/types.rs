use crate::error::{MapError, Result};
use geo::{MultiPolygon, Point};
use std::collections::HashMap;
use std::fmt;

/// One boundary feature: its geometry plus the attribute table row.
#[derive(Debug, Clone)]
pub struct Region {
    pub geometry: MultiPolygon<f64>,
    pub attributes: HashMap<String, String>,
}

/// Region polygons read from a boundary file, e.g. provinces.
#[derive(Debug, Clone, Default)]
pub struct RegionBoundary {
    /// Attribute columns present in the source file.
    pub fields: Vec<String>,
    pub regions: Vec<Region>,
}

impl RegionBoundary {
    pub fn new(fields: Vec<String>, regions: Vec<Region>) -> Self {
        Self { fields, regions }
    }

    /// Builds a boundary set with a single name column.
    pub fn from_named<I, S>(key: &str, named: I) -> Self
    where
        I: IntoIterator<Item = (S, MultiPolygon<f64>)>,
        S: Into<String>,
    {
        let regions = named
            .into_iter()
            .map(|(name, geometry)| Region {
                geometry,
                attributes: HashMap::from([(key.to_string(), name.into())]),
            })
            .collect();
        Self::new(vec![key.to_string()], regions)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// A header plus text rows, as read from a metric CSV.
#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MetricTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Two-column table of (region name, value).
    pub fn from_pairs<S: Into<String>>(key: &str, value: &str, pairs: Vec<(S, f64)>) -> Self {
        let rows = pairs
            .into_iter()
            .map(|(name, v)| vec![name.into(), v.to_string()])
            .collect();
        Self::new(vec![key.to_string(), value.to_string()], rows)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A matched region: geometry from the boundary side, cells from the metric side.
#[derive(Debug, Clone)]
pub struct JoinedRow {
    pub region_name: String,
    pub geometry: MultiPolygon<f64>,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct JoinedRegionMetric {
    /// Metric table columns, indexing `JoinedRow::cells`.
    pub columns: Vec<String>,
    pub rows: Vec<JoinedRow>,
}

impl JoinedRegionMetric {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn region_names(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.region_name.as_str()).collect()
    }

    /// Parses `column` of every row as a finite number.
    pub fn values(&self, column: &str) -> Result<Vec<f64>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| MapError::schema("joined table", column))?;

        self.rows
            .iter()
            .map(|row| {
                let raw = row.cells.get(idx).map(|s| s.trim()).unwrap_or("");
                match raw.parse::<f64>() {
                    Ok(v) if v.is_finite() => Ok(v),
                    _ => Err(MapError::Value(format!(
                        "'{}' for region '{}' in column '{}' is not a finite number",
                        raw, row.region_name, column
                    ))),
                }
            })
            .collect()
    }
}

/// A school location tagged with its cluster label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRecord {
    pub longitude: f64,
    pub latitude: f64,
    pub cluster_label: i64,
}

impl PointRecord {
    pub fn new(longitude: f64, latitude: f64, cluster_label: i64) -> Self {
        Self {
            longitude,
            latitude,
            cluster_label,
        }
    }

    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// A validated cluster identifier in {0, 1, 2}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(u8);

impl ClusterId {
    pub const COUNT: usize = 3;

    pub fn all() -> impl Iterator<Item = ClusterId> {
        (0..Self::COUNT as u8).map(ClusterId)
    }

    pub fn new(id: i64) -> Result<Self> {
        if (0..Self::COUNT as i64).contains(&id) {
            Ok(Self(id as u8))
        } else {
            Err(MapError::Range {
                what: "cluster id",
                value: id.to_string(),
                expected: format!("0..={}", Self::COUNT - 1),
            })
        }
    }

    /// From the 1-indexed number shown to readers.
    pub fn from_display_number(n: i64) -> Result<Self> {
        let out_of_range = || MapError::Range {
            what: "cluster number",
            value: n.to_string(),
            expected: format!("1..={}", Self::COUNT),
        };
        let index = n.checked_sub(1).ok_or_else(out_of_range)?;
        Self::new(index).map_err(|_| out_of_range())
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn label(self) -> i64 {
        self.0 as i64
    }

    pub fn display_number(self) -> u8 {
        self.0 + 1
    }
}

impl Default for ClusterId {
    fn default() -> Self {
        Self(0)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cluster {}", self.display_number())
    }
}

/// (cluster, category, count) rows backing the insight bar charts.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub cluster: i64,
    pub category: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryCountTable {
    pub category_label: Option<String>,
    pub rows: Vec<CategoryCount>,
}
