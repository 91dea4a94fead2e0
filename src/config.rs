use crate::render::FigureSize;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub eda: EdaConfig,
    pub clusters: ClusterConfig,
    #[serde(default)]
    pub insights: InsightsConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub boundaries: PathBuf,        // .shp, .json or .geojson
    pub boundary_key: String,
    pub assets_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EdaConfig {
    pub table: PathBuf,
    pub key_column: String,
    pub maps: Vec<MetricMapConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricMapConfig {
    pub column: String,
    pub title: String,
    pub subheader: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    pub points: PathBuf,
    #[serde(default = "default_longitude")]
    pub longitude_column: String,
    #[serde(default = "default_latitude")]
    pub latitude_column: String,
    #[serde(default = "default_cluster_column")]
    pub label_column: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InsightsConfig {
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub table: PathBuf,
    #[serde(default = "default_cluster_column")]
    pub cluster_column: String,
    pub category_column: Option<String>,
    pub value_column: String,
    pub category_label: Option<String>, // legend title, defaults to the column name
    pub title: String,
    pub y_label: String,
    pub subheader: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(flatten)]
    pub size: FigureSize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

fn default_longitude() -> String {
    "Longitude".to_string()
}

fn default_latitude() -> String {
    "Latitude".to_string()
}

fn default_cluster_column() -> String {
    "clusters".to_string()
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse TOML configuration")
    }

    /// Makes relative input and output paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.input.boundaries);
        resolve(&mut self.input.assets_dir);
        resolve(&mut self.eda.table);
        resolve(&mut self.clusters.points);
        resolve(&mut self.output.dir);
        for chart in &mut self.insights.charts {
            resolve(&mut chart.table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[input]
boundaries = "data/map_data_clean.shp"
boundary_key = "PROVINCE"
assets_dir = "assets"

[eda]
table = "data/df_st_ratio.csv"
key_column = "school.province"

[[eda.maps]]
column = "student_teacher_ratio"
title = "Average Student-Teacher Ratio Per Province"
subheader = "Student-Teacher Ratio"

[clusters]
points = "data/mappingclusters.csv"

[output]
dir = "output"

[server]
port = 3000
"#;

    #[test]
    fn defaults_fill_optional_fields() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.clusters.longitude_column, "Longitude");
        assert_eq!(config.clusters.label_column, "clusters");
        assert!(config.insights.charts.is_empty());
        assert_eq!(config.output.size, FigureSize::default());
    }

    #[test]
    fn relative_paths_follow_config_location() {
        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        config.resolve_paths(Path::new("/srv/atlas"));
        assert_eq!(config.eda.table, PathBuf::from("/srv/atlas/data/df_st_ratio.csv"));
        assert_eq!(config.output.dir, PathBuf::from("/srv/atlas/output"));
    }
}
