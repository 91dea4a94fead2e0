//! Error types shared by the loaders and renderers.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    /// An expected column or key is absent from a table.
    #[error("Column '{column}' not found in {table}")]
    Schema { table: String, column: String },

    /// Empty, non-numeric or otherwise unusable values.
    #[error("Invalid values: {0}")]
    Value(String),

    /// A selection outside its enumerated set.
    #[error("{what} {value} is out of range (expected {expected})")]
    Range {
        what: &'static str,
        value: String,
        expected: String,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported geometry format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Shapefile error in {path}: {source}")]
    Shapefile {
        path: PathBuf,
        #[source]
        source: shapefile::Error,
    },

    #[error("GeoJSON error in {path}: {source}")]
    GeoJson {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MapError {
    pub fn schema(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            column: column.into(),
        }
    }

    /// True for the missing/corrupt input family (file access and decoding).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::UnsupportedFormat(_)
                | Self::InvalidGeometry(_)
                | Self::Csv { .. }
                | Self::Shapefile { .. }
                | Self::GeoJson { .. }
                | Self::Image(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
