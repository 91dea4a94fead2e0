pub mod assets;
pub mod charts;
pub mod choropleth;
pub mod clusters;
pub mod config;
pub mod data;
pub mod error;
pub mod join;
pub mod pages;
pub mod palette;
pub mod render;
pub mod server;
pub mod types;

pub use error::{MapError, Result};
