use crate::error::{MapError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// A precomputed illustration shipped with the dashboard.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub image: DynamicImage,
}

pub fn asset_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

/// Decodes `dir/name`; the file is only open for the duration of the call.
pub fn load_asset(dir: &Path, name: &str) -> Result<Asset> {
    let path = asset_path(dir, name);
    if !path.is_file() {
        return Err(MapError::Io {
            path,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "asset not found"),
        });
    }
    let image = image::open(&path)?;
    Ok(Asset {
        name: name.to_string(),
        image,
    })
}
