use super::coco::Dataset;
use crate::error::Result;
use std::fs;
use std::path::Path;

/// Trait for dataset output formats
pub trait DatasetWriter {
    /// Write `dataset` to `path`, creating parent directories as needed
    fn write(&self, dataset: &Dataset, path: &Path) -> Result<()>;
}

/// Pretty-printed COCO JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct CocoJsonWriter;

impl DatasetWriter for CocoJsonWriter {
    fn write(&self, dataset: &Dataset, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(dataset)?;
        fs::write(path, json)?;

        tracing::info!("Dataset exported to {}", path.display());
        Ok(())
    }
}

/// Read a COCO JSON file
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
