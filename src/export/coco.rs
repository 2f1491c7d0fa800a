//! COCO instance-segmentation JSON layout.
//!
//! Unknown fields on images and annotations are kept in `extra` so datasets
//! written by other tools survive a load/save cycle.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetInfo {
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date_created: String,
}

impl DatasetInfo {
    pub fn now(description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            year: now.year(),
            version: "1.0".to_string(),
            description: description.into(),
            date_created: now.to_rfc3339(),
        }
    }
}

impl Default for DatasetInfo {
    fn default() -> Self {
        Self::now("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageEntry {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryEntry {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub supercategory: String,
}

/// Uncompressed counts or the compressed string form other tools emit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RleCounts {
    Uncompressed(Vec<u64>),
    Compressed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Segmentation {
    /// `size` is `[height, width]`
    Rle { size: [u32; 2], counts: RleCounts },
    Polygons(Vec<Vec<f64>>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotationEntry {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    /// `[x, y, width, height]`
    pub bbox: [f64; 4],
    pub area: f64,
    #[serde(default)]
    pub segmentation: Option<Segmentation>,
    #[serde(default)]
    pub iscrowd: u8,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    #[serde(default)]
    pub info: DatasetInfo,
    #[serde(default)]
    pub licenses: Vec<Value>,
    pub images: Vec<ImageEntry>,
    pub annotations: Vec<AnnotationEntry>,
    pub categories: Vec<CategoryEntry>,
}

impl Dataset {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            info: DatasetInfo::now(description),
            licenses: Vec::new(),
            images: Vec::new(),
            annotations: Vec::new(),
            categories: Vec::new(),
        }
    }

    pub fn category_name(&self, category_id: u64) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == category_id)
            .map(|c| c.name.as_str())
    }

    /// Annotation count per category name, in category order
    pub fn annotations_per_category(&self) -> Vec<(String, usize)> {
        self.categories
            .iter()
            .map(|category| {
                let count = self
                    .annotations
                    .iter()
                    .filter(|a| a.category_id == category.id)
                    .count();
                (category.name.clone(), count)
            })
            .collect()
    }
}
