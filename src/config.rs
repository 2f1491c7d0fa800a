use crate::model::{Color, DEFAULT_PALETTE};

/// Tunables for an annotation session and its export
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Logits strictly above this value count as foreground
    pub mask_threshold: f32,
    /// Written to the dataset's `info.description`
    pub dataset_name: String,
    /// Supercategory given to every exported category
    pub supercategory: String,
    /// Display colours handed out to objects in id order
    pub palette: Vec<Color>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mask_threshold: 0.0,
            dataset_name: "annotations".to_string(),
            supercategory: "object".to_string(),
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl SessionConfig {
    /// Default configuration named after the video being annotated
    pub fn for_video(video_path: &str) -> Self {
        let stem = std::path::Path::new(video_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| video_path.to_string());
        Self {
            dataset_name: format!("{}_annotations", stem),
            ..Self::default()
        }
    }
}
