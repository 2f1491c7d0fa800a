use super::coco::{CategoryEntry, Dataset, DatasetInfo};
use super::writer::{read_dataset, CocoJsonWriter, DatasetWriter};
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const LABELS_FILE: &str = "labels.json";
const FRAMES_DIR: &str = "frames";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub labels_path: PathBuf,
    pub images: usize,
    pub annotations: usize,
    pub categories: usize,
    pub missing_files: usize,
}

struct Source {
    name: String,
    dataset: Dataset,
    frames_dir: PathBuf,
}

fn load_source(path: &Path) -> Result<Source> {
    let labels = path.join(LABELS_FILE);
    let frames_dir = path.join(FRAMES_DIR);
    if !labels.is_file() {
        bail!("{} not found in {}", LABELS_FILE, path.display());
    }
    if !frames_dir.is_dir() {
        bail!("{} directory not found in {}", FRAMES_DIR, path.display());
    }

    let dataset = read_dataset(&labels)
        .with_context(|| format!("Failed to load {}", labels.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    tracing::info!(
        "Loaded dataset {} with {} images",
        name,
        dataset.images.len()
    );
    Ok(Source {
        name,
        dataset,
        frames_dir,
    })
}

/// Unify categories by name. The first dataset keeps its ids; names first
/// seen later get the next id above every id assigned so far.
///
/// Returns one old-id to new-id map per source, plus the merged categories.
fn unify_categories(sources: &[Source]) -> (Vec<HashMap<u64, u64>>, Vec<CategoryEntry>) {
    let mut by_name: HashMap<String, u64> = HashMap::new();
    let mut merged: Vec<CategoryEntry> = Vec::new();
    let mut maps = Vec::with_capacity(sources.len());

    for (index, source) in sources.iter().enumerate() {
        let mut map = HashMap::new();
        for category in &source.dataset.categories {
            let new_id = match by_name.get(&category.name) {
                Some(&id) => id,
                None => {
                    let id = if index == 0 {
                        category.id
                    } else {
                        merged.iter().map(|c| c.id).max().unwrap_or(0) + 1
                    };
                    by_name.insert(category.name.clone(), id);
                    merged.push(CategoryEntry {
                        id,
                        name: category.name.clone(),
                        supercategory: category.supercategory.clone(),
                    });
                    id
                }
            };
            map.insert(category.id, new_id);
        }
        maps.push(map);
    }

    merged.sort_by_key(|c| c.id);
    (maps, merged)
}

/// Merge several `<name>/{labels.json,frames/}` datasets into `output`.
///
/// Image files are copied as `<name>_<file_name>` so frames from different
/// videos cannot collide; image and annotation ids are renumbered from 1.
pub fn merge_datasets<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<MergeSummary> {
    if inputs.is_empty() {
        bail!("No datasets to merge");
    }

    let sources = inputs
        .iter()
        .map(|path| load_source(path.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let output_frames = output.join(FRAMES_DIR);
    fs::create_dir_all(&output_frames)
        .with_context(|| format!("Failed to create {}", output_frames.display()))?;

    let (category_maps, categories) = unify_categories(&sources);
    for category in &categories {
        tracing::info!("  {} -> ID {}", category.name, category.id);
    }

    let mut merged = Dataset {
        info: DatasetInfo::now("Merged COCO dataset"),
        licenses: Vec::new(),
        images: Vec::new(),
        annotations: Vec::new(),
        categories,
    };
    let mut missing_files = 0;

    for (source, category_map) in sources.into_iter().zip(category_maps) {
        let mut image_map = HashMap::new();

        for mut image in source.dataset.images {
            let old_path = source.frames_dir.join(&image.file_name);
            let new_name = format!("{}_{}", source.name, image.file_name);
            let new_path = output_frames.join(&new_name);

            if old_path.is_file() {
                fs::copy(&old_path, &new_path).with_context(|| {
                    format!("Failed to copy {} to {}", old_path.display(), new_path.display())
                })?;
            } else {
                missing_files += 1;
                tracing::warn!("Image file {} not found", old_path.display());
            }

            let new_id = merged.images.len() as u64 + 1;
            image_map.insert(image.id, new_id);
            image.id = new_id;
            image.file_name = new_name;
            merged.images.push(image);
        }

        let annotation_count = source.dataset.annotations.len();
        for mut annotation in source.dataset.annotations {
            let (Some(&image_id), Some(&category_id)) = (
                image_map.get(&annotation.image_id),
                category_map.get(&annotation.category_id),
            ) else {
                tracing::warn!(
                    "Dropping annotation {} from {}: unknown image or category",
                    annotation.id,
                    source.name
                );
                continue;
            };
            annotation.id = merged.annotations.len() as u64 + 1;
            annotation.image_id = image_id;
            annotation.category_id = category_id;
            merged.annotations.push(annotation);
        }

        tracing::info!(
            "Processed {}: {} images and {} annotations",
            source.name,
            image_map.len(),
            annotation_count
        );
    }

    let labels_path = output.join(LABELS_FILE);
    CocoJsonWriter
        .write(&merged, &labels_path)
        .with_context(|| format!("Failed to write {}", labels_path.display()))?;

    Ok(MergeSummary {
        labels_path,
        images: merged.images.len(),
        annotations: merged.annotations.len(),
        categories: merged.categories.len(),
        missing_files,
    })
}
