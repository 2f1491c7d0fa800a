use super::{FrameFile, FrameLookup, FrameSource};
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Zero-padded numeric name the segmentation backend expects for frame files
pub fn frame_file_name(relative_index: usize) -> String {
    format!("{:05}.jpg", relative_index)
}

/// Frames that were written out starting at `start_frame`, all sharing one
/// resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFrames {
    pub start_frame: usize,
    pub file_names: Vec<String>,
    pub width: u32,
    pub height: u32,
}

impl ExtractedFrames {
    /// Names for `count` frames as produced by [`FrameDirectory::extract`]
    pub fn numbered(start_frame: usize, count: usize, width: u32, height: u32) -> Self {
        Self {
            start_frame,
            file_names: (0..count).map(frame_file_name).collect(),
            width,
            height,
        }
    }
}

impl FrameLookup for ExtractedFrames {
    fn frame_file(&self, frame_index: usize) -> Option<FrameFile> {
        let relative = frame_index.checked_sub(self.start_frame)?;
        let file_name = self.file_names.get(relative)?;
        Some(FrameFile {
            file_name: file_name.clone(),
            width: self.width,
            height: self.height,
        })
    }
}

/// A directory of frame images, sorted by file name.
///
/// Index `i` of the directory is absolute frame `start_frame + i`.
pub struct FrameDirectory {
    dir: PathBuf,
    start_frame: usize,
    files: Vec<PathBuf>,
    width: u32,
    height: u32,
}

impl FrameDirectory {
    pub fn open<P: AsRef<Path>>(dir: P, start_frame: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Failed to read frame directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        let (width, height) = match files.first() {
            Some(first) => image::image_dimensions(first)
                .with_context(|| format!("Failed to read dimensions of {}", first.display()))?,
            None => (0, 0),
        };

        tracing::info!(
            "Opened frame directory {} ({} frames, {}x{})",
            dir.display(),
            files.len(),
            width,
            height
        );

        Ok(Self {
            dir,
            start_frame,
            files,
            width,
            height,
        })
    }

    /// Write frames `start_frame..` of `source` into `dir` as `00000.jpg`,
    /// `00001.jpg`, ...; existing images in `dir` are removed first.
    pub fn extract<P: AsRef<Path>>(source: &mut dyn FrameSource, start_frame: usize, dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let total = source.frame_count();
        if start_frame >= total {
            bail!("Start frame {} is past the end of the video ({} frames)", start_frame, total);
        }

        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove stale frame {}", path.display()))?;
            }
        }

        tracing::info!(
            "Extracting frames {}..{} to {}",
            start_frame,
            total,
            dir.display()
        );
        for (relative, frame_index) in (start_frame..total).enumerate() {
            let frame = source
                .frame_at(frame_index)
                .with_context(|| format!("Failed to decode frame {}", frame_index))?;
            let path = dir.join(frame_file_name(relative));
            frame
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        Self::open(dir, start_frame)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    /// Snapshot of the file names and resolution, for export
    pub fn to_extracted(&self) -> ExtractedFrames {
        ExtractedFrames {
            start_frame: self.start_frame,
            file_names: self
                .files
                .iter()
                .filter_map(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
            width: self.width,
            height: self.height,
        }
    }

    fn path_for(&self, frame_index: usize) -> Option<&PathBuf> {
        let relative = frame_index.checked_sub(self.start_frame)?;
        self.files.get(relative)
    }
}

impl FrameSource for FrameDirectory {
    fn frame_at(&mut self, frame_index: usize) -> Result<RgbImage> {
        let path = match self.path_for(frame_index) {
            Some(path) => path,
            None => bail!("Frame {} is not in {}", frame_index, self.dir.display()),
        };

        let decoded = image::open(path)
            .with_context(|| format!("Failed to decode {}", path.display()))?;

        Ok(decoded.to_rgb8())
    }

    fn frame_count(&self) -> usize {
        self.start_frame + self.files.len()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameLookup for FrameDirectory {
    fn frame_file(&self, frame_index: usize) -> Option<FrameFile> {
        let path = self.path_for(frame_index)?;
        Some(FrameFile {
            file_name: path.file_name()?.to_string_lossy().into_owned(),
            width: self.width,
            height: self.height,
        })
    }
}
