//! Frame and detection inputs.

use std::path::{Path, PathBuf};

use visage_analysis_model::{parse_detections, DetectionIndex, VideoInfo};
use visage_common::{VisageError, VisageResult};
use visage_processing_core::VideoFrame;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// A directory of still frames, read lazily in filename order.
#[derive(Debug)]
pub struct FrameSource {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    fps: f64,
    width: u32,
    height: u32,
}

impl FrameSource {
    /// List the frames in `dir` and read the size of the first one.
    pub fn open(dir: &Path, fps: f64) -> anyhow::Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("Frame directory not found: {}", dir.display());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| anyhow::anyhow!("No frame images in {}", dir.display()))?;
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", first.display()))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            paths,
            fps,
            width,
            height,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn video_info(&self) -> VideoInfo {
        let name = self
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dir.display().to_string());
        VideoInfo::new(name, self.paths.len() as u64, self.fps, self.width, self.height)
    }

    /// Decode frames one at a time, indexed from zero.
    pub fn frames(&self) -> impl Iterator<Item = anyhow::Result<VideoFrame>> + '_ {
        self.paths.iter().enumerate().map(|(index, path)| {
            let image = image::open(path)
                .map_err(|e| anyhow::anyhow!("Failed to decode {}: {e}", path.display()))?
                .to_rgb8();
            Ok(VideoFrame::new(index as u64, image))
        })
    }

    /// Like [`frames`](Self::frames), logging and skipping undecodable files.
    pub fn decodable_frames(&self) -> impl Iterator<Item = VideoFrame> + '_ {
        self.frames().filter_map(|frame| match frame {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping frame");
                None
            }
        })
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            FRAME_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Load a detections sidecar; no path means no faces anywhere.
pub fn load_detections(path: Option<&Path>) -> VisageResult<DetectionIndex> {
    let Some(path) = path else {
        return Ok(DetectionIndex::default());
    };
    if !path.exists() {
        return Err(VisageError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let detections = parse_detections(&content)
        .map_err(|e| VisageError::detections(format!("{}: {e}", path.display())))?;
    Ok(DetectionIndex::new(detections))
}
