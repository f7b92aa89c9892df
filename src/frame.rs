use std::path::Path;

use image::RgbImage;
use ndarray::Array2;
use tracing::info;

use crate::detection::Detection;
use crate::error::Error;

/// Detector output for a single video frame
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub index: usize,
    pub detections: Vec<Detection>,
}

impl Frame {
    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Luma plane as `[[row, col]]`, values in 0..=255
pub fn to_gray(img: &RgbImage) -> Array2<f32> {
    let (w, h) = img.dimensions();

    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        let p = img.get_pixel(x as u32, y as u32).0;
        0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
    })
}

/// All frames of a clip must share the dimensions of the first one
pub fn check_dims(frames: &[RgbImage]) -> Result<(u32, u32), Error> {
    let first = frames.first().ok_or(Error::EmptyVideo)?;
    let expected = first.dimensions();

    for (index, frame) in frames.iter().enumerate().skip(1) {
        let got = frame.dimensions();
        if got != expected {
            return Err(Error::FrameSizeError {
                index,
                expected,
                got,
            });
        }
    }

    Ok(expected)
}

/// Loads every png/jpg file of `dir` in file-name order
pub fn load_frames<P: AsRef<Path>>(dir: P) -> Result<Vec<RgbImage>, Error> {
    let mut paths: Vec<_> = std::fs::read_dir(dir.as_ref())?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("png" | "jpg" | "jpeg")
            )
        })
        .collect();

    paths.sort();

    let frames = paths
        .iter()
        .map(|p| Ok(image::open(p)?.to_rgb8()))
        .collect::<Result<Vec<_>, Error>>()?;

    info!(dir = %dir.as_ref().display(), frames = frames.len(), "loaded frames");

    check_dims(&frames)?;

    Ok(frames)
}
