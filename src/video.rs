use std::path::Path;

use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_FPS},
};
use tracing::info;

use crate::error::Error;

/// Decoded clip, frames in RGB
pub struct Video {
    pub frames: Vec<RgbImage>,
    pub frame_rate: f64,
}

fn mat_to_rgb(mat: &Mat) -> Result<RgbImage, Error> {
    let (rows, cols) = (mat.rows(), mat.cols());

    let mut rgb = Mat::default();
    imgproc::cvt_color(mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

    let data = rgb.data_bytes()?;

    RgbImage::from_raw(cols as u32, rows as u32, data.to_vec()).ok_or(Error::FrameSizeError {
        index: 0,
        expected: (cols as u32, rows as u32),
        got: (0, 0),
    })
}

pub fn read_video<P: AsRef<Path>>(path: P) -> Result<Video, Error> {
    let path = path.as_ref();
    let mut cap = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;

    if !cap.is_opened()? {
        return Err(Error::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("cannot open video {}", path.display()),
        )));
    }

    let frame_rate = cap.get(CAP_PROP_FPS)?;
    let mut frames = Vec::new();
    let mut mat = Mat::default();

    while cap.read(&mut mat)? {
        if mat.empty() {
            break;
        }

        frames.push(mat_to_rgb(&mat)?);
    }

    if frames.is_empty() {
        return Err(Error::EmptyVideo);
    }

    info!(path = %path.display(), frames = frames.len(), frame_rate, "decoded video");

    Ok(Video { frames, frame_rate })
}
