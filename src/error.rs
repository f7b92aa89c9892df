use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config Error: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Image Error: {0}")]
    ImageError(#[from] image::ImageError),

    #[cfg(feature = "video")]
    #[error("OpenCV Error: {0}")]
    OpenCvError(#[from] opencv::Error),

    #[error("Detector Error: {0}")]
    DetectorError(String),

    #[error("Calibration Error: {0}")]
    CalibrationError(String),

    #[error("Team Model Error: {0}")]
    TeamModelError(String),

    #[error("Frame {index} has size {got:?}, expected {expected:?}")]
    FrameSizeError {
        index: usize,
        expected: (u32, u32),
        got: (u32, u32),
    },

    #[error("Frame count mismatch: tracks cover {tracks} frames, camera movement {movement}")]
    FrameCountError { tracks: usize, movement: usize },

    #[error("Video contains no frames")]
    EmptyVideo,
}
