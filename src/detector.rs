use std::io::BufRead;
use std::path::Path;

use image::RgbImage;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;

/// Source of per-frame detections with persistent track ids.
///
/// Identity assignment across calls is the detector's job; frames are handed over
/// in batches, `first_index` being the clip index of `frames[0]`. The returned
/// frames are in input order and carry clip indices, `first_index + i` for `frames[i]`.
pub trait Detector {
    fn detect(&mut self, frames: &[RgbImage], first_index: usize) -> Result<Vec<Frame>, Error>;

    /// Identifies the detections this detector produces, used as part of cache keys
    fn fingerprint(&self) -> String;
}

/// Replays detections dumped one frame per line as `<index>: [<detection>, ...]`
pub struct DetectionsFile {
    frames: Vec<Vec<Detection>>,
    fingerprint: String,
}

impl DetectionsFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            Error::DetectorError(format!("{}: {}", path.as_ref().display(), e))
        })?;

        let mut frames = Vec::new();
        let mut hasher = Sha256::new();

        for (lineno, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            hasher.update(line.as_bytes());

            if line.trim().is_empty() {
                continue;
            }

            let (index, vector) = match line.find(':') {
                Some(idx) => {
                    let (index, vector) = line.split_at(idx);
                    (index.trim(), &vector[1..])
                }
                None => {
                    return Err(Error::DetectorError(format!(
                        "line {}: missing frame index",
                        lineno + 1
                    )))
                }
            };

            let index: usize = index.parse().map_err(|_| {
                Error::DetectorError(format!("line {}: bad frame index {:?}", lineno + 1, index))
            })?;

            if index >= frames.len() {
                frames.resize_with(index + 1, Vec::new);
            }

            frames[index] = serde_json::from_str(vector)?;
        }

        info!(path = %path.as_ref().display(), frames = frames.len(), "loaded detections");

        Ok(Self {
            frames,
            fingerprint: format!("{:x}", hasher.finalize()),
        })
    }

    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        let mut hasher = Sha256::new();
        for dets in &frames {
            // Vec<Detection> always serializes
            hasher.update(serde_json::to_vec(dets).unwrap_or_default());
        }

        Self {
            frames,
            fingerprint: format!("{:x}", hasher.finalize()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for DetectionsFile {
    fn detect(&mut self, frames: &[RgbImage], first_index: usize) -> Result<Vec<Frame>, Error> {
        let last = first_index + frames.len();

        if last > self.frames.len() {
            return Err(Error::DetectorError(format!(
                "detections cover {} frames, video has at least {}",
                self.frames.len(),
                last
            )));
        }

        Ok((first_index..last)
            .map(|index| Frame {
                index,
                detections: self.frames[index].clone(),
            })
            .collect())
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_dump() {
        let path = std::env::temp_dir()
            .join(format!("pitchtrack-dets-{}.dets", std::process::id()));
        {
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(
                f,
                r#"0: [{{"x":5.0, "y":5.0, "w":2.0, "h":2.0, "p":0.8, "c":"ball", "id":3}}]"#
            )
            .unwrap();
            writeln!(f, "1: []").unwrap();
            writeln!(
                f,
                r#"3: [{{"x":1.0, "y":2.0, "w":3.0, "h":4.0, "p":0.5, "c":"player", "id":9}}]"#
            )
            .unwrap();
        }

        let mut dets = DetectionsFile::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(dets.len(), 4);

        let frames = vec![RgbImage::new(1, 1); 4];
        let out = dets.detect(&frames, 0).unwrap();

        assert_eq!(out[0].len(), 1);
        assert_eq!(out[0].detections[0].label, "ball");
        assert_eq!(out[0].detections[0].track_id, 3);
        assert!(out[1].is_empty());
        assert!(out[2].is_empty());
        assert_eq!(out[3].index, 3);
        assert_eq!(out[3].detections[0].track_id, 9);

        assert!(dets.detect(&frames, 1).is_err());
    }

    #[test]
    fn test_missing_file_is_detector_error() {
        let res = DetectionsFile::open("/nonexistent/pitchtrack.dets");

        assert!(matches!(res, Err(Error::DetectorError(_))));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = DetectionsFile::from_frames(vec![vec![]]);
        let b = DetectionsFile::from_frames(vec![vec![], vec![]]);

        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), DetectionsFile::from_frames(vec![vec![]]).fingerprint());
    }
}
