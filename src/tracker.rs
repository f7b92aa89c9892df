use image::RgbImage;
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::detection::{Detection, ObjectClass};
use crate::detector::Detector;
use crate::error::Error;
use crate::frame::Frame;
use crate::track::{TrackRecord, TrackTable, BALL_ID};

pub struct TrackBuilder {
    config: TrackerConfig,
}

impl TrackBuilder {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }

    /// Runs the detector over the whole clip and fills the track table, with ball gaps
    /// interpolated.
    pub fn build(
        &self,
        frames: &[RgbImage],
        detector: &mut dyn Detector,
    ) -> Result<TrackTable, Error> {
        let mut table = TrackTable::with_frames(frames.len());
        let batch = self.config.detect_batch_size.max(1);

        for (chunk_idx, chunk) in frames.chunks(batch).enumerate() {
            let first_index = chunk_idx * batch;
            let detected = detector.detect(chunk, first_index)?;

            if detected.len() != chunk.len() {
                return Err(Error::DetectorError(format!(
                    "detector returned {} frames for a batch of {}",
                    detected.len(),
                    chunk.len()
                )));
            }

            for (offset, frame) in detected.iter().enumerate() {
                if frame.index != first_index + offset {
                    return Err(Error::DetectorError(format!(
                        "detector returned frame {} at clip index {}",
                        frame.index,
                        first_index + offset
                    )));
                }

                self.add_frame(&mut table, frame);
            }
        }

        let filled = self.interpolate_ball(&mut table);

        info!(
            frames = table.len(),
            interpolated_ball = filled,
            "built tracks"
        );

        Ok(table)
    }

    fn add_frame(&self, table: &mut TrackTable, frame: &Frame) {
        let mut ball: Option<&Detection> = None;

        for det in frame.iter() {
            if det.confidence < self.config.min_confidence {
                continue;
            }

            let class = match self.config.class_map.get(&det.label) {
                Some(class) => *class,
                None => {
                    debug!(frame = frame.index, label = %det.label, "dropping unmapped detection");
                    continue;
                }
            };

            match class {
                ObjectClass::Ball => {
                    if ball.map_or(true, |b| det.confidence > b.confidence) {
                        ball = Some(det);
                    }
                }
                _ => {
                    let record = TrackRecord::new(class, det.ltrb(), det.confidence);
                    table.insert(class, frame.index, det.track_id, record);
                }
            }
        }

        if let Some(det) = ball {
            let record = TrackRecord::new(ObjectClass::Ball, det.ltrb(), det.confidence);
            table.insert(ObjectClass::Ball, frame.index, BALL_ID, record);
        }
    }

    /// Linearly fills ball gaps bounded on both sides by a detection. Leading and
    /// trailing gaps are left empty. Returns the number of filled frames.
    pub fn interpolate_ball(&self, table: &mut TrackTable) -> usize {
        let known: Vec<(usize, TrackRecord)> = table
            .class(ObjectClass::Ball)
            .iter()
            .enumerate()
            .filter_map(|(idx, f)| f.get(&BALL_ID).map(|r| (idx, r.clone())))
            .collect();

        let mut filled = 0;

        for pair in known.windows(2) {
            let (start, from) = (pair[0].0, &pair[0].1);
            let (end, to) = (pair[1].0, &pair[1].1);
            let gap = end - start - 1;

            if gap == 0 {
                continue;
            }

            if let Some(max_gap) = self.config.max_ball_gap {
                if gap > max_gap {
                    debug!(start, end, gap, "ball gap too long to interpolate");
                    continue;
                }
            }

            for idx in start + 1..end {
                let factor = (idx - start) as f32 / (end - start) as f32;
                let bbox = from.bbox.lerp(&to.bbox, factor);
                let confidence = crate::math::lerp(from.confidence, to.confidence, factor);

                let mut record = TrackRecord::new(ObjectClass::Ball, bbox, confidence);
                record.interpolated = true;

                table.insert(ObjectClass::Ball, idx, BALL_ID, record);
                filled += 1;
            }
        }

        filled
    }
}
