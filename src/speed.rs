use std::collections::{BTreeMap, HashMap};

use nalgebra as na;
use tracing::debug;

use crate::config::SpeedConfig;
use crate::detection::{ObjectClass, TrackId};
use crate::track::TrackTable;

const MPS_TO_KMH: f32 = 3.6;

struct Span {
    first: (usize, na::Point2<f32>),
    last: (usize, na::Point2<f32>),
}

/// Player speed and covered distance over fixed frame windows of pitch positions
pub struct SpeedEstimator {
    window: usize,
    frame_rate: f32,
}

impl SpeedEstimator {
    pub fn new(config: &SpeedConfig) -> Self {
        Self {
            window: config.frame_window,
            frame_rate: config.frame_rate,
        }
    }

    pub fn estimate(&self, table: &mut TrackTable) {
        let num_frames = table.len();
        if num_frames < 2 || self.window == 0 || self.frame_rate <= 0.0 {
            return;
        }

        let frames = table.class_mut(ObjectClass::Player);
        let mut totals: HashMap<TrackId, f32> = HashMap::new();
        let mut start = 0;

        while start < num_frames - 1 {
            let end = (start + self.window).min(num_frames - 1);

            let mut spans: BTreeMap<TrackId, Span> = BTreeMap::new();
            for (idx, records) in frames[start..=end].iter().enumerate() {
                for (id, record) in records {
                    if let Some(p) = record.position_transformed {
                        let at = (start + idx, p);

                        spans
                            .entry(*id)
                            .and_modify(|s| s.last = at)
                            .or_insert(Span { first: at, last: at });
                    }
                }
            }

            let mut measured: HashMap<TrackId, (f32, f32)> = HashMap::new();
            for (id, span) in spans {
                if span.last.0 == span.first.0 {
                    continue;
                }

                let distance = na::distance(&span.first.1, &span.last.1);
                let elapsed = (span.last.0 - span.first.0) as f32 / self.frame_rate;

                let total = totals.entry(id).or_insert(0.0);
                *total += distance;

                measured.insert(id, (distance / elapsed * MPS_TO_KMH, *total));
            }

            debug!(start, end, players = measured.len(), "speed window");

            // The end frame belongs to the next window, except for the very last one
            let last = if end == num_frames - 1 { end } else { end - 1 };

            for records in &mut frames[start..=last] {
                for (id, record) in records.iter_mut() {
                    if record.position_transformed.is_none() {
                        continue;
                    }

                    if let Some((speed, distance)) = measured.get(id) {
                        record.speed = Some(*speed);
                        record.distance = Some(*distance);
                    }
                }
            }

            start = end;
        }
    }
}
