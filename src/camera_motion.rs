use image::RgbImage;
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CameraConfig;
use crate::error::Error;
use crate::flow::{self, CornerParams, FlowParams};
use crate::frame;

/// Per-frame camera displacement relative to the previous frame, in px.
///
/// The displacement is the image motion of the static background, so subtracting
/// the cumulative value from a position removes the camera pan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CameraMovement {
    per_frame: Vec<na::Vector2<f32>>,
}

impl CameraMovement {
    /// Frame 0 is forced to zero
    pub fn new(mut per_frame: Vec<na::Vector2<f32>>) -> Self {
        if let Some(first) = per_frame.first_mut() {
            *first = na::Vector2::zeros();
        }

        Self { per_frame }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.per_frame.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.per_frame.is_empty()
    }

    #[inline]
    pub fn per_frame(&self) -> &[na::Vector2<f32>] {
        &self.per_frame
    }

    /// Offset of every frame from frame 0
    pub fn cumulative(&self) -> Vec<na::Vector2<f32>> {
        self.per_frame
            .iter()
            .scan(na::Vector2::zeros(), |acc, d| {
                *acc += d;
                Some(*acc)
            })
            .collect()
    }
}

pub struct CameraMotionEstimator {
    config: CameraConfig,
}

impl CameraMotionEstimator {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    #[inline]
    fn in_mask(&self, x: usize) -> bool {
        self.config
            .mask_columns
            .iter()
            .any(|&(from, to)| x >= from as usize && x < to as usize)
    }

    fn corner_params(&self) -> CornerParams {
        CornerParams {
            max_corners: self.config.max_corners,
            quality_level: self.config.quality_level,
            min_distance: self.config.min_distance,
            block_size: self.config.block_size,
        }
    }

    fn flow_params(&self) -> FlowParams {
        FlowParams {
            win_size: self.config.win_size,
            max_level: self.config.max_level,
            max_iterations: self.config.max_iterations,
            epsilon: self.config.epsilon,
        }
    }

    /// Background features of a frame, re-selected for every frame pair
    pub fn features(&self, gray: &ndarray::Array2<f32>) -> Vec<na::Point2<f32>> {
        flow::good_features(gray, &self.corner_params(), |x, _| self.in_mask(x))
    }

    /// Largest tracked feature motion between two frames, zero when it does not
    /// exceed the noise threshold
    pub fn displacement(
        &self,
        prev: &ndarray::Array2<f32>,
        next: &ndarray::Array2<f32>,
        features: &[na::Point2<f32>],
    ) -> na::Vector2<f32> {
        let tracked = flow::track(prev, next, features, &self.flow_params());

        let best = features
            .iter()
            .zip(tracked)
            .filter_map(|(old, new)| Some(new? - *old))
            .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()));

        match best {
            Some(d) if d.norm() > self.config.min_displacement => d,
            _ => na::Vector2::zeros(),
        }
    }

    pub fn estimate(&self, frames: &[RgbImage]) -> Result<CameraMovement, Error> {
        frame::check_dims(frames)?;

        let mut per_frame = vec![na::Vector2::zeros(); frames.len()];
        let mut prev = frame::to_gray(&frames[0]);
        let mut features = self.features(&prev);
        let mut moving = 0;

        for (idx, img) in frames.iter().enumerate().skip(1) {
            let next = frame::to_gray(img);

            if !features.is_empty() {
                per_frame[idx] = self.displacement(&prev, &next, &features);
            }

            if per_frame[idx] != na::Vector2::zeros() {
                moving += 1;
                debug!(frame = idx, dx = per_frame[idx].x, dy = per_frame[idx].y, "camera moved");
            }

            features = self.features(&next);
            prev = next;
        }

        info!(frames = frames.len(), moving, "estimated camera movement");

        Ok(CameraMovement::new(per_frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rgb(plane: &ndarray::Array2<f32>) -> RgbImage {
        let (h, w) = plane.dim();

        RgbImage::from_fn(w as u32, h as u32, |x, y| {
            let v = plane[[y as usize, x as usize]].round().clamp(0.0, 255.0) as u8;
            image::Rgb([v, v, v])
        })
    }

    fn config() -> CameraConfig {
        CameraConfig {
            mask_columns: vec![(40, 90)],
            ..Default::default()
        }
    }

    #[test]
    fn test_static_video_has_zero_motion() {
        let img = rgb(&flow::tests::texture(128, 96, 0.0, 0.0));
        let frames = vec![img.clone(), img.clone(), img];

        let movement = CameraMotionEstimator::new(config()).estimate(&frames).unwrap();

        assert_eq!(movement.len(), 3);
        for d in movement.per_frame() {
            assert_eq!(*d, na::Vector2::zeros());
        }
        assert_eq!(movement.cumulative()[0], na::Vector2::zeros());
    }

    #[test]
    fn test_pan_is_detected() {
        let frames = vec![
            rgb(&flow::tests::texture(128, 96, 0.0, 0.0)),
            rgb(&flow::tests::texture(128, 96, 8.0, 0.0)),
            rgb(&flow::tests::texture(128, 96, 8.0, 0.0)),
        ];

        let movement = CameraMotionEstimator::new(config()).estimate(&frames).unwrap();
        let d = movement.per_frame();

        assert_eq!(d[0], na::Vector2::zeros());
        assert_abs_diff_eq!(d[1].x, 8.0, epsilon = 1.0);
        assert_abs_diff_eq!(d[1].y, 0.0, epsilon = 1.0);
        assert_eq!(d[2], na::Vector2::zeros());

        let cumulative = movement.cumulative();
        assert_abs_diff_eq!(cumulative[2].x, d[1].x);
    }

    #[test]
    fn test_largest_motion_wins() {
        // Left half of the background moves 8px, right half 6px
        let split = |left: f32, right: f32| {
            let (a, b) = (
                flow::tests::texture(256, 96, left, 0.0),
                flow::tests::texture(256, 96, right, 0.0),
            );

            ndarray::Array2::from_shape_fn((96, 256), |(y, x)| {
                if x < 128 {
                    a[[y, x]]
                } else {
                    b[[y, x]]
                }
            })
        };

        let frames = vec![rgb(&split(0.0, 0.0)), rgb(&split(8.0, 6.0))];
        let config = CameraConfig {
            mask_columns: vec![(20, 70), (180, 230)],
            ..Default::default()
        };

        let movement = CameraMotionEstimator::new(config).estimate(&frames).unwrap();
        let d = movement.per_frame()[1];

        assert_abs_diff_eq!(d.x, 8.0, epsilon = 0.5);
        assert_abs_diff_eq!(d.y, 0.0, epsilon = 0.5);
    }

    #[test]
    fn test_sub_threshold_motion_is_zero() {
        let frames = vec![
            rgb(&flow::tests::texture(128, 96, 0.0, 0.0)),
            rgb(&flow::tests::texture(128, 96, 2.0, 1.0)),
        ];

        let movement = CameraMotionEstimator::new(config()).estimate(&frames).unwrap();

        assert_eq!(movement.per_frame()[1], na::Vector2::zeros());
    }

    #[test]
    fn test_first_frame_forced_zero() {
        let movement = CameraMovement::new(vec![
            na::Vector2::new(3.0, 4.0),
            na::Vector2::new(1.0, 1.0),
        ]);

        assert_eq!(movement.per_frame()[0], na::Vector2::zeros());
        assert_eq!(movement.cumulative()[1], na::Vector2::new(1.0, 1.0));
    }
}
