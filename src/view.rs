use nalgebra as na;
use tracing::debug;

use crate::config::ViewConfig;
use crate::error::Error;
use crate::math::{in_bounds, perspective_transform, project};
use crate::track::TrackTable;

/// Maps camera-compensated pixel positions onto pitch meters through a fixed
/// homography, computed once from the calibration corners.
#[derive(Debug, Clone)]
pub struct ViewTransformer {
    bounds: Vec<na::Point2<f32>>,
    homography: na::Matrix3<f64>,
}

impl ViewTransformer {
    pub fn new(config: &ViewConfig) -> Result<Self, Error> {
        let to_f64 = |v: &[f32; 2]| na::Point2::new(v[0] as f64, v[1] as f64);

        let src = config.pixel_vertices.map(|v| to_f64(&v));
        let dst = config.target_vertices().map(|v| to_f64(&v));

        let homography = perspective_transform(&src, &dst).ok_or_else(|| {
            Error::CalibrationError(format!(
                "degenerate pixel vertices {:?}",
                config.pixel_vertices
            ))
        })?;

        Ok(Self {
            bounds: config
                .pixel_vertices
                .iter()
                .map(|v| na::Point2::new(v[0], v[1]))
                .collect(),
            homography,
        })
    }

    /// `None` outside the calibrated quadrilateral
    pub fn transform(&self, p: na::Point2<f32>) -> Option<na::Point2<f32>> {
        if !in_bounds(p, &self.bounds) {
            return None;
        }

        let t = project(&self.homography, na::Point2::new(p.x as f64, p.y as f64))?;

        Some(na::Point2::new(t.x as f32, t.y as f32))
    }

    pub fn transform_tracks(&self, table: &mut TrackTable) {
        let mut outside = 0usize;

        for (_, _, records) in table.iter_mut() {
            for record in records.values_mut() {
                record.position_transformed =
                    record.position_adjusted.and_then(|p| self.transform(p));

                if record.position_transformed.is_none() {
                    outside += 1;
                }
            }
        }

        debug!(outside, "transformed positions");
    }
}
