use std::time::Instant;

use image::RgbImage;
use serde_derive::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{digest_frames, Cache, CacheKey, CacheLookup};
use crate::camera_motion::{CameraMotionEstimator, CameraMovement};
use crate::compensation::adjust_positions;
use crate::config::Config;
use crate::detection::ObjectClass;
use crate::detector::Detector;
use crate::error::Error;
use crate::frame::check_dims;
use crate::possession::{BallAssigner, BallControl};
use crate::speed::SpeedEstimator;
use crate::team::TeamAssigner;
use crate::track::TrackTable;
use crate::tracker::TrackBuilder;
use crate::view::ViewTransformer;

const TRACKS: &str = "tracks";
const CAMERA: &str = "camera";

/// Everything a renderer needs to annotate the clip
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Analysis {
    pub tracks: TrackTable,
    pub camera_movement: CameraMovement,
    pub ball_control: BallControl,
}

pub struct Pipeline {
    config: Config,
    cache: Option<Cache>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    /// Reuses the track table and camera movement of a previous run on identical input
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn run(&self, frames: &[RgbImage], detector: &mut dyn Detector) -> Result<Analysis, Error> {
        let (width, height) = check_dims(frames)?;
        info!(frames = frames.len(), width, height, "analysis started");

        let view = ViewTransformer::new(&self.config.view)?;
        let digest = self.cache.as_ref().map(|_| digest_frames(frames));

        let fingerprint = detector.fingerprint();

        let now = Instant::now();
        let mut tracks = self.cached(TRACKS, digest.as_deref(), &fingerprint, || {
            TrackBuilder::new(self.config.tracker.clone()).build(frames, detector)
        })?;
        info!(stage = TRACKS, elapsed = ?now.elapsed(), "stage done");

        let now = Instant::now();
        let camera_movement = self.cached(CAMERA, digest.as_deref(), "", || {
            CameraMotionEstimator::new(self.config.camera.clone()).estimate(frames)
        })?;
        info!(stage = CAMERA, elapsed = ?now.elapsed(), "stage done");

        let now = Instant::now();
        adjust_positions(&mut tracks, &camera_movement)?;
        view.transform_tracks(&mut tracks);
        info!(stage = "positions", elapsed = ?now.elapsed(), "stage done");

        let now = Instant::now();
        let first = tracks.frame(ObjectClass::Player, 0).cloned().unwrap_or_default();
        match TeamAssigner::fit(&frames[0], &first, self.config.team.clone()) {
            Ok(mut assigner) => assigner.assign_tracks(frames, &mut tracks),
            Err(Error::TeamModelError(reason)) => {
                warn!(%reason, "teams left unassigned");
            }
            Err(err) => return Err(err),
        }
        info!(stage = "teams", elapsed = ?now.elapsed(), "stage done");

        let now = Instant::now();
        let ball_control = BallAssigner::new(&self.config.possession).assign_tracks(&mut tracks);
        info!(
            stage = "possession",
            elapsed = ?now.elapsed(),
            share = ?ball_control.share(),
            "stage done"
        );

        let now = Instant::now();
        SpeedEstimator::new(&self.config.speed).estimate(&mut tracks);
        info!(stage = "speed", elapsed = ?now.elapsed(), "stage done");

        Ok(Analysis {
            tracks,
            camera_movement,
            ball_control,
        })
    }

    fn cached<T, F>(
        &self,
        kind: &str,
        digest: Option<&str>,
        salt: &str,
        compute: F,
    ) -> Result<T, Error>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> Result<T, Error>,
    {
        let (cache, digest) = match (&self.cache, digest) {
            (Some(cache), Some(digest)) => (cache, digest),
            _ => return compute(),
        };

        let key = CacheKey::new(digest, &self.config, salt)?;

        if let CacheLookup::Hit(value) = cache.load(kind, &key)? {
            return Ok(value);
        }

        let value = compute()?;
        cache.store(kind, &key, &value)?;

        Ok(value)
    }
}
