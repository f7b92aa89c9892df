pub mod bbox;
pub mod cache;
pub mod camera_motion;
pub mod compensation;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame;
pub mod math;
pub mod pipeline;
pub mod possession;
pub mod speed;
pub mod team;
pub mod track;
pub mod tracker;
pub mod view;

#[cfg(feature = "video")]
pub mod video;

mod flow;
mod kmeans;

pub use cache::{Cache, CacheLookup};
pub use camera_motion::CameraMovement;
pub use config::Config;
pub use detection::{Detection, ObjectClass, TrackId};
pub use detector::{Detector, DetectionsFile};
pub use error::Error;
pub use frame::Frame;
pub use pipeline::{Analysis, Pipeline};
pub use possession::{BallControl, Possession};
pub use track::{Team, TrackRecord, TrackTable, BALL_ID};
