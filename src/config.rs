use std::collections::BTreeMap;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::detection::ObjectClass;
use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub camera: CameraConfig,
    pub view: ViewConfig,
    pub team: TeamConfig,
    pub possession: PossessionConfig,
    pub speed: SpeedConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;

        Ok(toml::from_str(&contents)?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub min_confidence: f32,
    pub detect_batch_size: usize,
    /// Detector label to object class, unknown labels are dropped
    pub class_map: BTreeMap<String, ObjectClass>,
    /// Longest ball gap (in frames) that gets interpolated, unlimited when absent
    pub max_ball_gap: Option<usize>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let class_map = [
            ("player", ObjectClass::Player),
            ("goalkeeper", ObjectClass::Player),
            ("referee", ObjectClass::Referee),
            ("ball", ObjectClass::Ball),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            min_confidence: 0.1,
            detect_batch_size: 20,
            class_map,
            max_ball_gap: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Displacements with a smaller magnitude (px) are reported as zero
    pub min_displacement: f32,
    pub max_corners: usize,
    pub quality_level: f32,
    pub min_distance: f32,
    pub block_size: usize,
    /// Half-open pixel column ranges where background features are searched
    pub mask_columns: Vec<(u32, u32)>,
    pub win_size: usize,
    pub max_level: usize,
    pub max_iterations: usize,
    pub epsilon: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_displacement: 5.0,
            max_corners: 100,
            quality_level: 0.3,
            min_distance: 3.0,
            block_size: 7,
            mask_columns: vec![(0, 20), (900, 1050)],
            win_size: 15,
            max_level: 2,
            max_iterations: 10,
            epsilon: 0.03,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    /// Pixel corners of the calibrated region: bottom-left, top-left, top-right, bottom-right
    pub pixel_vertices: [[f32; 2]; 4],
    /// Visible pitch length in meters
    pub pitch_length: f32,
    /// Pitch width in meters
    pub pitch_width: f32,
}

impl ViewConfig {
    /// Pitch corners matching `pixel_vertices`
    pub fn target_vertices(&self) -> [[f32; 2]; 4] {
        [
            [0.0, self.pitch_width],
            [0.0, 0.0],
            [self.pitch_length, 0.0],
            [self.pitch_length, self.pitch_width],
        ]
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            pixel_vertices: [
                [110.0, 1035.0],
                [265.0, 275.0],
                [910.0, 260.0],
                [1640.0, 915.0],
            ],
            pitch_length: 23.32,
            pitch_width: 68.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TeamConfig {
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            seed: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PossessionConfig {
    /// In px, measured from the ball center to the nearest lower bbox corner
    pub max_player_ball_distance: f32,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            max_player_ball_distance: 70.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpeedConfig {
    pub frame_window: usize,
    pub frame_rate: f32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            frame_window: 5,
            frame_rate: 24.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [speed]
            frame_rate = 30.0

            [tracker.class_map]
            keeper = "player"
            "#,
        )
        .unwrap();

        assert_eq!(config.speed.frame_rate, 30.0);
        assert_eq!(config.speed.frame_window, 5);
        assert_eq!(config.tracker.class_map.len(), 1);
        assert_eq!(config.tracker.class_map["keeper"], ObjectClass::Player);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn test_target_vertices() {
        let view = ViewConfig::default();
        let target = view.target_vertices();

        assert_eq!(target[0], [0.0, 68.0]);
        assert_eq!(target[2], [23.32, 0.0]);
    }
}
