use std::collections::BTreeMap;

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::detection::{ObjectClass, TrackId};

/// The ball is stored under a single fixed id no matter what id the detector reports
pub const BALL_ID: TrackId = 1;

pub type Rgb = [f32; 3];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    A,
    B,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackRecord {
    pub bbox: BBox<Ltrb>,
    pub confidence: f32,
    pub interpolated: bool,

    // px, anchor point of the bbox
    pub position: na::Point2<f32>,

    // px, camera motion removed
    pub position_adjusted: Option<na::Point2<f32>>,

    // meters on the pitch plane, absent outside the calibrated region
    pub position_transformed: Option<na::Point2<f32>>,

    pub team: Option<Team>,
    pub team_color: Option<Rgb>,
    pub has_ball: bool,

    // km/h
    pub speed: Option<f32>,

    // meters, cumulative since the first frame
    pub distance: Option<f32>,
}

impl TrackRecord {
    pub fn new(class: ObjectClass, bbox: BBox<Ltrb>, confidence: f32) -> Self {
        Self {
            position: anchor(class, &bbox),
            bbox,
            confidence,
            interpolated: false,
            position_adjusted: None,
            position_transformed: None,
            team: None,
            team_color: None,
            has_ball: false,
            speed: None,
            distance: None,
        }
    }
}

/// Ground-contact point for people, box center for the ball
#[inline]
pub fn anchor(class: ObjectClass, bbox: &BBox<Ltrb>) -> na::Point2<f32> {
    match class {
        ObjectClass::Ball => bbox.center(),
        ObjectClass::Player | ObjectClass::Referee => bbox.foot(),
    }
}

pub type FrameTracks = BTreeMap<TrackId, TrackRecord>;

/// Records addressed by (class, frame, track id). Every class holds exactly one
/// (possibly empty) entry per frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TrackTable {
    players: Vec<FrameTracks>,
    referees: Vec<FrameTracks>,
    ball: Vec<FrameTracks>,
}

impl TrackTable {
    pub fn with_frames(num_frames: usize) -> Self {
        Self {
            players: vec![BTreeMap::new(); num_frames],
            referees: vec![BTreeMap::new(); num_frames],
            ball: vec![BTreeMap::new(); num_frames],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    #[inline]
    pub fn class(&self, class: ObjectClass) -> &[FrameTracks] {
        match class {
            ObjectClass::Player => &self.players,
            ObjectClass::Referee => &self.referees,
            ObjectClass::Ball => &self.ball,
        }
    }

    #[inline]
    pub fn class_mut(&mut self, class: ObjectClass) -> &mut [FrameTracks] {
        match class {
            ObjectClass::Player => &mut self.players,
            ObjectClass::Referee => &mut self.referees,
            ObjectClass::Ball => &mut self.ball,
        }
    }

    #[inline]
    pub fn frame(&self, class: ObjectClass, frame: usize) -> Option<&FrameTracks> {
        self.class(class).get(frame)
    }

    #[inline]
    pub fn frame_mut(&mut self, class: ObjectClass, frame: usize) -> Option<&mut FrameTracks> {
        self.class_mut(class).get_mut(frame)
    }

    #[inline]
    pub fn get(&self, class: ObjectClass, frame: usize, id: TrackId) -> Option<&TrackRecord> {
        self.frame(class, frame)?.get(&id)
    }

    #[inline]
    pub fn get_mut(
        &mut self,
        class: ObjectClass,
        frame: usize,
        id: TrackId,
    ) -> Option<&mut TrackRecord> {
        self.frame_mut(class, frame)?.get_mut(&id)
    }

    /// Returns the replaced record, if any. Inserting past the last frame is ignored.
    pub fn insert(
        &mut self,
        class: ObjectClass,
        frame: usize,
        id: TrackId,
        record: TrackRecord,
    ) -> Option<TrackRecord> {
        self.frame_mut(class, frame)?.insert(id, record)
    }

    #[inline]
    pub fn ball(&self, frame: usize) -> Option<&TrackRecord> {
        self.get(ObjectClass::Ball, frame, BALL_ID)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ObjectClass, usize, &mut FrameTracks)> {
        self.players
            .iter_mut()
            .enumerate()
            .map(|(i, f)| (ObjectClass::Player, i, f))
            .chain(
                self.referees
                    .iter_mut()
                    .enumerate()
                    .map(|(i, f)| (ObjectClass::Referee, i, f)),
            )
            .chain(
                self.ball
                    .iter_mut()
                    .enumerate()
                    .map(|(i, f)| (ObjectClass::Ball, i, f)),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_policy() {
        let bbox = BBox::ltrb(0.0, 0.0, 10.0, 20.0);

        assert_eq!(anchor(ObjectClass::Player, &bbox), na::Point2::new(5.0, 20.0));
        assert_eq!(anchor(ObjectClass::Referee, &bbox), na::Point2::new(5.0, 20.0));
        assert_eq!(anchor(ObjectClass::Ball, &bbox), na::Point2::new(5.0, 10.0));
    }

    #[test]
    fn test_table_addressing() {
        let mut table = TrackTable::with_frames(3);
        let rec = TrackRecord::new(ObjectClass::Player, BBox::ltrb(0.0, 0.0, 2.0, 4.0), 0.9);

        assert!(table.insert(ObjectClass::Player, 1, 7, rec.clone()).is_none());
        assert!(table.insert(ObjectClass::Player, 5, 7, rec.clone()).is_none());

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(ObjectClass::Player, 1, 7), Some(&rec));
        assert!(table.get(ObjectClass::Referee, 1, 7).is_none());
        assert!(table.get(ObjectClass::Player, 0, 7).is_none());
        assert!(table.ball(1).is_none());

        table.get_mut(ObjectClass::Player, 1, 7).unwrap().has_ball = true;
        assert!(table.get(ObjectClass::Player, 1, 7).unwrap().has_ball);

        assert_eq!(table.iter_mut().count(), 9);
    }
}
