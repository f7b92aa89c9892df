use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PossessionConfig;
use crate::detection::{ObjectClass, TrackId};
use crate::track::{FrameTracks, Team, TrackTable};

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Possession {
    #[default]
    NoPossession,
    HeldBy(Team),
}

impl Possession {
    /// Control after a frame whose possessor (if any) belongs to `team`
    #[inline]
    pub fn next(self, team: Option<Team>) -> Self {
        match team {
            Some(team) => Possession::HeldBy(team),
            None => self,
        }
    }

    #[inline]
    pub fn team(&self) -> Option<Team> {
        match self {
            Possession::HeldBy(team) => Some(*team),
            Possession::NoPossession => None,
        }
    }
}

/// Ball-control value of every frame
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct BallControl {
    frames: Vec<Possession>,
}

impl BallControl {
    pub fn new(frames: Vec<Possession>) -> Self {
        Self { frames }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frames(&self) -> &[Possession] {
        &self.frames
    }

    #[inline]
    pub fn get(&self, frame: usize) -> Option<Possession> {
        self.frames.get(frame).copied()
    }

    /// Fraction of held frames per team over frames `0..=frame`, `None` until
    /// someone has had the ball.
    pub fn share_until(&self, frame: usize) -> Option<(f32, f32)> {
        let end = (frame + 1).min(self.frames.len());
        let (mut a, mut b) = (0usize, 0usize);

        for p in &self.frames[..end] {
            match p {
                Possession::HeldBy(Team::A) => a += 1,
                Possession::HeldBy(Team::B) => b += 1,
                Possession::NoPossession => (),
            }
        }

        let total = (a + b) as f32;
        if total == 0.0 {
            return None;
        }

        Some((a as f32 / total, b as f32 / total))
    }

    #[inline]
    pub fn share(&self) -> Option<(f32, f32)> {
        self.share_until(self.frames.len().checked_sub(1)?)
    }
}

pub struct BallAssigner {
    max_distance: f32,
}

impl BallAssigner {
    pub fn new(config: &PossessionConfig) -> Self {
        Self {
            max_distance: config.max_player_ball_distance,
        }
    }

    /// Player nearest to the ball, measured to the lower corners of the box, if it
    /// is strictly closer than the threshold
    pub fn assign(&self, players: &FrameTracks, ball: na::Point2<f32>) -> Option<TrackId> {
        let mut best = None;
        let mut best_d = self.max_distance;

        for (id, record) in players {
            let (left, right) = record.bbox.lower_corners();
            let d = f32::min(na::distance(&left, &ball), na::distance(&right, &ball));

            if d < best_d {
                best_d = d;
                best = Some(*id);
            }
        }

        best
    }

    /// Sets `has_ball` on the possessor of every frame and returns the sticky
    /// ball-control sequence
    pub fn assign_tracks(&self, table: &mut TrackTable) -> BallControl {
        let mut state = Possession::NoPossession;
        let mut frames = Vec::with_capacity(table.len());

        for frame in 0..table.len() {
            let ball = table.ball(frame).map(|b| b.position);

            let owner = ball.and_then(|ball| {
                let players = table.frame(ObjectClass::Player, frame)?;
                self.assign(players, ball)
            });

            let team = owner.and_then(|id| {
                let record = table.get_mut(ObjectClass::Player, frame, id)?;
                record.has_ball = true;
                record.team
            });

            if owner.is_some() && team.is_none() {
                debug!(frame, ?owner, "possessor has no team");
            }

            state = state.next(team);
            frames.push(state);
        }

        BallControl::new(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::track::{TrackRecord, BALL_ID};
    use approx::assert_abs_diff_eq;

    fn player(x: f32, team: Option<Team>) -> TrackRecord {
        let bbox = BBox::ltrb(x, 100.0, x + 20.0, 160.0);
        let mut rec = TrackRecord::new(ObjectClass::Player, bbox, 1.0);
        rec.team = team;
        rec
    }

    fn ball(x: f32, y: f32) -> TrackRecord {
        TrackRecord::new(ObjectClass::Ball, BBox::ltrb(x - 2.0, y - 2.0, x + 2.0, y + 2.0), 1.0)
    }

    #[test]
    fn test_nearest_player_wins() {
        let assigner = BallAssigner::new(&PossessionConfig::default());
        let mut players = FrameTracks::new();
        players.insert(3, player(100.0, Some(Team::A)));
        players.insert(4, player(150.0, Some(Team::B)));

        // Right corner of 3 is at 120, left corner of 4 at 150
        assert_eq!(assigner.assign(&players, na::Point2::new(125.0, 160.0)), Some(3));
        assert_eq!(assigner.assign(&players, na::Point2::new(145.0, 160.0)), Some(4));
        assert_eq!(assigner.assign(&players, na::Point2::new(500.0, 160.0)), None);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let assigner = BallAssigner::new(&PossessionConfig {
            max_player_ball_distance: 10.0,
        });
        let mut players = FrameTracks::new();
        players.insert(3, player(100.0, None));

        assert_eq!(assigner.assign(&players, na::Point2::new(130.0, 160.0)), None);
        assert_eq!(assigner.assign(&players, na::Point2::new(129.0, 160.0)), Some(3));
    }

    #[test]
    fn test_possession_is_sticky() {
        let mut table = TrackTable::with_frames(13);
        for frame in 0..13 {
            table.insert(ObjectClass::Player, frame, 3, player(100.0, Some(Team::A)));
        }

        // In reach on frame 10 only, then far away, then gone
        table.insert(ObjectClass::Ball, 10, BALL_ID, ball(110.0, 160.0));
        table.insert(ObjectClass::Ball, 11, BALL_ID, ball(900.0, 160.0));

        let control = BallAssigner::new(&PossessionConfig::default()).assign_tracks(&mut table);

        assert_eq!(control.len(), 13);
        assert_eq!(control.get(0), Some(Possession::NoPossession));
        assert_eq!(control.get(9), Some(Possession::NoPossession));
        assert_eq!(control.get(10), Some(Possession::HeldBy(Team::A)));
        assert_eq!(control.get(11), Some(Possession::HeldBy(Team::A)));
        assert_eq!(control.get(12), Some(Possession::HeldBy(Team::A)));

        assert!(table.get(ObjectClass::Player, 10, 3).unwrap().has_ball);
        assert!(!table.get(ObjectClass::Player, 11, 3).unwrap().has_ball);
    }

    #[test]
    fn test_possessor_without_team() {
        let mut table = TrackTable::with_frames(2);
        table.insert(ObjectClass::Player, 0, 3, player(100.0, Some(Team::B)));
        table.insert(ObjectClass::Player, 1, 5, player(100.0, None));
        table.insert(ObjectClass::Ball, 0, BALL_ID, ball(110.0, 160.0));
        table.insert(ObjectClass::Ball, 1, BALL_ID, ball(110.0, 160.0));

        let control = BallAssigner::new(&PossessionConfig::default()).assign_tracks(&mut table);

        assert!(table.get(ObjectClass::Player, 1, 5).unwrap().has_ball);
        assert_eq!(control.frames(), &[Possession::HeldBy(Team::B); 2]);
    }

    #[test]
    fn test_share() {
        let control = BallControl::new(vec![
            Possession::NoPossession,
            Possession::HeldBy(Team::A),
            Possession::HeldBy(Team::A),
            Possession::HeldBy(Team::B),
        ]);

        assert_eq!(control.share_until(0), None);

        let (a, b) = control.share_until(2).unwrap();
        assert_abs_diff_eq!(a, 1.0);
        assert_abs_diff_eq!(b, 0.0);

        let (a, b) = control.share().unwrap();
        assert_abs_diff_eq!(a, 2.0 / 3.0);
        assert_abs_diff_eq!(b, 1.0 / 3.0);

        assert_eq!(BallControl::default().share(), None);
    }
}
