use std::collections::HashMap;

use image::RgbImage;
use tracing::{debug, info};

use crate::bbox::{BBox, Ltrb};
use crate::config::TeamConfig;
use crate::detection::{ObjectClass, TrackId};
use crate::error::Error;
use crate::kmeans::KMeans;
use crate::track::{FrameTracks, Rgb, Team, TrackTable};

/// Two team colors fitted once on the first frame, never updated afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct ColorModel {
    kmeans: KMeans,
}

impl ColorModel {
    #[inline]
    pub fn classify(&self, color: &Rgb) -> Team {
        match self.kmeans.predict(color) {
            0 => Team::A,
            _ => Team::B,
        }
    }

    #[inline]
    pub fn color(&self, team: Team) -> Rgb {
        let centroids = self.kmeans.centroids();

        match team {
            Team::A => centroids[0],
            Team::B => centroids[1],
        }
    }
}

/// Pixels of `bbox` clipped to the image, `None` if nothing is left
fn crop(frame: &RgbImage, bbox: &BBox<Ltrb>) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = frame.dimensions();

    let x0 = bbox.left().max(0.0).floor() as u32;
    let y0 = bbox.top().max(0.0).floor() as u32;
    let x1 = (bbox.right().ceil().max(0.0) as u32).min(w);
    let y1 = (bbox.bottom().ceil().max(0.0) as u32).min(h);

    if x1 <= x0 || y1 <= y0 {
        None
    } else {
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// Dominant shirt color: 2-means over the upper half of the box, the cluster that
/// owns the majority of the crop corners being background.
pub fn shirt_color(frame: &RgbImage, bbox: &BBox<Ltrb>, config: &TeamConfig) -> Option<Rgb> {
    let (x0, y0, cw, ch) = crop(frame, &bbox.upper_half())?;

    let pixels: Vec<Rgb> = (y0..y0 + ch)
        .flat_map(|y| (x0..x0 + cw).map(move |x| (x, y)))
        .map(|(x, y)| {
            let p = frame.get_pixel(x, y).0;
            [p[0] as f32, p[1] as f32, p[2] as f32]
        })
        .collect();

    if pixels.len() < 2 {
        return pixels.first().copied();
    }

    let (kmeans, labels) = KMeans::fit(&pixels, 2, config.max_iterations, config.seed)?;

    let cw = cw as usize;
    let corners = [0, cw - 1, pixels.len() - cw, pixels.len() - 1];
    let background_votes = corners.iter().filter(|&&i| labels[i] == 1).count();
    let background = if background_votes > corners.len() / 2 { 1 } else { 0 };

    Some(kmeans.centroids()[1 - background])
}

pub struct TeamAssigner {
    config: TeamConfig,
    model: ColorModel,
    assigned: HashMap<TrackId, Team>,
}

impl TeamAssigner {
    /// Clusters the shirt colors of the given (first frame) players into two teams
    pub fn fit(frame: &RgbImage, players: &FrameTracks, config: TeamConfig) -> Result<Self, Error> {
        let colors: Vec<Rgb> = players
            .values()
            .filter_map(|rec| shirt_color(frame, &rec.bbox, &config))
            .collect();

        let (kmeans, _) = KMeans::fit(&colors, 2, config.max_iterations, config.seed)
            .ok_or_else(|| {
                Error::TeamModelError(format!(
                    "need at least two visible players, got {}",
                    colors.len()
                ))
            })?;

        let model = ColorModel { kmeans };

        info!(
            team_a = ?model.color(Team::A),
            team_b = ?model.color(Team::B),
            "fitted team colors"
        );

        Ok(Self {
            config,
            model,
            assigned: HashMap::new(),
        })
    }

    #[inline]
    pub fn model(&self) -> &ColorModel {
        &self.model
    }

    /// Team of a player, decided on first sight and cached for the rest of the clip
    pub fn player_team(
        &mut self,
        frame: &RgbImage,
        bbox: &BBox<Ltrb>,
        id: TrackId,
    ) -> Option<Team> {
        if let Some(team) = self.assigned.get(&id) {
            return Some(*team);
        }

        let color = shirt_color(frame, bbox, &self.config)?;
        let team = self.model.classify(&color);

        debug!(id, ?team, "assigned team");
        self.assigned.insert(id, team);

        Some(team)
    }

    pub fn assign_tracks(&mut self, frames: &[RgbImage], table: &mut TrackTable) {
        for (idx, frame) in frames.iter().enumerate() {
            let records = match table.frame_mut(ObjectClass::Player, idx) {
                Some(records) => records,
                None => break,
            };

            for (id, record) in records.iter_mut() {
                if let Some(team) = self.player_team(frame, &record.bbox, *id) {
                    record.team = Some(team);
                    record.team_color = Some(self.model.color(team));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackRecord;

    const GRASS: [u8; 3] = [30, 140, 40];
    const RED: [u8; 3] = [220, 20, 30];
    const BLUE: [u8; 3] = [20, 40, 220];

    /// Draws a player inside `bbox`: shirt on the upper half, shorts below, grass
    /// margin around the body
    fn draw_player(img: &mut RgbImage, bbox: &BBox<Ltrb>, shirt: [u8; 3]) {
        let (l, t, r, b) = (
            bbox.left() as u32,
            bbox.top() as u32,
            bbox.right() as u32,
            bbox.bottom() as u32,
        );
        let mid = t + (b - t) / 2;

        for y in t + 2..b - 2 {
            for x in l + 3..r - 3 {
                let c = if y < mid { shirt } else { [250, 250, 250] };
                img.put_pixel(x, y, image::Rgb(c));
            }
        }
    }

    fn grass(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, image::Rgb(GRASS))
    }

    fn close(a: Rgb, b: [u8; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - *y as f32).abs() < 1.0)
    }

    fn frame_with(players: &[(TrackId, BBox<Ltrb>, [u8; 3])]) -> (RgbImage, FrameTracks) {
        let mut img = grass(200, 100);
        let mut tracks = FrameTracks::new();

        for (id, bbox, shirt) in players {
            draw_player(&mut img, bbox, *shirt);
            tracks.insert(*id, TrackRecord::new(ObjectClass::Player, *bbox, 1.0));
        }

        (img, tracks)
    }

    #[test]
    fn test_shirt_color_ignores_background() {
        let bbox = BBox::ltrb(10.0, 10.0, 30.0, 50.0);
        let (img, _) = frame_with(&[(1, bbox, RED)]);

        let color = shirt_color(&img, &bbox, &TeamConfig::default()).unwrap();

        assert!(close(color, RED), "got {:?}", color);
    }

    #[test]
    fn test_offscreen_bbox_has_no_color() {
        let img = grass(50, 50);
        let bbox = BBox::ltrb(60.0, 60.0, 80.0, 90.0);

        assert!(shirt_color(&img, &bbox, &TeamConfig::default()).is_none());
    }

    #[test]
    fn test_team_assignment_is_sticky() {
        let players = [
            (7, BBox::ltrb(10.0, 10.0, 30.0, 50.0), RED),
            (8, BBox::ltrb(40.0, 10.0, 60.0, 50.0), RED),
            (9, BBox::ltrb(100.0, 10.0, 120.0, 50.0), BLUE),
            (10, BBox::ltrb(140.0, 10.0, 160.0, 50.0), BLUE),
        ];
        let (first, tracks) = frame_with(&players);

        let mut assigner = TeamAssigner::fit(&first, &tracks, TeamConfig::default()).unwrap();
        let model = assigner.model().clone();

        let red_team = model.classify(&[220.0, 20.0, 30.0]);
        let blue_team = model.classify(&[20.0, 40.0, 220.0]);
        assert_ne!(red_team, blue_team);

        let team7 = assigner.player_team(&first, &players[0].1, 7).unwrap();
        assert_eq!(team7, red_team);
        assert_eq!(assigner.player_team(&first, &players[2].1, 9), Some(blue_team));

        // Player 7 now looks blue, the cached team wins
        let (later, _) = frame_with(&[(7, players[0].1, BLUE)]);
        for _ in 0..5 {
            assert_eq!(assigner.player_team(&later, &players[0].1, 7), Some(team7));
        }

        assert_eq!(assigner.model(), &model);
    }

    #[test]
    fn test_assign_tracks_sets_team_color() {
        let players = [
            (1, BBox::ltrb(10.0, 10.0, 30.0, 50.0), RED),
            (2, BBox::ltrb(100.0, 10.0, 120.0, 50.0), BLUE),
        ];
        let (img, tracks) = frame_with(&players);

        let mut table = TrackTable::with_frames(2);
        for frame in 0..2 {
            for (id, record) in &tracks {
                table.insert(ObjectClass::Player, frame, *id, record.clone());
            }
        }

        let mut assigner = TeamAssigner::fit(&img, &tracks, TeamConfig::default()).unwrap();
        assigner.assign_tracks(&[img.clone(), img], &mut table);

        for frame in 0..2 {
            let p1 = table.get(ObjectClass::Player, frame, 1).unwrap();
            let p2 = table.get(ObjectClass::Player, frame, 2).unwrap();

            assert!(p1.team.is_some());
            assert_ne!(p1.team, p2.team);
            assert!(close(p1.team_color.unwrap(), RED));
            assert!(close(p2.team_color.unwrap(), BLUE));
        }
    }

    #[test]
    fn test_fit_needs_two_players() {
        let (img, tracks) = frame_with(&[(1, BBox::ltrb(10.0, 10.0, 30.0, 50.0), RED)]);

        assert!(matches!(
            TeamAssigner::fit(&img, &tracks, TeamConfig::default()),
            Err(Error::TeamModelError(_))
        ));
    }
}
