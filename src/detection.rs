use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb, Xywh};

pub type TrackId = u32;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Player,
    Referee,
    Ball,
}

/// Contains (x,y) of the center and (width,height) of bbox, plus the detector-provided
/// label and persistent track id
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub label: String,
    #[serde(rename = "id")]
    pub track_id: TrackId,
}

impl Detection {
    pub fn from_ltrb<S: Into<String>>(
        label: S,
        track_id: TrackId,
        confidence: f32,
        bbox: BBox<Ltrb>,
    ) -> Self {
        let xywh = bbox.as_xywh();

        Self {
            x: xywh.cx(),
            y: xywh.cy(),
            w: xywh.width(),
            h: xywh.height(),
            confidence,
            label: label.into(),
            track_id,
        }
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Xywh> {
        BBox::xywh(self.x, self.y, self.w, self.h)
    }

    #[inline(always)]
    pub fn ltrb(&self) -> BBox<Ltrb> {
        self.bbox().as_ltrb()
    }
}
