//! Parts entities and their per-kind state.

use crate::id::{PartsKey, PartsNumber};

/// Where an entity's (x, y) sits on its own rectangle, numbered like a
/// keypad read top to bottom: 1 is top-left, 5 the center, 9 bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginMode(i32);

impl OriginMode {
    pub const TOP_LEFT: OriginMode = OriginMode(1);
    pub const CENTER: OriginMode = OriginMode(5);
    pub const BOTTOM_RIGHT: OriginMode = OriginMode(9);

    /// Out-of-range modes behave as top-left.
    pub fn new(mode: i32) -> Self {
        if (1..=9).contains(&mode) {
            OriginMode(mode)
        } else {
            OriginMode::TOP_LEFT
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }

    /// Offset from the origin point to the rectangle's top-left corner.
    pub fn offset(self, width: i32, height: i32) -> (i32, i32) {
        let m = self.get() - 1;
        let dx = match m % 3 {
            0 => 0,
            1 => -(width / 2),
            _ => width.saturating_neg(),
        };
        let dy = match m / 3 {
            0 => 0,
            1 => -(height / 2),
            _ => height.saturating_neg(),
        };
        (dx, dy)
    }
}

/// Axis-aligned screen rectangle used for hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl HitBox {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        let (left, top) = (i64::from(self.x), i64::from(self.y));
        x >= left && y >= top && x < left + i64::from(self.w) && y < top + i64::from(self.h)
    }
}

/// Property a motion animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    Position,
    Alpha,
    Scale,
    Rotation,
}

impl MotionKind {
    pub fn tag(self) -> i32 {
        match self {
            MotionKind::Position => 0,
            MotionKind::Alpha => 1,
            MotionKind::Scale => 2,
            MotionKind::Rotation => 3,
        }
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(MotionKind::Position),
            1 => Some(MotionKind::Alpha),
            2 => Some(MotionKind::Scale),
            3 => Some(MotionKind::Rotation),
            _ => None,
        }
    }
}

/// A motion in flight: interpolates a property from `from` to `to`
/// between two timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub kind: MotionKind,
    pub begin_time: i32,
    pub end_time: i32,
    pub from: (f32, f32),
    pub to: (f32, f32),
}

/// Drawing step of a construction process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructOpKind {
    FillRect,
    DrawCg,
    DrawText,
}

impl ConstructOpKind {
    pub fn tag(self) -> i32 {
        match self {
            ConstructOpKind::FillRect => 0,
            ConstructOpKind::DrawCg => 1,
            ConstructOpKind::DrawText => 2,
        }
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(ConstructOpKind::FillRect),
            1 => Some(ConstructOpKind::DrawCg),
            2 => Some(ConstructOpKind::DrawText),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructOp {
    pub kind: ConstructOpKind,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub color: Vec<i32>,
    pub cg: i32,
    pub text: String,
}

impl ConstructOp {
    pub fn fill_rect(x: i32, y: i32, w: i32, h: i32, color: [i32; 4]) -> Self {
        Self {
            kind: ConstructOpKind::FillRect,
            x,
            y,
            w,
            h,
            color: color.to_vec(),
            cg: 0,
            text: String::new(),
        }
    }

    pub fn draw_cg(x: i32, y: i32, cg: i32) -> Self {
        Self {
            kind: ConstructOpKind::DrawCg,
            x,
            y,
            w: 0,
            h: 0,
            color: Vec::new(),
            cg,
            text: String::new(),
        }
    }

    pub fn draw_text(x: i32, y: i32, text: &str) -> Self {
        Self {
            kind: ConstructOpKind::DrawText,
            x,
            y,
            w: 0,
            h: 0,
            color: Vec::new(),
            cg: 0,
            text: text.to_string(),
        }
    }
}

/// Numeric tag of each entity kind in the save stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartsKind {
    Uninit = 0,
    Image = 1,
    Text = 2,
    Animation = 3,
    Numeral = 4,
    Gauge = 5,
    Construction = 6,
    Vector = 7,
}

impl PartsKind {
    pub fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            0 => PartsKind::Uninit,
            1 => PartsKind::Image,
            2 => PartsKind::Text,
            3 => PartsKind::Animation,
            4 => PartsKind::Numeral,
            5 => PartsKind::Gauge,
            6 => PartsKind::Construction,
            7 => PartsKind::Vector,
            _ => return None,
        })
    }
}

/// What an entity draws.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PartsState {
    #[default]
    Uninit,
    Image {
        cg: i32,
        width: i32,
        height: i32,
    },
    Text {
        lines: Vec<String>,
        font_size: i32,
        line_space: i32,
        width: i32,
        height: i32,
    },
    Animation {
        frames: Vec<i32>,
        frame_time: i32,
        elapsed: i32,
        width: i32,
        height: i32,
    },
    Numeral {
        value: i32,
        font: i32,
        digits: i32,
        zero_pad: bool,
        comma: bool,
    },
    Gauge {
        cg: i32,
        rate: f32,
        vertical: bool,
        width: i32,
        height: i32,
    },
    Construction {
        width: i32,
        height: i32,
        ops: Vec<ConstructOp>,
    },
    Vector {
        width: i32,
        height: i32,
        points: Vec<[i32; 2]>,
        color: [i32; 4],
    },
}

impl PartsState {
    pub fn kind(&self) -> PartsKind {
        match self {
            PartsState::Uninit => PartsKind::Uninit,
            PartsState::Image { .. } => PartsKind::Image,
            PartsState::Text { .. } => PartsKind::Text,
            PartsState::Animation { .. } => PartsKind::Animation,
            PartsState::Numeral { .. } => PartsKind::Numeral,
            PartsState::Gauge { .. } => PartsKind::Gauge,
            PartsState::Construction { .. } => PartsKind::Construction,
            PartsState::Vector { .. } => PartsKind::Vector,
        }
    }

    /// Unscaled size in pixels. Numeral size depends on the font, so it is
    /// resolved by the engine.
    pub fn size(&self) -> Option<(i32, i32)> {
        match self {
            PartsState::Uninit | PartsState::Numeral { .. } => None,
            PartsState::Image { width, height, .. }
            | PartsState::Text { width, height, .. }
            | PartsState::Animation { width, height, .. }
            | PartsState::Gauge { width, height, .. }
            | PartsState::Construction { width, height, .. }
            | PartsState::Vector { width, height, .. } => Some((*width, *height)),
        }
    }

    /// Text state sized to fit `lines`.
    pub fn text(lines: &[&str], font_size: i32, line_space: i32) -> Self {
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;
        let rows = lines.len() as i32;
        PartsState::Text {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            font_size,
            line_space,
            width: widest.saturating_mul(font_size),
            height: rows
                .saturating_mul(font_size)
                .saturating_add((rows - 1).max(0).saturating_mul(line_space)),
        }
    }
}

/// Link from an entity to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentLink {
    #[default]
    None,
    /// Parent number read from a snapshot, not yet resolved.
    Pending(PartsNumber),
    Linked(PartsKey),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartsEntity {
    pub number: PartsNumber,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub origin_mode: OriginMode,
    pub show: bool,
    pub alpha: i32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    pub clickable: bool,
    pub message_window: bool,
    pub parent: ParentLink,
    pub state: PartsState,
    pub motions: Vec<Motion>,
}

impl PartsEntity {
    pub fn new(number: PartsNumber) -> Self {
        Self {
            number,
            x: 0,
            y: 0,
            z: 0,
            origin_mode: OriginMode::TOP_LEFT,
            show: true,
            alpha: 255,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            clickable: false,
            message_window: false,
            parent: ParentLink::None,
            state: PartsState::Uninit,
            motions: Vec::new(),
        }
    }

    pub fn kind(&self) -> PartsKind {
        self.state.kind()
    }

    /// Screen rectangle of an entity of unscaled size `size`. Coordinates
    /// saturate at the `i32` range.
    pub fn hit_box(&self, (width, height): (i32, i32)) -> HitBox {
        let w = (width as f32 * self.scale_x).round() as i32;
        let h = (height as f32 * self.scale_y).round() as i32;
        let (dx, dy) = self.origin_mode.offset(w, h);
        HitBox {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            w,
            h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_offsets_follow_keypad_layout() {
        assert_eq!(OriginMode::TOP_LEFT.offset(100, 50), (0, 0));
        assert_eq!(OriginMode::CENTER.offset(100, 50), (-50, -25));
        assert_eq!(OriginMode::BOTTOM_RIGHT.offset(100, 50), (-100, -50));
        assert_eq!(OriginMode::new(3).offset(100, 50), (-100, 0));
        assert_eq!(OriginMode::new(42), OriginMode::TOP_LEFT);
    }

    #[test]
    fn hit_box_applies_scale_and_origin() {
        let mut e = PartsEntity::new(PartsNumber(1));
        e.x = 200;
        e.y = 100;
        e.scale_x = 2.0;
        e.origin_mode = OriginMode::CENTER;
        let hb = e.hit_box((50, 40));
        assert_eq!(hb, HitBox { x: 150, y: 80, w: 100, h: 40 });
        assert!(hb.contains(150, 80));
        assert!(!hb.contains(250, 80));
    }

    #[test]
    fn kind_tags_round_trip() {
        for tag in 0..8 {
            assert_eq!(PartsKind::from_tag(tag).map(PartsKind::tag), Some(tag));
        }
        assert_eq!(PartsKind::from_tag(8), None);
        assert_eq!(PartsKind::from_tag(-1), None);
    }

    #[test]
    fn text_state_is_sized_to_lines() {
        let s = PartsState::text(&["abc", "de"], 10, 2);
        assert_eq!(s.kind(), PartsKind::Text);
        assert_eq!(s.size(), Some((30, 22)));
    }
}
