//! Interface to the 2D compositor.
//!
//! Only rebuild and post-load fixup steps call into the renderer. Raw
//! decoding never does.

use crate::id::SurfaceId;

/// What a surface will be used to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Glyph,
    Image,
    Text,
    Animation,
    Numeral,
    Gauge,
    Construction,
    Vector,
}

pub trait RenderBackend {
    fn construct(&mut self, kind: SurfaceKind, width: i32, height: i32) -> SurfaceId;
    fn mark_dirty(&mut self, surface: SurfaceId);
}

/// A backend that draws nothing and hands out sequential surface ids.
#[derive(Debug, Default)]
pub struct NullRenderer {
    next: u32,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderBackend for NullRenderer {
    fn construct(&mut self, _kind: SurfaceKind, _width: i32, _height: i32) -> SurfaceId {
        let id = SurfaceId(self.next);
        self.next += 1;
        id
    }

    fn mark_dirty(&mut self, _surface: SurfaceId) {}
}
