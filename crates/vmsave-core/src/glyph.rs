//! Glyph sprites: single characters drawn as free-standing sprites.
//!
//! Sprites live in a [`HandlePool`], so handles survive a save/load cycle
//! exactly. Loading never touches the live pool. Decoded sprites wait in a
//! shadow pool until [`GlyphPool::rebuild`] reconstructs their surfaces and
//! swaps them in.

use crate::history::{HandlePool, HistoryError};
use crate::id::{PoolHandle, SurfaceId};
use crate::render::{RenderBackend, SurfaceKind};
use crate::snapshot::{Blob, GLYPH_SPRITE_MAGIC, SnapshotError, SnapshotReader, SnapshotWriter};

pub const GLYPH_SPRITE_VERSION: u32 = 1;
pub const DEFAULT_GLYPH_CAPACITY: usize = 16;

/// What to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphSpec {
    pub ch: char,
    pub font_size: i32,
    pub color: [i32; 3],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphSprite {
    pub spec: GlyphSpec,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub show: bool,
    surface: Option<SurfaceId>,
}

impl GlyphSprite {
    fn new(spec: GlyphSpec) -> Self {
        Self {
            spec,
            x: 0,
            y: 0,
            z: 0,
            show: false,
            surface: None,
        }
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    fn construct(&mut self, renderer: &mut impl RenderBackend) {
        let size = self.spec.font_size;
        let surface = renderer.construct(SurfaceKind::Glyph, size, size);
        renderer.mark_dirty(surface);
        self.surface = Some(surface);
    }
}

#[derive(Debug, Default)]
pub struct GlyphPool {
    live: HandlePool<GlyphSprite>,
    shadow: Option<HandlePool<GlyphSprite>>,
}

impl GlyphPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            live: HandlePool::with_capacity(capacity),
            shadow: None,
        }
    }

    /// Create a hidden sprite at the origin and build its surface.
    pub fn create(&mut self, spec: GlyphSpec, renderer: &mut impl RenderBackend) -> PoolHandle {
        let mut sprite = GlyphSprite::new(spec);
        sprite.construct(renderer);
        self.live.insert(sprite)
    }

    pub fn release(&mut self, handle: PoolHandle) -> bool {
        self.live.release(handle)
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&GlyphSprite> {
        self.live.get(handle)
    }

    fn sprite_mut(&mut self, handle: PoolHandle) -> Result<&mut GlyphSprite, HistoryError> {
        self.live
            .get_mut(handle)
            .ok_or(HistoryError::StaleHandle(handle))
    }

    pub fn set_show(&mut self, handle: PoolHandle, show: bool) -> Result<(), HistoryError> {
        self.sprite_mut(handle)?.show = show;
        Ok(())
    }

    pub fn set_position(
        &mut self,
        handle: PoolHandle,
        x: i32,
        y: i32,
        z: i32,
    ) -> Result<(), HistoryError> {
        let sprite = self.sprite_mut(handle)?;
        sprite.x = x;
        sprite.y = y;
        sprite.z = z;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.live.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &GlyphSprite)> {
        self.live.iter()
    }

    /// Release every sprite and drop any pending load. Returns `false` if
    /// there was nothing to drop.
    pub fn clear(&mut self) -> bool {
        let had_shadow = self.shadow.take().is_some();
        self.live.clear() || had_shadow
    }

    pub fn save(&self) -> Result<Blob, SnapshotError> {
        let mut w = SnapshotWriter::begin(GLYPH_SPRITE_MAGIC, GLYPH_SPRITE_VERSION);
        w.write_count(self.live.capacity())?;
        for (generation, sprite) in self.live.slots() {
            w.write_int(generation as i32);
            w.write_bool(sprite.is_some());
            let Some(sprite) = sprite else {
                continue;
            };
            w.write_int(sprite.spec.ch as i32);
            w.write_int(sprite.spec.font_size);
            for c in sprite.spec.color {
                w.write_int(c);
            }
            w.write_int(sprite.x);
            w.write_int(sprite.y);
            w.write_int(sprite.z);
            w.write_bool(sprite.show);
        }
        tracing::debug!(sprites = self.live.len(), "saved glyph sprites");
        Ok(w.finish())
    }

    /// Decode `blob` into the shadow pool. The live pool is untouched until
    /// [`rebuild`](Self::rebuild). On failure any earlier pending load is
    /// dropped too.
    pub fn load(&mut self, blob: &Blob) -> Result<(), SnapshotError> {
        self.shadow = None;
        match read_slots(blob) {
            Ok(pool) => {
                tracing::debug!(sprites = pool.len(), "loaded glyph sprites");
                self.shadow = Some(pool);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected glyph sprite snapshot");
                Err(e)
            }
        }
    }

    pub fn has_pending_rebuild(&self) -> bool {
        self.shadow.is_some()
    }

    /// Publish a pending load. Surfaces are built while the sprites are
    /// still in the shadow pool, so no sprite becomes reachable, and its
    /// saved visibility takes effect, until every surface exists. Returns
    /// `false` if no load was pending.
    pub fn rebuild(&mut self, renderer: &mut impl RenderBackend) -> bool {
        let Some(mut pool) = self.shadow.take() else {
            return false;
        };
        for (_, sprite) in pool.iter_mut() {
            sprite.construct(renderer);
        }
        tracing::debug!(sprites = pool.len(), "rebuilt glyph sprites");
        self.live = pool;
        true
    }
}

fn read_slots(blob: &Blob) -> Result<HandlePool<GlyphSprite>, SnapshotError> {
    let mut r = SnapshotReader::begin(blob, GLYPH_SPRITE_MAGIC, GLYPH_SPRITE_VERSION)?;
    // Generation plus occupancy flag.
    let count = r.read_count(2);
    r.checkpoint()?;

    let mut layout = Vec::with_capacity(count);
    for _ in 0..count {
        let generation = r.read_int() as u32;
        if !r.read_bool() {
            layout.push((generation, None));
            continue;
        }
        let ch = r.read_int();
        let Some(ch) = u32::try_from(ch).ok().and_then(char::from_u32) else {
            return Err(SnapshotError::InvalidRecord(format!(
                "glyph code {ch} is not a character"
            )));
        };
        let font_size = r.read_int();
        let color = [r.read_int(), r.read_int(), r.read_int()];
        let mut sprite = GlyphSprite::new(GlyphSpec {
            ch,
            font_size,
            color,
        });
        sprite.x = r.read_int();
        sprite.y = r.read_int();
        sprite.z = r.read_int();
        sprite.show = r.read_bool();
        r.checkpoint()?;
        layout.push((generation, Some(sprite)));
    }
    r.finish()?;
    Ok(HandlePool::restore(layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullRenderer;

    fn spec(ch: char) -> GlyphSpec {
        GlyphSpec {
            ch,
            font_size: 24,
            color: [255, 255, 255],
        }
    }

    #[test]
    fn create_builds_a_hidden_sprite() {
        let mut r = NullRenderer::new();
        let mut pool = GlyphPool::new(DEFAULT_GLYPH_CAPACITY);
        let h = pool.create(spec('あ'), &mut r);
        let sprite = pool.get(h).unwrap();
        assert!(!sprite.show);
        assert!(sprite.surface().is_some());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn released_handle_goes_stale() {
        let mut r = NullRenderer::new();
        let mut pool = GlyphPool::new(4);
        let h = pool.create(spec('a'), &mut r);
        assert!(pool.release(h));
        assert!(!pool.release(h));
        assert_eq!(pool.set_show(h, true), Err(HistoryError::StaleHandle(h)));
        let h2 = pool.create(spec('b'), &mut r);
        assert_eq!(h2.index(), h.index());
        assert!(pool.get(h).is_none());
    }

    #[test]
    fn load_waits_for_rebuild() {
        let mut r = NullRenderer::new();
        let mut pool = GlyphPool::new(4);
        let a = pool.create(spec('a'), &mut r);
        pool.set_show(a, true).unwrap();
        pool.set_position(a, 10, 20, 3).unwrap();
        let blob = pool.save().unwrap();

        let mut target = GlyphPool::new(4);
        target.load(&blob).unwrap();
        assert!(target.has_pending_rebuild());
        assert!(target.is_empty());

        assert!(target.rebuild(&mut r));
        assert!(!target.has_pending_rebuild());
        let sprite = target.get(a).unwrap();
        assert!(sprite.show);
        assert_eq!((sprite.x, sprite.y, sprite.z), (10, 20, 3));
        assert_eq!(sprite.spec, spec('a'));
        assert!(sprite.surface().is_some());
        assert!(!target.rebuild(&mut r));
    }

    #[test]
    fn rebuild_publishes_saved_visibility_with_surfaces() {
        let mut r = crate::test_utils::RecordingRenderer::new();
        let mut pool = GlyphPool::new(4);
        let shown = pool.create(spec('s'), &mut r);
        let hidden = pool.create(spec('h'), &mut r);
        pool.set_show(shown, true).unwrap();
        let blob = pool.save().unwrap();

        let mut target = GlyphPool::new(4);
        let old = target.create(spec('o'), &mut r);
        target.load(&blob).unwrap();
        let before = r.constructed();
        // Nothing loaded is reachable before the swap.
        assert_eq!(target.get(old).map(|s| s.spec.ch), Some('o'));
        assert!(target.get(hidden).is_none());

        assert!(target.rebuild(&mut r));
        assert_eq!(r.constructed(), before + 2);
        let shown = target.get(shown).unwrap();
        let hidden = target.get(hidden).unwrap();
        assert!(shown.show && shown.surface().is_some());
        assert!(!hidden.show && hidden.surface().is_some());
    }

    #[test]
    fn handles_survive_round_trip_with_holes() {
        let mut r = NullRenderer::new();
        let mut pool = GlyphPool::new(4);
        let a = pool.create(spec('a'), &mut r);
        let b = pool.create(spec('b'), &mut r);
        pool.release(a);
        let blob = pool.save().unwrap();

        let mut target = GlyphPool::default();
        target.load(&blob).unwrap();
        target.rebuild(&mut r);
        assert!(target.get(a).is_none());
        assert_eq!(target.get(b).unwrap().spec.ch, 'b');
        // The released slot is reused with its bumped generation.
        let c = target.create(spec('c'), &mut r);
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
    }

    #[test]
    fn failed_load_keeps_live_pool() {
        let mut r = NullRenderer::new();
        let mut pool = GlyphPool::new(4);
        let a = pool.create(spec('a'), &mut r);
        let mut words = pool.save().unwrap().into_words();
        words.truncate(words.len() - 2);

        assert!(pool.load(&Blob::from_words(words)).is_err());
        assert!(!pool.has_pending_rebuild());
        assert!(pool.get(a).is_some());
    }

    #[test]
    fn clear_drops_live_and_pending() {
        let mut r = NullRenderer::new();
        let mut pool = GlyphPool::new(4);
        pool.create(spec('a'), &mut r);
        let blob = pool.save().unwrap();
        pool.load(&blob).unwrap();
        assert!(pool.clear());
        assert!(!pool.has_pending_rebuild());
        assert!(pool.is_empty());
        assert!(!pool.clear());
    }
}
