//! The parts engine: numbered, layered widgets and their save format.
//!
//! # Architecture
//!
//! The `PartsEngine` owns:
//! - every live [`PartsEntity`] in a `SlotMap`, indexed by external number
//! - derived per-entity state (hit boxes, surfaces) in `SecondaryMap`s
//! - the draw order, sorted by `(z, number)`
//! - the numeral-font table
//! - a [`PendingUpdates`] tracker for lazily recomputed state
//!
//! # Save format
//!
//! After the `"PRT"` header and version word:
//! 1. numeral-font table (version 2 and later)
//! 2. record count, backpatched once the records are written
//! 3. one record per entity, ascending by number
//!
//! See [`save`] for the record layout.

pub mod entity;
pub mod pending;
pub mod save;
pub mod schema;

use crate::config::PartsConfig;
use crate::descriptor::DescriptorError;
use crate::id::{PartsKey, PartsNumber, SurfaceId};
use crate::render::{RenderBackend, SurfaceKind};
use entity::{HitBox, ParentLink, PartsEntity, PartsKind, PartsState};
use pending::PendingUpdates;
use schema::PartsSchema;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::BTreeMap;

/// Newest parts save format this build reads and writes.
pub const PARTS_VERSION: u32 = 2;

/// Glyphs in a numeral font: digits 0-9, minus sign, comma.
pub const NUMERAL_GLYPHS: usize = 12;

/// CG numbers used to draw numeral entities, plus the cell size of one glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumeralFont {
    pub cgs: [i32; NUMERAL_GLYPHS],
    pub width: i32,
    pub height: i32,
}

#[derive(Debug)]
pub struct PartsEngine {
    entities: SlotMap<PartsKey, PartsEntity>,
    by_number: BTreeMap<PartsNumber, PartsKey>,
    hit_boxes: SecondaryMap<PartsKey, HitBox>,
    surfaces: SecondaryMap<PartsKey, SurfaceId>,
    draw_order: Vec<PartsKey>,
    numeral_fonts: BTreeMap<i32, NumeralFont>,
    pending: PendingUpdates,
    schema: PartsSchema,
    write_version: u32,
    max_load_version: u32,
}

impl PartsEngine {
    pub fn new(config: &PartsConfig) -> Result<Self, DescriptorError> {
        Ok(Self {
            entities: SlotMap::with_key(),
            by_number: BTreeMap::new(),
            hit_boxes: SecondaryMap::new(),
            surfaces: SecondaryMap::new(),
            draw_order: Vec::new(),
            numeral_fonts: BTreeMap::new(),
            pending: PendingUpdates::new(),
            schema: PartsSchema::new()?,
            write_version: config.write_version,
            max_load_version: config.max_load_version,
        })
    }

    pub fn write_version(&self) -> u32 {
        self.write_version
    }

    pub fn max_load_version(&self) -> u32 {
        self.max_load_version
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn key(&self, number: PartsNumber) -> Option<PartsKey> {
        self.by_number.get(&number).copied()
    }

    /// Look up entity `number`, creating a blank one if it does not exist.
    pub fn get_or_create(&mut self, number: PartsNumber) -> PartsKey {
        if let Some(key) = self.key(number) {
            return key;
        }
        let key = self.entities.insert(PartsEntity::new(number));
        self.by_number.insert(number, key);
        self.pending.mark_all(key);
        key
    }

    pub fn entity(&self, number: PartsNumber) -> Option<&PartsEntity> {
        self.key(number).and_then(|k| self.entities.get(k))
    }

    /// Mutable access. The entity's derived state is recomputed on the next
    /// flush.
    pub fn entity_mut(&mut self, number: PartsNumber) -> Option<&mut PartsEntity> {
        let key = self.key(number)?;
        self.pending.mark_all(key);
        self.entities.get_mut(key)
    }

    pub fn entities(&self) -> impl Iterator<Item = &PartsEntity> {
        self.by_number.values().filter_map(|k| self.entities.get(*k))
    }

    /// Destroy entity `number`. Children linked to it fall back to a pending
    /// link by number. Returns `false` if there was no such entity.
    pub fn release(&mut self, number: PartsNumber) -> bool {
        let Some(key) = self.by_number.remove(&number) else {
            return false;
        };
        self.entities.remove(key);
        self.hit_boxes.remove(key);
        self.surfaces.remove(key);
        self.pending.forget(key);
        self.pending.mark_order();
        for child in self.entities.values_mut() {
            if child.parent == ParentLink::Linked(key) {
                child.parent = ParentLink::Pending(number);
            }
        }
        true
    }

    /// Destroy every entity. Returns `false` if there were none.
    pub fn release_all(&mut self) -> bool {
        let had_any = !self.entities.is_empty();
        self.entities.clear();
        self.by_number.clear();
        self.hit_boxes.clear();
        self.surfaces.clear();
        self.draw_order.clear();
        self.pending.clear();
        had_any
    }

    pub fn set_numeral_font(&mut self, id: i32, font: NumeralFont) {
        self.numeral_fonts.insert(id, font);
        for (key, e) in &self.entities {
            if matches!(e.state, PartsState::Numeral { font, .. } if font == id) {
                self.pending.mark_geometry(key);
                self.pending.mark_content(key);
            }
        }
    }

    pub fn numeral_font(&self, id: i32) -> Option<&NumeralFont> {
        self.numeral_fonts.get(&id)
    }

    pub fn numeral_fonts(&self) -> impl Iterator<Item = (i32, &NumeralFont)> {
        self.numeral_fonts.iter().map(|(id, f)| (*id, f))
    }

    /// Unscaled size of `entity`, if it draws anything.
    pub fn size_of(&self, entity: &PartsEntity) -> Option<(i32, i32)> {
        match entity.state {
            PartsState::Numeral {
                value,
                font,
                digits,
                comma,
                ..
            } => {
                let font = self.numeral_fonts.get(&font)?;
                let cells = numeral_cells(value, digits, comma);
                Some((cells.saturating_mul(font.width), font.height))
            }
            ref state => state.size(),
        }
    }

    /// Bring hit boxes and the draw order up to date.
    pub fn flush_pending(&mut self) {
        let (geometry, order_dirty) = self.pending.take_layout();
        for key in geometry {
            self.refresh_hit_box(key);
        }
        if order_dirty {
            self.sort_draw_order();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_pending()
    }

    fn refresh_hit_box(&mut self, key: PartsKey) {
        let Some(entity) = self.entities.get(key) else {
            return;
        };
        match self.size_of(entity).map(|size| entity.hit_box(size)) {
            Some(hit_box) => {
                self.hit_boxes.insert(key, hit_box);
            }
            None => {
                self.hit_boxes.remove(key);
            }
        }
    }

    fn sort_draw_order(&mut self) {
        let entities = &self.entities;
        self.draw_order = entities.keys().collect();
        self.draw_order
            .sort_by_key(|k| entities.get(*k).map(|e| (e.z, e.number)));
    }

    /// Entities back to front, as of the last flush.
    pub fn draw_order(&self) -> impl Iterator<Item = &PartsEntity> {
        self.draw_order.iter().filter_map(|k| self.entities.get(*k))
    }

    /// Hit box of entity `number` as of the last flush.
    pub fn hit_box(&self, number: PartsNumber) -> Option<HitBox> {
        self.key(number)
            .and_then(|k| self.hit_boxes.get(k))
            .copied()
    }

    /// Topmost shown, clickable entity under `(x, y)`, as of the last flush.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<PartsNumber> {
        self.draw_order.iter().rev().find_map(|key| {
            let e = self.entities.get(*key)?;
            let hit_box = self.hit_boxes.get(*key)?;
            (e.show && e.clickable && hit_box.contains(x, y)).then_some(e.number)
        })
    }

    pub fn surface(&self, number: PartsNumber) -> Option<SurfaceId> {
        self.key(number)
            .and_then(|k| self.surfaces.get(k))
            .copied()
    }

    /// Build missing surfaces and mark every changed one for redraw.
    pub fn present(&mut self, renderer: &mut impl RenderBackend) {
        for key in self.pending.take_content() {
            self.present_one(key, renderer);
        }
    }

    fn present_one(&mut self, key: PartsKey, renderer: &mut impl RenderBackend) {
        let Some(entity) = self.entities.get(key) else {
            return;
        };
        let Some((w, h)) = self.size_of(entity) else {
            return;
        };
        let surface = match self.surfaces.get(key) {
            Some(s) => *s,
            None => {
                let s = renderer.construct(surface_kind(entity.kind()), w, h);
                self.surfaces.insert(key, s);
                s
            }
        };
        renderer.mark_dirty(surface);
    }

    /// Link every pending parent number to the entity now holding it.
    /// Numbers with no live entity (or naming the child itself) stay
    /// pending. Returns how many links were made.
    pub fn resolve_pending_parents(&mut self) -> usize {
        let mut resolved = 0;
        for (key, e) in self.entities.iter_mut() {
            let ParentLink::Pending(number) = e.parent else {
                continue;
            };
            match self.by_number.get(&number) {
                Some(parent) if *parent != key => {
                    e.parent = ParentLink::Linked(*parent);
                    resolved += 1;
                }
                _ => {}
            }
        }
        resolved
    }

    /// Number of the parent of entity `number`, whether linked or pending.
    pub fn parent_number(&self, number: PartsNumber) -> Option<PartsNumber> {
        self.parent_of(self.entity(number)?)
    }

    fn parent_of(&self, entity: &PartsEntity) -> Option<PartsNumber> {
        match entity.parent {
            ParentLink::None => None,
            ParentLink::Pending(n) => Some(n),
            ParentLink::Linked(k) => self.entities.get(k).map(|p| p.number),
        }
    }
}

/// Glyph cells a numeral display needs.
fn numeral_cells(value: i32, digits: i32, comma: bool) -> i32 {
    let magnitude = value.unsigned_abs();
    let natural = magnitude.checked_ilog10().map_or(1, |d| d as i32 + 1);
    let shown = natural.max(digits);
    let commas = if comma { (shown - 1) / 3 } else { 0 };
    let sign = i32::from(value < 0);
    shown.saturating_add(commas).saturating_add(sign)
}

fn surface_kind(kind: PartsKind) -> SurfaceKind {
    match kind {
        PartsKind::Uninit | PartsKind::Image => SurfaceKind::Image,
        PartsKind::Text => SurfaceKind::Text,
        PartsKind::Animation => SurfaceKind::Animation,
        PartsKind::Numeral => SurfaceKind::Numeral,
        PartsKind::Gauge => SurfaceKind::Gauge,
        PartsKind::Construction => SurfaceKind::Construction,
        PartsKind::Vector => SurfaceKind::Vector,
    }
}
