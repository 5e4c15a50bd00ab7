use crate::id::PartsKey;
use std::collections::BTreeSet;

/// Tracks parts entities whose derived state is stale.
///
/// Geometry changes leave a hit box to recompute, content changes leave a
/// surface to redraw, and any z or membership change leaves the draw order
/// to re-sort. The engine flushes geometry and order before every save.
#[derive(Debug, Clone, Default)]
pub struct PendingUpdates {
    geometry: BTreeSet<PartsKey>,
    content: BTreeSet<PartsKey>,
    order_dirty: bool,
}

impl PendingUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_geometry(&mut self, key: PartsKey) {
        self.geometry.insert(key);
    }

    pub fn mark_content(&mut self, key: PartsKey) {
        self.content.insert(key);
    }

    pub fn mark_order(&mut self) {
        self.order_dirty = true;
    }

    /// Everything about one entity may have changed.
    pub fn mark_all(&mut self, key: PartsKey) {
        self.mark_geometry(key);
        self.mark_content(key);
        self.mark_order();
    }

    pub fn forget(&mut self, key: PartsKey) {
        self.geometry.remove(&key);
        self.content.remove(&key);
    }

    pub fn is_pending(&self) -> bool {
        self.order_dirty || !self.geometry.is_empty() || !self.content.is_empty()
    }

    pub fn is_geometry_pending(&self, key: PartsKey) -> bool {
        self.geometry.contains(&key)
    }

    pub fn is_content_pending(&self, key: PartsKey) -> bool {
        self.content.contains(&key)
    }

    pub fn is_order_dirty(&self) -> bool {
        self.order_dirty
    }

    /// Take the geometry set and the order flag, leaving both clean.
    pub fn take_layout(&mut self) -> (BTreeSet<PartsKey>, bool) {
        let order = std::mem::take(&mut self.order_dirty);
        (std::mem::take(&mut self.geometry), order)
    }

    pub fn take_content(&mut self) -> BTreeSet<PartsKey> {
        std::mem::take(&mut self.content)
    }

    pub fn clear(&mut self) {
        self.geometry.clear();
        self.content.clear();
        self.order_dirty = false;
    }
}
