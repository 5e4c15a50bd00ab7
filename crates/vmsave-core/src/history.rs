//! Bounded history stores.
//!
//! [`RingStore`] is a fixed-capacity circular buffer addressed oldest-first
//! that evicts its oldest entry on overflow. [`HandlePool`] is the growable
//! variant with explicit release and generation-tagged handles.

use crate::id::PoolHandle;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("index {index} out of range for store holding {count} entries")]
    OutOfRange { index: usize, count: usize },
    #[error("handle {0:?} is stale or was never issued")]
    StaleHandle(PoolHandle),
    #[error("slot {0} restored twice")]
    DuplicateSlot(u32),
}

// ---------------------------------------------------------------------------
// RingStore
// ---------------------------------------------------------------------------

/// A fixed-capacity ring of entries.
///
/// The backing array is allocated by the first push. `first` and `last` are
/// the physical slots of the oldest and newest entry; once allocated the
/// store holds `(last - first + capacity) % capacity + 1` entries. An
/// unallocated store holds none.
#[derive(Debug)]
pub struct RingStore<T> {
    capacity: usize,
    slots: Option<Vec<Option<T>>>,
    first: usize,
    last: usize,
    total_pushed: u64,
}

impl<T> RingStore<T> {
    /// Create an unallocated store. A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: None,
            first: 0,
            last: 0,
            total_pushed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_allocated(&self) -> bool {
        self.slots.is_some()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        if self.slots.is_none() {
            return 0;
        }
        (self.last + self.capacity - self.first) % self.capacity + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries ever pushed, evicted ones included.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Append an entry built by `make`. When the ring is full the oldest
    /// entry is dropped before `make` runs.
    pub fn push_new(&mut self, make: impl FnOnce() -> T) -> &mut T {
        self.total_pushed += 1;
        let capacity = self.capacity;
        let slot = match self.slots {
            None => {
                let mut slots: Vec<Option<T>> = (0..capacity).map(|_| None).collect();
                self.first = 0;
                self.last = 0;
                slots[0] = Some(make());
                self.slots.insert(slots)
            }
            Some(ref mut slots) => {
                let next = (self.last + 1) % capacity;
                if next == self.first {
                    slots[self.first] = None;
                    self.first = (self.first + 1) % capacity;
                    tracing::trace!(capacity, "ring full, evicted oldest entry");
                }
                self.last = next;
                slots[next] = Some(make());
                slots
            }
        };
        slot[self.last]
            .as_mut()
            .unwrap_or_else(|| unreachable!("slot constructed above"))
    }

    pub fn push(&mut self, value: T) -> &mut T {
        self.push_new(|| value)
    }

    fn physical(&self, index: usize) -> Result<usize, HistoryError> {
        let count = self.len();
        if index >= count {
            return Err(HistoryError::OutOfRange { index, count });
        }
        Ok((self.first + index) % self.capacity)
    }

    /// Entry by logical index (0 = oldest, len-1 = newest).
    pub fn get(&self, index: usize) -> Result<&T, HistoryError> {
        let slot = self.physical(index)?;
        self.slots
            .as_ref()
            .and_then(|s| s[slot].as_ref())
            .ok_or(HistoryError::OutOfRange {
                index,
                count: self.len(),
            })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut T, HistoryError> {
        let slot = self.physical(index)?;
        let count = self.len();
        self.slots
            .as_mut()
            .and_then(|s| s[slot].as_mut())
            .ok_or(HistoryError::OutOfRange { index, count })
    }

    /// The newest entry.
    pub fn latest(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i).ok())
    }

    pub fn latest_mut(&mut self) -> Option<&mut T> {
        let last = self.len().checked_sub(1)?;
        self.get_mut(last).ok()
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        (0..self.len()).filter_map(move |i| self.get(i).ok())
    }

    /// Drop every entry and release the backing array. Returns `false` when
    /// the store was already unallocated.
    pub fn clear(&mut self) -> bool {
        let Some(mut slots) = self.slots.take() else {
            return false;
        };
        let mut i = self.first;
        loop {
            slots[i] = None;
            if i == self.last {
                break;
            }
            i = (i + 1) % self.capacity;
        }
        self.first = 0;
        self.last = 0;
        true
    }
}

// ---------------------------------------------------------------------------
// HandlePool
// ---------------------------------------------------------------------------

/// Minimum capacity a pool grows to on its first insert.
pub const MIN_POOL_CAPACITY: usize = 4;

#[derive(Debug, Clone)]
struct PoolSlot<T> {
    generation: u32,
    value: Option<T>,
}

/// A growable pool of entries addressed by generation-tagged handles.
///
/// Free slots are kept on a stack. When it runs dry the pool doubles its
/// capacity and pushes the new slots. Releasing a slot bumps its generation
/// so old handles to it stop resolving.
#[derive(Debug, Clone)]
pub struct HandlePool<T> {
    slots: Vec<PoolSlot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for HandlePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandlePool<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut pool = Self::new();
        pool.grow_to(capacity);
        pool
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn grow_to(&mut self, capacity: usize) {
        let old = self.slots.len();
        if capacity <= old {
            return;
        }
        self.slots.extend((old..capacity).map(|_| PoolSlot {
            generation: 0,
            value: None,
        }));
        // Lowest index on top so handles are handed out in ascending order.
        self.free.extend((old as u32..capacity as u32).rev());
    }

    pub fn insert(&mut self, value: T) -> PoolHandle {
        if self.free.is_empty() {
            let doubled = (self.slots.len() * 2).max(MIN_POOL_CAPACITY);
            self.grow_to(doubled);
        }
        let index = self
            .free
            .pop()
            .unwrap_or_else(|| unreachable!("pool grown above"));
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.live += 1;
        PoolHandle::new(index, slot.generation)
    }

    fn slot(&self, handle: PoolHandle) -> Option<&PoolSlot<T>> {
        self.slots
            .get(handle.index() as usize)
            .filter(|s| s.generation == handle.generation() && s.value.is_some())
    }

    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.slot(handle).is_some()
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slot(handle).and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.value.as_mut())
    }

    /// Drop the entry behind `handle` and recycle its slot. Returns `false`
    /// for stale or unknown handles.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        let slot = &mut self.slots[handle.index() as usize];
        slot.value = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.live -= 1;
        true
    }

    /// Release every live entry. Returns `false` if there was none.
    pub fn clear(&mut self) -> bool {
        let handles: Vec<PoolHandle> = self.iter().map(|(h, _)| h).collect();
        for handle in &handles {
            self.release(*handle);
        }
        !handles.is_empty()
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value
                .as_ref()
                .map(|v| (PoolHandle::new(i as u32, s.generation), v))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value
                .as_mut()
                .map(|v| (PoolHandle::new(i as u32, generation), v))
        })
    }

    /// Every slot's generation and entry, for snapshotting the exact layout.
    pub fn slots(&self) -> impl Iterator<Item = (u32, Option<&T>)> {
        self.slots.iter().map(|s| (s.generation, s.value.as_ref()))
    }

    /// Rebuild a pool from a slot layout produced by [`slots`](Self::slots).
    pub fn restore(layout: Vec<(u32, Option<T>)>) -> Self {
        let mut pool = Self::new();
        for (generation, value) in layout {
            if value.is_some() {
                pool.live += 1;
            }
            pool.slots.push(PoolSlot { generation, value });
        }
        pool.free = (0..pool.slots.len() as u32)
            .rev()
            .filter(|&i| pool.slots[i as usize].value.is_none())
            .collect();
        pool
    }
}
