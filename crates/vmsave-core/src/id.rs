use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a live parts entity inside the parts engine.
    pub struct PartsKey;
}

/// The externally visible number of a parts entity, as the VM sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartsNumber(pub i32);

/// Identifies a struct descriptor in the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StructTypeId(pub u32);

/// Identifies a surface handed out by the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u32);

/// Reference to an object on the VM heap. Negative values never name an object.
pub type HeapRef = i32;

/// A generation-tagged handle into a [`HandlePool`](crate::history::HandlePool).
///
/// Releasing a slot bumps its generation, so a handle kept across a release
/// no longer matches and is detectably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

impl PoolHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}
