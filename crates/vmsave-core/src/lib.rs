//! VM Save -- persistence for an embedded scripting VM's runtime objects.
//!
//! This crate flattens sprites, parts widgets, dialogue logs and cached scene
//! structs into versioned word-stream blobs that the host keeps as opaque
//! save buffers, and restores them again.
//!
//! # Layers
//!
//! 1. **Codec** -- [`codec::WordWriter`] / [`codec::WordReader`] encode
//!    scalars, strings, structs and nested arrays guided by a
//!    [`descriptor::TypeRegistry`]. Reads never fail loudly: a sticky error
//!    flag is checked at record boundaries.
//! 2. **Snapshots** -- [`snapshot::SnapshotWriter`] / [`snapshot::SnapshotReader`]
//!    wrap a magic tag and version word around one record family.
//! 3. **History stores** -- [`history::RingStore`] (bounded, evicts oldest)
//!    and [`history::HandlePool`] (growable, generation-tagged handles).
//! 4. **Orchestration** -- the concrete stores ([`dialogue_log`],
//!    [`scene_cache`], [`glyph`]) and the [`parts::PartsEngine`].
//!
//! # Failure Atomicity
//!
//! A load either replaces a store's contents completely or leaves the store
//! empty. Header and version mismatches are rejected before anything is
//! touched:
//!
//! ```rust,ignore
//! let blob = ctx.parts.save(true)?;
//! ctx.parts.load(&blob, &mut renderer)?;
//! ctx.parts.resolve_pending_parents();
//! ```
//!
//! # Key Types
//!
//! - [`context::SaveContext`] -- Owns one instance of every store.
//! - [`config::SaveConfig`] -- Capacities and parts format versions.
//! - [`heap::VmHeap`] -- What the stores need from the VM heap.
//! - [`render::RenderBackend`] -- What rebuild steps need from the compositor.
//! - [`snapshot::detect_kind`] -- Identify a blob's record family.

pub mod codec;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod dialogue_log;
pub mod glyph;
pub mod heap;
pub mod history;
pub mod id;
pub mod parts;
pub mod render;
pub mod scene_cache;
pub mod snapshot;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
