//! Scene cache: a ring of encoded scene structs.
//!
//! The cache never interprets its entries. Each one is kept as the word
//! stream of one struct plus the name of its struct type, and only decoded
//! again when read back out. An empty cache holds zero entries.

use crate::codec::{EncodeError, WordReader, WordWriter};
use crate::descriptor::TypeRegistry;
use crate::heap::{HeapError, VmHeap};
use crate::history::{HistoryError, RingStore};
use crate::id::HeapRef;
use crate::snapshot::{Blob, SCENE_CACHE_MAGIC, SnapshotError, SnapshotReader, SnapshotWriter};
use crate::value::StructValue;

pub const SCENE_CACHE_CAPACITY: usize = 500;
pub const SCENE_CACHE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SceneCacheError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("struct type {0:?} is not registered")]
    UnknownType(String),
    #[error("cached {type_name} entry does not decode with the current descriptor")]
    Corrupt { type_name: String },
}

/// One cached struct, still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneEntry {
    pub type_name: String,
    pub words: Vec<i32>,
}

impl SceneEntry {
    /// Decode the entry with the descriptor registered under its type name.
    pub fn decode(&self, types: &TypeRegistry) -> Result<StructValue, SceneCacheError> {
        let type_id = types
            .struct_id(&self.type_name)
            .ok_or_else(|| SceneCacheError::UnknownType(self.type_name.clone()))?;
        let mut r = WordReader::new(&self.words);
        let value = r.read_struct(type_id, types);
        if r.has_error() || !r.is_exhausted() {
            return Err(SceneCacheError::Corrupt {
                type_name: self.type_name.clone(),
            });
        }
        Ok(value)
    }
}

#[derive(Debug)]
pub struct SceneCache {
    entries: RingStore<SceneEntry>,
}

impl Default for SceneCache {
    fn default() -> Self {
        Self::new(SCENE_CACHE_CAPACITY)
    }
}

impl SceneCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RingStore::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode `value` and append it, evicting the oldest entry when full.
    pub fn push(
        &mut self,
        value: &StructValue,
        types: &TypeRegistry,
    ) -> Result<(), SceneCacheError> {
        let desc = types
            .get(value.type_id)
            .ok_or(EncodeError::UnknownStruct(value.type_id))?;
        let mut w = WordWriter::new();
        w.write_struct(value, value.type_id, types)?;
        self.entries.push(SceneEntry {
            type_name: desc.name.clone(),
            words: w.into_words(),
        });
        Ok(())
    }

    /// Append the struct object `id` from the VM heap.
    pub fn push_from_heap(
        &mut self,
        heap: &impl VmHeap,
        id: HeapRef,
    ) -> Result<(), SceneCacheError> {
        let value = heap.struct_object(id)?;
        self.push(value, heap.types())
    }

    pub fn entry(&self, index: usize) -> Result<&SceneEntry, SceneCacheError> {
        Ok(self.entries.get(index)?)
    }

    /// Decode entry `index` (0 = oldest).
    pub fn get(&self, index: usize, types: &TypeRegistry) -> Result<StructValue, SceneCacheError> {
        self.entries.get(index)?.decode(types)
    }

    /// Decode entry `index` into a fresh struct object on `heap`.
    pub fn restore_to_heap(
        &self,
        index: usize,
        heap: &mut impl VmHeap,
    ) -> Result<HeapRef, SceneCacheError> {
        let value = self.get(index, heap.types())?;
        Ok(heap.alloc_struct(value))
    }

    /// Drop every entry. Returns `false` if the cache was already empty.
    pub fn clear(&mut self) -> bool {
        self.entries.clear()
    }

    pub fn save(&self) -> Result<Blob, SnapshotError> {
        let mut w = SnapshotWriter::begin(SCENE_CACHE_MAGIC, SCENE_CACHE_VERSION);
        w.write_count(self.entries.len())?;
        for entry in self.entries.iter() {
            w.write_string(&entry.type_name)?;
            w.write_count(entry.words.len())?;
            for word in &entry.words {
                w.write_int(*word);
            }
        }
        tracing::debug!(entries = self.entries.len(), "saved scene cache");
        Ok(w.finish())
    }

    /// Replace the cache with the entries in `blob`. Every entry must name a
    /// struct type in `types` and decode cleanly with it. On failure the
    /// cache is left empty.
    pub fn load(&mut self, blob: &Blob, types: &TypeRegistry) -> Result<(), SnapshotError> {
        self.clear();
        match self.read_entries(blob, types) {
            Ok(entries) => {
                tracing::debug!(entries = entries.len(), "loaded scene cache");
                self.entries = entries;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected scene cache snapshot");
                self.clear();
                Err(e)
            }
        }
    }

    fn read_entries(
        &self,
        blob: &Blob,
        types: &TypeRegistry,
    ) -> Result<RingStore<SceneEntry>, SnapshotError> {
        let mut r = SnapshotReader::begin(blob, SCENE_CACHE_MAGIC, SCENE_CACHE_VERSION)?;
        // Type name terminator plus word count.
        let count = r.read_count(2);
        r.checkpoint()?;

        let mut entries = RingStore::new(self.entries.capacity());
        for _ in 0..count {
            let type_name = r.read_string();
            let len = r.read_count(1);
            let words: Vec<i32> = (0..len).map(|_| r.read_int()).collect();
            r.checkpoint()?;
            let entry = SceneEntry { type_name, words };
            entry
                .decode(types)
                .map_err(|e| SnapshotError::InvalidRecord(e.to_string()))?;
            entries.push(entry);
        }
        r.finish()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        ArrayDescriptor, ElementKind, MemberDef, MemberKind, TypeRegistryBuilder,
    };
    use crate::heap::ObjectHeap;
    use crate::id::StructTypeId;
    use crate::value::Value;
    use std::sync::Arc;

    fn scene_types() -> (TypeRegistry, StructTypeId) {
        let mut b = TypeRegistryBuilder::new();
        let scene = b
            .register_struct(
                "scene",
                vec![
                    MemberDef::new("bg", MemberKind::String),
                    MemberDef::new("fade", MemberKind::Float),
                    MemberDef::new(
                        "actors",
                        MemberKind::Array(ArrayDescriptor::flat(ElementKind::Int)),
                    ),
                ],
            )
            .unwrap();
        (b.build().unwrap(), scene)
    }

    fn scene(id: StructTypeId, bg: &str) -> StructValue {
        StructValue::new(
            id,
            vec![
                Value::String(bg.into()),
                Value::Float(0.5),
                Value::Array(Some(vec![Value::Int(3), Value::Int(-1)])),
            ],
        )
    }

    #[test]
    fn empty_cache_holds_nothing() {
        let mut cache = SceneCache::default();
        assert_eq!(cache.len(), 0);
        assert!(!cache.clear());
        assert_eq!(cache.len(), 0);
        assert!(matches!(
            cache.entry(0),
            Err(SceneCacheError::History(HistoryError::OutOfRange { index: 0, count: 0 }))
        ));
    }

    #[test]
    fn push_and_get_round_trips() {
        let (types, id) = scene_types();
        let mut cache = SceneCache::default();
        cache.push(&scene(id, "bg01"), &types).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entry(0).unwrap().type_name, "scene");
        assert_eq!(cache.get(0, &types).unwrap(), scene(id, "bg01"));
    }

    #[test]
    fn overflow_evicts_oldest() {
        let (types, id) = scene_types();
        let mut cache = SceneCache::new(2);
        for bg in ["a", "b", "c"] {
            cache.push(&scene(id, bg), &types).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(0, &types).unwrap(), scene(id, "b"));
        assert_eq!(cache.get(1, &types).unwrap(), scene(id, "c"));
    }

    #[test]
    fn heap_round_trip() {
        let (types, id) = scene_types();
        let mut heap = ObjectHeap::new(Arc::new(types));
        let obj = heap.alloc_struct(scene(id, "heap"));
        let mut cache = SceneCache::default();
        cache.push_from_heap(&heap, obj).unwrap();
        let restored = cache.restore_to_heap(0, &mut heap).unwrap();
        assert_ne!(restored, obj);
        assert_eq!(heap.struct_object(restored).unwrap(), &scene(id, "heap"));
    }

    #[test]
    fn save_load_round_trip() {
        let (types, id) = scene_types();
        let mut cache = SceneCache::default();
        cache.push(&scene(id, "one"), &types).unwrap();
        cache.push(&scene(id, "two"), &types).unwrap();
        let blob = cache.save().unwrap();

        let mut restored = SceneCache::default();
        restored.load(&blob, &types).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(1, &types).unwrap(), scene(id, "two"));
    }

    #[test]
    fn unknown_type_name_fails_load() {
        let (types, id) = scene_types();
        let mut cache = SceneCache::default();
        cache.push(&scene(id, "x"), &types).unwrap();
        let blob = cache.save().unwrap();

        let mut b = TypeRegistryBuilder::new();
        b.register_struct("other", vec![]).unwrap();
        let other = b.build().unwrap();

        let mut target = SceneCache::default();
        assert!(matches!(
            target.load(&blob, &other),
            Err(SnapshotError::InvalidRecord(_))
        ));
        assert!(target.is_empty());
    }

    #[test]
    fn truncated_blob_leaves_cache_empty() {
        let (types, id) = scene_types();
        let mut cache = SceneCache::default();
        cache.push(&scene(id, "x"), &types).unwrap();
        let mut words = cache.save().unwrap().into_words();
        words.pop();

        assert!(cache.load(&Blob::from_words(words), &types).is_err());
        assert!(cache.is_empty());
    }
}
