//! Interface to the VM heap, plus an in-memory heap for hosts and tests.

use crate::descriptor::{ArrayDescriptor, TypeRegistry};
use crate::id::HeapRef;
use crate::snapshot::Blob;
use crate::value::{StructValue, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeapError {
    #[error("no heap object {0}")]
    NotFound(HeapRef),
    #[error("heap object {id} is not a {expected}")]
    WrongKind { id: HeapRef, expected: &'static str },
}

/// The operations the stores need from the VM heap.
pub trait VmHeap {
    /// Descriptors for every struct type living on this heap.
    fn types(&self) -> &TypeRegistry;

    fn struct_object(&self, id: HeapRef) -> Result<&StructValue, HeapError>;

    /// Array elements plus the array's element descriptor. `None` elements
    /// is the absent array.
    fn array_object(&self, id: HeapRef) -> Result<(Option<&[Value]>, ArrayDescriptor), HeapError>;

    fn string_object(&self, id: HeapRef) -> Result<&str, HeapError>;

    fn int_array(&self, id: HeapRef) -> Result<&[i32], HeapError>;

    /// Allocate an int array holding `words` and return its reference.
    fn alloc_int_array(&mut self, words: &[i32]) -> HeapRef;

    fn alloc_struct(&mut self, value: StructValue) -> HeapRef;
}

#[derive(Debug, Clone)]
enum HeapObject {
    Struct(StructValue),
    Array(ArrayDescriptor, Option<Vec<Value>>),
    IntArray(Vec<i32>),
    String(String),
}

/// A simple map-backed heap.
#[derive(Debug)]
pub struct ObjectHeap {
    types: Arc<TypeRegistry>,
    objects: HashMap<HeapRef, HeapObject>,
    next_id: HeapRef,
}

impl ObjectHeap {
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            objects: HashMap::new(),
            next_id: 1,
        }
    }

    fn alloc(&mut self, object: HeapObject) -> HeapRef {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    pub fn alloc_string(&mut self, s: &str) -> HeapRef {
        self.alloc(HeapObject::String(s.to_string()))
    }

    pub fn alloc_array(&mut self, desc: ArrayDescriptor, items: Option<Vec<Value>>) -> HeapRef {
        self.alloc(HeapObject::Array(desc, items))
    }

    pub fn free(&mut self, id: HeapRef) -> bool {
        self.objects.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn object(&self, id: HeapRef) -> Result<&HeapObject, HeapError> {
        self.objects.get(&id).ok_or(HeapError::NotFound(id))
    }
}

impl VmHeap for ObjectHeap {
    fn types(&self) -> &TypeRegistry {
        &self.types
    }

    fn struct_object(&self, id: HeapRef) -> Result<&StructValue, HeapError> {
        match self.object(id)? {
            HeapObject::Struct(s) => Ok(s),
            _ => Err(HeapError::WrongKind {
                id,
                expected: "struct",
            }),
        }
    }

    fn array_object(&self, id: HeapRef) -> Result<(Option<&[Value]>, ArrayDescriptor), HeapError> {
        match self.object(id)? {
            HeapObject::Array(desc, items) => Ok((items.as_deref(), *desc)),
            _ => Err(HeapError::WrongKind {
                id,
                expected: "array",
            }),
        }
    }

    fn string_object(&self, id: HeapRef) -> Result<&str, HeapError> {
        match self.object(id)? {
            HeapObject::String(s) => Ok(s),
            _ => Err(HeapError::WrongKind {
                id,
                expected: "string",
            }),
        }
    }

    fn int_array(&self, id: HeapRef) -> Result<&[i32], HeapError> {
        match self.object(id)? {
            HeapObject::IntArray(words) => Ok(words),
            _ => Err(HeapError::WrongKind {
                id,
                expected: "int array",
            }),
        }
    }

    fn alloc_int_array(&mut self, words: &[i32]) -> HeapRef {
        self.alloc(HeapObject::IntArray(words.to_vec()))
    }

    fn alloc_struct(&mut self, value: StructValue) -> HeapRef {
        self.alloc(HeapObject::Struct(value))
    }
}

impl Blob {
    /// Package the blob as an int array on `heap` so the VM can hold it.
    pub fn store_in(&self, heap: &mut impl VmHeap) -> HeapRef {
        heap.alloc_int_array(self.words())
    }

    /// Fetch a blob previously packaged with [`store_in`](Self::store_in).
    pub fn load_from(heap: &impl VmHeap, id: HeapRef) -> Result<Blob, HeapError> {
        heap.int_array(id).map(|words| Blob::from_words(words.to_vec()))
    }
}
