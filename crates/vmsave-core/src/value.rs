//! Dynamically-typed VM values as seen by the codec.

use crate::descriptor::{MemberKind, TypeRegistry};
use crate::id::StructTypeId;

/// One VM value.
///
/// Equality compares floats by bit pattern, so NaN payloads and signed zeros
/// are distinguished and a decoded value equals the value that was encoded.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
    Struct(StructValue),
    /// `None` is the absent array. Zero-length arrays are normalised to it
    /// by the codec.
    Array(Option<Vec<Value>>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// The value the reader produces for `kind` when the stream is exhausted.
    pub fn default_for(kind: &MemberKind, types: &TypeRegistry) -> Value {
        match kind {
            MemberKind::Int => Value::Int(0),
            MemberKind::Float => Value::Float(0.0),
            MemberKind::Bool => Value::Bool(false),
            MemberKind::String => Value::String(String::new()),
            MemberKind::Struct(id) => Value::Struct(StructValue::default_for(*id, types)),
            MemberKind::Array(_) => Value::Array(None),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Elements of an array value. The absent array yields an empty slice.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(Some(items)) => Some(items),
            Value::Array(None) => Some(&[]),
            _ => None,
        }
    }
}

/// A struct instance: its type and one value per member, in descriptor order.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub type_id: StructTypeId,
    pub members: Vec<Value>,
}

impl StructValue {
    pub fn new(type_id: StructTypeId, members: Vec<Value>) -> Self {
        Self { type_id, members }
    }

    /// A struct with every member at its default. Unknown types yield an
    /// empty member list.
    pub fn default_for(type_id: StructTypeId, types: &TypeRegistry) -> StructValue {
        let members = types
            .get(type_id)
            .map(|desc| {
                desc.members
                    .iter()
                    .map(|m| Value::default_for(&m.kind, types))
                    .collect()
            })
            .unwrap_or_default();
        StructValue { type_id, members }
    }

    pub fn member(&self, index: usize) -> Option<&Value> {
        self.members.get(index)
    }

    pub fn int(&self, index: usize) -> Option<i32> {
        self.member(index).and_then(Value::as_int)
    }

    pub fn float(&self, index: usize) -> Option<f32> {
        self.member(index).and_then(Value::as_float)
    }

    pub fn bool(&self, index: usize) -> Option<bool> {
        self.member(index).and_then(Value::as_bool)
    }

    pub fn str(&self, index: usize) -> Option<&str> {
        self.member(index).and_then(Value::as_str)
    }
}
