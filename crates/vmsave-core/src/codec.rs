//! Word codec: flattens VM values into a stream of 32-bit words and back.
//!
//! The stream carries no schema. Structs and arrays are walked in descriptor
//! order on both sides:
//!
//! - int, bool, float: one word each (float as its bit pattern)
//! - string: one word per character, then a terminating `0`
//! - struct: each member in descriptor order
//! - array: element count (`0` for the absent array), then each element,
//!   with multi-dimensional arrays recursing one rank at a time
//!
//! Reads never fail loudly. An exhausted or malformed stream sets a sticky
//! error flag on the [`WordReader`] and every read from then on returns a
//! default value. Callers check the flag at record boundaries.

use crate::descriptor::{ArrayDescriptor, MemberKind, TypeRegistry};
use crate::id::StructTypeId;
use crate::value::{StructValue, Value};

/// Maximum struct/array nesting the reader follows before giving up.
pub const MAX_NESTING: u32 = 64;

/// Upper bound on the element count of an array whose elements may encode
/// to zero words (e.g. arrays of empty structs).
pub const MAX_ZERO_WIDTH_ELEMENTS: usize = 65_536;

/// Errors raised while encoding a value whose shape disagrees with its
/// descriptor.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("string contains an embedded NUL at character {0}")]
    EmbeddedNul(usize),
    #[error("expected {expected} value, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("struct value of type {found:?} written with descriptor {expected:?}")]
    StructTypeMismatch {
        expected: StructTypeId,
        found: StructTypeId,
    },
    #[error("struct {type_id:?} expects {expected} members, value has {found}")]
    MemberCount {
        type_id: StructTypeId,
        expected: usize,
        found: usize,
    },
    #[error("unknown struct type {0:?}")]
    UnknownStruct(StructTypeId),
    #[error("array of {0} elements does not fit in a count word")]
    TooLong(usize),
}

/// Position of a word reserved for later backpatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder(usize);

/// Append-only word stream.
#[derive(Debug, Clone, Default)]
pub struct WordWriter {
    words: Vec<i32>,
}

impl WordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[i32] {
        &self.words
    }

    pub fn into_words(self) -> Vec<i32> {
        self.words
    }

    pub fn write_int(&mut self, value: i32) {
        self.words.push(value);
    }

    pub fn write_float(&mut self, value: f32) {
        self.words.push(value.to_bits() as i32);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.words.push(value as i32);
    }

    /// Writes each character code followed by a `0` terminator.
    pub fn write_string(&mut self, s: &str) -> Result<(), EncodeError> {
        if let Some(pos) = s.chars().position(|c| c == '\0') {
            return Err(EncodeError::EmbeddedNul(pos));
        }
        self.words.extend(s.chars().map(|c| c as i32));
        self.words.push(0);
        Ok(())
    }

    /// Writes an array count word, checking it fits.
    pub fn write_count(&mut self, count: usize) -> Result<(), EncodeError> {
        let count = i32::try_from(count).map_err(|_| EncodeError::TooLong(count))?;
        self.words.push(count);
        Ok(())
    }

    /// Reserve one word to be filled in later with [`patch`](Self::patch).
    pub fn reserve(&mut self) -> Placeholder {
        self.words.push(0);
        Placeholder(self.words.len() - 1)
    }

    pub fn patch(&mut self, slot: Placeholder, value: i32) {
        self.words[slot.0] = value;
    }

    /// Writes `value` as a member of kind `kind`.
    pub fn write_value(
        &mut self,
        value: &Value,
        kind: &MemberKind,
        types: &TypeRegistry,
    ) -> Result<(), EncodeError> {
        match (kind, value) {
            (MemberKind::Int, Value::Int(v)) => self.write_int(*v),
            (MemberKind::Float, Value::Float(v)) => self.write_float(*v),
            (MemberKind::Bool, Value::Bool(v)) => self.write_bool(*v),
            (MemberKind::String, Value::String(s)) => self.write_string(s)?,
            (MemberKind::Struct(id), Value::Struct(s)) => self.write_struct(s, *id, types)?,
            (MemberKind::Array(desc), Value::Array(items)) => {
                self.write_array(items.as_deref(), desc, types)?
            }
            (kind, value) => {
                return Err(EncodeError::KindMismatch {
                    expected: kind.name(),
                    found: value.kind_name(),
                });
            }
        }
        Ok(())
    }

    /// Writes every member of `value` in the order given by descriptor `type_id`.
    pub fn write_struct(
        &mut self,
        value: &StructValue,
        type_id: StructTypeId,
        types: &TypeRegistry,
    ) -> Result<(), EncodeError> {
        if value.type_id != type_id {
            return Err(EncodeError::StructTypeMismatch {
                expected: type_id,
                found: value.type_id,
            });
        }
        let desc = types
            .get(type_id)
            .ok_or(EncodeError::UnknownStruct(type_id))?;
        if desc.members.len() != value.members.len() {
            return Err(EncodeError::MemberCount {
                type_id,
                expected: desc.members.len(),
                found: value.members.len(),
            });
        }
        for (member, v) in desc.members.iter().zip(&value.members) {
            self.write_value(v, &member.kind, types)?;
        }
        Ok(())
    }

    /// Writes the element count (`0` when `items` is `None`), then each element.
    pub fn write_array(
        &mut self,
        items: Option<&[Value]>,
        desc: &ArrayDescriptor,
        types: &TypeRegistry,
    ) -> Result<(), EncodeError> {
        let items = items.unwrap_or(&[]);
        self.write_count(items.len())?;
        let item_kind = desc.item_kind();
        for item in items {
            self.write_value(item, &item_kind, types)?;
        }
        Ok(())
    }
}

/// Cursor over a word stream with a sticky error flag.
#[derive(Debug, Clone)]
pub struct WordReader<'a> {
    words: &'a [i32],
    pos: usize,
    error: bool,
    depth: u32,
}

impl<'a> WordReader<'a> {
    pub fn new(words: &'a [i32]) -> Self {
        Self {
            words,
            pos: 0,
            error: false,
            depth: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.words.len() - self.pos
    }

    /// Whether any read so far has failed. Never cleared once set.
    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.words.len()
    }

    /// Mark the stream as malformed. Used by callers that find a
    /// semantically invalid value (e.g. an unknown tag).
    pub fn fail(&mut self) {
        self.error = true;
    }

    fn next_word(&mut self) -> Option<i32> {
        if self.error {
            return None;
        }
        match self.words.get(self.pos) {
            Some(&w) => {
                self.pos += 1;
                Some(w)
            }
            None => {
                self.error = true;
                None
            }
        }
    }

    pub fn read_int(&mut self) -> i32 {
        self.next_word().unwrap_or(0)
    }

    pub fn read_float(&mut self) -> f32 {
        self.next_word().map(|w| f32::from_bits(w as u32)).unwrap_or(0.0)
    }

    pub fn read_bool(&mut self) -> bool {
        self.next_word().is_some_and(|w| w != 0)
    }

    /// Reads characters up to the `0` terminator. Returns an empty string if
    /// the stream ends first or a word is not a valid character.
    pub fn read_string(&mut self) -> String {
        let mut out = String::new();
        loop {
            let Some(word) = self.next_word() else {
                return String::new();
            };
            if word == 0 {
                return out;
            }
            match char::from_u32(word as u32) {
                Some(c) => out.push(c),
                None => {
                    self.error = true;
                    return String::new();
                }
            }
        }
    }

    /// Reads an element count and checks that `count` elements of at least
    /// `min_width` words each can still fit in the stream.
    pub fn read_count(&mut self, min_width: usize) -> usize {
        let Some(raw) = self.next_word() else {
            return 0;
        };
        let Ok(count) = usize::try_from(raw) else {
            self.error = true;
            return 0;
        };
        let fits = if min_width == 0 {
            count <= MAX_ZERO_WIDTH_ELEMENTS
        } else {
            count
                .checked_mul(min_width)
                .is_some_and(|needed| needed <= self.remaining())
        };
        if !fits {
            self.error = true;
            return 0;
        }
        count
    }

    /// Reads a value of kind `kind`.
    pub fn read_value(&mut self, kind: &MemberKind, types: &TypeRegistry) -> Value {
        match kind {
            MemberKind::Int => Value::Int(self.read_int()),
            MemberKind::Float => Value::Float(self.read_float()),
            MemberKind::Bool => Value::Bool(self.read_bool()),
            MemberKind::String => Value::String(self.read_string()),
            MemberKind::Struct(id) => Value::Struct(self.read_struct(*id, types)),
            MemberKind::Array(desc) => Value::Array(self.read_array(desc, types)),
        }
    }

    /// Reads a struct of type `type_id`. On failure the returned struct has
    /// every member at its default.
    pub fn read_struct(&mut self, type_id: StructTypeId, types: &TypeRegistry) -> StructValue {
        let Some(desc) = types.get(type_id) else {
            self.error = true;
            return StructValue::new(type_id, Vec::new());
        };
        if !self.enter() {
            return StructValue::default_for(type_id, types);
        }
        let members: Vec<Value> = desc
            .members
            .iter()
            .map(|m| self.read_value(&m.kind, types))
            .collect();
        self.depth -= 1;
        if self.error {
            return StructValue::default_for(type_id, types);
        }
        StructValue::new(type_id, members)
    }

    /// Reads an array. A zero count yields `None`, as does any failure.
    pub fn read_array(
        &mut self,
        desc: &ArrayDescriptor,
        types: &TypeRegistry,
    ) -> Option<Vec<Value>> {
        let item_kind = desc.item_kind();
        let count = self.read_count(types.min_width(&item_kind));
        if count == 0 || !self.enter() {
            return None;
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_value(&item_kind, types));
            if self.error {
                break;
            }
        }
        self.depth -= 1;
        if self.error {
            return None;
        }
        Some(items)
    }

    fn enter(&mut self) -> bool {
        if self.error {
            return false;
        }
        if self.depth >= MAX_NESTING {
            self.error = true;
            return false;
        }
        self.depth += 1;
        true
    }
}
