//! Type descriptors supplied by the VM's type registry.
//!
//! The codec never stores a descriptor in the stream. Writer and reader must
//! be handed the same descriptor, which is why the registry is frozen after
//! [`TypeRegistryBuilder::build`].

use crate::id::StructTypeId;
use std::collections::HashMap;

/// Element kind of an array. The innermost dimension of a multi-dimensional
/// array always has one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Int,
    Float,
    Bool,
    String,
    Struct(StructTypeId),
}

/// Array element kind plus nesting rank (1 for a flat array).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayDescriptor {
    pub element: ElementKind,
    pub rank: u32,
}

impl ArrayDescriptor {
    pub fn new(element: ElementKind, rank: u32) -> Self {
        Self { element, rank }
    }

    /// A one-dimensional array of `element`.
    pub fn flat(element: ElementKind) -> Self {
        Self::new(element, 1)
    }

    /// The member kind of one element of this array: a rank-reduced array
    /// for multi-dimensional arrays, the element kind otherwise.
    pub fn item_kind(&self) -> MemberKind {
        if self.rank > 1 {
            MemberKind::Array(ArrayDescriptor::new(self.element, self.rank - 1))
        } else {
            MemberKind::from(self.element)
        }
    }
}

/// Kind of one struct member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Int,
    Float,
    Bool,
    String,
    Struct(StructTypeId),
    Array(ArrayDescriptor),
}

impl MemberKind {
    pub fn name(&self) -> &'static str {
        match self {
            MemberKind::Int => "int",
            MemberKind::Float => "float",
            MemberKind::Bool => "bool",
            MemberKind::String => "string",
            MemberKind::Struct(_) => "struct",
            MemberKind::Array(_) => "array",
        }
    }
}

impl From<ElementKind> for MemberKind {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Int => MemberKind::Int,
            ElementKind::Float => MemberKind::Float,
            ElementKind::Bool => MemberKind::Bool,
            ElementKind::String => MemberKind::String,
            ElementKind::Struct(id) => MemberKind::Struct(id),
        }
    }
}

/// A named struct member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDef {
    pub name: String,
    pub kind: MemberKind,
}

impl MemberDef {
    pub fn new(name: &str, kind: MemberKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Ordered member list of one struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDescriptor {
    pub name: String,
    pub members: Vec<MemberDef>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("struct '{0}' was declared but never defined")]
    Undefined(String),
    #[error("struct '{0}' is already defined")]
    AlreadyDefined(String),
    #[error("duplicate struct name '{0}'")]
    DuplicateName(String),
    #[error("reference to unknown struct type {0:?}")]
    UnknownStruct(StructTypeId),
    #[error("array member '{member}' of '{owner}' has rank 0")]
    ZeroRank { owner: String, member: String },
    #[error("struct '{0}' contains itself without an array indirection")]
    InfiniteStruct(String),
}

/// Builder for an immutable [`TypeRegistry`].
///
/// Structs may be declared first and defined later, which lets a struct
/// refer to itself (or to a struct declared after it) through an array member.
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    structs: Vec<(String, Option<Vec<MemberDef>>)>,
    name_to_id: HashMap<String, StructTypeId>,
}

impl TypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for a struct whose members are supplied later.
    pub fn declare_struct(&mut self, name: &str) -> Result<StructTypeId, DescriptorError> {
        if self.name_to_id.contains_key(name) {
            return Err(DescriptorError::DuplicateName(name.to_string()));
        }
        let id = StructTypeId(self.structs.len() as u32);
        self.structs.push((name.to_string(), None));
        self.name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Supply the members of a previously declared struct.
    pub fn define_struct(
        &mut self,
        id: StructTypeId,
        members: Vec<MemberDef>,
    ) -> Result<(), DescriptorError> {
        let (name, slot) = self
            .structs
            .get_mut(id.0 as usize)
            .ok_or(DescriptorError::UnknownStruct(id))?;
        if slot.is_some() {
            return Err(DescriptorError::AlreadyDefined(name.clone()));
        }
        *slot = Some(members);
        Ok(())
    }

    /// Declare and define a struct in one step.
    pub fn register_struct(
        &mut self,
        name: &str,
        members: Vec<MemberDef>,
    ) -> Result<StructTypeId, DescriptorError> {
        let id = self.declare_struct(name)?;
        self.define_struct(id, members)?;
        Ok(id)
    }

    pub fn struct_id(&self, name: &str) -> Option<StructTypeId> {
        self.name_to_id.get(name).copied()
    }

    /// Validate every descriptor and freeze the registry.
    pub fn build(self) -> Result<TypeRegistry, DescriptorError> {
        let mut structs = Vec::with_capacity(self.structs.len());
        for (name, members) in self.structs {
            let members = members.ok_or_else(|| DescriptorError::Undefined(name.clone()))?;
            structs.push(StructDescriptor { name, members });
        }

        let count = structs.len();
        for desc in &structs {
            for member in &desc.members {
                let referenced = match member.kind {
                    MemberKind::Struct(id) => Some(id),
                    MemberKind::Array(array) => {
                        if array.rank == 0 {
                            return Err(DescriptorError::ZeroRank {
                                owner: desc.name.clone(),
                                member: member.name.clone(),
                            });
                        }
                        match array.element {
                            ElementKind::Struct(id) => Some(id),
                            _ => None,
                        }
                    }
                    _ => None,
                };
                if let Some(id) = referenced
                    && id.0 as usize >= count
                {
                    return Err(DescriptorError::UnknownStruct(id));
                }
            }
        }

        let min_widths = compute_min_widths(&structs)?;

        Ok(TypeRegistry {
            structs,
            name_to_id: self.name_to_id,
            min_widths,
        })
    }
}

/// Minimum number of words each struct occupies in a stream. Fails if a
/// struct reaches itself through plain struct members.
fn compute_min_widths(structs: &[StructDescriptor]) -> Result<Vec<usize>, DescriptorError> {
    #[derive(Clone, Copy)]
    enum Mark {
        Unvisited,
        InProgress,
        Done(usize),
    }

    fn visit(
        index: usize,
        structs: &[StructDescriptor],
        marks: &mut [Mark],
    ) -> Result<usize, DescriptorError> {
        match marks[index] {
            Mark::Done(width) => return Ok(width),
            Mark::InProgress => {
                return Err(DescriptorError::InfiniteStruct(structs[index].name.clone()));
            }
            Mark::Unvisited => {}
        }
        marks[index] = Mark::InProgress;
        let mut width = 0usize;
        for member in &structs[index].members {
            width += match member.kind {
                MemberKind::Struct(id) => visit(id.0 as usize, structs, marks)?,
                // Scalars take one word, strings at least their terminator,
                // arrays at least their count.
                _ => 1,
            };
        }
        marks[index] = Mark::Done(width);
        Ok(width)
    }

    let mut marks = vec![Mark::Unvisited; structs.len()];
    (0..structs.len())
        .map(|i| visit(i, structs, &mut marks))
        .collect()
}

/// Immutable set of struct descriptors. Frozen after build().
#[derive(Debug, Default)]
pub struct TypeRegistry {
    structs: Vec<StructDescriptor>,
    name_to_id: HashMap<String, StructTypeId>,
    min_widths: Vec<usize>,
}

impl TypeRegistry {
    pub fn get(&self, id: StructTypeId) -> Option<&StructDescriptor> {
        self.structs.get(id.0 as usize)
    }

    pub fn struct_id(&self, name: &str) -> Option<StructTypeId> {
        self.name_to_id.get(name).copied()
    }

    pub fn struct_count(&self) -> usize {
        self.structs.len()
    }

    /// Smallest number of words a value of `kind` can occupy in a stream.
    pub fn min_width(&self, kind: &MemberKind) -> usize {
        match kind {
            MemberKind::Struct(id) => self.min_widths.get(id.0 as usize).copied().unwrap_or(0),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_members() -> Vec<MemberDef> {
        vec![
            MemberDef::new("x", MemberKind::Int),
            MemberDef::new("y", MemberKind::Int),
        ]
    }

    #[test]
    fn register_and_lookup() {
        let mut b = TypeRegistryBuilder::new();
        let point = b.register_struct("point", point_members()).unwrap();
        let reg = b.build().unwrap();
        assert_eq!(reg.struct_id("point"), Some(point));
        assert_eq!(reg.get(point).unwrap().members.len(), 2);
        assert_eq!(reg.struct_count(), 1);
    }

    #[test]
    fn self_reference_through_array_is_allowed() {
        let mut b = TypeRegistryBuilder::new();
        let node = b.declare_struct("node").unwrap();
        b.define_struct(
            node,
            vec![
                MemberDef::new("value", MemberKind::Int),
                MemberDef::new(
                    "children",
                    MemberKind::Array(ArrayDescriptor::flat(ElementKind::Struct(node))),
                ),
            ],
        )
        .unwrap();
        let reg = b.build().unwrap();
        assert_eq!(reg.min_width(&MemberKind::Struct(node)), 2);
    }

    #[test]
    fn direct_self_containment_is_rejected() {
        let mut b = TypeRegistryBuilder::new();
        let bad = b.declare_struct("bad").unwrap();
        b.define_struct(bad, vec![MemberDef::new("inner", MemberKind::Struct(bad))])
            .unwrap();
        assert_eq!(
            b.build().unwrap_err(),
            DescriptorError::InfiniteStruct("bad".into())
        );
    }

    #[test]
    fn undefined_declaration_fails() {
        let mut b = TypeRegistryBuilder::new();
        b.declare_struct("pending").unwrap();
        assert!(matches!(b.build(), Err(DescriptorError::Undefined(_))));
    }

    #[test]
    fn duplicate_name_fails() {
        let mut b = TypeRegistryBuilder::new();
        b.register_struct("point", point_members()).unwrap();
        assert!(matches!(
            b.register_struct("point", point_members()),
            Err(DescriptorError::DuplicateName(_))
        ));
    }

    #[test]
    fn zero_rank_array_fails() {
        let mut b = TypeRegistryBuilder::new();
        b.register_struct(
            "holder",
            vec![MemberDef::new(
                "items",
                MemberKind::Array(ArrayDescriptor::new(ElementKind::Int, 0)),
            )],
        )
        .unwrap();
        assert!(matches!(b.build(), Err(DescriptorError::ZeroRank { .. })));
    }

    #[test]
    fn unknown_struct_reference_fails() {
        let mut b = TypeRegistryBuilder::new();
        b.register_struct(
            "holder",
            vec![MemberDef::new("inner", MemberKind::Struct(StructTypeId(7)))],
        )
        .unwrap();
        assert_eq!(
            b.build().unwrap_err(),
            DescriptorError::UnknownStruct(StructTypeId(7))
        );
    }

    #[test]
    fn nested_struct_widths_accumulate() {
        let mut b = TypeRegistryBuilder::new();
        let point = b.register_struct("point", point_members()).unwrap();
        let rect = b
            .register_struct(
                "rect",
                vec![
                    MemberDef::new("origin", MemberKind::Struct(point)),
                    MemberDef::new("size", MemberKind::Struct(point)),
                    MemberDef::new("label", MemberKind::String),
                ],
            )
            .unwrap();
        let reg = b.build().unwrap();
        assert_eq!(reg.min_width(&MemberKind::Struct(rect)), 5);
    }

    #[test]
    fn item_kind_reduces_rank() {
        let grid = ArrayDescriptor::new(ElementKind::Float, 2);
        assert_eq!(
            grid.item_kind(),
            MemberKind::Array(ArrayDescriptor::new(ElementKind::Float, 1))
        );
        assert_eq!(ArrayDescriptor::flat(ElementKind::Int).item_kind(), MemberKind::Int);
    }
}
