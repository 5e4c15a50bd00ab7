//! Struct descriptors for the parts records that go through the generic
//! codec, plus conversions between them and the typed entity model.

use super::entity::{ConstructOp, ConstructOpKind, Motion, MotionKind};
use crate::descriptor::{
    ArrayDescriptor, DescriptorError, ElementKind, MemberDef, MemberKind, TypeRegistry,
    TypeRegistryBuilder,
};
use crate::id::StructTypeId;
use crate::value::{StructValue, Value};

pub const MOTION_STRUCT: &str = "parts.motion";
pub const CONSTRUCT_OP_STRUCT: &str = "parts.construct_op";

#[derive(Debug)]
pub struct PartsSchema {
    pub types: TypeRegistry,
    pub motion: StructTypeId,
    pub construct_op: StructTypeId,
}

impl PartsSchema {
    pub fn new() -> Result<Self, DescriptorError> {
        let mut b = TypeRegistryBuilder::new();
        let motion = b.register_struct(
            MOTION_STRUCT,
            vec![
                MemberDef::new("kind", MemberKind::Int),
                MemberDef::new("begin_time", MemberKind::Int),
                MemberDef::new("end_time", MemberKind::Int),
                MemberDef::new("from_x", MemberKind::Float),
                MemberDef::new("from_y", MemberKind::Float),
                MemberDef::new("to_x", MemberKind::Float),
                MemberDef::new("to_y", MemberKind::Float),
            ],
        )?;
        let construct_op = b.register_struct(
            CONSTRUCT_OP_STRUCT,
            vec![
                MemberDef::new("kind", MemberKind::Int),
                MemberDef::new("x", MemberKind::Int),
                MemberDef::new("y", MemberKind::Int),
                MemberDef::new("w", MemberKind::Int),
                MemberDef::new("h", MemberKind::Int),
                MemberDef::new(
                    "color",
                    MemberKind::Array(ArrayDescriptor::flat(ElementKind::Int)),
                ),
                MemberDef::new("cg", MemberKind::Int),
                MemberDef::new("text", MemberKind::String),
            ],
        )?;
        Ok(Self {
            types: b.build()?,
            motion,
            construct_op,
        })
    }

    pub fn motions_desc(&self) -> ArrayDescriptor {
        ArrayDescriptor::flat(ElementKind::Struct(self.motion))
    }

    pub fn construct_ops_desc(&self) -> ArrayDescriptor {
        ArrayDescriptor::flat(ElementKind::Struct(self.construct_op))
    }

    pub fn motion_to_value(&self, m: &Motion) -> Value {
        Value::Struct(StructValue::new(
            self.motion,
            vec![
                Value::Int(m.kind.tag()),
                Value::Int(m.begin_time),
                Value::Int(m.end_time),
                Value::Float(m.from.0),
                Value::Float(m.from.1),
                Value::Float(m.to.0),
                Value::Float(m.to.1),
            ],
        ))
    }

    /// `None` for a struct of the wrong type or an unknown motion kind.
    pub fn motion_from_value(&self, v: &Value) -> Option<Motion> {
        let s = v.as_struct().filter(|s| s.type_id == self.motion)?;
        Some(Motion {
            kind: MotionKind::from_tag(s.int(0)?)?,
            begin_time: s.int(1)?,
            end_time: s.int(2)?,
            from: (s.float(3)?, s.float(4)?),
            to: (s.float(5)?, s.float(6)?),
        })
    }

    pub fn construct_op_to_value(&self, op: &ConstructOp) -> Value {
        let color = if op.color.is_empty() {
            None
        } else {
            Some(op.color.iter().copied().map(Value::Int).collect())
        };
        Value::Struct(StructValue::new(
            self.construct_op,
            vec![
                Value::Int(op.kind.tag()),
                Value::Int(op.x),
                Value::Int(op.y),
                Value::Int(op.w),
                Value::Int(op.h),
                Value::Array(color),
                Value::Int(op.cg),
                Value::String(op.text.clone()),
            ],
        ))
    }

    pub fn construct_op_from_value(&self, v: &Value) -> Option<ConstructOp> {
        let s = v.as_struct().filter(|s| s.type_id == self.construct_op)?;
        let color = s
            .member(5)?
            .as_array()?
            .iter()
            .map(Value::as_int)
            .collect::<Option<Vec<i32>>>()?;
        Some(ConstructOp {
            kind: ConstructOpKind::from_tag(s.int(0)?)?,
            x: s.int(1)?,
            y: s.int(2)?,
            w: s.int(3)?,
            h: s.int(4)?,
            color,
            cg: s.int(6)?,
            text: s.str(7)?.to_string(),
        })
    }
}
