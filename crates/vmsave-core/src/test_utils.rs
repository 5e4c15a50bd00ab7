//! Shared test helpers for integration tests, benchmarks and fuzz targets.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::PartsConfig;
use crate::descriptor::{
    ArrayDescriptor, ElementKind, MemberDef, MemberKind, TypeRegistry, TypeRegistryBuilder,
};
use crate::id::{PartsNumber, StructTypeId, SurfaceId};
use crate::parts::PartsEngine;
use crate::parts::entity::{ConstructOp, Motion, MotionKind, PartsState};
use crate::render::{RenderBackend, SurfaceKind};
use crate::value::{StructValue, Value};

// ===========================================================================
// Renderer
// ===========================================================================

/// A call made to a [`RecordingRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCall {
    Construct {
        kind: SurfaceKind,
        width: i32,
        height: i32,
        surface: SurfaceId,
    },
    MarkDirty(SurfaceId),
}

/// Renderer that records every call it receives.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub calls: Vec<RenderCall>,
    next: u32,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constructed(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, RenderCall::Construct { .. }))
            .count()
    }
}

impl RenderBackend for RecordingRenderer {
    fn construct(&mut self, kind: SurfaceKind, width: i32, height: i32) -> SurfaceId {
        let surface = SurfaceId(self.next);
        self.next += 1;
        self.calls.push(RenderCall::Construct {
            kind,
            width,
            height,
            surface,
        });
        surface
    }

    fn mark_dirty(&mut self, surface: SurfaceId) {
        self.calls.push(RenderCall::MarkDirty(surface));
    }
}

// ===========================================================================
// Type registry fixture
// ===========================================================================

/// A small registry with a recursive struct, used across tests.
pub struct SampleTypes {
    pub types: TypeRegistry,
    /// `point { x: int, y: int }`
    pub point: StructTypeId,
    /// `actor { name: string, pos: point, hp: float, alive: bool, tags: string[] }`
    pub actor: StructTypeId,
    /// `tree { value: int, children: tree[] }`
    pub tree: StructTypeId,
    /// `scene { bg: string, actors: actor[], grid: int[][] }`
    pub scene: StructTypeId,
}

pub fn sample_types() -> SampleTypes {
    let mut b = TypeRegistryBuilder::new();
    let point = b
        .register_struct(
            "point",
            vec![
                MemberDef::new("x", MemberKind::Int),
                MemberDef::new("y", MemberKind::Int),
            ],
        )
        .unwrap();
    let actor = b
        .register_struct(
            "actor",
            vec![
                MemberDef::new("name", MemberKind::String),
                MemberDef::new("pos", MemberKind::Struct(point)),
                MemberDef::new("hp", MemberKind::Float),
                MemberDef::new("alive", MemberKind::Bool),
                MemberDef::new(
                    "tags",
                    MemberKind::Array(ArrayDescriptor::flat(ElementKind::String)),
                ),
            ],
        )
        .unwrap();
    let tree = b.declare_struct("tree").unwrap();
    b.define_struct(
        tree,
        vec![
            MemberDef::new("value", MemberKind::Int),
            MemberDef::new(
                "children",
                MemberKind::Array(ArrayDescriptor::flat(ElementKind::Struct(tree))),
            ),
        ],
    )
    .unwrap();
    let scene = b
        .register_struct(
            "scene",
            vec![
                MemberDef::new("bg", MemberKind::String),
                MemberDef::new(
                    "actors",
                    MemberKind::Array(ArrayDescriptor::flat(ElementKind::Struct(actor))),
                ),
                MemberDef::new(
                    "grid",
                    MemberKind::Array(ArrayDescriptor::new(ElementKind::Int, 2)),
                ),
            ],
        )
        .unwrap();
    SampleTypes {
        types: b.build().unwrap(),
        point,
        actor,
        tree,
        scene,
    }
}

impl SampleTypes {
    pub fn point(&self, x: i32, y: i32) -> StructValue {
        StructValue::new(self.point, vec![Value::Int(x), Value::Int(y)])
    }

    pub fn actor(&self, name: &str, x: i32, y: i32, hp: f32, tags: &[&str]) -> StructValue {
        let tags = if tags.is_empty() {
            None
        } else {
            Some(tags.iter().map(|t| Value::String(t.to_string())).collect())
        };
        StructValue::new(
            self.actor,
            vec![
                Value::String(name.to_string()),
                Value::Struct(self.point(x, y)),
                Value::Float(hp),
                Value::Bool(hp > 0.0),
                Value::Array(tags),
            ],
        )
    }

    /// A tree `depth` levels deep with `fanout` children per node.
    pub fn tree(&self, depth: u32, fanout: usize) -> StructValue {
        let children = if depth == 0 || fanout == 0 {
            None
        } else {
            Some(
                (0..fanout)
                    .map(|_| Value::Struct(self.tree(depth - 1, fanout)))
                    .collect(),
            )
        };
        StructValue::new(
            self.tree,
            vec![Value::Int(depth as i32), Value::Array(children)],
        )
    }

    pub fn scene(&self, bg: &str, actors: usize) -> StructValue {
        let actors = (0..actors)
            .map(|i| {
                let n = i as i32;
                Value::Struct(self.actor(&format!("actor{i}"), n, -n, 10.0, &["npc"]))
            })
            .collect::<Vec<_>>();
        let grid = (0..3)
            .map(|row| Value::Array(Some((0..3).map(|c| Value::Int(row * 3 + c)).collect())))
            .collect();
        StructValue::new(
            self.scene,
            vec![
                Value::String(bg.to_string()),
                Value::Array((!actors.is_empty()).then_some(actors)),
                Value::Array(Some(grid)),
            ],
        )
    }
}

// ===========================================================================
// Parts fixtures
// ===========================================================================

pub fn parts_engine() -> PartsEngine {
    PartsEngine::new(&PartsConfig::default()).unwrap()
}

pub fn parts_engine_with_versions(write_version: u32, max_load_version: u32) -> PartsEngine {
    PartsEngine::new(&PartsConfig {
        write_version,
        max_load_version,
    })
    .unwrap()
}

/// Create text entity `number` showing `lines`.
pub fn add_text_part(engine: &mut PartsEngine, number: i32, lines: &[&str]) {
    let n = PartsNumber(number);
    engine.get_or_create(n);
    if let Some(e) = engine.entity_mut(n) {
        e.state = PartsState::text(lines, 16, 2);
        e.z = number;
    }
}

/// Fill `engine` with `count` entities cycling through the drawable kinds.
pub fn populate_parts(engine: &mut PartsEngine, count: i32) {
    for i in 0..count {
        let n = PartsNumber(i);
        engine.get_or_create(n);
        let Some(e) = engine.entity_mut(n) else {
            continue;
        };
        e.x = i * 10;
        e.y = i * 5;
        e.z = i % 7;
        e.clickable = i % 2 == 0;
        e.state = match i % 4 {
            0 => PartsState::Image {
                cg: i,
                width: 64,
                height: 64,
            },
            1 => PartsState::text(&["line one", "line two"], 16, 2),
            2 => PartsState::Construction {
                width: 32,
                height: 32,
                ops: vec![
                    ConstructOp::fill_rect(0, 0, 32, 32, [255, 255, 255, 255]),
                    ConstructOp::draw_cg(2, 2, i),
                ],
            },
            _ => PartsState::Vector {
                width: 8,
                height: 8,
                points: vec![[0, 0], [8, 0], [8, 8]],
                color: [0, 128, 255, 255],
            },
        };
        e.motions.push(Motion {
            kind: MotionKind::Position,
            begin_time: 0,
            end_time: 100 + i,
            from: (0.0, 0.0),
            to: (i as f32, 1.0),
        });
    }
}
