//! Parts save/load.
//!
//! Record layout, one per entity:
//!
//! | field | encoding |
//! |---|---|
//! | number, kind tag | int, int |
//! | x, y, z, origin mode | 4 ints |
//! | show | bool |
//! | alpha | int |
//! | scale x, scale y, rotation | 3 floats |
//! | clickable | bool |
//! | has parent, parent number | bool, int (`0` when there is no parent) |
//! | message window | bool, version 2 and later only |
//! | kind payload | depends on the kind tag |
//! | motions | array of `parts.motion` structs |
//!
//! Loading captures the parent as a pending number only.
//! [`PartsEngine::resolve_pending_parents`] links them afterwards.

use super::entity::{
    ConstructOp, Motion, OriginMode, ParentLink, PartsEntity, PartsKind, PartsState,
};
use super::schema::PartsSchema;
use super::{NUMERAL_GLYPHS, NumeralFont, PartsEngine};
use crate::codec::{EncodeError, WordWriter};
use crate::descriptor::{ArrayDescriptor, ElementKind, TypeRegistry};
use crate::id::PartsNumber;
use crate::render::RenderBackend;
use crate::snapshot::{Blob, PARTS_MAGIC, SnapshotError, SnapshotReader, SnapshotWriter};
use crate::value::Value;
use std::collections::BTreeMap;

/// Words in the smallest possible record: the common fields of a version 1
/// uninitialised entity plus an empty motion array.
const MIN_RECORD_WIDTH: usize = 15;

/// Words in one numeral-font table entry: id, glyph CGs, width, height.
const FONT_ENTRY_WIDTH: usize = 1 + NUMERAL_GLYPHS + 2;

impl PartsEngine {
    /// Snapshot every entity, skipping hidden ones unless `include_hidden`.
    /// Pending layout updates are flushed first.
    pub fn save(&mut self, include_hidden: bool) -> Result<Blob, SnapshotError> {
        self.flush_pending();
        let version = self.write_version;
        let mut w = SnapshotWriter::begin(PARTS_MAGIC, version);

        if version > 1 {
            w.write_count(self.numeral_fonts.len())?;
            for (id, font) in &self.numeral_fonts {
                w.write_int(*id);
                for cg in font.cgs {
                    w.write_int(cg);
                }
                w.write_int(font.width);
                w.write_int(font.height);
            }
        }

        let count_slot = w.reserve();
        let mut written: i32 = 0;
        for key in self.by_number.values() {
            let Some(entity) = self.entities.get(*key) else {
                continue;
            };
            if !entity.show && !include_hidden {
                continue;
            }
            let parent = self.parent_of(entity);
            write_entity(&mut w, entity, parent, version, &self.schema)?;
            written = written
                .checked_add(1)
                .ok_or(EncodeError::TooLong(self.by_number.len()))?;
        }
        w.patch(count_slot, written);

        tracing::debug!(version, records = written, include_hidden, "saved parts");
        Ok(w.finish())
    }

    /// Replace every entity with the contents of `blob`, then rebuild draw
    /// order, hit boxes and surfaces.
    ///
    /// A blob with a bad header or an unsupported version is rejected before
    /// anything is touched. Any later failure leaves the engine empty.
    pub fn load(
        &mut self,
        blob: &Blob,
        renderer: &mut impl RenderBackend,
    ) -> Result<(), SnapshotError> {
        let r = match SnapshotReader::begin(blob, PARTS_MAGIC, self.max_load_version) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "rejected parts snapshot header");
                return Err(e);
            }
        };
        let version = r.version();
        self.release_all();

        if let Err(e) = self.read_body(r) {
            tracing::warn!(error = %e, version, "rejected parts snapshot");
            self.release_all();
            return Err(e);
        }

        if version < 2 {
            for e in self.entities.values_mut() {
                e.message_window = false;
            }
        }
        let keys: Vec<_> = self.entities.keys().collect();
        for key in keys {
            self.pending.mark_all(key);
        }
        self.flush_pending();
        self.present(renderer);

        tracing::debug!(version, records = self.entities.len(), "loaded parts");
        Ok(())
    }

    fn read_body(&mut self, mut r: SnapshotReader<'_>) -> Result<(), SnapshotError> {
        let version = r.version();

        let fonts = if version > 1 {
            let count = r.read_count(FONT_ENTRY_WIDTH);
            let mut fonts = BTreeMap::new();
            for _ in 0..count {
                let id = r.read_int();
                let mut cgs = [0; NUMERAL_GLYPHS];
                for cg in &mut cgs {
                    *cg = r.read_int();
                }
                let width = r.read_int();
                let height = r.read_int();
                fonts.insert(id, NumeralFont { cgs, width, height });
            }
            r.checkpoint()?;
            Some(fonts)
        } else {
            None
        };

        let count = r.read_count(MIN_RECORD_WIDTH);
        r.checkpoint()?;

        for _ in 0..count {
            let entity = read_entity(&mut r, version, &self.schema)?;
            let number = entity.number;
            if self.by_number.contains_key(&number) {
                return Err(SnapshotError::InvalidRecord(format!(
                    "entity {} appears twice",
                    number.0
                )));
            }
            let key = self.entities.insert(entity);
            self.by_number.insert(number, key);
        }
        r.finish()?;

        // Version 1 had no font table, so the current one stays.
        if let Some(fonts) = fonts {
            self.numeral_fonts = fonts;
        }
        Ok(())
    }
}

fn write_entity(
    w: &mut WordWriter,
    e: &PartsEntity,
    parent: Option<PartsNumber>,
    version: u32,
    schema: &PartsSchema,
) -> Result<(), EncodeError> {
    let types = &schema.types;
    w.write_int(e.number.0);
    w.write_int(e.kind().tag());
    w.write_int(e.x);
    w.write_int(e.y);
    w.write_int(e.z);
    w.write_int(e.origin_mode.get());
    w.write_bool(e.show);
    w.write_int(e.alpha);
    w.write_float(e.scale_x);
    w.write_float(e.scale_y);
    w.write_float(e.rotation);
    w.write_bool(e.clickable);
    w.write_bool(parent.is_some());
    w.write_int(parent.map_or(0, |n| n.0));
    if version > 1 {
        w.write_bool(e.message_window);
    }

    match &e.state {
        PartsState::Uninit => {}
        PartsState::Image { cg, width, height } => {
            w.write_int(*cg);
            w.write_int(*width);
            w.write_int(*height);
        }
        PartsState::Text {
            lines,
            font_size,
            line_space,
            width,
            height,
        } => {
            let lines: Vec<Value> = lines.iter().cloned().map(Value::String).collect();
            w.write_array(
                Some(lines.as_slice()),
                &ArrayDescriptor::flat(ElementKind::String),
                types,
            )?;
            w.write_int(*font_size);
            w.write_int(*line_space);
            w.write_int(*width);
            w.write_int(*height);
        }
        PartsState::Animation {
            frames,
            frame_time,
            elapsed,
            width,
            height,
        } => {
            let frames: Vec<Value> = frames.iter().copied().map(Value::Int).collect();
            w.write_array(
                Some(frames.as_slice()),
                &ArrayDescriptor::flat(ElementKind::Int),
                types,
            )?;
            w.write_int(*frame_time);
            w.write_int(*elapsed);
            w.write_int(*width);
            w.write_int(*height);
        }
        PartsState::Numeral {
            value,
            font,
            digits,
            zero_pad,
            comma,
        } => {
            w.write_int(*value);
            w.write_int(*font);
            w.write_int(*digits);
            w.write_bool(*zero_pad);
            w.write_bool(*comma);
        }
        PartsState::Gauge {
            cg,
            rate,
            vertical,
            width,
            height,
        } => {
            w.write_int(*cg);
            w.write_float(*rate);
            w.write_bool(*vertical);
            w.write_int(*width);
            w.write_int(*height);
        }
        PartsState::Construction { width, height, ops } => {
            w.write_int(*width);
            w.write_int(*height);
            let ops: Vec<Value> = ops.iter().map(|op| schema.construct_op_to_value(op)).collect();
            w.write_array(Some(ops.as_slice()), &schema.construct_ops_desc(), types)?;
        }
        PartsState::Vector {
            width,
            height,
            points,
            color,
        } => {
            w.write_int(*width);
            w.write_int(*height);
            let points: Vec<Value> = points
                .iter()
                .map(|p| Value::Array(Some(vec![Value::Int(p[0]), Value::Int(p[1])])))
                .collect();
            w.write_array(Some(points.as_slice()), &points_desc(), types)?;
            for c in color {
                w.write_int(*c);
            }
        }
    }

    let motions: Vec<Value> = e.motions.iter().map(|m| schema.motion_to_value(m)).collect();
    w.write_array(Some(motions.as_slice()), &schema.motions_desc(), types)
}

fn read_entity(
    r: &mut SnapshotReader<'_>,
    version: u32,
    schema: &PartsSchema,
) -> Result<PartsEntity, SnapshotError> {
    let types = &schema.types;
    let number = PartsNumber(r.read_int());
    let tag = r.read_int();
    r.checkpoint()?;
    let kind = PartsKind::from_tag(tag).ok_or_else(|| {
        SnapshotError::InvalidRecord(format!("entity {} has unknown kind {tag}", number.0))
    })?;

    let mut e = PartsEntity::new(number);
    e.x = r.read_int();
    e.y = r.read_int();
    e.z = r.read_int();
    e.origin_mode = OriginMode::new(r.read_int());
    e.show = r.read_bool();
    e.alpha = r.read_int();
    e.scale_x = r.read_float();
    e.scale_y = r.read_float();
    e.rotation = r.read_float();
    e.clickable = r.read_bool();
    let has_parent = r.read_bool();
    let parent = PartsNumber(r.read_int());
    e.parent = if has_parent {
        ParentLink::Pending(parent)
    } else {
        ParentLink::None
    };
    if version > 1 {
        e.message_window = r.read_bool();
    }

    e.state = read_state(r, kind, schema, number)?;

    let motions = r.read_array(&schema.motions_desc(), types).unwrap_or_default();
    r.checkpoint()?;
    e.motions = motions
        .iter()
        .map(|v| schema.motion_from_value(v))
        .collect::<Option<Vec<Motion>>>()
        .ok_or_else(|| {
            SnapshotError::InvalidRecord(format!("entity {} has an invalid motion", number.0))
        })?;
    Ok(e)
}

fn read_state(
    r: &mut SnapshotReader<'_>,
    kind: PartsKind,
    schema: &PartsSchema,
    number: PartsNumber,
) -> Result<PartsState, SnapshotError> {
    let types: &TypeRegistry = &schema.types;
    let invalid = |what: &str| SnapshotError::InvalidRecord(format!("entity {}: {what}", number.0));

    let state = match kind {
        PartsKind::Uninit => PartsState::Uninit,
        PartsKind::Image => PartsState::Image {
            cg: r.read_int(),
            width: r.read_int(),
            height: r.read_int(),
        },
        PartsKind::Text => {
            let lines = r
                .read_array(&ArrayDescriptor::flat(ElementKind::String), types)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect();
            PartsState::Text {
                lines,
                font_size: r.read_int(),
                line_space: r.read_int(),
                width: r.read_int(),
                height: r.read_int(),
            }
        }
        PartsKind::Animation => {
            let frames = r
                .read_array(&ArrayDescriptor::flat(ElementKind::Int), types)
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_int)
                .collect();
            PartsState::Animation {
                frames,
                frame_time: r.read_int(),
                elapsed: r.read_int(),
                width: r.read_int(),
                height: r.read_int(),
            }
        }
        PartsKind::Numeral => PartsState::Numeral {
            value: r.read_int(),
            font: r.read_int(),
            digits: r.read_int(),
            zero_pad: r.read_bool(),
            comma: r.read_bool(),
        },
        PartsKind::Gauge => PartsState::Gauge {
            cg: r.read_int(),
            rate: r.read_float(),
            vertical: r.read_bool(),
            width: r.read_int(),
            height: r.read_int(),
        },
        PartsKind::Construction => {
            let width = r.read_int();
            let height = r.read_int();
            let ops = r
                .read_array(&schema.construct_ops_desc(), types)
                .unwrap_or_default();
            r.checkpoint()?;
            let ops = ops
                .iter()
                .map(|v| schema.construct_op_from_value(v))
                .collect::<Option<Vec<ConstructOp>>>()
                .ok_or_else(|| invalid("invalid construction op"))?;
            PartsState::Construction { width, height, ops }
        }
        PartsKind::Vector => {
            let width = r.read_int();
            let height = r.read_int();
            let points = r.read_array(&points_desc(), types).unwrap_or_default();
            let color = [r.read_int(), r.read_int(), r.read_int(), r.read_int()];
            r.checkpoint()?;
            let points = points
                .iter()
                .map(point_from_value)
                .collect::<Option<Vec<[i32; 2]>>>()
                .ok_or_else(|| invalid("vector point is not an (x, y) pair"))?;
            PartsState::Vector {
                width,
                height,
                points,
                color,
            }
        }
    };
    r.checkpoint()?;
    Ok(state)
}

/// Vector outlines are a two-dimensional int array: one `[x, y]` row per point.
fn points_desc() -> ArrayDescriptor {
    ArrayDescriptor::new(ElementKind::Int, 2)
}

fn point_from_value(v: &Value) -> Option<[i32; 2]> {
    match v.as_array()? {
        [x, y] => Some([x.as_int()?, y.as_int()?]),
        _ => None,
    }
}
