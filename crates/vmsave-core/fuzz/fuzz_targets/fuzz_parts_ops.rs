#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vmsave_core::id::PartsNumber;
use vmsave_core::parts::entity::{ParentLink, PartsState};
use vmsave_core::render::NullRenderer;
use vmsave_core::test_utils::*;

/// A structured edit of the parts engine.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Create { number: u8 },
    Release { number: u8 },
    Move { number: u8, x: i16, y: i16, z: i8 },
    SetShow { number: u8, show: bool },
    SetText { number: u8, lines: u8 },
    SetParent { child: u8, parent: u8 },
    Reload,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    ops: Vec<FuzzOp>,
}

fuzz_target!(|input: FuzzInput| {
    let mut engine = parts_engine();
    let mut renderer = NullRenderer::new();
    let max_ops = input.ops.len().min(200);

    for op in &input.ops[..max_ops] {
        match *op {
            FuzzOp::Create { number } => {
                engine.get_or_create(PartsNumber(number.into()));
            }
            FuzzOp::Release { number } => {
                engine.release(PartsNumber(number.into()));
            }
            FuzzOp::Move { number, x, y, z } => {
                if let Some(e) = engine.entity_mut(PartsNumber(number.into())) {
                    e.x = x.into();
                    e.y = y.into();
                    e.z = z.into();
                }
            }
            FuzzOp::SetShow { number, show } => {
                if let Some(e) = engine.entity_mut(PartsNumber(number.into())) {
                    e.show = show;
                }
            }
            FuzzOp::SetText { number, lines } => {
                let text: Vec<String> = (0..lines % 8).map(|i| format!("line {i}")).collect();
                let text: Vec<&str> = text.iter().map(String::as_str).collect();
                if let Some(e) = engine.entity_mut(PartsNumber(number.into())) {
                    e.state = PartsState::text(&text, 16, 2);
                }
            }
            FuzzOp::SetParent { child, parent } => {
                if let Some(e) = engine.entity_mut(PartsNumber(child.into())) {
                    e.parent = ParentLink::Pending(PartsNumber(parent.into()));
                }
            }
            FuzzOp::Reload => {
                let blob = engine.save(true).expect("save never fails on live state");
                engine
                    .load(&blob, &mut renderer)
                    .expect("a freshly saved blob always loads");
            }
        }
    }

    // A full save/load round trip preserves every entity.
    let blob = engine.save(true).expect("save never fails on live state");
    let mut restored = parts_engine();
    restored
        .load(&blob, &mut renderer)
        .expect("a freshly saved blob always loads");
    assert_eq!(restored.len(), engine.len());
    for e in engine.entities() {
        let r = restored.entity(e.number).expect("entity survives reload");
        assert_eq!((r.x, r.y, r.z, r.show), (e.x, e.y, e.z, e.show));
        assert_eq!(r.state, e.state);
        assert_eq!(
            restored.parent_number(e.number),
            engine.parent_number(e.number)
        );
    }
});
