//! Integration test: failed loads never leave a store half-restored.
//!
//! For every store a corrupted blob is loaded on top of live state. The store
//! must end up either exactly as it was (header rejected) or in its empty
//! state (payload rejected), never a mix of old and new entries.

use vmsave_core::dialogue_log::DialogueLog;
use vmsave_core::glyph::{GlyphPool, GlyphSpec};
use vmsave_core::id::PartsNumber;
use vmsave_core::parts::NumeralFont;
use vmsave_core::render::NullRenderer;
use vmsave_core::scene_cache::SceneCache;
use vmsave_core::snapshot::{Blob, SnapshotError};
use vmsave_core::test_utils::*;

/// Drop the last word of a blob so its payload is cut short.
fn truncated(blob: Blob) -> Blob {
    let mut words = blob.into_words();
    words.pop();
    Blob::from_words(words)
}

fn glyph(ch: char) -> GlyphSpec {
    GlyphSpec {
        ch,
        font_size: 16,
        color: [0, 0, 0],
    }
}

// ============================================================================
// Ring stores
// ============================================================================

#[test]
fn truncated_dialogue_log_leaves_one_blank_page() {
    let mut source = DialogueLog::default();
    source.add_text("one");
    source.new_page();
    source.add_text("two");
    let bad = truncated(source.save().unwrap());

    let mut target = DialogueLog::default();
    target.add_text("live");
    target.new_page();
    assert!(target.load(&bad).is_err());
    assert_eq!(target.page_count(), 1);
    assert!(target.page(0).unwrap().is_blank());
}

#[test]
fn scene_cache_with_mismatched_types_is_emptied() {
    let t = sample_types();
    let mut source = SceneCache::default();
    source.push(&t.actor("hero", 1, 2, 5.0, &["a"]), &t.types).unwrap();
    let blob = source.save().unwrap();

    // Same type name, different member layout.
    let mut other = vmsave_core::descriptor::TypeRegistryBuilder::new();
    other
        .register_struct(
            "actor",
            vec![vmsave_core::descriptor::MemberDef::new(
                "only",
                vmsave_core::descriptor::MemberKind::Int,
            )],
        )
        .unwrap();
    let other = other.build().unwrap();

    let mut target = SceneCache::default();
    target.push(&t.point(3, 4), &t.types).unwrap();
    assert!(matches!(
        target.load(&blob, &other),
        Err(SnapshotError::InvalidRecord(_))
    ));
    assert!(target.is_empty());
}

// ============================================================================
// Glyph pool
// ============================================================================

#[test]
fn failed_glyph_load_keeps_live_pool() {
    let mut r = NullRenderer::new();
    let mut source = GlyphPool::default();
    source.create(glyph('x'), &mut r);
    source.create(glyph('y'), &mut r);
    let bad = truncated(source.save().unwrap());

    let mut target = GlyphPool::default();
    let live = target.create(glyph('z'), &mut r);
    assert!(target.load(&bad).is_err());
    assert!(!target.has_pending_rebuild());
    assert!(!target.rebuild(&mut r));
    assert_eq!(target.get(live).map(|s| s.spec.ch), Some('z'));
}

#[test]
fn glyph_load_waits_for_rebuild() {
    let mut r = RecordingRenderer::new();
    let mut source = GlyphPool::default();
    let h = source.create(glyph('q'), &mut r);
    let blob = source.save().unwrap();

    let mut target = GlyphPool::default();
    let old = target.create(glyph('z'), &mut r);
    target.load(&blob).unwrap();
    // Until rebuilt the live pool is still the old one.
    assert_eq!(target.get(old).map(|s| s.spec.ch), Some('z'));

    let before = r.constructed();
    assert!(target.rebuild(&mut r));
    assert_eq!(r.constructed(), before + 1);
    assert_eq!(target.get(h).map(|s| s.spec.ch), Some('q'));
}

// ============================================================================
// Parts engine
// ============================================================================

#[test]
fn corrupt_parts_payload_releases_everything() {
    let mut source = parts_engine();
    populate_parts(&mut source, 4);
    let bad = truncated(source.save(true).unwrap());

    let mut target = parts_engine();
    populate_parts(&mut target, 10);
    let mut r = RecordingRenderer::new();
    assert!(target.load(&bad, &mut r).is_err());
    assert!(target.is_empty());
    assert_eq!(target.draw_order().count(), 0);
    assert_eq!(target.hit_test(0, 0), None);
    assert_eq!(target.surface(PartsNumber(0)), None);
}

#[test]
fn wrong_magic_leaves_parts_untouched() {
    let log_blob = DialogueLog::default().save().unwrap();
    let mut target = parts_engine();
    populate_parts(&mut target, 3);
    let font = NumeralFont {
        cgs: [1; 12],
        width: 8,
        height: 12,
    };
    target.set_numeral_font(0, font);

    assert!(matches!(
        target.load(&log_blob, &mut NullRenderer::new()),
        Err(SnapshotError::InvalidMagic { expected: "PRT" })
    ));
    assert_eq!(target.len(), 3);
    assert_eq!(target.numeral_font(0), Some(&font));
}

#[test]
fn successful_load_replaces_rather_than_merges() {
    let mut source = parts_engine();
    add_text_part(&mut source, 100, &["from save"]);
    let blob = source.save(true).unwrap();

    let mut target = parts_engine();
    populate_parts(&mut target, 5);
    target.load(&blob, &mut NullRenderer::new()).unwrap();
    assert_eq!(target.len(), 1);
    assert!(target.entity(PartsNumber(0)).is_none());
    assert!(target.entity(PartsNumber(100)).is_some());
}
