#![no_main]
use libfuzzer_sys::fuzz_target;
use vmsave_core::dialogue_log::DialogueLog;
use vmsave_core::glyph::GlyphPool;
use vmsave_core::render::NullRenderer;
use vmsave_core::scene_cache::SceneCache;
use vmsave_core::snapshot::Blob;
use vmsave_core::test_utils::sample_types;

fuzz_target!(|data: &[u8]| {
    // Feed the same bytes to every ring/pool store. Must not panic.
    let Ok(blob) = Blob::from_bytes(data) else {
        return;
    };

    let mut log = DialogueLog::default();
    if log.load(&blob).is_err() {
        assert_eq!(log.page_count(), 1);
    }

    let types = sample_types();
    let mut cache = SceneCache::default();
    if cache.load(&blob, &types.types).is_err() {
        assert!(cache.is_empty());
    }

    let mut glyphs = GlyphPool::default();
    if glyphs.load(&blob).is_ok() {
        glyphs.rebuild(&mut NullRenderer::new());
    }
});
