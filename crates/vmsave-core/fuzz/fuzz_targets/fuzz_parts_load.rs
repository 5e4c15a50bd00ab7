#![no_main]
use libfuzzer_sys::fuzz_target;
use vmsave_core::render::NullRenderer;
use vmsave_core::snapshot::Blob;
use vmsave_core::test_utils::parts_engine;

fuzz_target!(|data: &[u8]| {
    // Must not panic. A rejected blob must leave no entities behind.
    let Ok(blob) = Blob::from_bytes(data) else {
        return;
    };
    let mut engine = parts_engine();
    if engine.load(&blob, &mut NullRenderer::new()).is_err() {
        assert!(engine.is_empty());
    } else {
        let _ = engine.resolve_pending_parents();
        let _ = engine.save(true);
    }
});
