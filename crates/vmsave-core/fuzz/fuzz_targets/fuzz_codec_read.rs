#![no_main]
use libfuzzer_sys::fuzz_target;
use vmsave_core::codec::WordReader;
use vmsave_core::snapshot::Blob;
use vmsave_core::test_utils::sample_types;

fuzz_target!(|data: &[u8]| {
    // Decode arbitrary words as every sample struct. Must not panic and
    // must never read past the end.
    let Ok(blob) = Blob::from_bytes(data) else {
        return;
    };
    let t = sample_types();
    for type_id in [t.point, t.actor, t.tree, t.scene] {
        let mut r = WordReader::new(blob.words());
        let _ = r.read_struct(type_id, &t.types);
        assert!(r.position() <= blob.len());
    }
});
