//! Property-based tests for the word codec and the history stores.
//!
//! Uses proptest to generate random values and push sequences, then verify
//! round-trip and ring invariants hold.

use proptest::prelude::*;
use vmsave_core::codec::{WordReader, WordWriter};
use vmsave_core::descriptor::{ArrayDescriptor, ElementKind, MemberKind};
use vmsave_core::dialogue_log::DialogueLog;
use vmsave_core::history::{HandlePool, HistoryError, RingStore};
use vmsave_core::test_utils::*;
use vmsave_core::value::{StructValue, Value};

// ===========================================================================
// Generators
// ===========================================================================

/// Strings without NUL, including non-ASCII scalars.
fn arb_string() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            (1u32..0x80).prop_map(|c| char::from_u32(c).unwrap_or('a')),
            any::<char>().prop_filter("no NUL", |c| *c != '\0'),
        ],
        0..12,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Any float bit pattern, NaN payloads included.
fn arb_float() -> impl Strategy<Value = f32> {
    any::<u32>().prop_map(f32::from_bits)
}

fn arb_tags() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(arb_string(), 0..4)
}

fn arb_actor(types: &'static SampleTypes) -> impl Strategy<Value = StructValue> {
    (arb_string(), any::<i32>(), any::<i32>(), arb_float(), any::<bool>(), arb_tags()).prop_map(
        move |(name, x, y, hp, alive, tags)| {
            let tags = if tags.is_empty() {
                None
            } else {
                Some(tags.into_iter().map(Value::String).collect())
            };
            StructValue::new(
                types.actor,
                vec![
                    Value::String(name),
                    Value::Struct(types.point(x, y)),
                    Value::Float(hp),
                    Value::Bool(alive),
                    Value::Array(tags),
                ],
            )
        },
    )
}

/// Non-empty rows of a two-dimensional int grid, or the absent grid.
fn arb_grid() -> impl Strategy<Value = Option<Vec<Vec<i32>>>> {
    proptest::option::of(proptest::collection::vec(
        proptest::collection::vec(any::<i32>(), 1..5),
        1..5,
    ))
}

fn types() -> &'static SampleTypes {
    use std::sync::OnceLock;
    static TYPES: OnceLock<SampleTypes> = OnceLock::new();
    TYPES.get_or_init(sample_types)
}

// ===========================================================================
// Codec round-trip
// ===========================================================================

proptest! {
    #[test]
    fn scalars_round_trip(ints in proptest::collection::vec(any::<i32>(), 0..32),
                          floats in proptest::collection::vec(arb_float(), 0..32)) {
        let mut w = WordWriter::new();
        for v in &ints {
            w.write_int(*v);
        }
        for v in &floats {
            w.write_float(*v);
        }
        let words = w.into_words();
        let mut r = WordReader::new(&words);
        for v in &ints {
            prop_assert_eq!(r.read_int(), *v);
        }
        for v in &floats {
            prop_assert_eq!(r.read_float().to_bits(), v.to_bits());
        }
        prop_assert!(!r.has_error());
        prop_assert!(r.is_exhausted());
    }

    #[test]
    fn strings_round_trip(s in arb_string()) {
        let mut w = WordWriter::new();
        w.write_string(&s).unwrap();
        prop_assert_eq!(w.len(), s.chars().count() + 1);
        let words = w.into_words();
        let mut r = WordReader::new(&words);
        prop_assert_eq!(r.read_string(), s);
        prop_assert!(!r.has_error());
    }

    #[test]
    fn actors_round_trip(actor in arb_actor(types())) {
        let t = types();
        let mut w = WordWriter::new();
        w.write_struct(&actor, t.actor, &t.types).unwrap();
        let words = w.into_words();
        let mut r = WordReader::new(&words);
        prop_assert_eq!(r.read_struct(t.actor, &t.types), actor);
        prop_assert!(!r.has_error());
        prop_assert!(r.is_exhausted());
    }

    #[test]
    fn grids_round_trip(grid in arb_grid()) {
        let t = types();
        let desc = ArrayDescriptor::new(ElementKind::Int, 2);
        let value = Value::Array(grid.map(|rows| {
            rows.into_iter()
                .map(|row| Value::Array(Some(row.into_iter().map(Value::Int).collect())))
                .collect()
        }));
        let mut w = WordWriter::new();
        w.write_value(&value, &MemberKind::Array(desc), &t.types).unwrap();
        let words = w.into_words();
        let mut r = WordReader::new(&words);
        prop_assert_eq!(r.read_value(&MemberKind::Array(desc), &t.types), value);
        prop_assert!(!r.has_error());
    }

    #[test]
    fn truncation_always_sets_error(actor in arb_actor(types()), cut in 1usize..8) {
        let t = types();
        let mut w = WordWriter::new();
        w.write_struct(&actor, t.actor, &t.types).unwrap();
        let mut words = w.into_words();
        let keep = words.len().saturating_sub(cut);
        words.truncate(keep);
        let mut r = WordReader::new(&words);
        let decoded = r.read_struct(t.actor, &t.types);
        prop_assert!(r.has_error());
        prop_assert_eq!(decoded, StructValue::default_for(t.actor, &t.types));
    }

    #[test]
    fn random_words_never_panic(words in proptest::collection::vec(any::<i32>(), 0..64)) {
        let t = types();
        let mut r = WordReader::new(&words);
        let _ = r.read_struct(t.scene, &t.types);
        let _ = r.read_struct(t.tree, &t.types);
        prop_assert!(r.position() <= words.len());
    }
}

// ===========================================================================
// Ring invariants
// ===========================================================================

proptest! {
    #[test]
    fn ring_len_never_exceeds_capacity(capacity in 1usize..16, pushes in 0usize..64) {
        let mut ring = RingStore::new(capacity);
        for i in 0..pushes {
            ring.push(i);
        }
        prop_assert_eq!(ring.len(), pushes.min(capacity));
        if pushes > 0 {
            // Newest at len - 1, oldest is the first survivor.
            prop_assert_eq!(ring.get(ring.len() - 1).copied(), Ok(pushes - 1));
            prop_assert_eq!(ring.get(0).copied(), Ok(pushes - ring.len()));
        }
        prop_assert_eq!(
            ring.get(ring.len()),
            Err(HistoryError::OutOfRange { index: ring.len(), count: ring.len() })
        );
    }

    #[test]
    fn ring_iter_is_oldest_first(capacity in 1usize..16, pushes in 1usize..64) {
        let mut ring = RingStore::new(capacity);
        for i in 0..pushes {
            ring.push(i);
        }
        let items: Vec<usize> = ring.iter().copied().collect();
        let expected: Vec<usize> = (pushes - ring.len()..pushes).collect();
        prop_assert_eq!(items, expected);
    }

    #[test]
    fn dialogue_log_keeps_last_pages(capacity in 1usize..8, pages in 0usize..24) {
        let mut log = DialogueLog::new(capacity);
        log.add_text("page 0");
        for p in 1..=pages {
            log.new_page();
            log.add_text(&format!("page {p}"));
        }
        let total = pages + 1;
        prop_assert_eq!(log.page_count(), total.min(capacity));
        let first_kept = total - log.page_count();
        let expected = format!("page {first_kept}");
        prop_assert_eq!(log.text(0, 0), Ok(expected.as_str()));
    }

    #[test]
    fn pool_handles_stay_unique(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
        let mut pool = HandlePool::new();
        let mut live = Vec::new();
        for (i, insert) in ops.into_iter().enumerate() {
            if insert || live.is_empty() {
                live.push((pool.insert(i), i));
            } else {
                let (handle, _) = live.remove(i % live.len());
                prop_assert!(pool.release(handle));
                prop_assert!(!pool.contains(handle));
            }
        }
        prop_assert_eq!(pool.len(), live.len());
        for (handle, value) in &live {
            prop_assert_eq!(pool.get(*handle), Some(value));
        }
    }
}
