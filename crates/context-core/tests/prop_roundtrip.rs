/// Property-based round-trip tests for the JSON codec.
///
/// Generates random Context trees built from the JSON-representable subset
/// (None, bool, i64, finite f64, String, Array, Object) and checks that
/// `deserialize(serialize(v))` compares structurally equal to `v` for every
/// output layout.
///
/// Floats are generated as `mantissa / 10^n`; whole-number floats print as
/// `2.0` and must come back as f64, not i64.
use proptest::prelude::*;

use context_core::{deserialize, serialize, Context, SerializeOptions};

// ============================================================================
// Strategies
// ============================================================================

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-zA-Z_@][a-zA-Z0-9_]{0,12}").unwrap(),
        Just(String::new()),
        Just("caf\u{00e9}".to_string()),
        Just("with space".to_string()),
    ]
}

fn arb_string() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,24}",
        Just(String::new()),
        Just("line1\nline2".to_string()),
        Just("say \"hi\"".to_string()),
        Just("path\\to\\file".to_string()),
        Just("\u{4f60}\u{597d}".to_string()),
        Just("\u{1f600}".to_string()),
    ]
}

fn arb_float() -> impl Strategy<Value = f64> {
    (-100_000_000i64..100_000_000i64, 0u32..5u32)
        .prop_map(|(mantissa, decimals)| mantissa as f64 / 10f64.powi(decimals as i32))
}

fn arb_leaf() -> impl Strategy<Value = Context> {
    prop_oneof![
        Just(Context::None),
        any::<bool>().prop_map(Context::from),
        any::<i64>().prop_map(Context::from),
        arb_float().prop_map(Context::from),
        arb_string().prop_map(Context::from),
    ]
}

fn arb_context() -> impl Strategy<Value = Context> {
    arb_leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Context::from),
            prop::collection::btree_map(arb_key(), inner, 0..6).prop_map(Context::from),
        ]
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn compact_roundtrip(v in arb_context()) {
        let text = serialize(&v, &SerializeOptions::default()).unwrap();
        let back = deserialize(&text).unwrap();
        prop_assert!(back.compare(&v), "roundtrip failed for {text}");
    }

    #[test]
    fn pretty_roundtrip(v in arb_context(), indent in 0u16..5) {
        let text = serialize(&v, &SerializeOptions::pretty(indent)).unwrap();
        let back = deserialize(&text).unwrap();
        prop_assert!(back.compare(&v), "roundtrip failed for {text}");
    }

    #[test]
    fn ascii_roundtrip(v in arb_context()) {
        let opts = SerializeOptions::default().with_ensure_ascii(true);
        let text = serialize(&v, &opts).unwrap();
        prop_assert!(text.is_ascii());
        let back = deserialize(&text).unwrap();
        prop_assert!(back.compare(&v), "roundtrip failed for {text}");
    }

    #[test]
    fn serialization_is_stable(v in arb_context()) {
        let once = serialize(&v, &SerializeOptions::default()).unwrap();
        let twice = serialize(&deserialize(&once).unwrap(), &SerializeOptions::default()).unwrap();
        prop_assert_eq!(once, twice);
    }
}
