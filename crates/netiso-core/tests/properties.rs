//! Property tests: ordering laws and persisted-form round-trips.
//!
//! Keys are drawn from a small pool of tuple sites, opaque sites and nonces
//! so that collisions (equal keys) actually occur.

use netiso_core::{FrameSiteMode, KeyError, Nonce, PartitionKey, SchemeRegistry, Site};
use proptest::prelude::*;
use std::cmp::Ordering;

const HOSTS: &[&str] = &[
    "http://a.test",
    "https://a.test",
    "https://www.a.test",
    "https://b.test",
    "https://sub.b.test:8443",
    "http://localhost",
    "https://bbc.co.uk",
    "file:///x",
];

fn arb_mode() -> impl Strategy<Value = FrameSiteMode> {
    prop_oneof![
        Just(FrameSiteMode::Separate),
        Just(FrameSiteMode::CollapseIntoTopSite)
    ]
}

fn arb_tuple_site() -> impl Strategy<Value = Site> {
    prop::sample::select(HOSTS).prop_map(Site::new)
}

/// Tuple sites, plus a handful of shared opaque sites so equality between
/// distinct key values is exercised for opaque identities too.
fn arb_site(opaque_pool: Vec<Site>) -> impl Strategy<Value = Site> {
    prop_oneof![
        4 => arb_tuple_site(),
        1 => prop::sample::select(opaque_pool),
    ]
}

fn arb_key() -> impl Strategy<Value = PartitionKey> {
    let opaque_pool: Vec<Site> = (0..3).map(|_| Site::new_opaque()).collect();
    let nonce_pool: Vec<Nonce> = (0..2).map(|_| Nonce::create()).collect();
    prop_oneof![
        1 => Just(PartitionKey::empty()),
        6 => (
            arb_site(opaque_pool.clone()),
            arb_site(opaque_pool),
            prop::option::weighted(0.2, prop::sample::select(nonce_pool)),
        )
            .prop_map(|(top, frame, nonce)| PartitionKey::with_nonce(top, frame, nonce)),
    ]
}

fn arb_persistable_key() -> impl Strategy<Value = PartitionKey> {
    prop_oneof![
        1 => Just(PartitionKey::empty()),
        6 => (arb_tuple_site(), arb_tuple_site())
            .prop_map(|(top, frame)| PartitionKey::new(top, frame)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    // Exactly one of <, >, == holds, and it agrees with eq_in.
    #[test]
    fn trichotomy(a in arb_key(), b in arb_key(), mode in arb_mode()) {
        let ab = a.cmp_in(&b, mode);
        let ba = b.cmp_in(&a, mode);
        prop_assert_eq!(ab, ba.reverse());
        prop_assert_eq!(ab == Ordering::Equal, a.eq_in(&b, mode));
        prop_assert_eq!(a.effective(mode) == b.effective(mode), a.eq_in(&b, mode));
        prop_assert_eq!(a.effective(mode).cmp(&b.effective(mode)), ab);
    }

    #[test]
    fn transitivity(a in arb_key(), b in arb_key(), c in arb_key(), mode in arb_mode()) {
        let mut keys = [a, b, c];
        keys.sort_by(|x, y| x.cmp_in(y, mode));
        prop_assert!(keys[0].cmp_in(&keys[2], mode).is_le());
    }

    #[test]
    fn empty_sorts_first(k in arb_key(), mode in arb_mode()) {
        let empty = PartitionKey::empty();
        if k.is_empty() {
            prop_assert!(empty.cmp_in(&k, mode).is_eq());
        } else {
            prop_assert!(empty.cmp_in(&k, mode).is_lt());
        }
    }

    #[test]
    fn copies_are_equal(k in arb_key(), mode in arb_mode()) {
        let copy = k.clone();
        prop_assert!(k.eq_in(&copy, mode));
        prop_assert!(k.cmp_in(&copy, mode).is_eq());
        prop_assert_eq!(k.to_debug_string(mode), copy.to_debug_string(mode));
    }

    // Transient keys never persist and never render a cache string.
    #[test]
    fn transient_keys_stay_ephemeral(k in arb_key(), mode in arb_mode()) {
        if k.is_transient(mode) {
            prop_assert_eq!(k.to_cache_string(mode), "");
            if k.is_fully_populated() {
                prop_assert_eq!(k.to_value(mode), Err(KeyError::Transient));
            }
        } else {
            prop_assert!(k.nonce().is_none());
            prop_assert!(!k.to_cache_string(mode).is_empty());
            prop_assert!(k.to_value(mode).is_ok());
        }
    }

    #[test]
    fn collapse_never_adds_transience(k in arb_key()) {
        if !k.is_transient(FrameSiteMode::Separate) {
            prop_assert!(!k.is_transient(FrameSiteMode::CollapseIntoTopSite));
        }
    }

    #[test]
    fn persisted_round_trip(k in arb_persistable_key(), mode in arb_mode()) {
        let value = k.to_value(mode).unwrap();
        let back = PartitionKey::from_value(&value, &SchemeRegistry::new()).unwrap();
        prop_assert!(k.eq_in(&back, mode));
        prop_assert_eq!(back.to_value(mode).unwrap(), value);
    }

    // Arbitrary JSON never panics the decoder.
    #[test]
    fn from_value_is_total(s in ".{0,24}", t in ".{0,24}", n in 0usize..4) {
        let value = serde_json::Value::Array(
            std::iter::once(s).chain(std::iter::repeat(t).take(n)).map(serde_json::Value::String).collect(),
        );
        let _ = PartitionKey::from_value(&value, &SchemeRegistry::new());
    }
}
