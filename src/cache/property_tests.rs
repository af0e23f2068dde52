//! Property-Based Tests for Cache Module
//!
//! Drives the cache manager through generated operation sequences on a
//! manual clock and checks the observable guarantees.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::cache::clock::{from_unix, Clock, ManualClock};
use crate::cache::{CacheManager, CachePolicy, Fingerprint, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::fast::{FastLayer, MemoryFastLayer};
use crate::storage::{DurableStore, SqliteStore};

// == Test Configuration ==
const TEST_FAST_ENTRIES: usize = 1000;
const TEST_START: i64 = 1_700_000_000;

struct Fixture {
    cache: CacheManager,
    clock: Arc<ManualClock>,
    store: SqliteStore,
}

async fn fixture(with_fast_layer: bool) -> Fixture {
    let clock = Arc::new(ManualClock::new(from_unix(TEST_START)));
    let store = SqliteStore::open_in_memory().unwrap();
    let fast: Option<Arc<dyn FastLayer>> = if with_fast_layer {
        Some(Arc::new(MemoryFastLayer::new(
            "pw_",
            TEST_FAST_ENTRIES,
            clock.clone(),
        )))
    } else {
        None
    };
    let cache = CacheManager::open(
        Arc::new(store.clone()),
        fast,
        clock.clone(),
        CachePolicy::default(),
    )
    .await;
    Fixture { cache, clock, store }
}

// == Strategies ==
/// Generates group prefixes like `pw_hotel_`
fn group_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,12}".prop_map(|s| format!("{}_", s))
}

/// Generates key suffixes (non-empty, well within the key limit)
fn suffix_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{1,32}"
}

/// Generates JSON-ish payloads
fn payload_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 {}:\",]{1,256}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { suffix: String, value: String },
    Get { suffix: String },
    Delete { suffix: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    let suffix = "[a-e]{1,2}";
    prop_oneof![
        (suffix, payload_strategy()).prop_map(|(suffix, value)| CacheOp::Set { suffix, value }),
        suffix.prop_map(|suffix| CacheOp::Get { suffix }),
        suffix.prop_map(|suffix| CacheOp::Delete { suffix }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // A stored payload is returned unchanged until it expires.
    #[test]
    fn prop_roundtrip_storage(
        group in group_strategy(),
        suffix in suffix_strategy(),
        value in payload_strategy(),
        ttl in 1u64..100_000,
        with_fast_layer in any::<bool>(),
    ) {
        tokio_test::block_on(async {
            let f = fixture(with_fast_layer).await;
            let key = format!("{}{}", group, suffix);

            f.cache.set(&key, &value, ttl, &group).await.unwrap();
            prop_assert_eq!(f.cache.get(&key).await.unwrap(), Some(value));
            Ok(())
        })?;
    }

    // Writing the same key twice leaves one row holding the second value.
    #[test]
    fn prop_overwrite_leaves_single_row(
        group in group_strategy(),
        suffix in suffix_strategy(),
        value1 in payload_strategy(),
        value2 in payload_strategy(),
    ) {
        tokio_test::block_on(async {
            let f = fixture(true).await;
            let key = format!("{}{}", group, suffix);

            f.cache.set(&key, &value1, 60, &group).await.unwrap();
            f.cache.set(&key, &value2, 60, &group).await.unwrap();

            prop_assert_eq!(f.store.count_all().await.unwrap(), 1);
            prop_assert_eq!(f.cache.get(&key).await.unwrap(), Some(value2));

            let stats = f.cache.get_stats(false).await.unwrap();
            prop_assert_eq!(stats.total_entries, 1);
            prop_assert_eq!(stats.groups.get(&group).copied(), Some(1));
            Ok(())
        })?;
    }

    // Deleting one group never touches another.
    #[test]
    fn prop_group_isolation(
        suffixes_a in prop::collection::hash_set(suffix_strategy(), 1..10),
        suffixes_b in prop::collection::hash_set(suffix_strategy(), 1..10),
        with_fast_layer in any::<bool>(),
    ) {
        tokio_test::block_on(async {
            let f = fixture(with_fast_layer).await;
            let (group_a, group_b) = ("pw_hotel_", "pw_flight_");

            for suffix in &suffixes_a {
                f.cache.set(&format!("{}{}", group_a, suffix), "a", 600, group_a).await.unwrap();
            }
            for suffix in &suffixes_b {
                f.cache.set(&format!("{}{}", group_b, suffix), "b", 600, group_b).await.unwrap();
            }

            let removed = f.cache.delete_group(group_a).await.unwrap();
            prop_assert_eq!(removed, suffixes_a.len() as u64);

            for suffix in &suffixes_a {
                prop_assert_eq!(f.cache.get(&format!("{}{}", group_a, suffix)).await.unwrap(), None);
            }
            for suffix in &suffixes_b {
                prop_assert_eq!(
                    f.cache.get(&format!("{}{}", group_b, suffix)).await.unwrap(),
                    Some("b".to_string())
                );
            }

            let stats = f.cache.get_stats(true).await.unwrap();
            prop_assert_eq!(stats.groups.get(group_b).copied(), Some(suffixes_b.len() as u64));
            prop_assert_eq!(stats.total_entries, suffixes_b.len() as u64);
            Ok(())
        })?;
    }

    // Hit and miss counters match a model of the cache contents, and the
    // ratio is derived from them.
    #[test]
    fn prop_statistics_accuracy(
        ops in prop::collection::vec(cache_op_strategy(), 1..50),
        with_fast_layer in any::<bool>(),
    ) {
        tokio_test::block_on(async {
            let f = fixture(with_fast_layer).await;
            let mut model: HashMap<String, String> = HashMap::new();
            let mut expected_hits: u64 = 0;
            let mut expected_misses: u64 = 0;

            for op in ops {
                match op {
                    CacheOp::Set { suffix, value } => {
                        let key = format!("pw_api_{}", suffix);
                        f.cache.set(&key, &value, 600, "").await.unwrap();
                        model.insert(key, value);
                    }
                    CacheOp::Get { suffix } => {
                        let key = format!("pw_api_{}", suffix);
                        let got = f.cache.get(&key).await.unwrap();
                        prop_assert_eq!(got.as_ref(), model.get(&key));
                        if got.is_some() {
                            expected_hits += 1;
                        } else {
                            expected_misses += 1;
                        }
                    }
                    CacheOp::Delete { suffix } => {
                        let key = format!("pw_api_{}", suffix);
                        let existed = f.cache.delete(&key).await.unwrap();
                        prop_assert_eq!(existed, model.remove(&key).is_some());
                    }
                }
            }

            let stats = f.cache.get_stats(false).await.unwrap();
            prop_assert_eq!(stats.hits, expected_hits);
            prop_assert_eq!(stats.misses, expected_misses);
            prop_assert_eq!(stats.total_entries, model.len() as u64);

            let lookups = expected_hits + expected_misses;
            if lookups == 0 {
                prop_assert_eq!(stats.hit_ratio, 0.0);
            } else {
                let expected = expected_hits as f64 / lookups as f64;
                prop_assert!((stats.hit_ratio - expected).abs() < 1e-9);
            }
            Ok(())
        })?;
    }

    // Maintenance removes exactly the rows whose expiry has passed.
    #[test]
    fn prop_maintenance_removes_exactly_expired(
        ttls in prop::collection::vec(1u64..200, 1..40),
        elapsed in 0i64..250,
    ) {
        tokio_test::block_on(async {
            let f = fixture(true).await;
            for (i, ttl) in ttls.iter().enumerate() {
                f.cache.set(&format!("pw_api_{}", i), "v", *ttl, "").await.unwrap();
            }

            f.clock.advance(elapsed);
            let expected = ttls.iter().filter(|ttl| **ttl as i64 <= elapsed).count() as u64;

            prop_assert_eq!(f.cache.maintenance().await.unwrap(), expected);
            prop_assert_eq!(f.store.count_all().await.unwrap(), ttls.len() as u64 - expected);
            prop_assert_eq!(f.store.count_expired(f.clock.now()).await.unwrap(), 0);

            // A second run finds nothing left to do
            prop_assert_eq!(f.cache.maintenance().await.unwrap(), 0);
            Ok(())
        })?;
    }

    // An entry is a hit one second before its expiry and a miss from then on,
    // whether or not it was ever swept.
    #[test]
    fn prop_ttl_expiration_behavior(
        suffix in suffix_strategy(),
        value in payload_strategy(),
        ttl in 1u64..10_000,
        with_fast_layer in any::<bool>(),
    ) {
        tokio_test::block_on(async {
            let f = fixture(with_fast_layer).await;
            let key = format!("pw_api_{}", suffix);
            f.cache.set(&key, &value, ttl, "").await.unwrap();

            f.clock.advance(ttl as i64 - 1);
            prop_assert_eq!(f.cache.get(&key).await.unwrap(), Some(value));

            f.clock.advance(1);
            prop_assert_eq!(f.cache.get(&key).await.unwrap(), None);

            let stats = f.cache.get_stats(true).await.unwrap();
            prop_assert_eq!(stats.expired_entries, 1);
            prop_assert_eq!(stats.groups.get("pw_api_").copied(), Some(0));
            Ok(())
        })?;
    }

    // After a flush nothing is readable, and lookups still count.
    #[test]
    fn prop_flush_completeness(
        suffixes in prop::collection::hash_set(suffix_strategy(), 1..30),
    ) {
        tokio_test::block_on(async {
            let f = fixture(true).await;
            for suffix in &suffixes {
                f.cache.set(&format!("pw_api_{}", suffix), "v", 600, "").await.unwrap();
            }

            f.cache.flush_all().await.unwrap();

            for suffix in &suffixes {
                prop_assert_eq!(f.cache.get(&format!("pw_api_{}", suffix)).await.unwrap(), None);
            }
            let stats = f.cache.get_stats(false).await.unwrap();
            prop_assert_eq!(stats.total_entries, 0);
            prop_assert_eq!(stats.misses, suffixes.len() as u64);
            prop_assert_eq!(f.store.count_all().await.unwrap(), 0);
            Ok(())
        })?;
    }

    // Parameter order never changes the fingerprint; parameter values do.
    #[test]
    fn prop_fingerprint_order_independent(
        params in prop::collection::hash_map("[a-z]{1,8}", "[a-zA-Z0-9]{0,16}", 0..12),
        endpoint in "[a-z/]{1,24}",
    ) {
        let ordered: BTreeMap<&String, &String> = params.iter().collect();
        let a = Fingerprint::build("pw_api_", &endpoint, &params).unwrap();
        let b = Fingerprint::build("pw_api_", &endpoint, &ordered).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert!(a.starts_with("pw_api_"));
        prop_assert_eq!(a.len(), "pw_api_".len() + 64);

        let mut changed = params.clone();
        changed.insert("zz_extra".to_string(), "1".to_string());
        let c = Fingerprint::build("pw_api_", &endpoint, &changed).unwrap();
        prop_assert_ne!(a, c);
    }
}

// Concurrent callers against one manager. Reads see either nothing or a
// complete payload that some writer stored.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_concurrent_operation_correctness(
        ops in prop::collection::vec(cache_op_strategy(), 10..50),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let f = fixture(true).await;
            let cache = Arc::new(f.cache);
            let written: HashSet<String> = ops
                .iter()
                .filter_map(|op| match op {
                    CacheOp::Set { value, .. } => Some(value.clone()),
                    _ => None,
                })
                .collect();

            let mut handles = vec![];
            for op in ops {
                let cache = Arc::clone(&cache);
                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Set { suffix, value } => {
                            cache.set(&format!("pw_api_{}", suffix), &value, 600, "").await.unwrap();
                            None
                        }
                        CacheOp::Get { suffix } => cache.get(&format!("pw_api_{}", suffix)).await.unwrap(),
                        CacheOp::Delete { suffix } => {
                            cache.delete(&format!("pw_api_{}", suffix)).await.unwrap();
                            None
                        }
                    }
                }));
            }

            for handle in handles {
                if let Some(value) = handle.await.expect("Task should not panic") {
                    prop_assert!(written.contains(&value), "Read a payload nobody wrote: {}", value);
                }
            }

            let stats = cache.get_stats(true).await.unwrap();
            prop_assert_eq!(stats.total_entries, f.store.count_all().await.unwrap());
            prop_assert!(stats.hit_ratio >= 0.0 && stats.hit_ratio <= 1.0);
            Ok(())
        })?;
    }
}

// == Additional Unit Tests for Edge Cases ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[tokio::test]
    async fn test_key_length_validation() {
        let f = fixture(false).await;
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);

        let result = f.cache.set(&long_key, "value", 60, "").await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_value_size_validation() {
        let f = fixture(false).await;
        let large_value = "x".repeat(MAX_VALUE_SIZE + 1);

        let result = f.cache.set("pw_api_1", &large_value, 60, "").await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
        assert_eq!(f.store.count_all().await.unwrap(), 0);
    }

    #[test]
    fn test_error_status_codes() {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let test_cases = vec![
            (CacheError::NotFound("key".to_string()), StatusCode::NOT_FOUND),
            (CacheError::InvalidKey("key".to_string()), StatusCode::BAD_REQUEST),
            (CacheError::InvalidRequest("bad".to_string()), StatusCode::BAD_REQUEST),
            (CacheError::StorageUnavailable("down".to_string()), StatusCode::SERVICE_UNAVAILABLE),
            (CacheError::Upstream("timeout".to_string()), StatusCode::BAD_GATEWAY),
            (CacheError::Internal("error".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(
                response.status(),
                expected_status,
                "Error should map to correct HTTP status"
            );
        }
    }
}
