use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Barrier};

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

#[test]
fn second_lookup_is_a_hit() {
    let cache: CompilationCache<&'static str, Arc<String>> = CompilationCache::new();
    let first = cache.get_or_add("Account", |k| Arc::new(format!("validator for {k}")));
    let second = cache.get_or_add("Account", |_| unreachable!("must not recompile"));

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            compilations: 1,
            redundant: 0
        }
    );
}

#[test]
fn distinct_keys_get_distinct_entries() {
    let cache: CompilationCache<u32, u32> = CompilationCache::new();
    assert_eq!(cache.get_or_add(1, |k| k * 10), 10);
    assert_eq!(cache.get_or_add(2, |k| k * 10), 20);
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&1));
    assert_eq!(cache.get(&3), None);
}

#[test]
fn errors_are_not_cached() {
    let cache: CompilationCache<u8, u8> = CompilationCache::new();
    let attempts = AtomicUsize::new(0);
    let failing = |_: &u8| {
        attempts.fetch_add(1, AtomicOrdering::Relaxed);
        Err("authoring error")
    };

    assert_eq!(cache.try_get_or_add(7, failing), Err("authoring error"));
    assert_eq!(cache.try_get_or_add(7, failing), Err("authoring error"));
    assert_eq!(attempts.load(AtomicOrdering::Relaxed), 2);
    assert!(cache.is_empty());

    assert_eq!(cache.try_get_or_add(7, |_| Ok::<_, &str>(1)), Ok(1));
    assert_eq!(cache.stats().compilations, 1);
}

#[test]
fn racing_threads_share_the_first_inserted_value() {
    const THREADS: usize = 8;
    let cache: CompilationCache<&'static str, Arc<usize>> = CompilationCache::new();
    let barrier = Barrier::new(THREADS);

    // Every thread misses: nothing is inserted until all are compiling.
    let values: Vec<Arc<usize>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let (cache, barrier) = (&cache, &barrier);
                scope.spawn(move || {
                    cache.get_or_add("shared", |_| {
                        barrier.wait();
                        Arc::new(i)
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &values[0];
    assert!(values.iter().all(|v| Arc::ptr_eq(v, first)));
    let stats = cache.stats();
    assert_eq!(stats.compilations, 1);
    assert_eq!(stats.redundant, THREADS as u64 - 1);
    assert_eq!(cache.len(), 1);
}

proptest! {
    #[test]
    fn every_key_compiles_once(keys in proptest::collection::vec(0u16..32, 0..200)) {
        let cache: CompilationCache<u16, u32> = CompilationCache::new();
        for &key in &keys {
            let value = cache.get_or_add(key, |k| u32::from(*k) + 1);
            prop_assert_eq!(value, u32::from(key) + 1);
        }
        let distinct: std::collections::HashSet<_> = keys.iter().collect();
        let stats = cache.stats();
        prop_assert_eq!(stats.compilations as usize, distinct.len());
        prop_assert_eq!((stats.hits + stats.compilations) as usize, keys.len());
    }
}
