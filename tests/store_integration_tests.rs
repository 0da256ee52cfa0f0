//! Integration Tests for the Table Cache
//!
//! Drives `TableCache` through the public API against the in-memory table.

use std::sync::Arc;
use std::time::Duration;

use dynamo_cache::cache::{RetryPolicy, TableCache, Unprocessed};
use dynamo_cache::config::{KeySchema, StoreConfig};
use dynamo_cache::error::CacheError;
use dynamo_cache::provider::MemoryTable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user: String,
    visits: u32,
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

fn session(user: &str, visits: u32) -> Session {
    Session {
        user: user.to_string(),
        visits,
    }
}

#[tokio::test]
async fn test_typed_values_round_trip() {
    let config = StoreConfig::default();
    let table = Arc::new(MemoryTable::for_config(&config));
    let cache: TableCache<Session> = TableCache::new(table, config);

    cache.set("user+alice", &session("alice", 3), None).await.unwrap();

    assert_eq!(cache.get("user+alice").await.unwrap(), Some(session("alice", 3)));
}

#[tokio::test]
async fn test_large_batches_span_chunks() {
    let config = StoreConfig::default();
    let table = Arc::new(MemoryTable::for_config(&config));
    let cache: TableCache<Session> = TableCache::new(table.clone(), config);

    let entries: Vec<(String, Session)> = (0..260)
        .map(|i| (format!("user+{:03}", i), session("bulk", i)))
        .collect();
    cache.mset(&entries, Some(60_000)).await.unwrap();
    assert_eq!(table.len().await, 260);

    let keys: Vec<String> = entries.iter().rev().map(|(k, _)| k.clone()).collect();
    let values = cache.mget(&keys).await.unwrap();

    assert_eq!(values.len(), 260);
    assert_eq!(values[0], Some(session("bulk", 259)));
    assert_eq!(values[259], Some(session("bulk", 0)));
}

#[tokio::test]
async fn test_unprocessed_after_budget() {
    let config = StoreConfig {
        retry: fast_retry(3),
        ..StoreConfig::default()
    };
    let table = Arc::new(MemoryTable::for_config(&config));
    let cache: TableCache<Session> = TableCache::new(table.clone(), config);

    let entries: Vec<(String, Session)> = (0..8)
        .map(|i| (format!("user+{}", i), session("x", i)))
        .collect();
    table.throttle_batches(usize::MAX);

    let result = cache.mset(&entries, None).await;

    match result {
        Err(CacheError::UnprocessedData { attempts, remaining }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(remaining, Unprocessed::Writes(_)));
            // 8 -> 4 -> 2 -> 1 left
            assert_eq!(remaining.count(), 1);
        }
        other => panic!("expected UnprocessedData, got {:?}", other),
    }
    assert_eq!(table.len().await, 7);
    assert_eq!(cache.stats().unprocessed_failures, 1);
}

#[tokio::test]
async fn test_partition_only_table() {
    let config = StoreConfig {
        schema: KeySchema::new("id", None),
        ..StoreConfig::default()
    };
    let table = Arc::new(MemoryTable::for_config(&config));
    let cache: TableCache<Session> = TableCache::new(table, config);

    // The sort component is dropped, so both keys address the same record
    cache.set("alice+ignored", &session("alice", 1), None).await.unwrap();
    assert_eq!(cache.get("alice").await.unwrap(), Some(session("alice", 1)));
    assert_eq!(cache.keys(None).await.unwrap(), vec!["alice"]);

    assert!(matches!(
        cache.keys(Some("alice+a*")).await,
        Err(CacheError::InvalidPattern(_))
    ));
}

#[tokio::test]
async fn test_missing_sort_component_is_rejected_by_table() {
    let config = StoreConfig::default();
    let table = Arc::new(MemoryTable::for_config(&config));
    let cache: TableCache<Session> = TableCache::new(table, config);

    let result = cache.set("alice", &session("alice", 1), None).await;

    assert!(matches!(result, Err(CacheError::Provider(_))));
}
