//! In-Memory Table
//!
//! A [`TableClient`] that keeps a single table in process memory.
//!
//! It reproduces the parts of the real table's behaviour the cache depends on:
//! per-call batch ceilings, duplicate-key rejection, ordered query results,
//! cursor pagination, and a TTL sweep that only runs when asked to. Expired
//! records stay readable until the sweep removes them.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    AttributeValue, BatchGetItemInput, BatchGetItemOutput, BatchWriteItemInput,
    BatchWriteItemOutput, DeleteItemInput, GetItemInput, GetItemOutput, Item, KeysAndAttributes,
    PageOutput, ProviderError, ProviderResult, PutItemInput, QueryInput, ScanInput, TableClient,
    UpdateItemInput, WriteRequest,
};
use crate::config::StoreConfig;

/// Largest number of keys the table accepts in one batch read.
pub const TABLE_BATCH_GET_LIMIT: usize = 100;

/// Largest number of writes the table accepts in one batch write.
pub const TABLE_BATCH_WRITE_LIMIT: usize = 25;

type StorageKey = (String, String);

// == Memory Table ==
#[derive(Debug)]
pub struct MemoryTable {
    table_name: String,
    partition_key: String,
    sort_key: Option<String>,
    /// Attribute the sweep reads expiry seconds from
    ttl_attribute: Option<String>,
    /// Maximum records per scan/query page
    page_limit: Option<usize>,
    items: RwLock<BTreeMap<StorageKey, Item>>,
    /// Number of upcoming batch calls that will leave work unprocessed
    throttled_batches: AtomicUsize,
}

impl MemoryTable {
    // == Constructor ==
    /// Creates an empty table with the given key attribute names.
    pub fn new(
        table_name: impl Into<String>,
        partition_key: impl Into<String>,
        sort_key: Option<&str>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            partition_key: partition_key.into(),
            sort_key: sort_key.map(str::to_string),
            ttl_attribute: None,
            page_limit: None,
            items: RwLock::new(BTreeMap::new()),
            throttled_batches: AtomicUsize::new(0),
        }
    }

    /// Creates a table matching a cache configuration, TTL sweep included.
    pub fn for_config(config: &StoreConfig) -> Self {
        Self::new(
            config.table_name.clone(),
            config.schema.partition_key.clone(),
            config.schema.sort_key.as_deref(),
        )
        .with_ttl_attribute(config.expiration_attribute.clone())
    }

    /// Enables the TTL sweep on the given attribute.
    pub fn with_ttl_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.ttl_attribute = Some(attribute.into());
        self
    }

    /// Caps the number of records returned per scan/query page.
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit.max(1));
        self
    }

    /// Makes the next `count` batch calls leave their trailing half unprocessed.
    pub fn throttle_batches(&self, count: usize) {
        self.throttled_batches.store(count, Ordering::SeqCst);
    }

    /// Returns the number of stored records, expired ones included.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Returns true if the table holds no records.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    // == TTL Sweep ==
    /// Removes every record whose expiry instant lies before `now_ms`.
    ///
    /// Records without a numeric expiry attribute are never swept.
    /// Returns the number of records removed.
    pub async fn sweep_expired(&self, now_ms: i64) -> usize {
        let Some(attribute) = &self.ttl_attribute else {
            return 0;
        };

        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|_, item| {
            match item.get(attribute).and_then(AttributeValue::as_i64) {
                Some(expires_at) => expires_at.saturating_mul(1000) >= now_ms,
                None => true,
            }
        });
        before - items.len()
    }

    // == Internals ==
    fn check_table(&self, table_name: &str) -> ProviderResult<()> {
        if table_name == self.table_name {
            Ok(())
        } else {
            Err(ProviderError::ResourceNotFound(format!(
                "Requested resource not found: table '{}'",
                table_name
            )))
        }
    }

    fn component(&self, record: &Item, attribute: &str) -> ProviderResult<String> {
        match record.get(attribute) {
            Some(AttributeValue::S(s)) => Ok(s.clone()),
            Some(AttributeValue::N(n)) => Ok(n.clone()),
            Some(_) => Err(ProviderError::Validation(format!(
                "Key attribute '{}' must be a string or number",
                attribute
            ))),
            None => Err(ProviderError::Validation(format!(
                "Missing key attribute '{}'",
                attribute
            ))),
        }
    }

    /// Extracts the storage key from a full record.
    fn storage_key(&self, record: &Item) -> ProviderResult<StorageKey> {
        let partition = self.component(record, &self.partition_key)?;
        let sort = match &self.sort_key {
            Some(sort_key) => self.component(record, sort_key)?,
            None => String::new(),
        };
        Ok((partition, sort))
    }

    /// Extracts the storage key from a key-only map, rejecting extra attributes.
    fn exact_key(&self, key: &Item) -> ProviderResult<StorageKey> {
        let expected = 1 + usize::from(self.sort_key.is_some());
        if key.len() != expected {
            return Err(ProviderError::Validation(
                "The provided key element does not match the schema".to_string(),
            ));
        }
        self.storage_key(key)
    }

    fn key_of(&self, record: &Item) -> Item {
        let mut key = Item::new();
        for name in std::iter::once(&self.partition_key).chain(self.sort_key.iter()) {
            if let Some(value) = record.get(name) {
                key.insert(name.clone(), value.clone());
            }
        }
        key
    }

    /// Consumes one throttle token, if any remain.
    fn take_throttle(&self) -> bool {
        self.throttled_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn paginate<'a>(
        &self,
        records: impl Iterator<Item = &'a Item>,
        projection: &[String],
    ) -> PageOutput {
        let limit = self.page_limit.unwrap_or(usize::MAX);
        let mut records = records.peekable();
        let mut page = PageOutput::default();

        while page.items.len() < limit {
            match records.next() {
                Some(record) => page.items.push(project(record, Some(projection))),
                None => break,
            }
        }

        if records.peek().is_some() {
            // The cursor is the full key of the last record handed out
            page.last_evaluated_key = page.items.last().map(|last| self.key_of(last));
        }
        page
    }

    fn start_bound(&self, cursor: &Option<Item>) -> ProviderResult<Bound<StorageKey>> {
        match cursor {
            Some(key) => Ok(Bound::Excluded(self.exact_key(key)?)),
            None => Ok(Bound::Unbounded),
        }
    }
}

/// Copies only the requested attributes of a record.
fn project(record: &Item, projection: Option<&[String]>) -> Item {
    match projection {
        Some(names) if !names.is_empty() => names
            .iter()
            .filter_map(|name| record.get(name).map(|v| (name.clone(), v.clone())))
            .collect(),
        _ => record.clone(),
    }
}

#[async_trait]
impl TableClient for MemoryTable {
    async fn get_item(&self, input: GetItemInput) -> ProviderResult<GetItemOutput> {
        self.check_table(&input.table_name)?;
        let key = self.exact_key(&input.key)?;
        let items = self.items.read().await;

        Ok(GetItemOutput {
            item: items
                .get(&key)
                .map(|record| project(record, input.projection.as_deref())),
        })
    }

    async fn put_item(&self, input: PutItemInput) -> ProviderResult<()> {
        self.check_table(&input.table_name)?;
        let key = self.storage_key(&input.item)?;
        self.items.write().await.insert(key, input.item);
        Ok(())
    }

    async fn delete_item(&self, input: DeleteItemInput) -> ProviderResult<()> {
        self.check_table(&input.table_name)?;
        let key = self.exact_key(&input.key)?;
        self.items.write().await.remove(&key);
        Ok(())
    }

    async fn update_item(&self, input: UpdateItemInput) -> ProviderResult<()> {
        self.check_table(&input.table_name)?;
        let key = self.exact_key(&input.key)?;
        if input.set.keys().any(|name| input.key.contains_key(name)) {
            return Err(ProviderError::Validation(
                "Cannot update attribute that is part of the key".to_string(),
            ));
        }

        // A SET update on a missing record creates it from the key
        let mut items = self.items.write().await;
        let record = items.entry(key).or_insert_with(|| input.key.clone());
        record.extend(input.set);
        Ok(())
    }

    async fn batch_get_item(&self, input: BatchGetItemInput) -> ProviderResult<BatchGetItemOutput> {
        let total: usize = input.request_items.values().map(|r| r.keys.len()).sum();
        if total > TABLE_BATCH_GET_LIMIT {
            return Err(ProviderError::Validation(format!(
                "Too many items requested for the batch read: {} > {}",
                total, TABLE_BATCH_GET_LIMIT
            )));
        }

        let throttled = self.take_throttle();
        let items = self.items.read().await;
        let mut output = BatchGetItemOutput::default();

        for (table_name, request) in input.request_items {
            self.check_table(&table_name)?;

            let mut seen = HashSet::new();
            for key in &request.keys {
                if !seen.insert(self.exact_key(key)?) {
                    return Err(ProviderError::Validation(
                        "Provided list of item keys contains duplicates".to_string(),
                    ));
                }
            }

            let processed = if throttled {
                request.keys.len() / 2
            } else {
                request.keys.len()
            };
            let (done, rest) = request.keys.split_at(processed);

            let found: Vec<Item> = done
                .iter()
                .filter_map(|key| {
                    let storage_key = self.storage_key(key).ok()?;
                    items.get(&storage_key)
                })
                .map(|record| project(record, request.projection.as_deref()))
                .collect();
            output.responses.insert(table_name.clone(), found);

            if !rest.is_empty() {
                output.unprocessed_keys.insert(
                    table_name,
                    KeysAndAttributes {
                        keys: rest.to_vec(),
                        projection: request.projection.clone(),
                    },
                );
            }
        }

        debug!(keys = total, throttled, "Memory table batch read");
        Ok(output)
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> ProviderResult<BatchWriteItemOutput> {
        let total: usize = input.request_items.values().map(Vec::len).sum();
        if total > TABLE_BATCH_WRITE_LIMIT {
            return Err(ProviderError::Validation(format!(
                "Too many items requested for the batch write: {} > {}",
                total, TABLE_BATCH_WRITE_LIMIT
            )));
        }

        let throttled = self.take_throttle();
        let mut items = self.items.write().await;
        let mut output = BatchWriteItemOutput::default();

        for (table_name, requests) in input.request_items {
            self.check_table(&table_name)?;

            let mut keyed = Vec::with_capacity(requests.len());
            let mut seen = HashSet::new();
            for request in &requests {
                let key = match request {
                    WriteRequest::Put { item } => self.storage_key(item)?,
                    WriteRequest::Delete { key } => self.exact_key(key)?,
                };
                if !seen.insert(key.clone()) {
                    return Err(ProviderError::Validation(
                        "Provided list of item keys contains duplicates".to_string(),
                    ));
                }
                keyed.push(key);
            }

            let processed = if throttled {
                requests.len() / 2
            } else {
                requests.len()
            };

            let mut rest = Vec::new();
            for (index, (request, key)) in requests.into_iter().zip(keyed).enumerate() {
                if index >= processed {
                    rest.push(request);
                    continue;
                }
                match request {
                    WriteRequest::Put { item } => {
                        items.insert(key, item);
                    }
                    WriteRequest::Delete { .. } => {
                        items.remove(&key);
                    }
                }
            }

            if !rest.is_empty() {
                output.unprocessed_items.insert(table_name, rest);
            }
        }

        debug!(writes = total, throttled, "Memory table batch write");
        Ok(output)
    }

    async fn scan(&self, input: ScanInput) -> ProviderResult<PageOutput> {
        self.check_table(&input.table_name)?;
        let start = self.start_bound(&input.exclusive_start_key)?;
        let items = self.items.read().await;

        let records = items.range((start, Bound::Unbounded)).map(|(_, record)| record);
        Ok(self.paginate(records, &input.projection))
    }

    async fn query(&self, input: QueryInput) -> ProviderResult<PageOutput> {
        self.check_table(&input.table_name)?;
        let condition = &input.key_condition;
        if condition.partition_key != self.partition_key {
            return Err(ProviderError::Validation(format!(
                "Query condition missed key schema element: {}",
                self.partition_key
            )));
        }
        let partition = match &condition.partition_value {
            AttributeValue::S(s) | AttributeValue::N(s) => s.clone(),
            _ => {
                return Err(ProviderError::Validation(
                    "Partition value must be a string or number".to_string(),
                ))
            }
        };
        let prefix = match (&condition.sort_prefix, &self.sort_key) {
            (Some(sort_prefix), Some(sort_key)) if &sort_prefix.attribute == sort_key => {
                sort_prefix.prefix.clone()
            }
            (Some(sort_prefix), _) => {
                return Err(ProviderError::Validation(format!(
                    "Query key condition not supported on attribute '{}'",
                    sort_prefix.attribute
                )))
            }
            (None, _) => String::new(),
        };

        let start = match self.start_bound(&input.exclusive_start_key)? {
            Bound::Unbounded => Bound::Included((partition.clone(), String::new())),
            bound => bound,
        };
        let items = self.items.read().await;

        let records = items
            .range((start, Bound::Unbounded))
            .take_while(|((p, _), _)| *p == partition)
            .filter(|((_, s), _)| s.starts_with(&prefix))
            .map(|(_, record)| record);
        Ok(self.paginate(records, &input.projection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{KeyCondition, SortPrefix};

    fn s(value: &str) -> AttributeValue {
        AttributeValue::S(value.to_string())
    }

    fn record(pk: &str, sk: &str, expires_at: i64) -> Item {
        Item::from([
            ("pk".to_string(), s(pk)),
            ("sk".to_string(), s(sk)),
            ("expiresAt".to_string(), AttributeValue::number(expires_at)),
        ])
    }

    fn key(pk: &str, sk: &str) -> Item {
        Item::from([("pk".to_string(), s(pk)), ("sk".to_string(), s(sk))])
    }

    fn table() -> MemoryTable {
        MemoryTable::new("cache", "pk", Some("sk")).with_ttl_attribute("expiresAt")
    }

    async fn seed(table: &MemoryTable, records: Vec<Item>) {
        for item in records {
            table
                .put_item(PutItemInput {
                    table_name: "cache".to_string(),
                    item,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_put_and_get_with_projection() {
        let table = table();
        seed(&table, vec![record("a", "1", 100)]).await;

        let output = table
            .get_item(GetItemInput {
                table_name: "cache".to_string(),
                key: key("a", "1"),
                projection: Some(vec!["expiresAt".to_string()]),
            })
            .await
            .unwrap();

        let item = output.item.unwrap();
        assert_eq!(item.len(), 1);
        assert_eq!(item["expiresAt"].as_i64(), Some(100));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let table = table();
        let result = table
            .delete_item(DeleteItemInput {
                table_name: "other".to_string(),
                key: key("a", "1"),
            })
            .await;
        assert!(matches!(result, Err(ProviderError::ResourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_key_must_match_schema() {
        let table = table();
        let result = table
            .get_item(GetItemInput {
                table_name: "cache".to_string(),
                key: Item::from([("pk".to_string(), s("a"))]),
                projection: None,
            })
            .await;
        assert!(matches!(result, Err(ProviderError::Validation(_))));
    }

    #[tokio::test]
    async fn test_batch_get_rejects_oversized_request() {
        let table = table();
        let keys = (0..101).map(|i| key("a", &i.to_string())).collect();
        let input = BatchGetItemInput {
            request_items: [("cache".to_string(), KeysAndAttributes { keys, projection: None })]
                .into(),
        };
        assert!(matches!(
            table.batch_get_item(input).await,
            Err(ProviderError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_write_rejects_duplicates() {
        let table = table();
        let requests = vec![
            WriteRequest::Put { item: record("a", "1", 1) },
            WriteRequest::Delete { key: key("a", "1") },
        ];
        let input = BatchWriteItemInput {
            request_items: [("cache".to_string(), requests)].into(),
        };
        assert!(matches!(
            table.batch_write_item(input).await,
            Err(ProviderError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_throttled_batch_write_leaves_remainder() {
        let table = table();
        table.throttle_batches(1);
        let requests: Vec<WriteRequest> = (0..4)
            .map(|i| WriteRequest::Put { item: record("a", &i.to_string(), 1) })
            .collect();

        let output = table
            .batch_write_item(BatchWriteItemInput {
                request_items: [("cache".to_string(), requests)].into(),
            })
            .await
            .unwrap();

        assert_eq!(output.unprocessed_items["cache"].len(), 2);
        assert_eq!(table.len().await, 2);

        // The throttle token is spent
        let output = table
            .batch_write_item(BatchWriteItemInput {
                request_items: output.unprocessed_items,
            })
            .await
            .unwrap();
        assert!(output.unprocessed_items.is_empty());
        assert_eq!(table.len().await, 4);
    }

    #[tokio::test]
    async fn test_scan_paginates_with_cursor() {
        let table = table().with_page_limit(2);
        seed(
            &table,
            vec![record("a", "1", 1), record("a", "2", 1), record("b", "1", 1)],
        )
        .await;

        let projection = vec!["pk".to_string(), "sk".to_string()];
        let first = table
            .scan(ScanInput {
                table_name: "cache".to_string(),
                projection: projection.clone(),
                exclusive_start_key: None,
            })
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.last_evaluated_key, Some(key("a", "2")));

        let second = table
            .scan(ScanInput {
                table_name: "cache".to_string(),
                projection,
                exclusive_start_key: first.last_evaluated_key,
            })
            .await
            .unwrap();
        assert_eq!(second.items, vec![key("b", "1")]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_query_by_sort_prefix() {
        let table = table();
        seed(
            &table,
            vec![
                record("123", "bar", 1),
                record("123", "baz", 1),
                record("123", "foo", 1),
                record("124", "bar", 1),
            ],
        )
        .await;

        let page = table
            .query(QueryInput {
                table_name: "cache".to_string(),
                key_condition: KeyCondition {
                    partition_key: "pk".to_string(),
                    partition_value: s("123"),
                    sort_prefix: Some(SortPrefix {
                        attribute: "sk".to_string(),
                        prefix: "b".to_string(),
                    }),
                },
                projection: vec!["pk".to_string(), "sk".to_string()],
                exclusive_start_key: None,
            })
            .await
            .unwrap();

        assert_eq!(page.items, vec![key("123", "bar"), key("123", "baz")]);
    }

    #[tokio::test]
    async fn test_update_sets_only_given_attributes() {
        let table = table();
        let mut original = record("a", "1", 100);
        original.insert("value".to_string(), s("payload"));
        seed(&table, vec![original]).await;

        table
            .update_item(UpdateItemInput {
                table_name: "cache".to_string(),
                key: key("a", "1"),
                set: Item::from([("expiresAt".to_string(), AttributeValue::number(200))]),
            })
            .await
            .unwrap();

        let item = table
            .get_item(GetItemInput {
                table_name: "cache".to_string(),
                key: key("a", "1"),
                projection: None,
            })
            .await
            .unwrap()
            .item
            .unwrap();
        assert_eq!(item["expiresAt"].as_i64(), Some(200));
        assert_eq!(item["value"], s("payload"));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let table = table();
        seed(&table, vec![record("a", "old", 10), record("a", "new", 1_000)]).await;

        // now = 500s
        let removed = table.sweep_expired(500_000).await;
        assert_eq!(removed, 1);
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_disabled_without_ttl_attribute() {
        let table = MemoryTable::new("cache", "pk", Some("sk"));
        seed(&table, vec![record("a", "old", 10)]).await;
        assert_eq!(table.sweep_expired(i64::MAX).await, 0);
    }
}
