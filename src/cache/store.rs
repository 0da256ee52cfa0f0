//! Cache Store Module
//!
//! Main cache engine mapping cache operations onto the backing table.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::batch::{align_records, BatchEngine};
use crate::cache::codec::canonical_key;
use crate::cache::enumerator::list_keys;
use crate::cache::expiration::{current_timestamp_ms, expires_at, is_record_expired, remaining_ttl_ms, NO_TTL};
use crate::cache::requests::{self, WriteOp};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::value::{JsonCodec, ValueCodec};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::provider::{Item, TableClient};

/// Derives extra attributes stored next to a value.
pub type MetadataFn<V> = Arc<dyn Fn(&V) -> Item + Send + Sync>;

// == Table Cache ==
/// Cache store backed by a partitioned key-value table.
///
/// Values expire lazily: reads treat a record past its expiry instant as
/// absent, and the table's own TTL sweep deletes it later. Multi-key calls are
/// not atomic across the whole key list.
pub struct TableCache<V> {
    /// Handle to the backing table
    client: Arc<dyn TableClient>,
    /// Table layout, default TTL, and batch retry policy
    config: StoreConfig,
    /// Value <-> attribute conversion
    codec: Arc<dyn ValueCodec<V>>,
    /// Optional extra attributes derived from each value
    metadata: Option<MetadataFn<V>>,
    /// Performance statistics
    stats: StatsRecorder,
}

impl<V> TableCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache storing values as JSON text.
    pub fn new(client: Arc<dyn TableClient>, config: StoreConfig) -> Self {
        Self::with_codec(client, config, JsonCodec::new())
    }
}

impl<V> TableCache<V>
where
    V: Send + Sync + 'static,
{
    /// Creates a cache with a custom value codec.
    pub fn with_codec(
        client: Arc<dyn TableClient>,
        config: StoreConfig,
        codec: impl ValueCodec<V> + 'static,
    ) -> Self {
        Self {
            client,
            config,
            codec: Arc::new(codec),
            metadata: None,
            stats: StatsRecorder::new(),
        }
    }

    /// Stores the attributes `derive` returns next to every value written.
    pub fn with_metadata(mut self, derive: impl Fn(&V) -> Item + Send + Sync + 'static) -> Self {
        self.metadata = Some(Arc::new(derive));
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    fn engine(&self) -> BatchEngine<'_> {
        BatchEngine::new(self.client.as_ref(), &self.config, &self.stats)
    }

    /// Value attributes plus derived metadata; the value wins on clashes.
    fn payload(&self, value: &V) -> Result<Item> {
        let mut payload = match &self.metadata {
            Some(derive) => derive(value),
            None => Item::new(),
        };
        payload.extend(self.codec.encode(value)?);
        Ok(payload)
    }

    /// Records without a payload count as absent.
    fn decode_slot(&self, record: Option<Item>) -> Result<Option<V>> {
        record
            .filter(|record| self.codec.has_payload(record))
            .map(|record| self.codec.decode(&record))
            .transpose()
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `None` if the key is absent or expired.
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        let input = requests::get_item(&self.config, key)?;
        let output = self.client.get_item(input).await?;

        let now = current_timestamp_ms();
        let record = output
            .item
            .filter(|record| !is_record_expired(record, &self.config.expiration_attribute, now));
        let value = self.decode_slot(record)?;

        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        debug!(key, hit = value.is_some(), "Cache get");
        Ok(value)
    }

    // == Set ==
    /// Stores a value with optional TTL in milliseconds (uses the default if None).
    pub async fn set(&self, key: &str, value: &V, ttl_ms: Option<u64>) -> Result<()> {
        let ttl_ms = ttl_ms.unwrap_or(self.config.default_ttl_ms);
        let payload = self.payload(value)?;
        let input = requests::put_item(&self.config, key, payload, ttl_ms, current_timestamp_ms())?;

        self.client.put_item(input).await?;
        debug!(key, ttl_ms, "Cache set");
        Ok(())
    }

    // == Delete ==
    /// Removes an entry by key. Deleting an absent key succeeds.
    pub async fn del(&self, key: &str) -> Result<()> {
        let input = requests::delete_item(&self.config, key)?;
        self.client.delete_item(input).await?;
        debug!(key, "Cache delete");
        Ok(())
    }

    // == Multi Get ==
    /// Retrieves several values; the result has one slot per requested key,
    /// in request order.
    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<V>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let unique = self.unique_keys(keys.iter())?;
        let records = self.engine().get(&unique).await?;
        let aligned = align_records(keys, records, &self.config, current_timestamp_ms())?;

        let values = aligned
            .into_iter()
            .map(|slot| self.decode_slot(slot))
            .collect::<Result<Vec<_>>>()?;
        self.stats.record_lookups(&values);
        debug!(keys = keys.len(), "Cache mget");
        Ok(values)
    }

    // == Multi Set ==
    /// Stores several values with one TTL. A key listed twice keeps its last value.
    pub async fn mset(&self, entries: &[(String, V)], ttl_ms: Option<u64>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let ttl_ms = ttl_ms.unwrap_or(self.config.default_ttl_ms);

        let mut seen = HashSet::new();
        let mut ops = Vec::with_capacity(entries.len());
        for (key, value) in entries.iter().rev() {
            if seen.insert(canonical_key(key, &self.config.schema)?) {
                ops.push(WriteOp::Put {
                    key: key.clone(),
                    payload: self.payload(value)?,
                    ttl_ms,
                });
            }
        }
        ops.reverse();

        self.engine().write(ops, current_timestamp_ms()).await?;
        debug!(entries = entries.len(), ttl_ms, "Cache mset");
        Ok(())
    }

    // == Multi Delete ==
    pub async fn mdel(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let ops = self
            .unique_keys(keys.iter())?
            .into_iter()
            .map(|key| WriteOp::Delete { key })
            .collect();
        self.engine().write(ops, current_timestamp_ms()).await?;
        debug!(keys = keys.len(), "Cache mdel");
        Ok(())
    }

    /// First occurrence of every distinct record address.
    fn unique_keys<'k>(&self, keys: impl Iterator<Item = &'k String>) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for key in keys {
            if seen.insert(canonical_key(key, &self.config.schema)?) {
                unique.push(key.clone());
            }
        }
        Ok(unique)
    }

    // == Keys ==
    /// Lists keys, optionally restricted to a `"<partition>+<prefix>*"` pattern.
    ///
    /// Expired records that have not been swept yet are included.
    pub async fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        list_keys(self.client.as_ref(), &self.config, pattern).await
    }

    // == Time To Live ==
    /// Returns remaining lifetime in milliseconds, or -1 if the key is absent
    /// or expired.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let input = requests::ttl_item(&self.config, key)?;
        let output = self.client.get_item(input).await?;

        let remaining = match output.item {
            Some(record) => remaining_ttl_ms(
                expires_at(&record, &self.config.expiration_attribute),
                current_timestamp_ms(),
            ),
            None => NO_TTL,
        };
        Ok(remaining)
    }

    // == Touch ==
    /// Resets the expiry of a key without rewriting its value.
    pub async fn touch(&self, key: &str, ttl_ms: Option<u64>) -> Result<()> {
        let ttl_ms = ttl_ms.unwrap_or(self.config.default_ttl_ms);
        let input = requests::touch_item(&self.config, key, ttl_ms, current_timestamp_ms())?;

        self.client.update_item(input).await?;
        debug!(key, ttl_ms, "Cache touch");
        Ok(())
    }

    // == Reset ==
    /// Deletes every key in the table.
    pub async fn reset(&self) -> Result<()> {
        let keys = self.keys(None).await?;
        let count = keys.len();
        self.mdel(&keys).await?;
        info!(count, "Cache reset");
        Ok(())
    }
}
