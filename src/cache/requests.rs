//! Request Builder Module
//!
//! Pure functions shaping table requests from cache operations. Nothing here
//! performs I/O.

use std::collections::HashMap;

use crate::cache::codec::{decode_key, strip_mask};
use crate::cache::expiration::expiration_attribute;
use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use crate::provider::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, Item, KeyCondition,
    KeysAndAttributes, PutItemInput, QueryInput, ScanInput, SortPrefix, UpdateItemInput,
    WriteRequest,
};

/// Keys a batch read left unprocessed, exactly as the table returned them.
pub type ReadRemainder = HashMap<String, KeysAndAttributes>;

/// Writes a batch write left unprocessed, exactly as the table returned them.
pub type WriteRemainder = HashMap<String, Vec<WriteRequest>>;

// == Batch Input ==
/// Input to a batch request: either fresh cache-level items or the table's
/// own remainder from a previous attempt.
///
/// A remainder is forwarded untouched; it is already in table form and is
/// never mapped back to cache keys.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchInput<T, R> {
    Fresh(Vec<T>),
    Remainder(R),
}

/// One logical write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Store `payload` (value plus metadata attributes) under `key`
    Put {
        key: String,
        payload: Item,
        ttl_ms: u64,
    },
    Delete {
        key: String,
    },
}

// == Single Item ==
pub fn get_item(config: &StoreConfig, key: &str) -> Result<GetItemInput> {
    Ok(GetItemInput {
        table_name: config.table_name.clone(),
        key: decode_key(key, &config.schema)?,
        projection: None,
    })
}

/// Reads only the expiry attribute of a record.
pub fn ttl_item(config: &StoreConfig, key: &str) -> Result<GetItemInput> {
    Ok(GetItemInput {
        table_name: config.table_name.clone(),
        key: decode_key(key, &config.schema)?,
        projection: Some(vec![config.expiration_attribute.clone()]),
    })
}

pub fn put_item(
    config: &StoreConfig,
    key: &str,
    payload: Item,
    ttl_ms: u64,
    now_ms: i64,
) -> Result<PutItemInput> {
    Ok(PutItemInput {
        table_name: config.table_name.clone(),
        item: record(config, key, payload, ttl_ms, now_ms)?,
    })
}

pub fn delete_item(config: &StoreConfig, key: &str) -> Result<DeleteItemInput> {
    Ok(DeleteItemInput {
        table_name: config.table_name.clone(),
        key: decode_key(key, &config.schema)?,
    })
}

/// Moves the expiry instant of a record without touching anything else.
pub fn touch_item(
    config: &StoreConfig,
    key: &str,
    ttl_ms: u64,
    now_ms: i64,
) -> Result<UpdateItemInput> {
    Ok(UpdateItemInput {
        table_name: config.table_name.clone(),
        key: decode_key(key, &config.schema)?,
        set: Item::from([(
            config.expiration_attribute.clone(),
            expiration_attribute(ttl_ms, now_ms),
        )]),
    })
}

/// Full stored record: payload first, then key and expiry attributes, which
/// win on name clashes.
fn record(config: &StoreConfig, key: &str, payload: Item, ttl_ms: u64, now_ms: i64) -> Result<Item> {
    let mut item = payload;
    item.extend(decode_key(key, &config.schema)?);
    item.insert(
        config.expiration_attribute.clone(),
        expiration_attribute(ttl_ms, now_ms),
    );
    Ok(item)
}

// == Batches ==
pub fn batch_get(
    config: &StoreConfig,
    input: BatchInput<String, ReadRemainder>,
) -> Result<BatchGetItemInput> {
    let request_items = match input {
        BatchInput::Fresh(keys) => {
            let keys = keys
                .iter()
                .map(|key| decode_key(key, &config.schema))
                .collect::<Result<Vec<_>>>()?;
            HashMap::from([(
                config.table_name.clone(),
                KeysAndAttributes {
                    keys,
                    projection: None,
                },
            )])
        }
        BatchInput::Remainder(remainder) => remainder,
    };
    Ok(BatchGetItemInput { request_items })
}

pub fn batch_write(
    config: &StoreConfig,
    input: BatchInput<WriteOp, WriteRemainder>,
    now_ms: i64,
) -> Result<BatchWriteItemInput> {
    let request_items = match input {
        BatchInput::Fresh(ops) => {
            let requests = ops
                .into_iter()
                .map(|op| match op {
                    WriteOp::Put {
                        key,
                        payload,
                        ttl_ms,
                    } => Ok(WriteRequest::Put {
                        item: record(config, &key, payload, ttl_ms, now_ms)?,
                    }),
                    WriteOp::Delete { key } => Ok(WriteRequest::Delete {
                        key: decode_key(&key, &config.schema)?,
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            HashMap::from([(config.table_name.clone(), requests)])
        }
        BatchInput::Remainder(remainder) => remainder,
    };
    Ok(BatchWriteItemInput { request_items })
}

// == Listing ==
/// Scan page request projecting only the key attributes.
pub fn scan(config: &StoreConfig, cursor: Option<Item>) -> ScanInput {
    ScanInput {
        table_name: config.table_name.clone(),
        projection: config.schema.key_attributes(),
        exclusive_start_key: cursor,
    }
}

/// Query page request for a validated `<partition>+<prefix>*` pattern.
pub fn query(config: &StoreConfig, pattern: &str, cursor: Option<Item>) -> Result<QueryInput> {
    let mut bounds = decode_key(strip_mask(pattern), &config.schema)?;
    let schema = &config.schema;

    let partition_value = bounds.remove(&schema.partition_key).ok_or_else(|| {
        CacheError::InvalidPattern(format!("'{}' has no partition component", pattern))
    })?;
    let sort_key = schema.sort_key.as_ref().ok_or_else(|| {
        CacheError::InvalidPattern(format!("'{}': prefix patterns need a table with a sort key", pattern))
    })?;
    let prefix = bounds
        .remove(sort_key)
        .and_then(|value| value.as_s().map(str::to_string))
        .ok_or_else(|| CacheError::InvalidPattern(format!("'{}' has no sort component", pattern)))?;

    Ok(QueryInput {
        table_name: config.table_name.clone(),
        key_condition: KeyCondition {
            partition_key: schema.partition_key.clone(),
            partition_value,
            sort_prefix: Some(SortPrefix {
                attribute: sort_key.clone(),
                prefix,
            }),
        },
        projection: schema.key_attributes(),
        exclusive_start_key: cursor,
    })
}
