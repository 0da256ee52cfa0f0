//! Key Codec Module
//!
//! Converts between the opaque cache key (`"<partition>+<sort>"`) and the
//! table's partition/sort key attributes, and validates key patterns used for
//! prefix enumeration.

use crate::config::KeySchema;
use crate::error::{CacheError, Result};
use crate::provider::{AttributeValue, Item};

/// Separates the partition and sort components of a cache key.
pub const KEY_DELIMITER: char = '+';

/// Terminates a key pattern; everything before it is a sort-key prefix.
pub const KEY_MASK: char = '*';

// == Encode ==
/// Builds the cache key of a stored record.
///
/// Fails with `MalformedKey` if the record lacks the partition attribute, or
/// the sort attribute when the schema defines one.
pub fn encode_key(record: &Item, schema: &KeySchema) -> Result<String> {
    let partition = string_attribute(record, &schema.partition_key)?;

    match &schema.sort_key {
        Some(sort_key) => {
            let sort = string_attribute(record, sort_key)?;
            Ok(format!("{}{}{}", partition, KEY_DELIMITER, sort))
        }
        None => Ok(partition.to_string()),
    }
}

fn string_attribute<'a>(record: &'a Item, name: &str) -> Result<&'a str> {
    record
        .get(name)
        .and_then(AttributeValue::as_s)
        .ok_or_else(|| CacheError::MalformedKey(format!("record has no string attribute '{}'", name)))
}

// == Decode ==
/// Splits a cache key into the table's key attributes.
///
/// The split happens on the first delimiter. When the schema has no sort
/// attribute, anything after the delimiter is dropped. When the schema has one
/// and the key carries no delimiter, the sort attribute is left out and the
/// table will reject the key.
pub fn decode_key(key: &str, schema: &KeySchema) -> Result<Item> {
    if key.is_empty() {
        return Err(CacheError::MalformedKey("key is empty".to_string()));
    }
    if key.starts_with(KEY_DELIMITER) {
        return Err(CacheError::MalformedKey(format!(
            "key '{}' starts with '{}'",
            key, KEY_DELIMITER
        )));
    }

    let (partition, sort) = match key.split_once(KEY_DELIMITER) {
        Some((partition, sort)) => (partition, Some(sort)),
        None => (key, None),
    };

    let mut store_key = Item::new();
    store_key.insert(
        schema.partition_key.clone(),
        AttributeValue::S(partition.to_string()),
    );
    if let (Some(sort_key), Some(sort)) = (&schema.sort_key, sort) {
        store_key.insert(sort_key.clone(), AttributeValue::S(sort.to_string()));
    }
    Ok(store_key)
}

/// Normalizes a cache key to the form its table key encodes back to.
///
/// Two keys with the same canonical form address the same record. A key the
/// schema cannot fully encode is returned unchanged.
pub fn canonical_key(key: &str, schema: &KeySchema) -> Result<String> {
    let store_key = decode_key(key, schema)?;
    Ok(encode_key(&store_key, schema).unwrap_or_else(|_| key.to_string()))
}

// == Patterns ==
/// Checks a key pattern before it is turned into a prefix query.
///
/// A missing pattern is always valid and means "every key". Otherwise the
/// pattern must end in exactly one mask, contain exactly one delimiter, hold
/// at most two masks overall, and the schema must define a sort attribute.
pub fn validate_pattern(pattern: Option<&str>, schema: &KeySchema) -> Result<()> {
    let Some(pattern) = pattern else {
        return Ok(());
    };

    let invalid = |reason: &str| -> Result<()> {
        Err(CacheError::InvalidPattern(format!("'{}': {}", pattern, reason)))
    };

    if schema.sort_key.is_none() {
        return invalid("prefix patterns need a table with a sort key");
    }
    if !pattern.ends_with(KEY_MASK) || pattern.ends_with(&format!("{0}{0}", KEY_MASK)) {
        return invalid("must end with exactly one mask character");
    }
    if pattern.matches(KEY_DELIMITER).count() != 1 {
        return invalid("must contain exactly one delimiter");
    }
    if pattern.matches(KEY_MASK).count() > 2 {
        return invalid("too many mask characters");
    }
    if pattern.starts_with(KEY_DELIMITER) {
        return invalid("partition component is empty");
    }
    Ok(())
}

/// Removes the trailing mask, leaving `"<partition>+<prefix>"`.
pub fn strip_mask(pattern: &str) -> &str {
    pattern.strip_suffix(KEY_MASK).unwrap_or(pattern)
}
