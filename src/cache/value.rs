//! Value Codec Module
//!
//! The boundary between application values and the table's attribute model.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, Result};
use crate::provider::{AttributeValue, Item};

/// Default attribute holding the serialized payload.
pub const DEFAULT_VALUE_ATTRIBUTE: &str = "value";

// == Value Codec ==
/// Converts cache values to and from a flat attribute map.
///
/// `decode` receives the whole stored record, key and expiry attributes
/// included, and should read only the fields `encode` produced.
pub trait ValueCodec<V>: Send + Sync {
    fn encode(&self, value: &V) -> Result<Item>;
    fn decode(&self, record: &Item) -> Result<V>;

    /// Whether the record carries a value at all. A record holding only key
    /// and expiry attributes, as left by `touch` on a missing key, does not.
    fn has_payload(&self, record: &Item) -> bool;
}

// == JSON Codec ==
/// Stores a value as JSON text in a single string attribute.
#[derive(Debug, Clone)]
pub struct JsonCodec<V> {
    attribute: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonCodec<V> {
    pub fn new() -> Self {
        Self::with_attribute(DEFAULT_VALUE_ATTRIBUTE)
    }

    pub fn with_attribute(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            _value: PhantomData,
        }
    }
}

impl<V> Default for JsonCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ValueCodec<V> for JsonCodec<V>
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Item> {
        let text = serde_json::to_string(value).map_err(|e| CacheError::Codec(e.to_string()))?;
        Ok(Item::from([(self.attribute.clone(), AttributeValue::S(text))]))
    }

    fn decode(&self, record: &Item) -> Result<V> {
        let text = record
            .get(&self.attribute)
            .and_then(AttributeValue::as_s)
            .ok_or_else(|| {
                CacheError::Codec(format!("record has no string attribute '{}'", self.attribute))
            })?;
        serde_json::from_str(text).map_err(|e| CacheError::Codec(e.to_string()))
    }

    fn has_payload(&self, record: &Item) -> bool {
        record.contains_key(&self.attribute)
    }
}
