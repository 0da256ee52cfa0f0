//! Provider Module
//!
//! Attribute model, request/response shapes and the client trait of the
//! partitioned key-value table the cache is stored in.
//!
//! The cache never builds a client itself: it receives something that
//! implements [`TableClient`] and talks to it exclusively through the shapes
//! defined here. [`MemoryTable`] is a complete in-process implementation.

mod memory;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryTable;

// == Attribute Model ==
/// A single typed attribute value as the table stores it.
///
/// Numbers travel as decimal text, the same way the table transmits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number, decimal text
    N(String),
    /// Boolean
    Bool(bool),
    /// Explicit null
    Null,
    /// Binary
    B(Vec<u8>),
}

impl AttributeValue {
    /// Builds a numeric attribute from anything displayable as a number.
    pub fn number(n: impl fmt::Display) -> Self {
        AttributeValue::N(n.to_string())
    }

    /// Returns the string payload if this is an `S` attribute.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Parses an `N` attribute as a signed integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::N(n) => n.parse().ok(),
            _ => None,
        }
    }
}

/// A record (or a key) as a flat map of attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

// == Single-Item Calls ==
#[derive(Debug, Clone, PartialEq)]
pub struct GetItemInput {
    pub table_name: String,
    pub key: Item,
    /// Attributes to return; `None` returns the whole record
    pub projection: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemOutput {
    pub item: Option<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutItemInput {
    pub table_name: String,
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemInput {
    pub table_name: String,
    pub key: Item,
}

/// In-place update that only SETs the given attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemInput {
    pub table_name: String,
    pub key: Item,
    pub set: Item,
}

// == Batch Calls ==
/// Keys to read from one table inside a batch read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeysAndAttributes {
    pub keys: Vec<Item>,
    pub projection: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetItemInput {
    /// Table name -> keys to read
    pub request_items: HashMap<String, KeysAndAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetItemOutput {
    /// Table name -> records found
    pub responses: HashMap<String, Vec<Item>>,
    /// Table name -> keys the table declined to read this time
    pub unprocessed_keys: HashMap<String, KeysAndAttributes>,
}

/// One write inside a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put { item: Item },
    Delete { key: Item },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteItemInput {
    pub request_items: HashMap<String, Vec<WriteRequest>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteItemOutput {
    /// Table name -> writes the table declined to apply this time
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,
}

// == Listing Calls ==
/// `begins_with(<attribute>, <prefix>)` on the sort attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct SortPrefix {
    pub attribute: String,
    pub prefix: String,
}

/// Key condition of a query: partition equality plus an optional sort prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub partition_key: String,
    pub partition_value: AttributeValue,
    pub sort_prefix: Option<SortPrefix>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanInput {
    pub table_name: String,
    pub projection: Vec<String>,
    /// Cursor returned by the previous page
    pub exclusive_start_key: Option<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryInput {
    pub table_name: String,
    pub key_condition: KeyCondition,
    pub projection: Vec<String>,
    pub exclusive_start_key: Option<Item>,
}

/// One page of a scan or query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageOutput {
    pub items: Vec<Item>,
    /// Continuation cursor; `None` on the last page
    pub last_evaluated_key: Option<Item>,
}

// == Provider Error ==
/// Transport or service failure reported by the table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The request was rejected as malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// The table does not exist
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The table refused the whole call for capacity reasons
    #[error("Throughput exceeded: {0}")]
    ThroughputExceeded(String),

    /// The call never reached the table or the connection dropped
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other service-side failure
    #[error("Service error: {0}")]
    Service(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

// == Table Client ==
/// Port to the underlying table, one method per call the cache issues.
#[async_trait]
pub trait TableClient: Send + Sync + 'static {
    async fn get_item(&self, input: GetItemInput) -> ProviderResult<GetItemOutput>;
    async fn put_item(&self, input: PutItemInput) -> ProviderResult<()>;
    async fn delete_item(&self, input: DeleteItemInput) -> ProviderResult<()>;
    async fn update_item(&self, input: UpdateItemInput) -> ProviderResult<()>;
    async fn batch_get_item(&self, input: BatchGetItemInput) -> ProviderResult<BatchGetItemOutput>;
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> ProviderResult<BatchWriteItemOutput>;
    async fn scan(&self, input: ScanInput) -> ProviderResult<PageOutput>;
    async fn query(&self, input: QueryInput) -> ProviderResult<PageOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_attribute() {
        let value = AttributeValue::number(1_700_000_000i64);
        assert_eq!(value, AttributeValue::N("1700000000".to_string()));
        assert_eq!(value.as_i64(), Some(1_700_000_000));
        assert_eq!(value.as_s(), None);
    }

    #[test]
    fn test_string_attribute() {
        let value = AttributeValue::S("abc".to_string());
        assert_eq!(value.as_s(), Some("abc"));
        assert_eq!(value.as_i64(), None);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Validation("bad key".to_string());
        assert_eq!(err.to_string(), "Validation error: bad key");
    }
}
