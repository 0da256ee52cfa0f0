//! Cache Module
//!
//! Key-value cache semantics on top of a partitioned table: key codec,
//! lazy expiration, batched reads and writes with retry, and key listing.

mod batch;
mod codec;
mod enumerator;
mod expiration;
mod requests;
mod stats;
mod store;
mod value;


// Re-export public types
pub use batch::{
    align_records, BatchEngine, RetryDecision, RetryPolicy, Unprocessed, BATCH_GET_CHUNK_SIZE,
    BATCH_WRITE_CHUNK_SIZE,
};
pub use codec::{
    canonical_key, decode_key, encode_key, strip_mask, validate_pattern, KEY_DELIMITER, KEY_MASK,
};
pub use enumerator::list_keys;
pub use expiration::{
    compute_expires_at, current_timestamp_ms, is_expired, remaining_ttl_ms, NO_TTL,
};
pub use requests::{BatchInput, ReadRemainder, WriteOp, WriteRemainder};
pub use stats::{CacheStats, StatsRecorder};
pub use store::{MetadataFn, TableCache};
pub use value::{JsonCodec, ValueCodec, DEFAULT_VALUE_ATTRIBUTE};
