//! Batch Retry Engine Module
//!
//! Executes batch reads and writes within the table's per-call ceilings.
//!
//! A batch is split into chunks (100 keys per read, 25 writes per write) and
//! every chunk runs concurrently as its own retry unit. When the table answers
//! but leaves part of a chunk unprocessed, only that remainder is resent, in
//! the table's own representation, after an exponential backoff. A chunk that
//! still has a remainder when its attempts run out fails with
//! `UnprocessedData`; a failed table call fails the chunk at once. Chunks that
//! already completed are not rolled back.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::cache::codec::{canonical_key, encode_key};
use crate::cache::expiration::is_record_expired;
use crate::cache::requests::{self, BatchInput, ReadRemainder, WriteOp, WriteRemainder};
use crate::cache::stats::StatsRecorder;
use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use crate::provider::{BatchGetItemInput, BatchWriteItemInput, Item, TableClient};

/// Keys per batch read request.
pub const BATCH_GET_CHUNK_SIZE: usize = 100;

/// Writes per batch write request.
pub const BATCH_WRITE_CHUNK_SIZE: usize = 25;

// == Retry Policy ==
/// Attempt budget and backoff schedule for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests per chunk, the first one included
    pub max_attempts: u32,
    /// Wait before the first resend; doubles on every further resend
    pub base_delay: Duration,
    /// Ceiling for a single wait
    pub max_delay: Duration,
}

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Resend the remainder after waiting
    Retry(Duration),
    Stop,
}

impl RetryPolicy {
    /// Wait after the given attempt (1-based): `base * 2^(attempt - 1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Decides from an attempt's outcome whether to go again.
    ///
    /// Only a non-empty remainder with budget left is retried.
    pub fn decide(&self, attempt: u32, pending: usize) -> RetryDecision {
        if pending == 0 || attempt >= self.max_attempts {
            RetryDecision::Stop
        } else {
            RetryDecision::Retry(self.backoff(attempt))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

// == Unprocessed ==
/// Remainder carried by `UnprocessedData`, in the table's representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Unprocessed {
    Keys(ReadRemainder),
    Writes(WriteRemainder),
}

impl Unprocessed {
    /// Number of keys or writes left over.
    pub fn count(&self) -> usize {
        match self {
            Unprocessed::Keys(rest) => rest.pending(),
            Unprocessed::Writes(rest) => rest.pending(),
        }
    }
}

/// A table remainder the engine can measure and report.
trait Remainder: Send {
    fn pending(&self) -> usize;
    fn into_unprocessed(self) -> Unprocessed;
}

impl Remainder for ReadRemainder {
    fn pending(&self) -> usize {
        self.values().map(|request| request.keys.len()).sum()
    }

    fn into_unprocessed(self) -> Unprocessed {
        Unprocessed::Keys(self)
    }
}

impl Remainder for WriteRemainder {
    fn pending(&self) -> usize {
        self.values().map(Vec::len).sum()
    }

    fn into_unprocessed(self) -> Unprocessed {
        Unprocessed::Writes(self)
    }
}

// == Batch Engine ==
/// Runs chunked batch operations for one cache call.
pub struct BatchEngine<'a> {
    client: &'a dyn TableClient,
    config: &'a StoreConfig,
    stats: &'a StatsRecorder,
}

impl<'a> BatchEngine<'a> {
    pub fn new(client: &'a dyn TableClient, config: &'a StoreConfig, stats: &'a StatsRecorder) -> Self {
        Self {
            client,
            config,
            stats,
        }
    }

    // == Read ==
    /// Reads `keys` and returns every record the table handed back, in no
    /// particular order. Keys must be unique.
    ///
    /// Every key is decoded before the first request goes out.
    pub async fn get(&self, keys: &[String]) -> Result<Vec<Item>> {
        let batches = keys
            .chunks(BATCH_GET_CHUNK_SIZE)
            .map(|chunk| requests::batch_get(self.config, BatchInput::Fresh(chunk.to_vec())))
            .collect::<Result<Vec<_>>>()?;
        debug!(keys = keys.len(), chunks = batches.len(), "Batch read");

        let chunks = try_join_all(batches.into_iter().map(|request| {
            self.drive(
                request,
                |input| self.send_get(input),
                |rest| requests::batch_get(self.config, BatchInput::Remainder(rest)),
            )
        }))
        .await?;

        Ok(chunks.into_iter().flatten().collect())
    }

    async fn send_get(&self, input: BatchGetItemInput) -> Result<(Vec<Item>, ReadRemainder)> {
        let output = self.client.batch_get_item(input).await?;
        let records = output.responses.into_values().flatten().collect();
        Ok((records, output.unprocessed_keys))
    }

    // == Write ==
    /// Applies puts and deletes. Keys must be unique across `ops`.
    pub async fn write(&self, ops: Vec<WriteOp>, now_ms: i64) -> Result<()> {
        let batches = ops
            .chunks(BATCH_WRITE_CHUNK_SIZE)
            .map(|chunk| {
                requests::batch_write(self.config, BatchInput::Fresh(chunk.to_vec()), now_ms)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(writes = ops.len(), chunks = batches.len(), "Batch write");

        try_join_all(batches.into_iter().map(|request| {
            self.drive(
                request,
                |input| self.send_write(input),
                |rest| requests::batch_write(self.config, BatchInput::Remainder(rest), now_ms),
            )
        }))
        .await?;

        Ok(())
    }

    async fn send_write(&self, input: BatchWriteItemInput) -> Result<(Vec<Item>, WriteRemainder)> {
        let output = self.client.batch_write_item(input).await?;
        Ok((Vec::new(), output.unprocessed_items))
    }

    // == Chunk Retry Loop ==
    /// Sends one chunk until nothing is left over, the policy says stop, or
    /// the table call fails.
    async fn drive<Req, R, F, Fut, B>(&self, first: Req, mut send: F, rebuild: B) -> Result<Vec<Item>>
    where
        R: Remainder,
        F: FnMut(Req) -> Fut,
        Fut: Future<Output = Result<(Vec<Item>, R)>>,
        B: Fn(R) -> Result<Req>,
    {
        let policy = &self.config.retry;
        let mut request = first;
        let mut collected = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let (records, remainder) = send(request).await?;
            collected.extend(records);

            let pending = remainder.pending();
            if pending == 0 {
                return Ok(collected);
            }

            match policy.decide(attempt, pending) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        attempt,
                        pending,
                        delay_ms = delay.as_millis() as u64,
                        "Batch chunk left items unprocessed, retrying"
                    );
                    self.stats.record_retry();
                    tokio::time::sleep(delay).await;
                    request = rebuild(remainder)?;
                }
                RetryDecision::Stop => {
                    warn!(attempt, pending, "Batch chunk ran out of attempts");
                    self.stats.record_unprocessed_failure();
                    return Err(CacheError::UnprocessedData {
                        attempts: attempt,
                        remaining: remainder.into_unprocessed(),
                    });
                }
            }
        }
    }
}

// == Result Assembly ==
/// Lines records up with the requested keys.
///
/// Records are matched by their table key, never by position. Each slot holds
/// the record if the table returned it and it has not expired.
pub fn align_records(
    keys: &[String],
    records: Vec<Item>,
    config: &StoreConfig,
    now_ms: i64,
) -> Result<Vec<Option<Item>>> {
    let mut by_key = HashMap::with_capacity(records.len());
    for record in records {
        if is_record_expired(&record, &config.expiration_attribute, now_ms) {
            continue;
        }
        by_key.insert(encode_key(&record, &config.schema)?, record);
    }

    keys.iter()
        .map(|key| Ok(by_key.get(&canonical_key(key, &config.schema)?).cloned()))
        .collect()
}
