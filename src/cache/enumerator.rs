//! Key Enumerator Module
//!
//! Lists cache keys by walking scan or query pages until the table stops
//! returning a cursor. Listing does not look at expiry: records that expired
//! but have not been swept yet are still listed.

use tracing::debug;

use crate::cache::codec::{encode_key, validate_pattern};
use crate::cache::requests;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::provider::{Item, PageOutput, TableClient};

/// How a listing walks the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode<'p> {
    /// Every record in the table
    Scan,
    /// Records of one partition whose sort key starts with a prefix
    Query(&'p str),
}

/// Returns every key, or only those matching `"<partition>+<prefix>*"`.
///
/// The pattern is validated before any request is made.
pub async fn list_keys(
    client: &dyn TableClient,
    config: &StoreConfig,
    pattern: Option<&str>,
) -> Result<Vec<String>> {
    validate_pattern(pattern, &config.schema)?;
    let mode = match pattern {
        Some(pattern) => Mode::Query(pattern),
        None => Mode::Scan,
    };

    let mut keys = Vec::new();
    let mut cursor: Option<Item> = None;
    let mut pages = 0usize;

    loop {
        let page: PageOutput = match mode {
            Mode::Scan => client.scan(requests::scan(config, cursor.take())).await?,
            Mode::Query(pattern) => {
                client
                    .query(requests::query(config, pattern, cursor.take())?)
                    .await?
            }
        };
        pages += 1;

        for record in &page.items {
            keys.push(encode_key(record, &config.schema)?);
        }

        match page.last_evaluated_key {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(?mode, pages, keys = keys.len(), "Listed keys");
    Ok(keys)
}
