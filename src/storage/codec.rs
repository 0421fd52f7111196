//! JSON array-of-records representation of a collection.

use crate::core::{PersistenceError, Record};
use serde_json::Value;
use tracing::warn;

pub fn encode<R: Record>(key: &str, records: &[R], pretty: bool) -> Result<String, PersistenceError> {
    let encoded = if pretty {
        serde_json::to_string_pretty(records)
    } else {
        serde_json::to_string(records)
    };
    encoded.map_err(|e| PersistenceError::Encode {
        key: key.to_string(),
        reason: format!("Failed to serialize {} records: {}", R::KIND, e),
    })
}

pub fn decode<R: Record>(key: &str, raw: &str) -> Result<Vec<R>, PersistenceError> {
    serde_json::from_str(raw).map_err(|e| {
        warn!(key = %key, kind = R::KIND, error = %e, "stored collection is not readable");
        PersistenceError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Whether two blobs hold the same JSON, ignoring formatting.
pub fn same_content(left: &str, right: &str) -> bool {
    match (
        serde_json::from_str::<Value>(left),
        serde_json::from_str::<Value>(right),
    ) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}
