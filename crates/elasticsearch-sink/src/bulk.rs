//! Bulk request encoding and response inspection.
//!
//! A bulk request body for two products looks like:
//!
//! ```text
//! {"index":{"_index":"floral-products","_id":"a1"}}
//! {"name":"Rose","description":"Red","category":"Flowers","seller":"Larisa"}
//! {"index":{"_index":"floral-products","_id":"b2"}}
//! {"name":"Lily","description":"White","seller":"Danila"}
//!
//! ```
//!
//! i.e. one action line and one document line per record, in record order,
//! followed by a terminating blank line.

use serde::Serialize;
use sync_core::Product;

#[derive(Serialize)]
struct IndexAction<'a> {
    index: IndexTarget<'a>,
}

#[derive(Serialize)]
struct IndexTarget<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: &'a str,
}

#[derive(Serialize)]
struct Document<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
    seller: &'a str,
}

/// Encode `records` as an NDJSON bulk body targeting `index`.
pub fn encode_bulk_body(index: &str, records: &[Product]) -> serde_json::Result<Vec<u8>> {
    let mut body = Vec::with_capacity(records.len() * 256);

    for record in records {
        let action = IndexAction {
            index: IndexTarget {
                index,
                id: &record.id,
            },
        };
        serde_json::to_writer(&mut body, &action)?;
        body.push(b'\n');

        let document = Document {
            name: &record.name,
            description: &record.description,
            category: record.category.as_deref(),
            seller: &record.seller,
        };
        serde_json::to_writer(&mut body, &document)?;
        body.push(b'\n');
    }
    body.push(b'\n');

    Ok(body)
}

/// Per-item result counts extracted from a bulk response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkSummary {
    pub total: usize,
    /// Items the sink did not index, for any reason
    pub failed: usize,
    /// Failed items whose status says a later attempt may succeed (429, 5xx)
    pub retryable: usize,
}

impl BulkSummary {
    /// Inspect a bulk response.
    ///
    /// Returns `None` when the body is not a bulk response (e.g. a proxy
    /// page or an empty body); such bodies are judged by status code alone.
    pub fn parse(body: &str, expected_items: usize) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let errors = value.get("errors")?.as_bool()?;

        let items = value.get("items").and_then(|items| items.as_array());
        let (total, failed, retryable) = match items {
            Some(items) => {
                let statuses: Vec<ItemStatus> = items.iter().map(item_status).collect();
                let failed = statuses.iter().filter(|s| **s != ItemStatus::Ok).count();
                let retryable = statuses
                    .iter()
                    .filter(|s| **s == ItemStatus::Retryable)
                    .count();
                (items.len(), failed, retryable)
            }
            None => (expected_items, if errors { expected_items } else { 0 }, 0),
        };

        // `errors: true` with no recognisable failed item still means the
        // sink rejected something.
        let failed = if errors && failed == 0 { total.max(1) } else { failed };

        Some(Self {
            total,
            failed,
            retryable,
        })
    }

    /// Failed items that no retry will fix, e.g. mapping errors.
    pub fn rejected(&self) -> usize {
        self.failed - self.retryable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemStatus {
    Ok,
    Rejected,
    Retryable,
}

fn item_status(item: &serde_json::Value) -> ItemStatus {
    let Some(result) = item.as_object().and_then(|ops| ops.values().next()) else {
        return ItemStatus::Ok;
    };
    let status = result.get("status").and_then(|status| status.as_u64());
    match status {
        Some(429) => ItemStatus::Retryable,
        Some(status) if status >= 500 => ItemStatus::Retryable,
        Some(status) if status > 299 => ItemStatus::Rejected,
        _ if result.get("error").is_some() => ItemStatus::Rejected,
        _ => ItemStatus::Ok,
    }
}
