//! Payload decoding.
//!
//! Payloads are JSON objects of the form
//!
//! ```json
//! {"id": "...", "name": "...", "description": "...", "category": "...", "seller": "..."}
//! ```
//!
//! `id` (also accepted as `identifier`) and `category` are optional, unknown
//! fields are ignored.

use serde::Deserialize;

use crate::error::DecodeError;
use crate::types::{Product, RawMessage};

#[derive(Deserialize)]
struct WireProduct {
    #[serde(default, alias = "identifier")]
    id: Option<String>,
    name: String,
    description: String,
    #[serde(default)]
    category: Option<String>,
    seller: String,
}

/// Decode a single log message into a [`Product`].
///
/// Decoding is all-or-nothing per message: any malformed or incomplete
/// payload yields a [`DecodeError`] and no partial record.
pub fn decode_product(message: &RawMessage) -> Result<Product, DecodeError> {
    if message.payload.is_empty() {
        return Err(DecodeError::EmptyPayload {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
        });
    }

    let wire: WireProduct =
        serde_json::from_slice(&message.payload).map_err(|source| DecodeError::Malformed {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            source,
        })?;

    let id = match wire.id {
        Some(id) if !id.is_empty() => id,
        _ => message.coordinate_id(),
    };

    Ok(Product {
        id,
        name: wire.name,
        description: wire.description,
        category: wire.category.filter(|c| !c.is_empty()),
        seller: wire.seller,
    })
}
