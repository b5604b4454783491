//! # Persisted Shape
//!
//! What of the cart survives a restart, and how it is written.
//!
//! ## Projection and Hydration
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   CartState                          PersistedCart                      │
//! │   ├── lines ───────── project() ───► lines                              │
//! │   ├── panel_open       (dropped)                                        │
//! │   └── lines_revision   (dropped)                                        │
//! │                                                                         │
//! │   PersistedCart ───── hydrate() ───► CartState { panel closed, rev 0 }  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Record Format
//! ```json
//! {
//!   "state": { "lines": [ { "lineId": "v1", "unitPriceCents": 1000, "quantity": 2, ... } ] },
//!   "version": 1,
//!   "savedAt": "2026-01-01T12:00:00Z"
//! }
//! ```
//! A bare `{ "lines": [...] }` object is accepted as well. Version 0 records
//! written by the first storefront keep `state.items` with prices in major
//! units; those are migrated to cents on read. Unknown fields are
//! ignored everywhere so older engines can read records written by newer
//! ones, as long as `version` does not exceed [`PERSIST_VERSION`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cart::CartState;
use crate::error::{CoreError, CoreResult};
use crate::types::CartLine;
use crate::validation::validate_lines;
use crate::PERSIST_VERSION;

/// The durable subset of [`CartState`]: only the lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCart {
    #[serde(default)]
    pub lines: Vec<CartLine>,
}

/// The envelope written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub state: PersistedCart,

    #[serde(default)]
    pub version: u32,

    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Version 0 Records
// =============================================================================

#[derive(Debug, Deserialize)]
struct LegacyRecord {
    state: LegacyState,
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Deserialize)]
struct LegacyState {
    #[serde(default)]
    items: Vec<LegacyItem>,
}

/// A line as the first storefront stored it.
///
/// `price` is in major units and both numbers may arrive as JSON floats.
/// This is the only place a float enters the engine; it is converted to
/// cents here and never kept.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyItem {
    id: String,
    product_id: String,
    product_name: String,
    product_slug: String,
    variant_name: String,
    price: f64,
    quantity: f64,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl LegacyItem {
    fn into_line(self) -> CoreResult<CartLine> {
        let cents = self.price * 100.0;
        if !cents.is_finite() || cents < 0.0 || cents > i64::MAX as f64 {
            return Err(CoreError::CorruptRecord(format!(
                "item {}: price {} is not a valid amount",
                self.id, self.price
            )));
        }
        let whole = self.quantity.is_finite() && self.quantity.fract() == 0.0;
        if !whole || self.quantity.abs() > i64::MAX as f64 {
            return Err(CoreError::CorruptRecord(format!(
                "item {}: quantity {} is not a whole number",
                self.id, self.quantity
            )));
        }

        Ok(CartLine {
            line_id: self.id,
            product_id: self.product_id,
            product_name: self.product_name,
            product_slug: self.product_slug,
            variant_name: self.variant_name,
            unit_price_cents: cents.round() as i64,
            quantity: self.quantity as i64,
            image_url: self.image_url,
            selected_attributes: self.attributes,
        })
    }
}

fn migrate_legacy(value: Value) -> CoreResult<PersistedRecord> {
    let legacy: LegacyRecord =
        serde_json::from_value(value).map_err(|e| CoreError::CorruptRecord(e.to_string()))?;

    let lines = legacy
        .state
        .items
        .into_iter()
        .map(LegacyItem::into_line)
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(PersistedRecord {
        state: PersistedCart { lines },
        version: legacy.version,
        saved_at: None,
    })
}

/// Projects a cart onto its durable subset.
pub fn project(state: &CartState) -> PersistedCart {
    PersistedCart {
        lines: state.lines().to_vec(),
    }
}

/// Rebuilds a cart from its durable subset. Transient fields take defaults.
pub fn hydrate(persisted: PersistedCart) -> CartState {
    CartState::from_lines(persisted.lines)
}

/// Encodes a persisted cart into the storage record.
pub fn encode(persisted: &PersistedCart, saved_at: DateTime<Utc>) -> CoreResult<String> {
    let record = PersistedRecord {
        state: persisted.clone(),
        version: PERSIST_VERSION,
        saved_at: Some(saved_at),
    };
    serde_json::to_string(&record).map_err(|e| CoreError::Encode(e.to_string()))
}

/// Decodes and validates a storage record.
///
/// ## Errors
/// - `CorruptRecord`: not JSON, wrong shape, or lines breaking cart invariants
/// - `UnsupportedVersion`: written by a newer engine
pub fn decode(raw: &str) -> CoreResult<PersistedRecord> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CoreError::CorruptRecord(e.to_string()))?;

    let corrupt = |e: serde_json::Error| CoreError::CorruptRecord(e.to_string());
    let legacy = value.pointer("/state/items").is_some() && value.pointer("/state/lines").is_none();
    let record = if legacy {
        migrate_legacy(value)?
    } else if value.get("state").is_some() {
        serde_json::from_value::<PersistedRecord>(value).map_err(corrupt)?
    } else if value.get("lines").is_some() {
        serde_json::from_value::<PersistedCart>(value)
            .map(|state| PersistedRecord {
                state,
                version: PERSIST_VERSION,
                saved_at: None,
            })
            .map_err(corrupt)?
    } else {
        return Err(CoreError::CorruptRecord(
            "expected an object with `state` or `lines`".to_string(),
        ));
    };

    if record.version > PERSIST_VERSION {
        return Err(CoreError::UnsupportedVersion {
            found: record.version,
            supported: PERSIST_VERSION,
        });
    }

    validate_lines(&record.state.lines).map_err(|e| CoreError::CorruptRecord(e.to_string()))?;

    Ok(record)
}

// =============================================================================
// Unit Tests
// =============================================================================
