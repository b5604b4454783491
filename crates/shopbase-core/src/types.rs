//! # Cart Line Types
//!
//! The purchasable unit of the cart and the candidate a product page builds
//! before adding it.
//!
//! ## Identity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product "T-Shirt" (product_id = p-1)                                   │
//! │    ├── Variant "Red / M"  (line_id = v-10)  ◄── one CartLine            │
//! │    └── Variant "Blue / L" (line_id = v-11)  ◄── another CartLine        │
//! │                                                                         │
//! │  The merge key is the VARIANT id (line_id), never the product id.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Cart Line
// =============================================================================

/// One purchasable line in the cart.
///
/// ## Snapshot Pattern
/// Name, slug, variant name, image and price are frozen at the moment the
/// line was first added. Re-adding the same variant only bumps the quantity.
///
/// ## Serialized Form
/// This struct is also the persisted shape of a line. Unknown fields are
/// ignored on read; `imageUrl` and `selectedAttributes` may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    /// Variant identifier, the merge key.
    pub line_id: String,

    /// Parent product identifier.
    pub product_id: String,

    /// Product name at time of adding (frozen).
    pub product_name: String,

    /// Product URL slug, used to link back to the product page.
    pub product_slug: String,

    /// Variant display name, e.g. "Red / M".
    pub variant_name: String,

    /// Unit price in cents at time of adding (frozen, never negative).
    pub unit_price_cents: i64,

    /// Quantity in cart, always >= 1 while the line exists.
    pub quantity: i64,

    /// Product image, if any.
    #[serde(default)]
    pub image_url: Option<String>,

    /// Attribute name → chosen value (e.g. "size" → "M").
    #[serde(default)]
    pub selected_attributes: BTreeMap<String, String>,
}

impl CartLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Calculates the line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Line Candidate
// =============================================================================

/// Everything a [`CartLine`] carries except the quantity.
///
/// Product pages build one of these and hand it to `AddLine` together with
/// the quantity the shopper picked.
///
/// ## Example
/// ```rust
/// use shopbase_core::LineCandidate;
///
/// let candidate = LineCandidate::new("v-10", 1999)
///     .product("p-1", "T-Shirt", "t-shirt")
///     .variant("Red / M")
///     .attribute("color", "red")
///     .attribute("size", "M");
///
/// let line = candidate.into_line(2);
/// assert_eq!(line.line_total().cents(), 3998);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineCandidate {
    pub line_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_slug: String,
    pub variant_name: String,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub selected_attributes: BTreeMap<String, String>,
}

impl LineCandidate {
    /// Starts a candidate with its identity and price; the rest defaults to empty.
    pub fn new(line_id: impl Into<String>, unit_price_cents: i64) -> Self {
        LineCandidate {
            line_id: line_id.into(),
            unit_price_cents,
            ..Default::default()
        }
    }

    /// Sets the parent product's id, name and slug.
    pub fn product(
        mut self,
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        product_slug: impl Into<String>,
    ) -> Self {
        self.product_id = product_id.into();
        self.product_name = product_name.into();
        self.product_slug = product_slug.into();
        self
    }

    pub fn variant(mut self, variant_name: impl Into<String>) -> Self {
        self.variant_name = variant_name.into();
        self
    }

    pub fn image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.selected_attributes.insert(name.into(), value.into());
        self
    }

    /// Freezes the candidate into a line with the given quantity.
    pub fn into_line(self, quantity: i64) -> CartLine {
        CartLine {
            line_id: self.line_id,
            product_id: self.product_id,
            product_name: self.product_name,
            product_slug: self.product_slug,
            variant_name: self.variant_name,
            unit_price_cents: self.unit_price_cents,
            quantity,
            image_url: self.image_url,
            selected_attributes: self.selected_attributes,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_line_keeps_attributes_verbatim() {
        let line = LineCandidate::new("v1", 999)
            .product("p1", "Mug", "mug")
            .variant("Large")
            .image("https://cdn.example/mug.png")
            .attribute("size", "L")
            .into_line(3);

        assert_eq!(line.line_id, "v1");
        assert_eq!(line.product_id, "p1");
        assert_eq!(line.product_name, "Mug");
        assert_eq!(line.product_slug, "mug");
        assert_eq!(line.variant_name, "Large");
        assert_eq!(line.quantity, 3);
        assert_eq!(line.image_url.as_deref(), Some("https://cdn.example/mug.png"));
        assert_eq!(line.selected_attributes.get("size").map(String::as_str), Some("L"));
    }

    #[test]
    fn test_line_total() {
        let line = LineCandidate::new("v1", 999).into_line(2);
        assert_eq!(line.unit_price().cents(), 999);
        assert_eq!(line.line_total().cents(), 1998);
    }

    #[test]
    fn test_attribute_order_is_irrelevant() {
        let a = LineCandidate::new("v1", 100)
            .attribute("size", "M")
            .attribute("color", "red");
        let b = LineCandidate::new("v1", 100)
            .attribute("color", "red")
            .attribute("size", "M");
        assert_eq!(a, b);
    }

    #[test]
    fn test_line_serializes_camel_case() {
        let line = LineCandidate::new("v1", 1000).into_line(2);
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["lineId"], "v1");
        assert_eq!(json["unitPriceCents"], 1000);
        assert_eq!(json["quantity"], 2);
        assert!(json["imageUrl"].is_null());
    }
}
