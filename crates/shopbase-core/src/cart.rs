//! # Cart State
//!
//! The cart aggregate and its reducer.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Reducer                                         │
//! │                                                                         │
//! │  (CartState, CartAction) ──► apply() ──► Ok(Some(next))  state changed  │
//! │                                     ├──► Ok(None)        no-op          │
//! │                                     └──► Err(CoreError)  rejected       │
//! │                                                                         │
//! │  Storefront Action      CartAction             Lines Change             │
//! │  ─────────────────      ──────────             ────────────             │
//! │  Add to cart ─────────► AddLine ─────────────► merge or push            │
//! │  Quantity picker ─────► SetQuantity ─────────► lines[i].qty = n         │
//! │  Remove button ───────► RemoveLine ──────────► retain                   │
//! │  Sign-out / order ────► Clear ───────────────► empty                    │
//! │  Cart icon ───────────► SetPanelOpen/Toggle ─► (none, panel only)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `apply` never mutates `self`. Every successful case builds a complete
//! successor state, which the store then publishes as one snapshot.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CartLine, LineCandidate};
use crate::validation::validate_candidate;
use crate::{MAX_ITEM_QUANTITY, QUANTITY_CEILING};

// =============================================================================
// Quantity Rules
// =============================================================================

/// What to do with an out-of-range quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityPolicy {
    /// Return an error and leave the cart untouched.
    #[default]
    Reject,

    /// Raise non-positive add quantities to 1 and cap totals at the maximum.
    Clamp,
}

impl std::fmt::Display for QuantityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantityPolicy::Reject => write!(f, "reject"),
            QuantityPolicy::Clamp => write!(f, "clamp"),
        }
    }
}

impl std::str::FromStr for QuantityPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" | "strict" => Ok(QuantityPolicy::Reject),
            "clamp" | "permissive" => Ok(QuantityPolicy::Clamp),
            _ => Err(ValidationError::InvalidFormat {
                field: "quantity_policy".to_string(),
                reason: format!("unknown policy '{}', expected reject or clamp", s),
            }),
        }
    }
}

/// Quantity limits applied by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartRules {
    pub quantity_policy: QuantityPolicy,
    pub max_item_quantity: i64,
}

impl Default for CartRules {
    fn default() -> Self {
        CartRules {
            quantity_policy: QuantityPolicy::Reject,
            max_item_quantity: MAX_ITEM_QUANTITY,
        }
    }
}

impl CartRules {
    /// Admits the amount an `AddLine` adds.
    fn admit_increment(&self, quantity: i64) -> CoreResult<i64> {
        if quantity > 0 {
            return Ok(quantity);
        }

        match self.quantity_policy {
            QuantityPolicy::Reject => Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into()),
            QuantityPolicy::Clamp => Ok(1),
        }
    }

    /// Effective maximum: the configured one, never above [`QUANTITY_CEILING`].
    pub fn max_quantity(&self) -> i64 {
        self.max_item_quantity.min(QUANTITY_CEILING)
    }

    /// Admits the quantity a line ends up with. `quantity` is already >= 1.
    fn admit_total(&self, quantity: i64) -> CoreResult<i64> {
        let max = self.max_quantity();
        if quantity <= max {
            return Ok(quantity);
        }

        match self.quantity_policy {
            QuantityPolicy::Reject => Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max,
            }),
            QuantityPolicy::Clamp => Ok(max),
        }
    }
}

// =============================================================================
// Cart Action
// =============================================================================

/// One reducer case per cart operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Merge-by-identity add.
    AddLine {
        candidate: LineCandidate,
        quantity: i64,
    },
    RemoveLine {
        line_id: String,
    },
    /// `quantity <= 0` removes the line.
    SetQuantity {
        line_id: String,
        quantity: i64,
    },
    Clear,
    SetPanelOpen(bool),
    TogglePanel,
}

impl CartAction {
    pub fn add(candidate: LineCandidate, quantity: i64) -> Self {
        CartAction::AddLine {
            candidate,
            quantity,
        }
    }

    pub fn remove(line_id: impl Into<String>) -> Self {
        CartAction::RemoveLine {
            line_id: line_id.into(),
        }
    }

    pub fn set_quantity(line_id: impl Into<String>, quantity: i64) -> Self {
        CartAction::SetQuantity {
            line_id: line_id.into(),
            quantity,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            CartAction::AddLine { .. } => "add_line",
            CartAction::RemoveLine { .. } => "remove_line",
            CartAction::SetQuantity { .. } => "set_quantity",
            CartAction::Clear => "clear",
            CartAction::SetPanelOpen(_) => "set_panel_open",
            CartAction::TogglePanel => "toggle_panel",
        }
    }
}

// =============================================================================
// Cart State
// =============================================================================

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `line_id` (adding the same variant increases quantity)
/// - Every line has `quantity >= 1` (setting qty to 0 removes the line)
/// - Line order is first-added order; merges never move a line
/// - `lines_revision` changes if and only if `lines` changes
///
/// `lines` is shared behind an `Arc`, so a panel toggle produces a successor
/// that points at the very same line vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    lines: Arc<Vec<CartLine>>,
    panel_open: bool,
    lines_revision: u64,
}

impl CartState {
    /// Creates a new empty cart with the panel closed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cart from already-validated lines (panel closed, revision 0).
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        CartState {
            lines: Arc::new(lines),
            panel_open: false,
            lines_revision: 0,
        }
    }

    /// Applies one action and returns the successor state.
    ///
    /// ## Returns
    /// - `Ok(Some(next))` when the cart changed
    /// - `Ok(None)` when the action is a defined no-op (missing line,
    ///   unchanged quantity, clearing an empty cart, same panel flag)
    /// - `Err(_)` when the action violates `rules` or the candidate is malformed
    pub fn apply(&self, action: CartAction, rules: &CartRules) -> CoreResult<Option<CartState>> {
        match action {
            CartAction::AddLine {
                candidate,
                quantity,
            } => self.add_line(candidate, quantity, rules),
            CartAction::RemoveLine { line_id } => Ok(self.remove_line(&line_id)),
            CartAction::SetQuantity { line_id, quantity } => {
                self.set_quantity(&line_id, quantity, rules)
            }
            CartAction::Clear => Ok(self.clear()),
            CartAction::SetPanelOpen(open) => Ok(self.with_panel(open)),
            CartAction::TogglePanel => Ok(self.with_panel(!self.panel_open)),
        }
    }

    fn add_line(
        &self,
        candidate: LineCandidate,
        quantity: i64,
        rules: &CartRules,
    ) -> CoreResult<Option<CartState>> {
        validate_candidate(&candidate)?;
        let quantity = rules.admit_increment(quantity)?;

        let mut lines = (*self.lines).clone();

        // Check if the variant is already in the cart
        if let Some(line) = lines.iter_mut().find(|l| l.line_id == candidate.line_id) {
            let merged = rules.admit_total(line.quantity.saturating_add(quantity))?;
            if merged == line.quantity {
                // Already clamped at the maximum
                return Ok(None);
            }
            line.quantity = merged;
        } else {
            let quantity = rules.admit_total(quantity)?;
            lines.push(candidate.into_line(quantity));
        }

        Ok(Some(self.with_lines(lines)))
    }

    fn remove_line(&self, line_id: &str) -> Option<CartState> {
        if !self.contains(line_id) {
            return None;
        }

        let lines = self
            .lines
            .iter()
            .filter(|l| l.line_id != line_id)
            .cloned()
            .collect();
        Some(self.with_lines(lines))
    }

    fn set_quantity(
        &self,
        line_id: &str,
        quantity: i64,
        rules: &CartRules,
    ) -> CoreResult<Option<CartState>> {
        if quantity <= 0 {
            return Ok(self.remove_line(line_id));
        }

        let Some(current) = self.line(line_id) else {
            return Ok(None);
        };

        let quantity = rules.admit_total(quantity)?;
        if current.quantity == quantity {
            return Ok(None);
        }

        let lines = self
            .lines
            .iter()
            .map(|l| {
                if l.line_id == line_id {
                    CartLine {
                        quantity,
                        ..l.clone()
                    }
                } else {
                    l.clone()
                }
            })
            .collect();
        Ok(Some(self.with_lines(lines)))
    }

    fn clear(&self) -> Option<CartState> {
        if self.lines.is_empty() {
            return None;
        }
        Some(self.with_lines(Vec::new()))
    }

    fn with_panel(&self, open: bool) -> Option<CartState> {
        if self.panel_open == open {
            return None;
        }
        Some(CartState {
            lines: Arc::clone(&self.lines),
            panel_open: open,
            lines_revision: self.lines_revision,
        })
    }

    fn with_lines(&self, lines: Vec<CartLine>) -> CartState {
        CartState {
            lines: Arc::new(lines),
            panel_open: self.panel_open,
            lines_revision: self.lines_revision + 1,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Lines in first-added order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, line_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    pub fn contains(&self, line_id: &str) -> bool {
        self.line(line_id).is_some()
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// Counter bumped on every change to `lines`.
    pub fn lines_revision(&self) -> u64 {
        self.lines_revision
    }

    /// Returns the number of distinct lines in the cart.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the total quantity of all lines (0 for an empty cart).
    pub fn total_item_count(&self) -> i64 {
        total_item_count(&self.lines)
    }

    /// Calculates the subtotal in exact cents (zero for an empty cart).
    pub fn subtotal(&self) -> Money {
        subtotal(&self.lines)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }
}

/// Sum of quantities over a line slice. Saturates at `i64::MAX`.
pub fn total_item_count(lines: &[CartLine]) -> i64 {
    lines
        .iter()
        .fold(0_i64, |total, line| total.saturating_add(line.quantity))
}

/// Sum of `unit_price * quantity` over a line slice. Saturates at `i64::MAX`.
pub fn subtotal(lines: &[CartLine]) -> Money {
    lines.iter().map(CartLine::line_total).sum()
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Cart totals summary for the header badge and cart page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    pub total_item_count: i64,
    pub subtotal_cents: i64,
}

impl From<&CartState> for CartTotals {
    fn from(cart: &CartState) -> Self {
        CartTotals {
            line_count: cart.line_count(),
            total_item_count: cart.total_item_count(),
            subtotal_cents: cart.subtotal().cents(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
