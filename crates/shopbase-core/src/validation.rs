//! # Validation Module
//!
//! Input validation for cart operations and hydrated records.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront forms                                             │
//! │  └── Quantity picker, immediate user feedback                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Cart reducer (Rust)                                          │
//! │  ├── THIS MODULE: line id + price checks                              │
//! │  └── QuantityPolicy decides reject vs clamp                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Hydration                                                    │
//! │  └── THIS MODULE: stored lines must satisfy cart invariants            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{CartLine, LineCandidate};
use crate::{MAX_PRICE_CENTS, QUANTITY_CEILING};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a line id (variant identifier).
///
/// ## Example
/// ```rust
/// use shopbase_core::validation::validate_line_id;
///
/// assert!(validate_line_id("v-10").is_ok());
/// assert!(validate_line_id("  ").is_err());
/// ```
pub fn validate_line_id(line_id: &str) -> ValidationResult<()> {
    if line_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "lineId".to_string(),
        });
    }

    Ok(())
}

/// Validates a unit price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
/// - At most [`MAX_PRICE_CENTS`]
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "unitPrice".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a stored line quantity: between 1 and [`QUANTITY_CEILING`].
pub fn validate_stored_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > QUANTITY_CEILING {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: QUANTITY_CEILING,
        });
    }

    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Validates a candidate before it may enter the cart.
pub fn validate_candidate(candidate: &LineCandidate) -> ValidationResult<()> {
    validate_line_id(&candidate.line_id)?;
    validate_price_cents(candidate.unit_price_cents)
}

/// Validates a sequence of lines read back from storage.
///
/// ## Rules
/// - Every line id is non-empty and unique
/// - Every quantity is between 1 and [`QUANTITY_CEILING`]
/// - Every price is between 0 and [`MAX_PRICE_CENTS`]
///
/// The configured maximum quantity is not enforced here: a record written
/// under a larger maximum still hydrates, as long as it stays under the
/// ceiling.
pub fn validate_lines(lines: &[CartLine]) -> ValidationResult<()> {
    let mut seen = HashSet::with_capacity(lines.len());

    for line in lines {
        validate_line_id(&line.line_id)?;
        validate_price_cents(line.unit_price_cents)?;
        validate_stored_quantity(line.quantity)?;

        if !seen.insert(line.line_id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "lineId".to_string(),
                value: line.line_id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
