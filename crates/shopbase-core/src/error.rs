//! # Error Types
//!
//! Domain-specific error types for shopbase-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  shopbase-core errors (this file)                                      │
//! │  ├── CoreError        - Cart rule violations, record codec failures    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  shopbase-store errors (separate crate)                                │
//! │  └── StoreError       - Storage, config and worker failures            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Removing or updating a line that is not in the cart is NOT an error.
//! Those operations are defined no-ops.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core cart errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Line quantity would exceed the configured maximum.
    ///
    /// ## When This Occurs
    /// - `AddLine` merge pushes an existing line past the maximum
    /// - `SetQuantity` with a value above the maximum
    /// - Only under `QuantityPolicy::Reject`; `Clamp` caps instead
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Persisted record could not be parsed or fails cart invariants.
    #[error("Corrupt cart record: {0}")]
    CorruptRecord(String),

    /// Persisted record was written by a newer engine.
    #[error("Unsupported cart record version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Persisted record could not be encoded.
    #[error("Failed to encode cart record: {0}")]
    Encode(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a caller hands the cart malformed input.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed price string).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., two lines with the same line id).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
