//! # shopbase-core: Pure Cart Logic for the ShopBase Storefront
//!
//! This crate is the **heart** of the storefront cart. It contains the cart
//! state, its reducer, money math and the persisted-record format as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ShopBase Cart Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Storefront UI                                │   │
//! │  │    Product page ──► Header badge ──► Cart page ──► Cart panel   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CartStore methods                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 shopbase-store (CartStore)                      │   │
//! │  │    subscriptions, key-value storage, ordered save worker        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ shopbase-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │  persist  │  │   │
//! │  │   │ CartLine  │  │   Money   │  │ CartState │  │ projection│  │   │
//! │  │   │ Candidate │  │  parsing  │  │  reducer  │  │ hydration │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO THREADS • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Cart line types (CartLine, LineCandidate)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - CartState, CartAction and the reducer
//! - [`persist`] - Persisted shape, projection, hydration, record codec
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use shopbase_core::{CartAction, CartRules, CartState, LineCandidate};
//!
//! let rules = CartRules::default();
//! let cart = CartState::new();
//!
//! let cart = cart
//!     .apply(CartAction::add(LineCandidate::new("v1", 999), 2), &rules)
//!     .unwrap()
//!     .expect("adding a line changes the cart");
//!
//! assert_eq!(cart.total_item_count(), 2);
//! assert_eq!(cart.subtotal().cents(), 1998);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod persist;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{CartAction, CartRules, CartState, CartTotals, QuantityPolicy};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use persist::{PersistedCart, PersistedRecord};
pub use types::{CartLine, LineCandidate};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Key the cart record is stored under.
///
/// Matches the namespace the storefront has always used for its local cart,
/// so an existing record keeps resolving to the same slot. Records from
/// before integer prices (`state.items`, version 0) are migrated on read.
pub const CART_STORAGE_KEY: &str = "cart-storage";

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
/// Overridable through `CartRules`.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Hard ceiling on any line quantity, whatever the configured maximum.
///
/// Records holding more than this are treated as corrupt.
pub const QUANTITY_CEILING: i64 = 1_000_000;

/// Largest accepted unit price in minor units (one billion major units).
///
/// Together with [`QUANTITY_CEILING`] this keeps a line total far inside `i64`.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// Version written into every persisted record.
pub const PERSIST_VERSION: u32 = 1;
