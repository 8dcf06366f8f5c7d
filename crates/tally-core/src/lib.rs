//! # tally-core: Pure Checkout Logic for Tally
//!
//! This crate is the **heart** of Tally. It contains the checkout business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Tally Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Front office (POS terminals)                 │   │
//! │  │    Scan ──► Cart ──► Checkout ──► Receipt                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP / JSON                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-api (axum)                             │   │
//! │  │    POST /api/v1/orders, GET /api/v1/orders/{id}, ...           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               tally-db (Checkout Engine + repositories)        │   │
//! │  │              SQLite transaction, migrations, ledger             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  resolve  │  │   cart    │  │   │
//! │  │   │   Order   │  │ Quantity  │  │  formula  │  │  catalog  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Store, Order, CartLine, ...)
//! - [`money`] - Money in integer minor units
//! - [`quantity`] - Fixed-point quantities (three decimals)
//! - [`pricing`] - The Pricing Resolver
//! - [`formula`] - Sandboxed evaluator for dynamic pricing rules
//! - [`error`] - Error taxonomy with stable codes
//! - [`validation`] - Request and catalog validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are i64 minor units
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::{Money, Quantity};
//!
//! // 1000 paid at 600 per litre
//! let litres = Money::from_cents(1000)
//!     .divide_by_unit_price(Money::from_cents(600))
//!     .unwrap();
//! assert_eq!(litres, Quantity::from_millis(1667));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod formula;
pub mod money;
pub mod pricing;
pub mod quantity;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use error::{
    CheckoutError, CheckoutResult, ErrorKind, LineError, PricingError, ValidationError,
};
pub use money::Money;
pub use pricing::{PricingFallback, ResolvedLine};
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single checkout.
///
/// A sanity bound against runaway requests, not a business rule.
pub const MAX_CART_LINES: usize = 100;

/// Prefix of every order reference code.
pub const ORDER_REFERENCE_PREFIX: &str = "ORD";
