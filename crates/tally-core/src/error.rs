//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── ValidationError  - Malformed request input                        │
//! │  ├── PricingError     - Pricing Resolver failures                      │
//! │  ├── LineError        - Anything that fails one cart line              │
//! │  └── CheckoutError    - What a checkout returns (kind + code + index)  │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  API errors (in app)                                                   │
//! │  └── ApiError         - What clients see (serialized)                  │
//! │                                                                         │
//! │  Flow: PricingError → LineError → CheckoutError → ApiError → Client    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Every variant has a stable machine-readable code
//! 3. Errors are enum variants, never String
//! 4. Line-level failures carry the 0-based cart index

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a failure. Clients branch on this.
///
/// ```text
/// ┌──────────────────────┬──────────────────────────────────┬──────────┐
/// │ Kind                 │ Meaning                          │ Retry?   │
/// ├──────────────────────┼──────────────────────────────────┼──────────┤
/// │ VALIDATION_ERROR     │ malformed input                  │ fix cart │
/// │ AUTHORIZATION_ERROR  │ store access denied              │ no       │
/// │ NOT_FOUND            │ product/variant/store missing    │ no       │
/// │ INVENTORY_ERROR      │ not enough stock                 │ adjust   │
/// │ PRICING_ERROR        │ line cannot be priced            │ fix cart │
/// │ SERVER_ERROR         │ persistence / infrastructure     │ yes      │
/// └──────────────────────┴──────────────────────────────────┴──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "AUTHORIZATION_ERROR")]
    Authorization,
    NotFound,
    #[serde(rename = "INVENTORY_ERROR")]
    Inventory,
    #[serde(rename = "PRICING_ERROR")]
    Pricing,
    #[serde(rename = "SERVER_ERROR")]
    Server,
}

impl ErrorKind {
    /// The wire string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Authorization => "AUTHORIZATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Inventory => "INVENTORY_ERROR",
            ErrorKind::Pricing => "PRICING_ERROR",
            ErrorKind::Server => "SERVER_ERROR",
        }
    }

    /// Whether resubmitting the same request unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Server)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any persistence access. The same input always produces the
/// same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The cart has no lines.
    #[error("cart must contain at least one item")]
    EmptyCart,

    /// The cart exceeds the per-order line cap.
    #[error("cart cannot have more than {max} items (got {actual})")]
    CartTooLarge { max: usize, actual: usize },

    /// An identifier is not a UUID.
    ///
    /// ## When This Occurs
    /// - `storeId` is empty or not a UUID
    /// - a line's `product` or `variant` is not a UUID
    #[error("{field} is not a valid identifier: '{value}'")]
    InvalidId { field: &'static str, value: String },

    /// The request body could not be understood at all.
    #[error("malformed request: {reason}")]
    Malformed { reason: String },

    /// Quantity is present but not a positive finite number.
    #[error("quantity must be a positive number: {reason}")]
    InvalidQuantity { reason: String },

    /// A non-fuel line carries no quantity.
    #[error("quantity is required")]
    MissingQuantity,

    /// A discrete-unit product was given a fractional quantity.
    #[error("quantity {quantity} must be a whole number for this product")]
    FractionalQuantity { quantity: Quantity },

    /// A product definition breaks a catalog rule (negative price, fuel
    /// product without fuel pricing, duplicate variant ids, ...).
    #[error("invalid product: {reason}")]
    InvalidProduct { reason: String },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyCart => "EMPTY_CART",
            ValidationError::CartTooLarge { .. } => "CART_TOO_LARGE",
            ValidationError::InvalidId { .. } => "INVALID_ID",
            ValidationError::Malformed { .. } => "MALFORMED_REQUEST",
            ValidationError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            ValidationError::MissingQuantity => "MISSING_QUANTITY",
            ValidationError::FractionalQuantity { .. } => "FRACTIONAL_QUANTITY",
            ValidationError::InvalidProduct { .. } => "INVALID_PRODUCT",
        }
    }
}

// =============================================================================
// Pricing Error
// =============================================================================

/// Failures of the Pricing Resolver.
///
/// Dynamic formula failures are NOT here: they degrade to the base price
/// and are reported as a fallback on the resolved line instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// Fuel amount missing, non-numeric or not positive.
    ///
    /// ## User Workflow
    /// ```text
    /// Pump keypad: amount = 0
    ///      │
    ///      ▼
    /// resolve_line() → InvalidFuelAmount
    ///      │
    ///      ▼
    /// UI highlights the fuel line
    /// ```
    #[error("invalid fuel amount: {reason}")]
    InvalidFuelAmount { reason: String },

    /// A fuel product without a usable fuel configuration.
    #[error("product {product_id} has no valid fuel configuration")]
    FuelConfigMissing { product_id: String },

    /// The requested variant id is not one of the product's variants.
    #[error("variant {variant_id} not found on product {product_id}")]
    VariantNotFound {
        product_id: String,
        variant_id: String,
    },

    /// `base_price + price_offset` went below zero.
    #[error("variant {variant_id} yields a negative unit price ({unit_price})")]
    NegativeUnitPrice { variant_id: String, unit_price: Money },

    /// The line total does not fit the money type.
    #[error("line total overflows")]
    AmountOverflow,
}

impl PricingError {
    pub fn code(&self) -> &'static str {
        match self {
            PricingError::InvalidFuelAmount { .. } => "INVALID_FUEL_AMOUNT",
            PricingError::FuelConfigMissing { .. } => "FUEL_CONFIG_MISSING",
            PricingError::VariantNotFound { .. } => "VARIANT_NOT_FOUND",
            PricingError::NegativeUnitPrice { .. } => "NEGATIVE_UNIT_PRICE",
            PricingError::AmountOverflow => "AMOUNT_OVERFLOW",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PricingError::VariantNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Pricing,
        }
    }
}

// =============================================================================
// Line Error
// =============================================================================

/// Why a single cart line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Product id does not exist.
    #[error("product {0} not found")]
    ProductNotFound(String),

    /// Product exists but `is_active = false`.
    #[error("product {0} is not active")]
    ProductInactive(String),

    /// Insufficient stock to complete the sale.
    ///
    /// ## When This Occurs
    /// - Pre-check: the cart (summed per product) asks for more than is on hand
    /// - Commit: a concurrent checkout took the stock first
    ///
    /// ## User Workflow
    /// ```text
    /// Cart line 2: Cola × 10
    ///      │
    ///      ▼
    /// Check stock: available=5
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Cola", available: 5, requested: 10 }
    ///      │
    ///      ▼
    /// UI shows: "Only 5 Cola in stock" on line 2
    /// ```
    ///
    /// `available` is `None` when the level could not be re-read after a
    /// commit-time conflict.
    #[error("insufficient stock for {product}: {}, requested {requested}", describe_available(.available))]
    InsufficientStock {
        product: String,
        available: Option<Quantity>,
        requested: Quantity,
    },

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl LineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LineError::Validation(_) => ErrorKind::Validation,
            LineError::ProductNotFound(_) | LineError::ProductInactive(_) => ErrorKind::NotFound,
            LineError::InsufficientStock { .. } => ErrorKind::Inventory,
            LineError::Pricing(e) => e.kind(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LineError::Validation(e) => e.code(),
            LineError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            LineError::ProductInactive(_) => "PRODUCT_INACTIVE",
            LineError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            LineError::Pricing(e) => e.code(),
        }
    }
}

fn describe_available(available: &Option<Quantity>) -> String {
    match available {
        Some(quantity) => format!("available {}", quantity),
        None => "available unknown".to_string(),
    }
}

// =============================================================================
// Checkout Error
// =============================================================================

/// The single error type returned by a checkout.
///
/// Every variant maps to `{kind, code, message, lineIndex?}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Request-level validation failure (store id, cart size).
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("store {0} not found")]
    StoreNotFound(String),

    #[error("store {0} is not active")]
    StoreInactive(String),

    /// The principal is neither an employee nor the supervisor.
    #[error("user {user_id} is not authorized for store {store_id}")]
    AccessDenied { store_id: String, user_id: String },

    /// A specific cart line failed.
    #[error("item {index}: {source}")]
    Line {
        index: usize,
        #[source]
        source: LineError,
    },

    /// Every generated reference collided with an existing one.
    #[error("could not allocate a unique order reference after {attempts} attempts")]
    ReferenceExhausted { attempts: u32 },

    /// Persistence failure. Safe to retry.
    #[error("database error: {0}")]
    Database(String),

    /// The deadline passed before the commit began. Nothing was written.
    #[error("checkout did not reach its commit within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

impl CheckoutError {
    /// Wraps a line failure with its 0-based cart index.
    pub fn at_line(index: usize, source: impl Into<LineError>) -> Self {
        CheckoutError::Line {
            index,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Validation(_) => ErrorKind::Validation,
            CheckoutError::StoreNotFound(_) => ErrorKind::NotFound,
            CheckoutError::StoreInactive(_) | CheckoutError::AccessDenied { .. } => {
                ErrorKind::Authorization
            }
            CheckoutError::Line { source, .. } => source.kind(),
            CheckoutError::ReferenceExhausted { .. }
            | CheckoutError::Database(_)
            | CheckoutError::Timeout { .. } => ErrorKind::Server,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::Validation(e) => e.code(),
            CheckoutError::StoreNotFound(_) => "STORE_NOT_FOUND",
            CheckoutError::StoreInactive(_) => "STORE_INACTIVE",
            CheckoutError::AccessDenied { .. } => "STORE_ACCESS_DENIED",
            CheckoutError::Line { source, .. } => source.code(),
            CheckoutError::ReferenceExhausted { .. } => "REFERENCE_EXHAUSTED",
            CheckoutError::Database(_) => "DATABASE_ERROR",
            CheckoutError::Timeout { .. } => "CHECKOUT_TIMEOUT",
        }
    }

    /// 0-based index of the failing cart line, if the failure is line-level.
    pub fn line_index(&self) -> Option<usize> {
        match self {
            CheckoutError::Line { index, .. } => Some(*index),
            _ => None,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for checkout results.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LineError::InsufficientStock {
            product: "Cola".to_string(),
            available: Some(Quantity::from_units(5)),
            requested: Quantity::from_units(10),
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for Cola: available 5, requested 10"
        );

        let unknown = LineError::InsufficientStock {
            product: "Cola".to_string(),
            available: None,
            requested: Quantity::from_units(1),
        };
        assert_eq!(
            unknown.to_string(),
            "insufficient stock for Cola: available unknown, requested 1"
        );

        let err = CheckoutError::at_line(2, err);
        assert_eq!(
            err.to_string(),
            "item 2: insufficient stock for Cola: available 5, requested 10"
        );
    }

    #[test]
    fn test_line_error_attribution() {
        let err = CheckoutError::at_line(
            3,
            PricingError::InvalidFuelAmount {
                reason: "must be greater than zero".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::Pricing);
        assert_eq!(err.code(), "INVALID_FUEL_AMOUNT");
        assert_eq!(err.line_index(), Some(3));
    }

    #[test]
    fn test_variant_not_found_is_not_found_kind() {
        let err = CheckoutError::at_line(
            0,
            PricingError::VariantNotFound {
                product_id: "p".to_string(),
                variant_id: "v".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), "VARIANT_NOT_FOUND");
    }

    #[test]
    fn test_request_level_errors_have_no_index() {
        let err: CheckoutError = ValidationError::EmptyCart.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code(), "EMPTY_CART");
        assert_eq!(err.line_index(), None);

        let err = CheckoutError::AccessDenied {
            store_id: "s".to_string(),
            user_id: "u".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.code(), "STORE_ACCESS_DENIED");
    }

    #[test]
    fn test_kind_wire_strings() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::Inventory).unwrap(),
            "\"INVENTORY_ERROR\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::NotFound).unwrap(),
            "\"NOT_FOUND\""
        );
        assert_eq!(ErrorKind::Server.as_str(), "SERVER_ERROR");
        assert!(ErrorKind::Server.is_retryable());
        assert!(!ErrorKind::Inventory.is_retryable());
    }
}
