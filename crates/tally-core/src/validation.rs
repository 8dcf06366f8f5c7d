//! # Validation Module
//!
//! Input validation for checkout requests and catalog entries.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (axum)                                        │
//! │  ├── JSON syntax, body shape                                           │
//! │  └── Malformed body → MALFORMED_REQUEST                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any database access)                     │
//! │  ├── Numeric parsing of quantity / amount per line                     │
//! │  ├── Identifier format, cart size                                      │
//! │  └── Catalog rules on product insert                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Pricing Resolver (per line, product known)                   │
//! │  ├── Positive quantity, whole units, fuel amount                       │
//! │  └── Variant lookup                                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: Database (SQLite)                                            │
//! │  ├── CHECK (stock_milli >= 0)                                          │
//! │  └── UNIQUE (reference), foreign keys                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::validate_uuid;
//!
//! assert!(validate_uuid("storeId", "550e8400-e29b-41d4-a716-446655440000").is_ok());
//! assert!(validate_uuid("storeId", "store-1").is_err());
//! ```

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{CheckoutError, CheckoutResult, PricingError, ValidationError};
use crate::formula::MAX_FORMULA_LEN;
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{CartLine, CartLineInput, PricingMode, Product, ProductType};
use crate::MAX_CART_LINES;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates that `value` is a UUID in the canonical lowercase hyphenated
/// form ids are stored in.
///
/// Padded, braced, uppercase or hyphenless spellings are rejected, since
/// they would pass here and then miss in every lookup.
///
/// `field` names the offending input in the error (`storeId`, `product`, ...).
pub fn validate_uuid(field: &'static str, value: &str) -> ValidationResult<()> {
    let canonical = uuid::Uuid::parse_str(value)
        .ok()
        .map(|id| id.hyphenated().to_string());

    if canonical.as_deref() != Some(value) {
        return Err(ValidationError::InvalidId {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Checkout Request
// =============================================================================

/// Checks the shape of a checkout before anything is read from storage.
///
/// ## Rules
/// - `store_id` is a UUID
/// - 1 ..= [`MAX_CART_LINES`] lines
/// - every line's `product` (and `variant`, if present) is a UUID
///
/// Line-level problems carry the line index.
pub fn validate_checkout_request(store_id: &str, lines: &[CartLine]) -> CheckoutResult<()> {
    validate_uuid("storeId", store_id)?;

    if lines.is_empty() {
        return Err(ValidationError::EmptyCart.into());
    }
    if lines.len() > MAX_CART_LINES {
        return Err(ValidationError::CartTooLarge {
            max: MAX_CART_LINES,
            actual: lines.len(),
        }
        .into());
    }

    for (index, line) in lines.iter().enumerate() {
        validate_uuid("product", &line.product).map_err(|e| CheckoutError::at_line(index, e))?;
        if let Some(variant) = &line.variant {
            validate_uuid("variant", variant).map_err(|e| CheckoutError::at_line(index, e))?;
        }
    }

    Ok(())
}

/// Converts the wire form of each cart line into a typed [`CartLine`].
///
/// Only the numeric form is checked here. Whether a quantity is positive or
/// an amount is required depends on the product and is decided later by the
/// Pricing Resolver.
pub fn parse_cart_lines(items: Vec<CartLineInput>) -> CheckoutResult<Vec<CartLine>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let quantity = item
                .quantity
                .as_ref()
                .map(parse_quantity)
                .transpose()
                .map_err(|e| CheckoutError::at_line(index, e))?;
            let amount = item
                .amount
                .as_ref()
                .map(parse_amount)
                .transpose()
                .map_err(|e| CheckoutError::at_line(index, e))?;

            Ok(CartLine {
                product: item.product.unwrap_or_default(),
                quantity,
                amount,
                variant: item.variant,
            })
        })
        .collect()
}

// =============================================================================
// Numeric Parsers
// =============================================================================

/// Reads a JSON number (or numeric string) as a [`Quantity`].
///
/// ```rust
/// use serde_json::json;
/// use tally_core::validation::parse_quantity;
///
/// assert_eq!(parse_quantity(&json!(1.5)).unwrap().millis(), 1500);
/// assert_eq!(parse_quantity(&json!("3")).unwrap().millis(), 3000);
/// assert!(parse_quantity(&json!("three")).is_err());
/// ```
pub fn parse_quantity(value: &Value) -> ValidationResult<Quantity> {
    let number = as_number(value).ok_or_else(|| ValidationError::InvalidQuantity {
        reason: format!("'{}' is not a number", value),
    })?;

    Quantity::from_decimal(number).ok_or_else(|| ValidationError::InvalidQuantity {
        reason: "value out of range".to_string(),
    })
}

/// Reads a JSON integer (or integer string) of minor units as [`Money`].
///
/// Fractional minor units are rejected.
pub fn parse_amount(value: &Value) -> Result<Money, PricingError> {
    let invalid = |reason: String| PricingError::InvalidFuelAmount { reason };

    if let Some(cents) = value.as_i64() {
        return Ok(Money::from_cents(cents));
    }

    let number = as_number(value).ok_or_else(|| invalid(format!("'{}' is not a number", value)))?;
    if number.fract() != 0.0 {
        return Err(invalid(format!(
            "{} is not a whole number of minor units",
            number
        )));
    }
    if number.abs() >= i64::MAX as f64 {
        return Err(invalid("value out of range".to_string()));
    }
    Ok(Money::from_cents(number as i64))
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

// =============================================================================
// Catalog Validators
// =============================================================================

/// Validates a product before it is written to the catalog.
///
/// ## Rules
/// - name is not blank and at most 200 characters
/// - `base_price >= 0`, `stock >= 0`
/// - fuel products use fuel pricing with `price_per_unit > 0`
/// - variant ids are UUIDs and unique within the product
/// - dynamic rules have a formula no longer than the evaluator accepts
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidProduct {
        reason: reason.to_string(),
    };

    let name = product.name.trim();
    if name.is_empty() {
        return Err(invalid("name is required"));
    }
    if name.chars().count() > 200 {
        return Err(invalid("name must be at most 200 characters"));
    }
    if product.pricing.base_price.is_negative() {
        return Err(invalid("base price must not be negative"));
    }
    if product.stock.is_negative() {
        return Err(invalid("stock must not be negative"));
    }

    match (&product.product_type, &product.pricing.mode) {
        (ProductType::Fuel, PricingMode::Fuel { config }) => {
            if !config.price_per_unit.is_positive() {
                return Err(invalid("fuel price per unit must be positive"));
            }
        }
        (ProductType::Fuel, _) => return Err(invalid("fuel products require fuel pricing")),
        (_, PricingMode::Dynamic { rules }) => {
            if rules.iter().any(|r| r.formula.len() > MAX_FORMULA_LEN) {
                return Err(invalid("pricing formula is too long"));
            }
        }
        _ => {}
    }

    let mut seen = HashSet::new();
    for variant in &product.variants {
        validate_uuid("variant", &variant.id)?;
        if !seen.insert(variant.id.as_str()) {
            return Err(invalid("variant ids must be unique"));
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STORE: &str = "550e8400-e29b-41d4-a716-446655440000";
    const PRODUCT: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    fn line(product: &str) -> CartLine {
        CartLine {
            product: product.to_string(),
            quantity: Some(Quantity::from_units(1)),
            amount: None,
            variant: None,
        }
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", STORE).is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_uuid_requires_canonical_form() {
        assert!(validate_uuid("id", &format!(" {} ", STORE)).is_err());
        assert!(validate_uuid("id", &STORE.to_uppercase()).is_err());
        assert!(validate_uuid("id", &format!("{{{}}}", STORE)).is_err());
        assert!(validate_uuid("id", &STORE.replace('-', "")).is_err());
    }

    #[test]
    fn test_padded_line_id_is_invalid_not_missing() {
        let err = validate_checkout_request(STORE, &[line(PRODUCT), line(&format!(" {} ", PRODUCT))])
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ID");
        assert_eq!(err.line_index(), Some(1));

        let err = validate_checkout_request(&format!("{} ", STORE), &[line(PRODUCT)]).unwrap_err();
        assert_eq!(err.code(), "INVALID_ID");
        assert_eq!(err.line_index(), None);
    }

    #[test]
    fn test_checkout_request_shape() {
        assert!(validate_checkout_request(STORE, &[line(PRODUCT)]).is_ok());

        let err = validate_checkout_request("bad", &[line(PRODUCT)]).unwrap_err();
        assert_eq!(err.code(), "INVALID_ID");
        assert_eq!(err.line_index(), None);

        let err = validate_checkout_request(STORE, &[]).unwrap_err();
        assert_eq!(err.code(), "EMPTY_CART");

        let many = vec![line(PRODUCT); MAX_CART_LINES + 1];
        let err = validate_checkout_request(STORE, &many).unwrap_err();
        assert_eq!(err.code(), "CART_TOO_LARGE");

        let full = vec![line(PRODUCT); MAX_CART_LINES];
        assert!(validate_checkout_request(STORE, &full).is_ok());
    }

    #[test]
    fn test_bad_line_id_reports_index() {
        let mut bad_variant = line(PRODUCT);
        bad_variant.variant = Some("large".to_string());

        let err =
            validate_checkout_request(STORE, &[line(PRODUCT), line(PRODUCT), bad_variant]).unwrap_err();
        assert_eq!(err.code(), "INVALID_ID");
        assert_eq!(err.line_index(), Some(2));

        let err = validate_checkout_request(STORE, &[line(""), line(PRODUCT)]).unwrap_err();
        assert_eq!(err.line_index(), Some(0));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!(3)).unwrap(), Quantity::from_units(3));
        assert_eq!(parse_quantity(&json!(0.25)).unwrap().millis(), 250);
        assert_eq!(parse_quantity(&json!(-1)).unwrap().millis(), -1000);
        assert!(parse_quantity(&json!(null)).is_err());
        assert!(parse_quantity(&json!([1])).is_err());
        assert!(parse_quantity(&json!("NaN")).is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&json!(1000)).unwrap(), Money::from_cents(1000));
        assert_eq!(parse_amount(&json!("250")).unwrap(), Money::from_cents(250));
        assert_eq!(parse_amount(&json!(0)).unwrap(), Money::zero());

        let err = parse_amount(&json!(10.5)).unwrap_err();
        assert_eq!(err.code(), "INVALID_FUEL_AMOUNT");
        assert!(parse_amount(&json!("ten")).is_err());
        assert!(parse_amount(&json!(true)).is_err());
    }

    #[test]
    fn test_parse_cart_lines_attributes_index() {
        let items = vec![
            CartLineInput {
                product: Some(PRODUCT.to_string()),
                quantity: Some(json!(2)),
                amount: None,
                variant: None,
            },
            CartLineInput {
                product: Some(PRODUCT.to_string()),
                quantity: Some(json!("lots")),
                amount: None,
                variant: None,
            },
        ];
        let err = parse_cart_lines(items).unwrap_err();
        assert_eq!(err.code(), "INVALID_QUANTITY");
        assert_eq!(err.line_index(), Some(1));
    }

    fn catalog_product() -> Product {
        use crate::types::{Pricing, Variant};
        Product {
            id: PRODUCT.to_string(),
            company_id: STORE.to_string(),
            name: "Cola 330ml".to_string(),
            barcode: Some("5449000000996".to_string()),
            product_type: ProductType::Quantity,
            pricing: Pricing {
                mode: PricingMode::Fixed,
                base_price: Money::from_cents(150),
            },
            variants: vec![Variant {
                id: STORE.to_string(),
                name: "Chilled".to_string(),
                price_offset: Money::from_cents(20),
            }],
            stock: Quantity::from_units(24),
            is_active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_validate_product() {
        assert!(validate_product(&catalog_product()).is_ok());

        let mut p = catalog_product();
        p.name = "   ".to_string();
        assert!(validate_product(&p).is_err());

        let mut p = catalog_product();
        p.pricing.base_price = Money::from_cents(-1);
        assert!(validate_product(&p).is_err());

        let mut p = catalog_product();
        p.variants.push(p.variants[0].clone());
        assert!(validate_product(&p).is_err());

        let mut p = catalog_product();
        p.product_type = ProductType::Fuel;
        let err = validate_product(&p).unwrap_err();
        assert_eq!(err.code(), "INVALID_PRODUCT");
    }

    #[test]
    fn test_parse_cart_lines_missing_product_becomes_empty_id() {
        let items = vec![CartLineInput {
            product: None,
            quantity: Some(json!(1)),
            amount: None,
            variant: None,
        }];
        let lines = parse_cart_lines(items).unwrap();
        assert_eq!(lines[0].product, "");

        let err = validate_checkout_request(STORE, &lines).unwrap_err();
        assert_eq!(err.code(), "INVALID_ID");
        assert_eq!(err.line_index(), Some(0));
    }
}
