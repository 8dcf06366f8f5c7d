//! # Pricing Resolver
//!
//! Turns one cart line into a priced order line. Pure and synchronous.
//!
//! ## Dispatch
//! ```text
//! resolve_line(product, line)
//!      │
//!      ├── product_type == Fuel ──────► amount ÷ price_per_unit
//!      │                                line_total = amount (exact)
//!      │
//!      ├── line.variant is Some ──────► (base_price + offset) × quantity
//!      │
//!      ├── mode == Dynamic ───────────► formula(first rule) × quantity
//!      │                                └── fails? base_price × quantity
//!      │                                    + PricingFallback reported
//!      │
//!      └── otherwise ─────────────────► base_price × quantity
//! ```
//!
//! Stock sufficiency is a separate step ([`check_stock`]) that the engine
//! runs before pricing, against the cumulative quantity of the product in
//! the cart.

use crate::error::{LineError, PricingError, ValidationError};
use crate::formula::{self, Scope};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{CartLine, PricingMode, Product, ProductType, Variant};

/// A priced cart line, ready to become an order item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub unit_price: Money,
    pub quantity: Quantity,
    pub line_total: Money,
    pub unit_label: Option<String>,
    pub variant: Option<Variant>,
    /// Set when a dynamic formula could not be used.
    pub fallback: Option<PricingFallback>,
}

/// Records that a dynamic price degraded to the base price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingFallback {
    /// Name of the rule that failed; `None` if the product has no rules.
    pub rule: Option<String>,
    pub reason: String,
}

// =============================================================================
// Quantity & Stock
// =============================================================================

/// The quantity a non-fuel line asks for.
///
/// ## Rules
/// - must be present
/// - must be > 0 (after rounding to three decimals)
/// - must be whole for [`ProductType::Quantity`]
pub fn requested_quantity(product: &Product, line: &CartLine) -> Result<Quantity, LineError> {
    let quantity = line.quantity.ok_or(ValidationError::MissingQuantity)?;

    if !quantity.is_positive() {
        return Err(ValidationError::InvalidQuantity {
            reason: format!("got {}", quantity),
        }
        .into());
    }
    if !product.product_type.allows_fractional() && !quantity.is_whole() {
        return Err(ValidationError::FractionalQuantity { quantity }.into());
    }

    Ok(quantity)
}

/// Fails with `InsufficientStock` if `requested` exceeds the product's stock.
///
/// `requested` is the total asked for this product so far in the cart, so two
/// lines of 3 against a stock of 5 fail on the second line.
pub fn check_stock(product: &Product, requested: Quantity) -> Result<(), LineError> {
    if product.can_sell(requested) {
        return Ok(());
    }
    Err(LineError::InsufficientStock {
        product: product.name.clone(),
        available: Some(product.stock),
        requested,
    })
}

// =============================================================================
// Resolver
// =============================================================================

/// Prices one cart line.
///
/// ## Example
/// ```rust
/// # use chrono::Utc;
/// # use tally_core::types::*;
/// # use tally_core::{Money, Quantity};
/// use tally_core::pricing::resolve_line;
///
/// # let product = Product {
/// #     id: "p".into(), company_id: "c".into(), name: "Cola".into(), barcode: None,
/// #     product_type: ProductType::Quantity,
/// #     pricing: Pricing { mode: PricingMode::Fixed, base_price: Money::from_cents(100) },
/// #     variants: vec![], stock: Quantity::from_units(10), is_active: true,
/// #     created_at: Utc::now(), updated_at: Utc::now(),
/// # };
/// let line = CartLine {
///     product: product.id.clone(),
///     quantity: Some(Quantity::from_units(3)),
///     amount: None,
///     variant: None,
/// };
/// let resolved = resolve_line(&product, &line).unwrap();
/// assert_eq!(resolved.line_total, Money::from_cents(300));
/// ```
pub fn resolve_line(product: &Product, line: &CartLine) -> Result<ResolvedLine, LineError> {
    if product.product_type == ProductType::Fuel {
        return resolve_fuel(product, line.amount).map_err(LineError::from);
    }

    let quantity = requested_quantity(product, line)?;
    let base_price = product.pricing.base_price;

    if let Some(variant_id) = &line.variant {
        let variant = product
            .variant(variant_id)
            .ok_or_else(|| PricingError::VariantNotFound {
                product_id: product.id.clone(),
                variant_id: variant_id.clone(),
            })?;

        let unit_price = base_price
            .checked_add(variant.price_offset)
            .ok_or(PricingError::AmountOverflow)?;
        if unit_price.is_negative() {
            return Err(PricingError::NegativeUnitPrice {
                variant_id: variant.id.clone(),
                unit_price,
            }
            .into());
        }

        return Ok(ResolvedLine {
            variant: Some(variant.clone()),
            ..priced(unit_price, quantity)?
        });
    }

    if let PricingMode::Dynamic { rules } = &product.pricing.mode {
        return match dynamic_unit_price(base_price, quantity, rules.first()) {
            Ok(unit_price) => Ok(priced(unit_price, quantity)?),
            Err(fallback) => Ok(ResolvedLine {
                fallback: Some(fallback),
                ..priced(base_price, quantity)?
            }),
        };
    }

    Ok(priced(base_price, quantity)?)
}

fn priced(unit_price: Money, quantity: Quantity) -> Result<ResolvedLine, PricingError> {
    let line_total = unit_price
        .multiply_quantity(quantity)
        .ok_or(PricingError::AmountOverflow)?;
    Ok(ResolvedLine {
        unit_price,
        quantity,
        line_total,
        unit_label: None,
        variant: None,
        fallback: None,
    })
}

/// Fuel: the customer pays an amount, the quantity is derived.
fn resolve_fuel(product: &Product, amount: Option<Money>) -> Result<ResolvedLine, PricingError> {
    let amount = amount.ok_or_else(|| PricingError::InvalidFuelAmount {
        reason: "amount is required".to_string(),
    })?;
    if !amount.is_positive() {
        return Err(PricingError::InvalidFuelAmount {
            reason: format!("must be greater than zero, got {}", amount.cents()),
        });
    }

    let config = match &product.pricing.mode {
        PricingMode::Fuel { config } if config.price_per_unit.is_positive() => config,
        _ => {
            return Err(PricingError::FuelConfigMissing {
                product_id: product.id.clone(),
            })
        }
    };

    let quantity = amount
        .divide_by_unit_price(config.price_per_unit)
        .ok_or(PricingError::AmountOverflow)?;

    Ok(ResolvedLine {
        unit_price: config.price_per_unit,
        quantity,
        line_total: amount,
        unit_label: Some(config.display_unit.clone()),
        variant: None,
        fallback: None,
    })
}

/// Evaluates the first dynamic rule. `Err` carries why the base price must
/// be used instead.
fn dynamic_unit_price(
    base_price: Money,
    quantity: Quantity,
    rule: Option<&crate::types::PricingRule>,
) -> Result<Money, PricingFallback> {
    let rule = rule.ok_or_else(|| PricingFallback {
        rule: None,
        reason: "no pricing rules defined".to_string(),
    })?;
    let fallback = |reason: String| PricingFallback {
        rule: Some(rule.name.clone()),
        reason,
    };

    let scope = Scope {
        base_price: base_price.cents() as f64,
        quantity: quantity.as_f64(),
        weight: quantity.as_f64(),
    };
    let value = formula::evaluate(&rule.formula, &scope).map_err(|e| fallback(e.to_string()))?;

    if value < 0.0 {
        return Err(fallback(format!("formula produced a negative price ({})", value)));
    }
    let rounded = value.round();
    if rounded >= i64::MAX as f64 {
        return Err(fallback("formula result out of range".to_string()));
    }
    Ok(Money::from_cents(rounded as i64))
}

// =============================================================================
// Unit Tests
// =============================================================================
