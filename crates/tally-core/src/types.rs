//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Store       │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  product_type   │   │  employees      │   │  reference      │       │
//! │  │  pricing        │   │  supervisor_id  │   │  items          │       │
//! │  │  variants       │   │  is_active      │   │  total          │       │
//! │  │  stock          │   └─────────────────┘   │  status         │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  PricingMode    │   │  OrderStatus    │   │ PaymentStatus   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Fixed          │   │  Pending        │   │  Pending        │       │
//! │  │  PerUnit        │   │  Completed      │   │  Paid           │       │
//! │  │  Dynamic(rules) │   │  Cancelled      │   │  PartiallyPaid  │       │
//! │  │  Fuel(config)   │   │  Refunded       │   │  Failed         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! - `id`: UUID v4 - immutable, used for relations
//! - Business ID: (barcode, order reference) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Product
// =============================================================================

/// What a product measures. Decides how quantities are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// Discrete units. Quantities must be whole.
    Quantity,
    /// Sold by weight; fractional quantities allowed.
    Weight,
    /// Sold by volume; fractional quantities allowed.
    Volume,
    /// Metered by amount paid. Never touches stock.
    Fuel,
}

impl ProductType {
    /// Fuel is metered; everything else decrements stock.
    #[inline]
    pub fn tracks_stock(&self) -> bool {
        !matches!(self, ProductType::Fuel)
    }

    /// Whether fractional quantities are meaningful for this type.
    #[inline]
    pub fn allows_fractional(&self) -> bool {
        !matches!(self, ProductType::Quantity)
    }
}

/// Configuration for metered fuel sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelConfig {
    /// Price of one display unit (e.g. one litre).
    pub price_per_unit: Money,
    /// Label printed on the order line ("L", "gal").
    pub display_unit: String,
}

/// A named tier formula for dynamic pricing.
///
/// The formula is evaluated by [`crate::formula`] against
/// `{basePrice, quantity, weight}` and yields a unit price in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub name: String,
    pub formula: String,
}

/// How a product's unit price is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum PricingMode {
    /// `base_price` per unit.
    Fixed,
    /// `base_price` per unit of weight/volume.
    PerUnit,
    /// First rule's formula; falls back to `base_price` if it fails.
    Dynamic { rules: Vec<PricingRule> },
    /// Metered by amount; see [`FuelConfig`].
    Fuel { config: FuelConfig },
}

impl PricingMode {
    /// Short name for storage and logs.
    pub fn name(&self) -> &'static str {
        match self {
            PricingMode::Fixed => "fixed",
            PricingMode::PerUnit => "perUnit",
            PricingMode::Dynamic { .. } => "dynamic",
            PricingMode::Fuel { .. } => "fuel",
        }
    }
}

/// Pricing configuration of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub mode: PricingMode,
    pub base_price: Money,
}

/// A named price adjustment selected at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub name: String,
    /// Added to `base_price`. May be negative.
    pub price_offset: Money,
}

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Company (tenant) this product belongs to.
    pub company_id: String,

    /// Display name, snapshotted onto order lines.
    pub name: String,

    /// Barcode (EAN-13, UPC-A, ...). Globally unique when present.
    pub barcode: Option<String>,

    pub product_type: ProductType,

    pub pricing: Pricing,

    /// Ordered list of price variants.
    pub variants: Vec<Variant>,

    /// Current stock level. Never negative.
    pub stock: Quantity,

    /// Inactive products cannot be sold.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Looks up a variant by id.
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Returns true if `quantity` can be taken from stock.
    ///
    /// Fuel is metered and always sellable.
    pub fn can_sell(&self, quantity: Quantity) -> bool {
        if !self.product_type.tracks_stock() {
            return true;
        }
        self.stock >= quantity
    }
}

// =============================================================================
// Store Registry
// =============================================================================

/// A store and the staff allowed to transact for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub is_active: bool,
    pub supervisor_id: Option<String>,
    pub employees: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// True if `user_id` is an employee or the supervisor of this store.
    ///
    /// Does not look at `is_active`; callers check that separately so the
    /// two failures can be told apart.
    pub fn is_staff(&self, user_id: &str) -> bool {
        self.supervisor_id.as_deref() == Some(user_id)
            || self.employees.iter().any(|e| e == user_id)
    }
}

// =============================================================================
// Principal
// =============================================================================

/// Role carried by an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Cashier,
}

/// The authenticated caller. Trusted as given; credentials are verified
/// upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created by checkout.
    #[default]
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

/// Payment status. Recorded only; no gateway processing happens here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    PartiallyPaid,
    Failed,
}

// =============================================================================
// Order
// =============================================================================

/// An immutable record of one checkout.
///
/// `status`, `total`, `items[].product`, `items[].quantity` and `createdAt`
/// are read by reporting; their meaning must not change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    /// `ORD-<YYYYMMDD>-<5 digits>`, unique.
    pub reference: String,
    pub store: String,
    pub cashier: String,
    pub created_by: String,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sum of all line totals.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(|i| i.total).sum()
    }
}

/// A line of an order.
/// Uses the snapshot pattern: names are frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product id.
    pub product: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    pub unit_price: Money,
    /// `unit_price × quantity`, or the exact amount paid for fuel.
    pub total: Money,
    /// Variant id, if one was selected.
    pub variant: Option<String>,
    /// Variant name at time of sale (frozen).
    pub variant_name: Option<String>,
    /// Display unit for metered lines ("L").
    pub unit_label: Option<String>,
}

// =============================================================================
// Cart Line
// =============================================================================

/// One requested product in a checkout. Exists only for one call.
///
/// Exactly one of `quantity` / `amount` is meaningful: `amount` for fuel,
/// `quantity` for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product: String,
    pub quantity: Option<Quantity>,
    pub amount: Option<Money>,
    pub variant: Option<String>,
}

/// A cart line as it arrives on the wire.
///
/// `quantity` and `amount` stay untyped until
/// [`crate::validation::parse_cart_lines`] so a non-numeric value can be
/// reported against its line index instead of failing the whole body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub variant: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store {
            id: "s1".to_string(),
            company_id: "c1".to_string(),
            name: "Main".to_string(),
            is_active: true,
            supervisor_id: Some("boss".to_string()),
            employees: vec!["alice".to_string()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_store_staff() {
        let s = store();
        assert!(s.is_staff("alice"));
        assert!(s.is_staff("boss"));
        assert!(!s.is_staff("mallory"));
    }

    #[test]
    fn test_status_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }

    #[test]
    fn test_payment_status_wire_name() {
        let json = serde_json::to_string(&PaymentStatus::PartiallyPaid).unwrap();
        assert_eq!(json, "\"partially_paid\"");
    }

    #[test]
    fn test_pricing_mode_json_shape() {
        let mode = PricingMode::Fuel {
            config: FuelConfig {
                price_per_unit: Money::from_cents(600),
                display_unit: "L".to_string(),
            },
        };
        let json = serde_json::to_value(&mode).unwrap();
        assert_eq!(json["mode"], "fuel");
        assert_eq!(json["config"]["pricePerUnit"], 600);

        let back: PricingMode = serde_json::from_value(json).unwrap();
        assert_eq!(back, mode);
    }

    #[test]
    fn test_product_type_stock_tracking() {
        assert!(ProductType::Quantity.tracks_stock());
        assert!(ProductType::Weight.tracks_stock());
        assert!(!ProductType::Fuel.tracks_stock());
        assert!(!ProductType::Quantity.allows_fractional());
        assert!(ProductType::Volume.allows_fractional());
    }
}
