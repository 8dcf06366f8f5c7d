//! # Seed Data Generator
//!
//! Populates a database with one store and one product per pricing mode,
//! enough to exercise every checkout path by hand.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db (default)
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//!
//! # Specify the company the records belong to
//! cargo run -p tally-db --bin seed -- --company acme
//! ```
//!
//! ## Generated Records
//! - Store "Main Street" with a supervisor and one cashier
//! - Fixed price:   "Cola 330ml", 48 in stock
//! - Variants:      "T-Shirt" with Small / Large offsets
//! - Dynamic:       "Apples" sold by weight, bulk formula
//! - Fuel:          "Diesel" sold by amount, price per litre

use chrono::Utc;
use std::env;
use tally_core::{
    FuelConfig, Money, Pricing, PricingMode, PricingRule, Product, ProductType, Quantity, Store,
    Variant,
};
use tally_db::{Database, DbConfig};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");
    let mut company_id = String::from("demo-company");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--company" | "-c" => {
                if i + 1 < args.len() {
                    company_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./tally_dev.db)");
                println!("  -c, --company <ID>     Company id for all records (default: demo-company)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Company:  {}", company_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let supervisor_id = Uuid::new_v4().to_string();
    let cashier_id = Uuid::new_v4().to_string();

    let store = Store {
        id: Uuid::new_v4().to_string(),
        company_id: company_id.clone(),
        name: "Main Street".to_string(),
        is_active: true,
        supervisor_id: Some(supervisor_id.clone()),
        employees: vec![cashier_id.clone()],
        created_at: Utc::now(),
    };
    db.stores().insert(&store).await?;

    println!();
    println!("Store");
    println!("  id:          {}", store.id);
    println!("  supervisor:  {}", supervisor_id);
    println!("  cashier:     {}", cashier_id);

    println!();
    println!("Products");
    for product in catalog(&company_id) {
        db.products().insert(&product).await?;
        println!(
            "  {:<8} {:<12} {}",
            product.pricing.mode.name(),
            product.name,
            product.id
        );
        for variant in &product.variants {
            println!("           └─ {:<9} {}", variant.name, variant.id);
        }
    }

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// One product per pricing mode.
fn catalog(company_id: &str) -> Vec<Product> {
    let product = |name: &str, product_type: ProductType, mode: PricingMode, base_price: i64, stock: Quantity| {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: name.to_string(),
            barcode: None,
            product_type,
            pricing: Pricing {
                mode,
                base_price: Money::from_cents(base_price),
            },
            variants: vec![],
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    };

    let mut cola = product(
        "Cola 330ml",
        ProductType::Quantity,
        PricingMode::Fixed,
        150,
        Quantity::from_units(48),
    );
    cola.barcode = Some("5449000000996".to_string());

    let mut shirt = product(
        "T-Shirt",
        ProductType::Quantity,
        PricingMode::PerUnit,
        1500,
        Quantity::from_units(20),
    );
    shirt.variants = vec![
        Variant {
            id: Uuid::new_v4().to_string(),
            name: "Small".to_string(),
            price_offset: Money::from_cents(-200),
        },
        Variant {
            id: Uuid::new_v4().to_string(),
            name: "Large".to_string(),
            price_offset: Money::from_cents(300),
        },
    ];

    let apples = product(
        "Apples",
        ProductType::Weight,
        PricingMode::Dynamic {
            rules: vec![PricingRule {
                name: "bulk discount".to_string(),
                formula: "max(basePrice * 0.8, basePrice - floor(quantity) * 8)".to_string(),
            }],
        },
        320,
        Quantity::from_units(150),
    );

    let diesel = product(
        "Diesel",
        ProductType::Fuel,
        PricingMode::Fuel {
            config: FuelConfig {
                price_per_unit: Money::from_cents(600),
                display_unit: "L".to_string(),
            },
        },
        600,
        Quantity::zero(),
    );

    vec![cola, shirt, apples, diesel]
}
