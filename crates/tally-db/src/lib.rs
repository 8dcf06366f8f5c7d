//! # tally-db: Persistence and Checkout for Tally
//!
//! SQLite storage through sqlx, and the checkout engine that writes orders.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Data Flow                                  │
//! │                                                                         │
//! │  POST /api/v1/orders (tally-api)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ CheckoutEngine│    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (checkout.rs) │───►│ ProductRepo   │    │  (embedded)  │  │   │
//! │  │   │               │    │ StoreRepo     │    │              │  │   │
//! │  │   │ one tx/order  │    │ OrderRepo     │    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │            │                    │                               │   │
//! │  │            └──────── Database (pool.rs) ────────┘               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign keys on)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Catalog, store registry and order ledger
//! - [`checkout`] - The order-creation transaction
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{CheckoutRequest, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./tally.db")).await?;
//!
//! let order = db
//!     .checkout()
//!     .create_order(CheckoutRequest { store_id, cashier, lines })
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutEngine, CheckoutRequest};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::store::StoreRepository;
