//! # Repository Module
//!
//! Database repository implementations for Tally.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and their owners                        │
//! │                                                                         │
//! │  HTTP handler / CheckoutEngine                                         │
//! │       │                                                                 │
//! │       │  db.orders().get_by_reference("ORD-20260131-04217")            │
//! │       ▼                                                                 │
//! │  ProductRepository   Catalog Store    (read + conditional decrement)   │
//! │  StoreRepository     Store Registry   (read-only for checkout)         │
//! │  OrderRepository     Order Ledger     (append via CheckoutEngine only) │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog reads, inserts and stock corrections
//! - [`store::StoreRepository`] - Stores and their staff
//! - [`order::OrderRepository`] - Order ledger lookups

pub mod order;
pub mod product;
pub mod store;
