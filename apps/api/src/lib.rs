//! # Tally API
//!
//! REST server in front of the checkout engine and the order ledger.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            API Server                                   │
//! │                                                                         │
//! │  POS terminal ──► HTTP (8080) ──► TraceLayer ──► routes                │
//! │                                                    │                    │
//! │                        AuthUser (Bearer JWT) ◄─────┤                    │
//! │                                                    ▼                    │
//! │                                   tally-db: CheckoutEngine / ledger     │
//! │                                                    │                    │
//! │                                                    ▼                    │
//! │                                                 SQLite                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables (or the same keys in `tally.toml`):
//! - `TALLY_PORT` - HTTP port (default: 8080)
//! - `TALLY_DATABASE_PATH` - SQLite file (default: ./tally.db)
//! - `TALLY_DATABASE_MAX_CONNECTIONS` - pool size (default: 8)
//! - `TALLY_JWT_SECRET` - HS256 key for bearer tokens
//! - `TALLY_CHECKOUT_TIMEOUT_MS` - deadline for one checkout (default: 5000)

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

// Re-exports
pub use config::ApiConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
