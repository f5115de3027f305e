//! # kubebill
//!
//! Billing API and schema migrations for a container hosting panel, usable
//! both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kubebill::billing::BillingFactory;
//! use kubebill::server::{AppState, create_router};
//! use kubebill::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/kubebill.db")?;
//! store.initialize()?;
//!
//! let state = Arc::new(AppState::new(Arc::new(store), BillingFactory::new()));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `kubebill` binary. Disable with `default-features = false`.

pub mod auth;
pub mod billing;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
