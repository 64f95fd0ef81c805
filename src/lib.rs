//! # Dockhand
//!
//! Control plane for a self-hostable multi-tenant deployment platform,
//! usable both as a standalone binary and as a library.
//!
//! It answers who may act on which managed resource (a hierarchical,
//! role-based authorization engine), drives the lifecycle that exposes a
//! running workload to the internet (domain binding, ownership
//! verification, TLS issuance, reverse-proxy publication), and issues
//! scoped, signed credentials for the platform's container registry.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dockhand::rbac::Evaluator;
//! use dockhand::store::{SqliteStore, Store};
//! use dockhand::types::{Id, Permission};
//!
//! let store = Arc::new(SqliteStore::new("./data/dockhand.db").unwrap());
//! store.initialize().unwrap();
//!
//! let evaluator = Evaluator::new(store, site_admin_org_id);
//! let grants = evaluator
//!     .evaluate(principal, &groups, "acme::deployer", Permission::DOMAIN_ADD)
//!     .unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the CLI binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod exposure;
pub mod rbac;
pub mod registry;
pub mod server;
pub mod store;
pub mod types;
