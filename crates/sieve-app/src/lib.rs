//! Sieve - per-app proxy lists from rule subscriptions.
//!
//! This crate backs the `sieve` binary:
//!
//! - [`app::SieveApp`] wires the database to the sync and filter engines
//! - [`settings`] keeps the default mode and export format
//! - [`packages`] reads installed-package lists
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use sieve_app::app::SieveApp;
//! use sieve_core::{HttpConfFetcher, RuleMode};
//! use sieve_storage::Database;
//!
//! let db = Database::new()?;
//! let app = SieveApp::new(db, Arc::new(HttpConfFetcher::new()?), Database::default_conf_dir()?);
//! app.add(None, "https://example.com/cn.conf").await?;
//! let report = app.sync_mode(RuleMode::ByPass).await?;
//! ```

pub mod app;
pub mod packages;
pub mod settings;
