//! # WasteWise Common Library
//!
//! Shared code for the WasteWise backend and its maintenance tooling:
//! - Error and result types
//! - Configuration resolution (CLI/ENV → TOML → defaults)
//! - Database initialization and schema
//! - Entity models and repository functions
//! - Plan and subscription constants

pub mod config;
pub mod db;
pub mod error;
pub mod plan;

pub use error::{Error, Result};
pub use plan::{Plan, SubscriptionStatus};
