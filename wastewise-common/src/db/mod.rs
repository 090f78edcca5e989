//! Database layer
//!
//! Schema creation plus one repository module per entity. Repository
//! functions take a `SqliteExecutor` where they may run inside a
//! transaction, and `&SqlitePool` otherwise.

pub mod articles;
pub mod init;
pub mod subscriptions;
pub mod users;
pub mod waste_banks;

pub use init::{init_database, init_in_memory};
