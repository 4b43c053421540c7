//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! rowset-core test suite.
//!
//! # Modules
//!
//! - `fixtures`: The `Device`/`Reading` fixture entities and sample data
//! - `builders`: Builder patterns for test data construction
//! - `memory`: An independent in-memory oracle for paged queries
//! - `database`: Database test helpers and container management
//! - `generators`: Property-based test data generators

pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;
pub mod memory;

pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
pub use memory::*;
