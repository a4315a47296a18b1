//! Resolves field chains against a [`Database`](crate::schema_catalog::Database)
//! and assembles the joins they need.

mod scope;
mod select_builder;

pub use scope::{QueryScope, ResolvedField, DEFAULT_MAX_JOINS};
pub use select_builder::{compile_select, SelectBuilder};
