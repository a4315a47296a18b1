//! EventQL - logical analytics schema over ClickHouse append logs
//!
//! This crate resolves dotted field chains written against a logical schema
//! (`events.person.properties.email`) into ClickHouse expression trees:
//! - Typed schema declaration (fields, virtual tables, lazy relations, traversers)
//! - Versioned-collapse joins over person / distinct-id append logs
//! - Wildcard ("splash") expansion
//! - Computed fields backed by SQL fragments or expression trees

pub mod config;
pub mod query_builder;
pub mod schema_catalog;
pub mod sql_ast;
