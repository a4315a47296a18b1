//! Lazy relations: attributes that cross a physical-table boundary.
//!
//! A [`LazyTable`] names the target table in the [`Database`](super::Database)
//! and carries the [`LazyJoinBuilder`] that materialises it. Builders receive
//! the exact set of columns the query reads from the far side.

use std::fmt;
use std::sync::Arc;

use super::errors::SchemaError;
use crate::sql_ast::Join;

/// Ordered, duplicate-free set of physical columns requested from a relation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedFields(Vec<String>);

impl RequestedFields {
    pub fn new() -> Self {
        RequestedFields(Vec::new())
    }

    /// Add a column; returns false if it was already requested
    pub fn insert(&mut self, column: impl Into<String>) -> bool {
        let column = column.into();
        if self.0.contains(&column) {
            false
        } else {
            self.0.push(column);
            true
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|c| c == column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for RequestedFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut fields = RequestedFields::new();
        for column in iter {
            fields.insert(column);
        }
        fields
    }
}

/// Inputs of one join materialisation
#[derive(Debug, Clone, Copy)]
pub struct JoinRequest<'a> {
    /// Alias of the table initiating the join
    pub from_alias: &'a str,
    /// Column on the initiating table holding the relation key
    pub from_column: &'a str,
    /// Alias assigned to the joined subquery
    pub to_alias: &'a str,
    pub requested_fields: &'a RequestedFields,
}

/// Builds the join expression for one relation.
///
/// Implementations must fail with [`SchemaError::EmptyFieldRequest`] when
/// nothing is requested instead of emitting a useless join.
pub trait LazyJoinBuilder: fmt::Debug + Send + Sync {
    /// Relation name used in diagnostics
    fn relation(&self) -> &str;

    /// Physical table the join reads from
    fn physical_source(&self) -> &str;

    /// Column on the joined side matched against the initiating table
    fn key_column(&self) -> &str;

    fn build_join(&self, request: &JoinRequest<'_>) -> Result<Join, SchemaError>;
}

/// A relation reachable only through a join
#[derive(Debug, Clone)]
pub struct LazyTable {
    /// Column on the owning table that holds the relation key
    pub from_field: String,
    /// Registry name of the table the relation lands on
    pub table: String,
    pub join_builder: Arc<dyn LazyJoinBuilder>,
}

impl LazyTable {
    pub fn new(
        from_field: impl Into<String>,
        table: impl Into<String>,
        join_builder: Arc<dyn LazyJoinBuilder>,
    ) -> Self {
        LazyTable {
            from_field: from_field.into(),
            table: table.into(),
            join_builder,
        }
    }

    pub fn build_join(&self, request: &JoinRequest<'_>) -> Result<Join, SchemaError> {
        log::debug!(
            "Building lazy join `{}`: {}.{} -> {} ({} fields)",
            self.join_builder.relation(),
            request.from_alias,
            request.from_column,
            request.to_alias,
            request.requested_fields.len()
        );
        self.join_builder.build_join(request)
    }
}
