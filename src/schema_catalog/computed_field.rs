//! Computed fields: attributes backed by an expression instead of a column.
//!
//! A raw fragment is only parsed when the field is resolved (or when the
//! startup validator dry-runs it), so a malformed fragment surfaces as
//! [`SchemaError::FieldExpressionParse`] with the field name and fragment.

use super::errors::SchemaError;
use super::expression_parser::parse_field_expression;
use crate::sql_ast::SqlExpr;

#[derive(Debug, Clone, PartialEq)]
pub enum ComputedField {
    /// Single ClickHouse scalar expression, e.g. `concat(first, ' ', last)`
    Raw(String),
    /// Expression tree; `SqlExpr::Chain` leaves refer to fields of the same table
    Tree(SqlExpr),
}

impl ComputedField {
    pub fn raw(fragment: impl Into<String>) -> Self {
        ComputedField::Raw(fragment.into())
    }

    pub fn tree(expr: SqlExpr) -> Self {
        ComputedField::Tree(expr)
    }

    /// Body of the field with unresolved chains, ready for binding
    pub fn expression(&self, field_name: &str) -> Result<SqlExpr, SchemaError> {
        match self {
            ComputedField::Raw(fragment) => parse_field_expression(field_name, fragment),
            ComputedField::Tree(expr) => Ok(expr.clone()),
        }
    }
}
