//! Expression-tree vocabulary produced by schema resolution.
//!
//! The resolver never emits SQL text directly: it builds [`SqlExpr`] nodes and
//! [`Join`] items that a query compiler splices into its own `SELECT`. The
//! [`ToSql`] implementations render them as ClickHouse SQL.

pub mod render_expr;
mod to_sql;

pub use render_expr::{
    ColumnRef, FromTable, FunctionCall, Join, JoinType, Literal, Operator,
    OperatorApplication, SelectQuery, SqlExpr,
};

pub trait ToSql {
    fn to_sql(&self) -> String;
}
