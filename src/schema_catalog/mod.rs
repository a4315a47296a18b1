//! Logical schema catalog: tables, fields, relations and the registry that
//! holds them.

mod analytics_schema;
pub mod collapse;
pub mod computed_field;
pub mod config;
pub mod database;
pub mod errors;
pub mod expression_parser;
pub mod field;
pub mod lazy_table;
pub mod schema_validator;
pub mod table;

pub use collapse::VersionedCollapse;
pub use computed_field::ComputedField;
pub use config::SchemaDefinition;
pub use database::{Database, DatabaseBuilder};
pub use errors::SchemaError;
pub use expression_parser::parse_field_expression;
pub use field::{FieldDescriptor, FieldKind};
pub use lazy_table::{JoinRequest, LazyJoinBuilder, LazyTable, RequestedFields};
pub use schema_validator::{SchemaValidator, ValidationSummary};
pub use table::{Attribute, FieldTraverser, Table, TableBuilder, TableSource};
