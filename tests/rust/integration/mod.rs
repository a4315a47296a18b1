//! Integration tests - full compilation against the analytics schema, and
//! the row-level meaning of the emitted collapse subqueries.

mod collapse_semantics_tests;
mod sql_compilation_tests;
