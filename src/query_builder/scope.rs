//! Per-query field resolution.
//!
//! A [`QueryScope`] resolves dotted chains starting at one root table alias.
//! Each hop is dispatched on the attribute kind:
//!
//! - field: column on the current alias (or a JSON property path past it)
//! - nested/virtual table: same alias, the nested table's column names
//! - lazy table: registers a join (deduplicated per query) and continues on
//!   the joined alias; every column read there is added to that join's
//!   requested fields
//! - traverser: the chain it aliases is spliced in, resolved from the same table
//! - computed: the body's chains are resolved on the declaring table
//!
//! Joins are only materialised in [`QueryScope::finish`], once every field of
//! the query has contributed its columns.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::schema_catalog::{
    Attribute, Database, FieldKind, JoinRequest, LazyTable, RequestedFields, SchemaError, Table,
    TableSource,
};
use crate::sql_ast::{Join, SqlExpr};

pub const DEFAULT_MAX_JOINS: u32 = 16;

/// Resolution result for one chain
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub expr: SqlExpr,
    /// `None` for computed fields
    pub kind: Option<FieldKind>,
}

struct PendingJoin<'db> {
    from_alias: String,
    from_column: String,
    to_alias: String,
    lazy: &'db LazyTable,
    requested: RequestedFields,
}

#[derive(Clone)]
struct Cursor<'db> {
    table: &'db Table,
    alias: String,
    /// Attribute path inside `alias` through nested tables, `__`-terminated
    prefix: String,
    source: Option<&'db str>,
    join: Option<usize>,
}

pub struct QueryScope<'db> {
    db: &'db Database,
    root_table: &'db Table,
    root_alias: String,
    joins: Vec<PendingJoin<'db>>,
    /// (from alias, attribute path) -> index into `joins`
    join_index: HashMap<(String, String), usize>,
    used_aliases: HashSet<String>,
    max_joins: u32,
    /// Accept chains that stop on a table or lazy relation
    probing: bool,
}

impl<'db> QueryScope<'db> {
    /// Scope over `table`, aliased by its own name
    pub fn new(db: &'db Database, table: &str) -> Result<Self, SchemaError> {
        Self::with_alias(db, table, table)
    }

    pub fn with_alias(db: &'db Database, table: &str, alias: &str) -> Result<Self, SchemaError> {
        let root_table = db.get_table(table)?;
        let mut used_aliases = HashSet::new();
        used_aliases.insert(alias.to_string());
        Ok(QueryScope {
            db,
            root_table,
            root_alias: alias.to_string(),
            joins: Vec::new(),
            join_index: HashMap::new(),
            used_aliases,
            max_joins: DEFAULT_MAX_JOINS,
            probing: false,
        })
    }

    pub fn with_max_joins(mut self, max_joins: u32) -> Self {
        self.max_joins = max_joins;
        self
    }

    pub fn root_table(&self) -> &'db Table {
        self.root_table
    }

    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    /// Number of distinct lazy joins registered so far
    pub fn join_count(&self) -> usize {
        self.joins.len()
    }

    /// Resolve `person.properties.email` style input
    pub fn resolve_dotted(&mut self, dotted: &str) -> Result<ResolvedField, SchemaError> {
        let chain: Vec<String> = dotted.split('.').map(str::to_string).collect();
        self.resolve(&chain)
    }

    pub fn resolve<S: AsRef<str>>(&mut self, chain: &[S]) -> Result<ResolvedField, SchemaError> {
        let chain: Vec<String> = chain.iter().map(|s| s.as_ref().to_string()).collect();
        let cursor = Cursor {
            table: self.root_table,
            alias: self.root_alias.clone(),
            prefix: String::new(),
            source: self.root_table.physical_source(),
            join: None,
        };
        let mut visiting = Vec::new();
        self.resolve_chain(cursor, &chain, &mut visiting)
    }

    /// Check that `chain` resolves, allowing it to end on a relation the way
    /// traversers such as `events.person` do.
    pub(crate) fn probe<S: AsRef<str>>(&mut self, chain: &[S]) -> Result<(), SchemaError> {
        self.probing = true;
        let result = self.resolve(chain).map(|_| ());
        self.probing = false;
        result
    }

    /// Build every registered join in registration order.
    pub fn finish(self) -> Result<Vec<Join>, SchemaError> {
        self.joins
            .iter()
            .map(|pending| {
                pending.lazy.build_join(&JoinRequest {
                    from_alias: &pending.from_alias,
                    from_column: &pending.from_column,
                    to_alias: &pending.to_alias,
                    requested_fields: &pending.requested,
                })
            })
            .collect()
    }

    fn resolve_chain(
        &mut self,
        cursor: Cursor<'db>,
        chain: &[String],
        visiting: &mut Vec<(String, String)>,
    ) -> Result<ResolvedField, SchemaError> {
        let table: &'db Table = cursor.table;
        let Some((head, rest)) = chain.split_first() else {
            return Err(SchemaError::IncompleteChain {
                table: table.name().to_string(),
                field: String::new(),
            });
        };
        let incomplete = || SchemaError::IncompleteChain {
            table: table.name().to_string(),
            field: head.clone(),
        };

        match table.get_field(head)? {
            Attribute::Field(field) => {
                self.request(&cursor, &field.name);
                let column = SqlExpr::column(cursor.alias.clone(), field.name.clone());
                if rest.is_empty() {
                    Ok(ResolvedField {
                        expr: column,
                        kind: Some(field.kind),
                    })
                } else if field.supports_property_access() {
                    Ok(ResolvedField {
                        expr: SqlExpr::JsonProperty {
                            expr: Box::new(column),
                            path: rest.to_vec(),
                        },
                        kind: Some(FieldKind::String),
                    })
                } else {
                    Err(incomplete())
                }
            }
            Attribute::Table(nested) => {
                if rest.is_empty() {
                    return self.relation_end(chain, incomplete());
                }
                let source = match nested.source() {
                    TableSource::Virtual => cursor.source,
                    TableSource::Physical(s) if Some(s.as_str()) == cursor.source => cursor.source,
                    TableSource::Physical(s) => {
                        return Err(SchemaError::invalid_schema(format!(
                            "`{}.{}` reads from `{}` but is not a lazy table",
                            table.name(),
                            head,
                            s
                        )));
                    }
                };
                let next = Cursor {
                    table: nested.as_ref(),
                    alias: cursor.alias.clone(),
                    prefix: format!("{}{}__", cursor.prefix, head),
                    source,
                    join: cursor.join,
                };
                self.resolve_chain(next, rest, visiting)
            }
            Attribute::Lazy(lazy) => {
                if rest.is_empty() {
                    return self.relation_end(chain, incomplete());
                }
                let from_column = self.lazy_from_column(&cursor, head, lazy)?;
                let target = self.db.get_table(&lazy.table)?;
                let join = self.register_join(&cursor, head, lazy, from_column)?;
                let next = Cursor {
                    table: target,
                    alias: self.joins[join].to_alias.clone(),
                    prefix: String::new(),
                    source: target.physical_source(),
                    join: Some(join),
                };
                self.resolve_chain(next, rest, visiting)
            }
            Attribute::Traverser(traverser) => {
                enter(table, head, visiting)?;
                let mut redirected = traverser.chain.clone();
                redirected.extend_from_slice(rest);
                let result = self.resolve_chain(cursor, &redirected, visiting);
                visiting.pop();
                result
            }
            Attribute::Computed(computed) => {
                if !rest.is_empty() {
                    return Err(incomplete());
                }
                enter(table, head, visiting)?;
                let result = computed.expression(head).and_then(|body| {
                    body.try_map_chains(&mut |inner: &[String]| {
                        self.resolve_chain(cursor.clone(), inner, visiting)
                            .map(|resolved| resolved.expr)
                    })
                });
                visiting.pop();
                result.map(|expr| ResolvedField { expr, kind: None })
            }
        }
    }

    fn relation_end(
        &self,
        chain: &[String],
        err: SchemaError,
    ) -> Result<ResolvedField, SchemaError> {
        if self.probing {
            Ok(ResolvedField {
                expr: SqlExpr::chain(chain),
                kind: None,
            })
        } else {
            Err(err)
        }
    }

    /// Column on the current table holding the relation key; it is requested
    /// like any other column when the current table is itself joined.
    fn lazy_from_column(
        &mut self,
        cursor: &Cursor<'db>,
        head: &str,
        lazy: &LazyTable,
    ) -> Result<String, SchemaError> {
        match cursor.table.get_field(&lazy.from_field)? {
            Attribute::Field(field) => {
                self.request(cursor, &field.name);
                Ok(field.name.clone())
            }
            other => Err(SchemaError::invalid_schema(format!(
                "lazy table `{}.{}` joins on `{}`, which is a {} and not a column",
                cursor.table.name(),
                head,
                lazy.from_field,
                other.kind_name()
            ))),
        }
    }

    fn request(&mut self, cursor: &Cursor<'db>, column: &str) {
        if let Some(join) = cursor.join {
            self.joins[join].requested.insert(column);
        }
    }

    fn register_join(
        &mut self,
        cursor: &Cursor<'db>,
        head: &str,
        lazy: &'db LazyTable,
        from_column: String,
    ) -> Result<usize, SchemaError> {
        let path = format!("{}{}", cursor.prefix, head);
        let key = (cursor.alias.clone(), path.clone());
        if let Some(&existing) = self.join_index.get(&key) {
            return Ok(existing);
        }
        if self.joins.len() >= self.max_joins as usize {
            return Err(SchemaError::TooManyJoins {
                limit: self.max_joins,
            });
        }

        let to_alias = self.unique_alias(format!("{}__{}", cursor.alias, path));
        debug!(
            "Registering lazy join {}.{} -> {} ({})",
            cursor.alias,
            path,
            to_alias,
            lazy.join_builder.relation()
        );
        // The key is always projected, so a hop that reads no columns (a
        // constant computed field) still yields a valid collapse.
        let mut requested = RequestedFields::new();
        requested.insert(lazy.join_builder.key_column());
        self.joins.push(PendingJoin {
            from_alias: cursor.alias.clone(),
            from_column,
            to_alias,
            lazy,
            requested,
        });
        let index = self.joins.len() - 1;
        self.join_index.insert(key, index);
        Ok(index)
    }

    /// First free alias among `base`, `base_1`, `base_2`, ...
    fn unique_alias(&mut self, base: String) -> String {
        if self.used_aliases.insert(base.clone()) {
            return base;
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{}_{}", base, counter);
            if self.used_aliases.insert(candidate.clone()) {
                warn!("Alias collision: renaming '{}' -> '{}'", base, candidate);
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Mark `(table, field)` as being expanded; revisiting it is a cycle.
fn enter(
    table: &Table,
    field: &str,
    visiting: &mut Vec<(String, String)>,
) -> Result<(), SchemaError> {
    let key = (table.name().to_string(), field.to_string());
    if visiting.contains(&key) {
        let mut path: Vec<String> = visiting.iter().map(|(t, f)| format!("{t}.{f}")).collect();
        path.push(format!("{}.{}", key.0, key.1));
        return Err(SchemaError::Cycle {
            table: key.0,
            field: key.1,
            path: path.join(" -> "),
        });
    }
    visiting.push(key);
    Ok(())
}
