use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum SqlExpr {
    /// Unresolved dotted field chain, e.g. `person.properties.email`.
    /// Only appears in computed-field bodies before resolution.
    Chain(Vec<String>),

    /// Resolved column: `alias.column`, or a bare column inside a subquery
    Column(ColumnRef),

    /// `expr AS alias`
    Alias { expr: Box<SqlExpr>, alias: String },

    Call(FunctionCall),

    OperatorApplicationExp(OperatorApplication),

    Literal(Literal),

    /// Property path inside a JSON string column
    JsonProperty { expr: Box<SqlExpr>, path: Vec<String> },

    /// Array indexing: tags[1]
    ArrayIndex {
        array: Box<SqlExpr>,
        index: Box<SqlExpr>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table_alias: Option<String>,
    pub column: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<SqlExpr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<SqlExpr>,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum Operator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    ModuloDivision,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    And,
    Or,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
}

impl SqlExpr {
    pub fn chain<S: AsRef<str>>(parts: &[S]) -> Self {
        SqlExpr::Chain(parts.iter().map(|p| p.as_ref().to_string()).collect())
    }

    pub fn column(table_alias: impl Into<String>, column: impl Into<String>) -> Self {
        SqlExpr::Column(ColumnRef {
            table_alias: Some(table_alias.into()),
            column: column.into(),
        })
    }

    /// Column without a table qualifier, used inside collapse subqueries
    pub fn bare_column(column: impl Into<String>) -> Self {
        SqlExpr::Column(ColumnRef {
            table_alias: None,
            column: column.into(),
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<SqlExpr>) -> Self {
        SqlExpr::Call(FunctionCall {
            name: name.into(),
            args,
        })
    }

    pub fn alias(expr: SqlExpr, alias: impl Into<String>) -> Self {
        SqlExpr::Alias {
            expr: Box::new(expr),
            alias: alias.into(),
        }
    }

    pub fn binary(operator: Operator, left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::OperatorApplicationExp(OperatorApplication::binary(operator, left, right))
    }

    pub fn integer(value: i64) -> Self {
        SqlExpr::Literal(Literal::Integer(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        SqlExpr::Literal(Literal::String(value.into()))
    }

    /// Name a SELECT item is visible under: the alias, else the column name
    pub fn output_name(&self) -> Option<&str> {
        match self {
            SqlExpr::Alias { alias, .. } => Some(alias),
            SqlExpr::Column(col) => Some(&col.column),
            _ => None,
        }
    }

    /// True when no `Chain` placeholder is left anywhere in the tree
    pub fn is_resolved(&self) -> bool {
        match self {
            SqlExpr::Chain(_) => false,
            SqlExpr::Column(_) | SqlExpr::Literal(_) => true,
            SqlExpr::Alias { expr, .. } | SqlExpr::JsonProperty { expr, .. } => expr.is_resolved(),
            SqlExpr::Call(call) => call.args.iter().all(SqlExpr::is_resolved),
            SqlExpr::OperatorApplicationExp(op) => op.operands.iter().all(SqlExpr::is_resolved),
            SqlExpr::ArrayIndex { array, index } => array.is_resolved() && index.is_resolved(),
        }
    }

    /// Rebuild the tree, replacing every `Chain` with the output of `resolve`.
    pub fn try_map_chains<E, F>(&self, resolve: &mut F) -> Result<SqlExpr, E>
    where
        F: FnMut(&[String]) -> Result<SqlExpr, E>,
    {
        Ok(match self {
            SqlExpr::Chain(chain) => resolve(chain)?,
            SqlExpr::Column(_) | SqlExpr::Literal(_) => self.clone(),
            SqlExpr::Alias { expr, alias } => SqlExpr::Alias {
                expr: Box::new(expr.try_map_chains(resolve)?),
                alias: alias.clone(),
            },
            SqlExpr::Call(call) => SqlExpr::Call(FunctionCall {
                name: call.name.clone(),
                args: call
                    .args
                    .iter()
                    .map(|a| a.try_map_chains(resolve))
                    .collect::<Result<Vec<_>, E>>()?,
            }),
            SqlExpr::OperatorApplicationExp(op) => {
                SqlExpr::OperatorApplicationExp(OperatorApplication {
                    operator: op.operator,
                    operands: op
                        .operands
                        .iter()
                        .map(|o| o.try_map_chains(resolve))
                        .collect::<Result<Vec<_>, E>>()?,
                })
            }
            SqlExpr::JsonProperty { expr, path } => SqlExpr::JsonProperty {
                expr: Box::new(expr.try_map_chains(resolve)?),
                path: path.clone(),
            },
            SqlExpr::ArrayIndex { array, index } => SqlExpr::ArrayIndex {
                array: Box::new(array.try_map_chains(resolve)?),
                index: Box::new(index.try_map_chains(resolve)?),
            },
        })
    }
}

impl OperatorApplication {
    pub fn binary(operator: Operator, left: SqlExpr, right: SqlExpr) -> Self {
        OperatorApplication {
            operator,
            operands: vec![left, right],
        }
    }
}

impl Operator {
    pub fn to_str(&self) -> &'static str {
        match self {
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "*",
            Operator::Division => "/",
            Operator::ModuloDivision => "%",
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThanEqual => ">=",
            Operator::And => "AND",
            Operator::Or => "OR",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SelectQuery {
    pub select: Vec<SqlExpr>,
    pub from: FromTable,
    pub joins: Vec<Join>,
    pub filter: Option<SqlExpr>,
    pub group_by: Vec<SqlExpr>,
    pub having: Option<SqlExpr>,
}

impl SelectQuery {
    pub fn from_table(table_name: impl Into<String>, alias: Option<String>) -> Self {
        SelectQuery {
            select: Vec::new(),
            from: FromTable {
                table_name: table_name.into(),
                alias,
            },
            joins: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            having: None,
        }
    }

    /// Output column names of the SELECT list, in order
    pub fn output_names(&self) -> Vec<&str> {
        self.select.iter().filter_map(SqlExpr::output_name).collect()
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FromTable {
    pub table_name: String,
    pub alias: Option<String>,
}

/// `INNER JOIN (<collapse subquery>) AS alias ON ...`
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Join {
    pub source: Box<SelectQuery>,
    pub table_alias: String,
    pub joining_on: Vec<OperatorApplication>,
    pub join_type: JoinType,
}

impl Join {
    /// The collapse subquery behind this join
    pub fn subquery(&self) -> &SelectQuery {
        &self.source
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
}
