use super::render_expr::{
    FromTable, Join, JoinType, Literal, OperatorApplication, SelectQuery, SqlExpr,
};
use super::ToSql;
use log::trace;

fn needs_quoting(ident: &str) -> bool {
    // Column names with spaces or special chars (`$session_id`) need quoting
    ident.is_empty() || ident.chars().any(|c| !c.is_alphanumeric() && c != '_')
}

fn quote_identifier(ident: &str) -> String {
    if needs_quoting(ident) {
        format!("\"{}\"", ident.replace('"', "\\\""))
    } else {
        ident.to_string()
    }
}

fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl ToSql for Literal {
    fn to_sql(&self) -> String {
        match self {
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Boolean(b) => b.to_string(),
            Literal::String(s) => quote_string(s),
            Literal::Null => "NULL".to_string(),
        }
    }
}

impl ToSql for OperatorApplication {
    fn to_sql(&self) -> String {
        let operands: Vec<String> = self
            .operands
            .iter()
            .map(|operand| match operand {
                // Nested operators keep their own grouping
                SqlExpr::OperatorApplicationExp(inner) => format!("({})", inner.to_sql()),
                other => other.to_sql(),
            })
            .collect();
        operands.join(&format!(" {} ", self.operator.to_str()))
    }
}

impl ToSql for SqlExpr {
    fn to_sql(&self) -> String {
        match self {
            SqlExpr::Chain(chain) => chain
                .iter()
                .map(|part| quote_identifier(part))
                .collect::<Vec<_>>()
                .join("."),
            SqlExpr::Column(col) => match &col.table_alias {
                Some(alias) => format!(
                    "{}.{}",
                    quote_identifier(alias),
                    quote_identifier(&col.column)
                ),
                None => quote_identifier(&col.column),
            },
            SqlExpr::Alias { expr, alias } => {
                format!("{} AS {}", expr.to_sql(), quote_identifier(alias))
            }
            SqlExpr::Call(call) => {
                let args: Vec<String> = call.args.iter().map(|a| a.to_sql()).collect();
                format!("{}({})", call.name, args.join(", "))
            }
            SqlExpr::OperatorApplicationExp(op) => op.to_sql(),
            SqlExpr::Literal(lit) => lit.to_sql(),
            SqlExpr::JsonProperty { expr, path } => {
                let keys: Vec<String> = path.iter().map(|k| quote_string(k)).collect();
                format!(
                    "replaceRegexpAll(JSONExtractRaw({}, {}), '^\"|\"$', '')",
                    expr.to_sql(),
                    keys.join(", ")
                )
            }
            SqlExpr::ArrayIndex { array, index } => {
                format!("{}[{}]", array.to_sql(), index.to_sql())
            }
        }
    }
}

impl ToSql for FromTable {
    fn to_sql(&self) -> String {
        match &self.alias {
            Some(alias) => format!(
                "FROM {} AS {}",
                quote_identifier(&self.table_name),
                quote_identifier(alias)
            ),
            None => format!("FROM {}", quote_identifier(&self.table_name)),
        }
    }
}

impl ToSql for Join {
    fn to_sql(&self) -> String {
        trace!(
            "Join::to_sql alias={} conditions={}",
            self.table_alias,
            self.joining_on.len()
        );

        let join_type_str = match self.join_type {
            JoinType::Inner => "INNER JOIN",
        };
        let table_expr = format!("({})", render_select(&self.source, " "));

        let mut sql = format!(
            "{} {} AS {}",
            join_type_str,
            table_expr,
            quote_identifier(&self.table_alias)
        );

        if !self.joining_on.is_empty() {
            let conditions: Vec<String> = self
                .joining_on
                .iter()
                .map(|cond| {
                    if self.joining_on.len() > 1 {
                        format!("({})", cond.to_sql())
                    } else {
                        cond.to_sql()
                    }
                })
                .collect();
            sql.push_str(&format!(" ON {}", conditions.join(" AND ")));
        }
        sql
    }
}

/// Render a SELECT with clauses separated by `separator` (newline at top
/// level, a single space inside a join subquery).
fn render_select(query: &SelectQuery, separator: &str) -> String {
    let mut clauses = Vec::new();

    let items: Vec<String> = query.select.iter().map(|item| item.to_sql()).collect();
    clauses.push(format!("SELECT {}", items.join(", ")));
    clauses.push(query.from.to_sql());

    for join in &query.joins {
        clauses.push(join.to_sql());
    }
    if let Some(filter) = &query.filter {
        clauses.push(format!("WHERE {}", filter.to_sql()));
    }
    if !query.group_by.is_empty() {
        let group_by: Vec<String> = query.group_by.iter().map(|e| e.to_sql()).collect();
        clauses.push(format!("GROUP BY {}", group_by.join(", ")));
    }
    if let Some(having) = &query.having {
        clauses.push(format!("HAVING {}", having.to_sql()));
    }
    clauses.join(separator)
}

impl ToSql for SelectQuery {
    fn to_sql(&self) -> String {
        render_select(self, "\n")
    }
}
