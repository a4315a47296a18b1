use anyhow::Context;
use clap::Parser;
use eventql::config::{CliConfig, CompilerConfig};
use eventql::query_builder::SelectBuilder;
use eventql::schema_catalog::{Database, SchemaDefinition, SchemaValidator};
use eventql::sql_ast::ToSql;
use std::sync::Arc;

/// EventQL - compile logical analytics field chains to ClickHouse SQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML compiler configuration (otherwise read from EVENTQL_* variables)
    #[arg(long)]
    config: Option<String>,

    /// YAML schema declaration replacing the built-in analytics schema
    #[arg(long)]
    schema_file: Option<String>,

    /// Table to select from
    #[arg(long)]
    table: Option<String>,

    /// Lazy joins a single query may register
    #[arg(long)]
    max_joins: Option<u32>,

    /// Skip the startup schema validation
    #[arg(long)]
    skip_validation: bool,

    /// Print the wildcard expansion of the table instead of SQL
    #[arg(long)]
    splash: bool,

    /// Print the query tree as JSON instead of SQL
    #[arg(long)]
    json: bool,

    /// Dotted field chains, e.g. `event person.properties.email`; `*` for all
    fields: Vec<String>,
}

impl From<&Cli> for CliConfig {
    fn from(cli: &Cli) -> Self {
        CliConfig {
            schema_file: cli.schema_file.clone(),
            default_table: cli.table.clone(),
            validate_schema: cli.skip_validation.then_some(false),
            max_joins: cli.max_joins,
        }
    }
}

fn load_database(config: &CompilerConfig) -> anyhow::Result<Arc<Database>> {
    let db = match &config.schema_file {
        Some(path) => SchemaDefinition::from_yaml_file(path)
            .and_then(SchemaDefinition::into_database)
            .with_context(|| format!("loading schema from {}", path))?,
        None => Database::analytics().context("building the analytics schema")?,
    };

    if config.validate_schema {
        SchemaValidator::new()
            .with_max_joins(config.max_joins)
            .validate(&db)
            .context("schema validation failed")?;
    }
    Ok(db)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CompilerConfig::from_yaml_file(path)?,
        None => CompilerConfig::from_env()?,
    };
    config.merge(CliConfig::from(&cli))?;
    log::debug!("Effective configuration: {:?}", config);

    let db = load_database(&config)?;
    let table = config.default_table.as_str();

    if cli.splash {
        for path in db.get_table(table)?.splash()? {
            println!("{}", path);
        }
        return Ok(());
    }

    let mut builder = SelectBuilder::new(&db, table)?.max_joins(config.max_joins);
    for field in &cli.fields {
        builder
            .select(field)
            .with_context(|| format!("resolving `{}.{}`", table, field))?;
    }
    let query = builder.build()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&query)?);
    } else {
        println!("{}", query.to_sql());
    }
    Ok(())
}
