//! quarry CLI
//!
//! Runs JSON filters against a SQLite database.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use quarry_core::{build_select, FilterSpec, Schema};
use quarry_orm::{Connection, QueryResult, Repository, TransactionManager};
use quarry_sqlite::{SqliteConfig, SqliteConnection};

/// Run declarative JSON filters against SQLite.
#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: SqliteConfig,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where a filter comes from.
#[derive(clap::Args)]
struct FilterArgs {
    /// JSON file with the entity definitions.
    #[arg(short, long)]
    schema: PathBuf,

    /// Entity to query.
    #[arg(short, long)]
    entity: String,

    /// Filter as inline JSON.
    #[arg(short, long, conflicts_with = "filter_file")]
    filter: Option<String>,

    /// Filter read from a JSON file.
    #[arg(long)]
    filter_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a filter and print the result as JSON.
    Query {
        #[command(flatten)]
        args: FilterArgs,
    },

    /// Print the compiled statement and its parameters without executing.
    Sql {
        #[command(flatten)]
        args: FilterArgs,
    },

    /// Execute raw SQL (no parameters).
    Exec {
        /// Statement text.
        sql: String,
    },
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

impl FilterArgs {
    fn load(&self) -> anyhow::Result<(Schema, FilterSpec)> {
        let schema = Schema::from_json(&read_file(&self.schema)?)
            .with_context(|| format!("loading schema {}", self.schema.display()))?;

        let filter = match (&self.filter, &self.filter_file) {
            (Some(inline), _) => FilterSpec::from_json(inline)?,
            (None, Some(path)) => FilterSpec::from_json(&read_file(path)?)?,
            (None, None) => FilterSpec::new(),
        };
        Ok((schema, filter))
    }
}

fn render(result: QueryResult) -> serde_json::Result<Value> {
    Ok(match result {
        QueryResult::Records(records) => serde_json::to_value(records)?,
        QueryResult::One(record) => serde_json::to_value(record)?,
        QueryResult::Values(values) => serde_json::to_value(values)?,
        QueryResult::Value(value) => serde_json::to_value(value)?,
        QueryResult::Count(count) => json!({ "count": count }),
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Sql { args } => {
            let (schema, filter) = args.load()?;
            let stmt = build_select(&filter, schema.get(&args.entity)?)?;
            println!("{}", stmt.sql);
            for (name, value) in stmt.params.iter() {
                println!(":{name} = {}", value.to_sql_inline());
            }
        }

        Commands::Query { args } => {
            let (schema, filter) = args.load()?;
            let conn = SqliteConnection::open(&cli.config)?;
            let mut session = TransactionManager::new(conn);
            let mut repo = Repository::new(&mut session, &schema, &args.entity)?;
            let result = repo.query(&filter)?;
            println!("{}", serde_json::to_string_pretty(&render(result)?)?);
        }

        Commands::Exec { sql } => {
            let mut conn = SqliteConnection::open(&cli.config)?;
            let affected = conn.exec_raw(&sql)?;
            info!("{affected} row(s) affected.");
        }
    }

    Ok(())
}
