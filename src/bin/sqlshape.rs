//! sqlshape: build and run schema-driven SQL from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Show the SELECT for a table
//! sqlshape --schema schema.toml select website --left 'realm:r:website.realm_uuid = r.uuid'
//!
//! # Filtered page, executed when a database URL is configured
//! sqlshape --schema schema.toml list ai_model --filter 'Type=test_type' --sort Key=asc --page 2
//!
//! # Dry run an insert
//! sqlshape --schema schema.toml --dry-run insert realm --set name=North --generate-id uuid
//! ```

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlshape::config::Config;
use sqlshape::engine::JsonRow;
use sqlshape::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlshape")]
#[command(version)]
#[command(about = "Schema-driven SQL statement builder", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlshape --schema schema.toml select realm
    sqlshape --schema schema.toml list ai_model --filter 'Name[€like]=%gpt%' --per-page 10
    sqlshape --schema schema.toml update realm --set name=South --set uuid=42 --key uuid")]
struct Cli {
    /// Schema file (TOML or JSON) describing the tables
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Config file (defaults to <config dir>/sqlshape/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database connection URL
    #[arg(long, env = "SQLSHAPE_DATABASE_URL")]
    database_url: Option<String>,

    /// Don't execute, just show the generated SQL
    #[arg(short, long, global = true)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered tables
    Tables,
    /// Render a table's column list
    Columns {
        table: String,
        /// select, insert or update
        #[arg(short, long, default_value = "select")]
        mode: String,
        /// Join alias for select columns
        #[arg(short, long)]
        alias: Option<String>,
    },
    /// Build the base SELECT for a table
    Select {
        table: String,
        /// LEFT JOIN as table:alias:condition
        #[arg(short, long)]
        left: Vec<String>,
    },
    /// Filtered, sorted page of a table
    List {
        table: String,
        /// LEFT JOIN as table:alias:condition
        #[arg(short, long)]
        left: Vec<String>,
        /// Filter as key=value, e.g. 'Age[$gt]=18'
        #[arg(long)]
        filter: Vec<String>,
        /// Sort as field=asc|desc
        #[arg(long)]
        sort: Vec<String>,
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Rows per page (defaults to the configured page size)
        #[arg(long)]
        per_page: Option<u64>,
    },
    /// Build an INSERT
    Insert {
        table: String,
        /// Column value as column=value
        #[arg(long)]
        set: Vec<String>,
        #[arg(long)]
        returning: Option<String>,
        /// Fill this column with a fresh identifier
        #[arg(long)]
        generate_id: Option<String>,
    },
    /// Build an UPDATE keyed on one column
    Update {
        table: String,
        /// Column value as column=value
        #[arg(long)]
        set: Vec<String>,
        #[arg(long)]
        key: String,
    },
    /// Rewrite a paginated query as a row count
    Count { sql: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let database_url = cli.database_url.clone().or(config.database_url.clone());

    let registry = Registry::new();
    if let Some(schema) = cli.schema.as_ref().or(config.schema.as_ref()) {
        registry
            .load_schema_file(schema)
            .with_context(|| format!("loading schema {}", schema.display()))?;
    }

    match &cli.command {
        Commands::Tables => {
            let schema = cli.schema.as_ref().or(config.schema.as_ref());
            let Some(schema) = schema else {
                bail!("no schema file; pass --schema or set `schema` in the config");
            };
            for table in SchemaFile::load(schema)?.tables {
                let meta = registry.lookup(&table.name);
                println!(
                    "{} {}",
                    table.name.cyan().bold(),
                    format!(
                        "({} select, {} insert, {} update)",
                        meta.select.len(),
                        meta.insert.len(),
                        meta.update.len()
                    )
                    .dimmed()
                );
            }
        }
        Commands::Columns { table, mode, alias } => {
            ensure_table(&registry, table)?;
            let mode: ColumnMode = mode.parse()?;
            let list = registry.try_columns(table, mode, alias.as_deref())?;
            for fragment in &list.fragments {
                println!("{}", fragment.white());
            }
        }
        Commands::Select { table, left } => {
            let sql = build_select(&registry, table, left)?;
            print_statement(&sql, &[]);
        }
        Commands::List {
            table,
            left,
            filter,
            sort,
            page,
            per_page,
        } => {
            let base = build_select(&registry, table, left)?;
            let filter: Filter = parse_pairs(filter)?
                .into_iter()
                .map(|(k, v)| (k, Value::infer(&v)))
                .collect();
            let sort: Sort = parse_pairs(sort)?.into_iter().collect();
            let page = Page::new(*page, per_page.unwrap_or(config.default_page_size));

            let query = filter_query(&registry, &base, table, &filter, &sort, page)?;

            match connect(&cli, database_url.as_deref(), config.max_connections).await? {
                None => {
                    print_statement(&query.sql, &query.args);
                    println!();
                    println!("{}", "Count:".green().bold());
                    println!("{}", build_count(&query.sql).white());
                }
                Some(db) => {
                    let meta = registry.try_lookup(table)?;
                    let (rows, pagination) = db.list_nested(&meta, &query, page).await?;
                    format_output(&rows, &cli.format);
                    println!(
                        "{} page {}/{} ({} total)",
                        "▸".cyan(),
                        pagination.page_no,
                        pagination.page_max,
                        pagination.count
                    );
                }
            }
        }
        Commands::Insert {
            table,
            set,
            returning,
            generate_id,
        } => {
            ensure_table(&registry, table)?;
            let mut values = parse_values(set)?;
            if let Some(column) = generate_id {
                values.insert(column.clone(), Value::Text(generate_identifier()));
            }
            let query = registry.insert_query(table, &values, returning.as_deref());
            run_mutation(&cli, database_url.as_deref(), config.max_connections, &query).await?;
        }
        Commands::Update { table, set, key } => {
            let values = parse_values(set)?;
            let query = registry.try_update_query(table, &values, key)?;
            run_mutation(&cli, database_url.as_deref(), config.max_connections, &query).await?;
        }
        Commands::Count { sql } => {
            println!("{}", build_count(sql).white());
        }
    }

    Ok(())
}

fn ensure_table(registry: &Registry, table: &str) -> anyhow::Result<()> {
    registry.try_lookup(table)?;
    Ok(())
}

fn build_select(registry: &Registry, table: &str, joins: &[String]) -> anyhow::Result<String> {
    ensure_table(registry, table)?;
    let mut builder = registry.select(table);
    for join in joins {
        let mut parts = join.splitn(3, ':');
        let (Some(target), Some(alias), Some(on)) = (parts.next(), parts.next(), parts.next()) else {
            bail!("join '{}' must be table:alias:condition", join);
        };
        ensure_table(registry, target)?;
        builder = builder.left(target, alias, on);
    }
    Ok(builder.build())
}

fn parse_pairs(raw: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => Ok((k.trim().to_string(), v.to_string())),
            None => Err(anyhow::anyhow!("expected key=value, got '{}'", pair)),
        })
        .collect()
}

fn parse_values(raw: &[String]) -> anyhow::Result<Values> {
    Ok(parse_pairs(raw)?
        .into_iter()
        .map(|(k, v)| (k, Value::infer(&v)))
        .collect())
}

async fn connect(cli: &Cli, url: Option<&str>, max_connections: u32) -> anyhow::Result<Option<Db>> {
    if cli.dry_run {
        return Ok(None);
    }
    let Some(url) = url else {
        return Ok(None);
    };
    if cli.verbose {
        println!("{} {}", "Connecting to:".dimmed(), url);
    }
    Ok(Some(Db::connect(url, max_connections).await?))
}

async fn run_mutation(
    cli: &Cli,
    url: Option<&str>,
    max_connections: u32,
    query: &CompiledQuery,
) -> anyhow::Result<()> {
    match connect(cli, url, max_connections).await? {
        None => {
            print_statement(&query.sql, &query.args);
            if url.is_none() && !cli.dry_run {
                println!();
                println!(
                    "{}",
                    "⚠ No database URL. Use --database-url or set SQLSHAPE_DATABASE_URL".yellow()
                );
            }
        }
        Some(db) if query.sql.contains(" RETURNING ") => {
            let row = db.fetch_one(&query.sql, &query.args).await?;
            format_output(&[row], &cli.format);
        }
        Some(db) => {
            let affected = db.execute(&query.sql, &query.args).await?;
            println!("{} {} rows affected", "✓".green(), affected);
        }
    }
    Ok(())
}

fn print_statement(sql: &str, args: &[Value]) {
    println!("{}", "Generated SQL:".green().bold());
    println!("{}", sql.white());

    if !args.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        for (i, arg) in args.iter().enumerate() {
            println!("  ${} = {}", i + 1, arg.to_string().yellow());
        }
    }
}

fn format_output(rows: &[JsonRow], format: &OutputFormat) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(rows).unwrap_or_default());
        return;
    }

    let mut columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    columns.sort_unstable();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| cell(row.get(*c))).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .fold(c.chars().count(), usize::max)
        })
        .collect();

    let line = |values: &[&str]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{v:w$}"))
            .collect::<Vec<_>>()
            .join(" │ ")
    };

    println!("{}", line(&columns).white().bold());
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", rule.join("─┼─").dimmed());
    for row in &cells {
        let row: Vec<&str> = row.iter().map(String::as_str).collect();
        println!("{}", line(&row));
    }
    println!("{} row(s)", rows.len().to_string().cyan());
}

/// Linked records print as inline JSON.
fn cell(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => "NULL".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
