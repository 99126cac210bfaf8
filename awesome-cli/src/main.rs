//! awesome CLI - drive the blog models from the command line
//!
//! Connects a pool (TOML config file or `AWESOME_DB_*` environment), registers
//! the user/blog/comment schemas and runs one mapper operation. Records are
//! printed as JSON on stdout.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use awesome_orm::{
    register_models, ColumnKind, Database, DbConfig, FindOptions, Models, Record, Schema,
    SchemaRegistry, Value,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "awesome",
    author,
    version,
    about = "Run mapper operations against the blog database"
)]
struct Cli {
    /// TOML file with the pool configuration (defaults to AWESOME_DB_* variables)
    #[arg(long, short, global = true, env = "AWESOME_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the generated statement templates for a model
    Schema {
        #[arg(value_enum)]
        model: Model,
    },
    /// Insert a record from field=value pairs (defaults fill the rest)
    Save {
        #[arg(value_enum)]
        model: Model,
        /// Field assignments, e.g. name=test email=test@example.com
        #[arg(value_name = "FIELD=VALUE")]
        values: Vec<String>,
    },
    /// List records
    List {
        #[arg(value_enum)]
        model: Model,
        /// SQL condition appended after `where`
        #[arg(long = "where")]
        where_clause: Option<String>,
        /// Arguments bound to `?` in the condition
        #[arg(long = "arg")]
        args: Vec<String>,
        /// SQL ordering appended after `order by`
        #[arg(long)]
        order_by: Option<String>,
        /// Number of rows to return
        #[arg(long)]
        limit: Option<i64>,
        /// Rows to skip (requires --limit)
        #[arg(long, requires = "limit")]
        offset: Option<i64>,
    },
    /// Fetch one record by primary key
    Get {
        #[arg(value_enum)]
        model: Model,
        id: String,
    },
    /// Count records
    Count {
        #[arg(value_enum)]
        model: Model,
        #[arg(long = "where")]
        where_clause: Option<String>,
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// Change fields of an existing record
    Update {
        #[arg(value_enum)]
        model: Model,
        id: String,
        #[arg(value_name = "FIELD=VALUE", required = true)]
        values: Vec<String>,
    },
    /// Delete a record by primary key
    Delete {
        #[arg(value_enum)]
        model: Model,
        id: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Model {
    Users,
    Blogs,
    Comments,
}

impl Model {
    fn schema(self, models: &Models) -> Arc<Schema> {
        match self {
            Model::Users => models.user.clone(),
            Model::Blogs => models.blog.clone(),
            Model::Comments => models.comment.clone(),
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<DbConfig> {
    match path {
        Some(path) => DbConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                debug!("Loaded .env from {}", path.display());
            }
            DbConfig::from_env().context("Failed to read AWESOME_DB_* variables")
        }
    }
}

/// Parse `field=value` using the field's column type.
fn parse_assignment(schema: &Schema, raw: &str) -> Result<(String, Value)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{raw}'"))?;
    let descriptor = schema
        .field(field)
        .ok_or_else(|| anyhow!("{} has no field '{field}'", schema.type_name()))?;
    Ok((field.to_string(), parse_value(descriptor.kind(), value)?))
}

fn parse_value(kind: ColumnKind, raw: &str) -> Result<Value> {
    let value = match kind {
        ColumnKind::Boolean => Value::Bool(
            raw.parse()
                .with_context(|| format!("'{raw}' is not true/false"))?,
        ),
        ColumnKind::Integer => Value::Int(
            raw.parse()
                .with_context(|| format!("'{raw}' is not an integer"))?,
        ),
        ColumnKind::Real => Value::Float(
            raw.parse()
                .with_context(|| format!("'{raw}' is not a number"))?,
        ),
        ColumnKind::Text => Value::Text(raw.to_string()),
    };
    Ok(value)
}

fn to_json(record: &Record) -> serde_json::Value {
    let ordered: BTreeMap<&str, &Value> = record
        .values()
        .iter()
        .map(|(k, v)| (k.as_str(), v))
        .collect();
    serde_json::to_value(ordered).unwrap_or(serde_json::Value::Null)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli, models: Models) -> Result<()> {
    if let Commands::Schema { model } = &cli.command {
        let schema = model.schema(&models);
        println!("{}", schema.select_sql());
        println!("{}", schema.insert_sql());
        println!("{}", schema.update_sql());
        println!("{}", schema.delete_sql());
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    let db = Database::connect(config)
        .await
        .context("Failed to create database connection pool")?;

    match cli.command {
        // Printed above without a connection.
        Commands::Schema { .. } => {}
        Commands::Save { model, values } => {
            let schema = model.schema(&models);
            let assignments = values
                .iter()
                .map(|raw| parse_assignment(&schema, raw))
                .collect::<Result<Vec<_>>>()?;
            let mut record = Record::with_values(schema, assignments)?;
            let rows = record.save(&db).await?;
            info!("saved {} row(s)", rows);
            print_json(&to_json(&record))?;
        }
        Commands::List {
            model,
            where_clause,
            args,
            order_by,
            limit,
            offset,
        } => {
            let mut options = FindOptions::new();
            if let Some(clause) = where_clause {
                options = options.filter(clause, args.into_iter().map(Value::from).collect());
            }
            if let Some(order) = order_by {
                options = options.order_by(order);
            }
            options = match (offset, limit) {
                (Some(offset), Some(count)) => options.limit((offset, count)),
                (None, Some(count)) => options.limit(count),
                _ => options,
            };
            let records = Record::find_all(&db, &model.schema(&models), options).await?;
            print_json(&serde_json::Value::Array(records.iter().map(to_json).collect()))?;
        }
        Commands::Get { model, id } => match Record::find(&db, &model.schema(&models), id.as_str()).await? {
            Some(record) => print_json(&to_json(&record))?,
            None => anyhow::bail!("No {:?} record with id {}", model, id),
        },
        Commands::Count {
            model,
            where_clause,
            args,
        } => {
            let schema = model.schema(&models);
            let args: Vec<Value> = args.into_iter().map(Value::from).collect();
            let select = format!("count(`{}`)", schema.column(schema.primary_key()));
            let count = Record::find_count(&db, &schema, &select, where_clause.as_deref(), &args)
                .await?
                .unwrap_or(Value::Int(0));
            println!("{count}");
        }
        Commands::Update { model, id, values } => {
            let schema = model.schema(&models);
            let mut record = Record::find(&db, &schema, id.as_str())
                .await?
                .ok_or_else(|| anyhow!("No {:?} record with id {}", model, id))?;
            for raw in &values {
                let (field, value) = parse_assignment(&schema, raw)?;
                record.set(field, value)?;
            }
            let rows = record.update(&db).await?;
            info!("updated {} row(s)", rows);
            print_json(&to_json(&record))?;
        }
        Commands::Delete { model, id } => {
            let schema = model.schema(&models);
            let mut record = Record::new(schema.clone());
            record.set(schema.primary_key(), id)?;
            let rows = record.delete(&db).await?;
            println!("{rows}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    let mut registry = SchemaRegistry::new();
    let models = register_models(&mut registry).context("Failed to register models")?;

    run(cli, models).await
}
