//! CLI definitions and dispatch for the `goatfish` binary.

use crate::core::config::{CONFIG_FILE_NAME, GoatfishConfig};
use crate::core::db::Store;
use crate::core::document::{Attributes, Document};
use crate::core::error::{GoatfishError, Result};
use crate::core::value::Value;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "GOATFISH_LOG";

#[derive(Parser, Debug)]
#[clap(
    name = "goatfish",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect and edit a goatfish document store."
)]
pub(crate) struct Cli {
    /// Path to the configuration file.
    #[clap(long, global = true, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,
    /// Database path (overrides the config file and GOATFISH_DB).
    #[clap(long, global = true)]
    pub db: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create tables and indexes for every configured collection
    Init,
    /// Save a document given as a JSON object; prints its id
    Put {
        collection: String,
        /// JSON object. An "id" key updates that existing document.
        document: String,
    },
    /// Print one document by id
    Get { collection: String, id: String },
    /// Print documents matching a JSON filter, one per line
    Find {
        collection: String,
        /// JSON object of attribute -> exact value
        filter: Option<String>,
        /// Stop after the first match
        #[clap(long)]
        one: bool,
    },
    /// Count documents matching a JSON filter
    Count {
        collection: String,
        filter: Option<String>,
    },
    /// Delete one document by id
    Delete { collection: String, id: String },
    /// Rebuild every index table of a collection
    Reindex { collection: String },
    /// Show which access path a query on these fields would use
    Plan {
        collection: String,
        fields: Vec<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn parse_object(raw: &str) -> Result<Attributes> {
    let json: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| GoatfishError::ValidationError(format!("invalid JSON: {}", e)))?;
    match Value::from(json) {
        Value::Map(attrs) => Ok(attrs),
        _ => Err(GoatfishError::ValidationError(
            "expected a JSON object".to_string(),
        )),
    }
}

pub fn document_json(doc: &Document) -> String {
    serde_json::Value::from(&Value::Map(doc.attrs().clone())).to_string()
}

fn parse_filter(raw: Option<&str>) -> Result<Option<Attributes>> {
    raw.map(parse_object).transpose()
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = GoatfishConfig::load(&cli.config)?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
    let store = Store::open(&db_path)?;
    tracing::debug!(db = %db_path.display(), "store opened");

    match cli.command {
        Command::Init => {
            for collection in config.all_collections(&store)? {
                collection.initialize()?;
                println!(
                    "initialized {} ({} indexes)",
                    collection.name(),
                    collection.indexes().len()
                );
            }
        }
        Command::Put {
            collection,
            document,
        } => {
            let collection = config.collection(&collection, &store)?;
            let mut doc = Document::from(parse_object(&document)?);
            if let Some(id) = doc.saved_id()?
                && collection.get(&id)?.is_none()
            {
                return Err(GoatfishError::NotFound(format!("document '{}'", id)));
            }
            collection.save(&mut doc, true)?;
            println!("{}", doc.id().unwrap_or_default());
        }
        Command::Get { collection, id } => {
            let collection = config.collection(&collection, &store)?;
            let doc = collection
                .get(&id)?
                .ok_or_else(|| GoatfishError::NotFound(format!("document '{}'", id)))?;
            println!("{}", document_json(&doc));
        }
        Command::Find {
            collection,
            filter,
            one,
        } => {
            let collection = config.collection(&collection, &store)?;
            let filter = parse_filter(filter.as_deref())?;
            let cursor = collection.find(filter.as_ref())?;
            for doc in cursor.take(if one { 1 } else { usize::MAX }) {
                println!("{}", document_json(&doc?));
            }
        }
        Command::Count { collection, filter } => {
            let collection = config.collection(&collection, &store)?;
            let filter = parse_filter(filter.as_deref())?;
            println!("{}", collection.count(filter.as_ref())?);
        }
        Command::Delete { collection, id } => {
            let collection = config.collection(&collection, &store)?;
            let doc = collection
                .get(&id)?
                .ok_or_else(|| GoatfishError::NotFound(format!("document '{}'", id)))?;
            collection.delete(&doc, true)?;
            println!("deleted {}", id);
        }
        Command::Reindex { collection } => {
            let collection = config.collection(&collection, &store)?;
            let n = collection.reindex(true)?;
            println!("reindexed {} documents in {}", n, collection.name());
        }
        Command::Plan { collection, fields } => {
            let collection = config.collection(&collection, &store)?;
            let filter: Attributes = fields
                .into_iter()
                .map(|f| (f, Value::Bool(true)))
                .collect();
            let plan = collection.plan(Some(&filter));
            println!("{}", plan.to_string().bold());
        }
    }
    Ok(())
}
