//! Diagnostic command-line interface.
//!
//! Runs reads against the configured store so operators can compare what each
//! perspective returns for the same dataset.

use crate::config::{ConfigLoader, VantageConfig};
use crate::error::ResolveError;
use crate::identity::LogicalKey;
use crate::perspective::Perspective;
use crate::query::{Direction, Filter, ListQuery, OrderBy};
use crate::service::ContentService;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vantage")]
#[command(about = "Perspective-aware content resolution diagnostics")]
pub struct Cli {
    /// Configuration file (defaults to ./vantage.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override: trace, debug, info, warn, error, off
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format override: text, json
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve one document by logical key
    Get {
        key: String,
        #[arg(long, short)]
        perspective: Perspective,
    },
    /// Resolve every document matching a filter
    List {
        #[arg(long, short)]
        perspective: Perspective,
        #[command(flatten)]
        filter: FilterArgs,
        /// key, updated-at, or field:PATH
        #[arg(long, default_value = "key")]
        order: String,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List logical keys in a filter's key space
    Keys {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (token redacted)
    Show,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Document type
    #[arg(long = "type")]
    pub document_type: Option<String>,
    /// Restrict to logical keys (repeatable)
    #[arg(long = "key")]
    pub keys: Vec<String>,
    /// Field equality PATH=JSON (repeatable); non-JSON values are taken as strings
    #[arg(long = "field")]
    pub fields: Vec<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<Filter, ResolveError> {
        let mut filter = Filter {
            document_type: self.document_type.clone(),
            ..Filter::default()
        };
        if !self.keys.is_empty() {
            let keys = self
                .keys
                .iter()
                .map(|k| {
                    LogicalKey::parse(k).map_err(|e| ResolveError::InvalidQuery(e.to_string()))
                })
                .collect::<Result<_, _>>()?;
            filter.keys = Some(keys);
        }
        for entry in &self.fields {
            let (path, raw) = entry.split_once('=').ok_or_else(|| {
                ResolveError::InvalidQuery(format!("field filter '{}' must be PATH=VALUE", entry))
            })?;
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            filter.fields.insert(path.trim().to_string(), value);
        }
        filter.validate()?;
        Ok(filter)
    }
}

pub fn parse_order(order: &str) -> Result<OrderBy, ResolveError> {
    match order {
        "key" => Ok(OrderBy::Key),
        "updated-at" | "updated" => Ok(OrderBy::UpdatedAt),
        other => match other.strip_prefix("field:") {
            Some(path) if !path.is_empty() => Ok(OrderBy::Field(path.to_string())),
            _ => Err(ResolveError::InvalidQuery(format!(
                "unknown order '{}' (expected key, updated-at or field:PATH)",
                other
            ))),
        },
    }
}

/// Outcome of a command.
#[derive(Debug)]
pub enum CommandOutput {
    Text(String),
    /// `get` found nothing under the requested perspective.
    NotFound(String),
}

/// Loaded configuration plus a lazily built service.
pub struct RunContext {
    config: VantageConfig,
}

impl RunContext {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ResolveError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self { config })
    }

    pub fn from_config(config: VantageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VantageConfig {
        &self.config
    }

    pub async fn execute(&self, command: &Command) -> Result<CommandOutput, ResolveError> {
        match command {
            Command::Config {
                command: ConfigCommand::Show,
            } => Ok(CommandOutput::Text(self.config.to_toml()?)),
            Command::Get { key, perspective } => {
                let key = LogicalKey::parse(key)
                    .map_err(|e| ResolveError::InvalidQuery(e.to_string()))?;
                let service = ContentService::from_config(&self.config)?;
                match service.resolve_one(&key, *perspective).await? {
                    Some(doc) => Ok(CommandOutput::Text(to_json(&doc)?)),
                    None => Ok(CommandOutput::NotFound(format!(
                        "{} has no visible variant under {}",
                        key, perspective
                    ))),
                }
            }
            Command::List {
                perspective,
                filter,
                order,
                desc,
                limit,
            } => {
                let query = ListQuery {
                    filter: filter.to_filter()?,
                    order: parse_order(order)?,
                    direction: if *desc {
                        Direction::Descending
                    } else {
                        Direction::Ascending
                    },
                    limit: *limit,
                };
                query.validate()?;
                let service = ContentService::from_config(&self.config)?;
                let documents = service.resolve_many(&query, *perspective).await?;
                Ok(CommandOutput::Text(to_json(&documents)?))
            }
            Command::Keys { filter } => {
                let filter = filter.to_filter()?;
                let service = ContentService::from_config(&self.config)?;
                let keys = service.keys(&filter).await?;
                Ok(CommandOutput::Text(to_json(&keys)?))
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ResolveError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ResolveError::Output(e.to_string()))
}

/// User-facing error text.
pub fn map_error(err: &ResolveError) -> String {
    match err {
        ResolveError::StoreUnavailable(msg) => {
            format!("Error: the document store could not be reached: {}", msg)
        }
        ResolveError::InvalidQuery(msg) => format!("Error: invalid query: {}", msg),
        ResolveError::ConfigError(msg) => format!("Error: configuration problem: {}", msg),
        ResolveError::Output(msg) => format!("Error: could not render output: {}", msg),
    }
}
