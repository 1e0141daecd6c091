pub mod cli;
pub mod core;
pub mod providers;

use crate::cli::trends::TrendSort;
use crate::core::config::AppConfig;
use crate::core::dispatcher::Dispatcher;
use crate::core::payload::TrendList;
use crate::core::provider::Timeframe;
use crate::core::registry::Registry;
use crate::core::request::{Field, RequestKey};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Search { query: String },
    Compare { symbols: Vec<String>, json: bool },
    History { symbol: String, range: Option<Timeframe> },
    Trends {
        lists: Vec<TrendList>,
        sort: Option<TrendSort>,
        ascending: bool,
    },
}

/// Every key a command may dispatch. Checked once at startup.
pub fn required_keys() -> Vec<RequestKey> {
    let mut keys = vec![RequestKey::search(), RequestKey::trends()];
    keys.extend(Field::ALL.map(RequestKey::compare));
    keys
}

/// Builds the dispatcher for `config`: one adapter per provider, the
/// standard routes with any configured overrides, and the request timeout.
pub fn build_dispatcher(config: &AppConfig) -> Result<Dispatcher> {
    let client = providers::util::build_client(config.request_timeout())?;
    let provider_set = providers::build_provider_set(config, client);

    let registry = Registry::with_overrides(&provider_set, &config.routes)
        .context("Invalid provider routes")?;
    let missing = registry.missing(&required_keys());
    if !missing.is_empty() {
        let keys: Vec<String> = missing.iter().map(ToString::to_string).collect();
        anyhow::bail!("No provider configured for: {}", keys.join(", "));
    }
    debug!("Registered routes: {}", registry.keys().count());

    Ok(Dispatcher::new(Arc::new(registry))
        .with_timeout(config.request_timeout())
        .with_timeframe(config.history_range))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fundscope starting...");

    let config = AppConfig::resolve(config_path)?;
    debug!(
        "Loaded config: timeout {:?}, history range {}, {} route override(s)",
        config.request_timeout(),
        config.history_range,
        config.routes.len()
    );

    let dispatcher = build_dispatcher(&config)?;
    let today = chrono::Local::now().date_naive();

    match command {
        AppCommand::Search { query } => cli::search::run(&dispatcher, &query).await,
        AppCommand::Compare { symbols, json } => {
            cli::compare::run(&dispatcher, &symbols, today, json).await
        }
        AppCommand::History { symbol, range } => {
            let timeframe = range.unwrap_or(config.history_range);
            cli::history::run(&dispatcher, &symbol, timeframe, today).await
        }
        AppCommand::Trends {
            lists,
            sort,
            ascending,
        } => {
            let lists = if lists.is_empty() {
                TrendList::ALL.to_vec()
            } else {
                lists
            };
            cli::trends::run(&dispatcher, &lists, sort, ascending).await
        }
    }
}
