use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fundscope::core::log::init_logging;
use fundscope::cli::trends::TrendSort;
use fundscope::core::payload::TrendList;
use fundscope::core::provider::Timeframe;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fundscope::AppCommand {
    fn from(cmd: Commands) -> fundscope::AppCommand {
        match cmd {
            Commands::Search { query } => fundscope::AppCommand::Search {
                query: query.join(" "),
            },
            Commands::Compare { symbols, json } => fundscope::AppCommand::Compare {
                symbols: symbols.iter().map(|s| s.trim().to_uppercase()).collect(),
                json,
            },
            Commands::History { symbol, range } => fundscope::AppCommand::History {
                symbol: symbol.trim().to_uppercase(),
                range,
            },
            Commands::Trends { lists, sort, asc } => fundscope::AppCommand::Trends {
                lists,
                sort,
                ascending: asc,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Search funds by name or symbol
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Compare funds side by side
    Compare {
        #[arg(required = true)]
        symbols: Vec<String>,
        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show price history metrics for a fund
    History {
        symbol: String,
        /// Range such as 1y, 5y, 10y or max
        #[arg(short, long)]
        range: Option<Timeframe>,
    },
    /// Show today's most active stocks, gainers and losers
    Trends {
        /// Lists to show: actives, gainers or losers (default all)
        lists: Vec<TrendList>,
        /// Sort by price, change or percent
        #[arg(short, long)]
        sort: Option<TrendSort>,
        /// Sort ascending instead of descending
        #[arg(long, requires = "sort")]
        asc: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => fundscope::cli::setup::setup_at_path(path),
            None => fundscope::cli::setup::setup(),
        },
        Some(cmd) => fundscope::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
