use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use valuta::core::log::init_logging;

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

impl From<Commands> for valuta::AppCommand {
    fn from(cmd: Commands) -> valuta::AppCommand {
        match cmd {
            Commands::GetRate { from, to } => valuta::AppCommand::GetRate { from, to },
            Commands::UpdateRates { source } => valuta::AppCommand::UpdateRates { source },
            Commands::ShowRates { currency, top } => {
                valuta::AppCommand::ShowRates { currency, top }
            }
            Commands::Status => valuta::AppCommand::Status,
            Commands::History { from, to, limit } => {
                valuta::AppCommand::History { from, to, limit }
            }
            Commands::RunScheduler => valuta::AppCommand::RunScheduler,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show the exchange rate between two currencies
    GetRate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Fetch fresh rates from the configured sources
    UpdateRates {
        /// Only update from this source (coingecko, exchangerate)
        #[arg(long)]
        source: Option<String>,
    },
    /// List cached rates
    ShowRates {
        /// Only rates involving this currency
        #[arg(long)]
        currency: Option<String>,
        /// Only the N highest rates
        #[arg(long)]
        top: Option<usize>,
    },
    /// Show cache freshness
    Status,
    /// Show recorded rate history
    History {
        #[arg(long, requires = "to")]
        from: Option<String>,
        #[arg(long, requires = "from")]
        to: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Refresh rates periodically until interrupted
    RunScheduler,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => valuta::cli::setup::setup(),
        Some(cmd) => valuta::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
