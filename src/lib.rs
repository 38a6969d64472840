pub mod cli;
pub mod core;
pub mod service;
pub mod sources;
pub mod store;

use crate::core::config::ParserConfig;
use crate::core::currency::CurrencyRegistry;
use crate::service::RateService;
use crate::store::Storage;
use anyhow::{Context, Result};
use tracing::{debug, info};

pub enum AppCommand {
    GetRate {
        from: String,
        to: String,
    },
    UpdateRates {
        source: Option<String>,
    },
    ShowRates {
        currency: Option<String>,
        top: Option<usize>,
    },
    Status,
    History {
        from: Option<String>,
        to: Option<String>,
        limit: usize,
    },
    RunScheduler,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Valuta starting...");

    let config = match config_path {
        Some(path) => ParserConfig::load_from_path(path)?,
        None => ParserConfig::load()?,
    };
    debug!(
        base = %config.base_currency,
        fiat = config.fiat_currencies.len(),
        crypto = config.crypto_currencies.len(),
        "Loaded config"
    );

    let data_path = config.default_data_path()?;
    let storage = Storage::open(&data_path)
        .with_context(|| format!("Failed to open data directory {}", data_path.display()))?;
    let service = RateService::from_config(&config, storage)?;

    match command {
        AppCommand::GetRate { from, to } => {
            let registry = CurrencyRegistry::from_config(&config);
            cli::rate::run(&service, &registry, &from, &to).await
        }
        AppCommand::UpdateRates { source } => cli::update::run(&service, source.as_deref()).await,
        AppCommand::ShowRates { currency, top } => {
            cli::rates::run(&service, currency.as_deref(), top)
        }
        AppCommand::Status => cli::update::status(&service),
        AppCommand::History { from, to, limit } => {
            cli::history::run(&service, from.as_deref(), to.as_deref(), limit)
        }
        AppCommand::RunScheduler => {
            cli::scheduler::run(&service, config.update_interval()).await
        }
    }
}
