pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::AppContext;
use crate::cli::portfolio::PortfolioCommand;
use crate::cli::settings::SettingsCommand;
use crate::cli::widget::WidgetCommand;
use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Refresh { force: bool },
    Advance { id: u32 },
    Watch,
    Widget(WidgetCommand),
    Portfolio(PortfolioCommand),
    Settings(SettingsCommand),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("stockboard starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load_or_default()?,
    };
    debug!("Loaded config: {config:#?}");

    let ctx = AppContext::open(config)?;

    match command {
        AppCommand::Refresh { force } => cli::board::refresh(&ctx, force).await,
        AppCommand::Advance { id } => cli::board::advance(&ctx, id).await,
        AppCommand::Watch => cli::board::watch(&ctx).await,
        AppCommand::Widget(cmd) => cli::widget::run(&ctx, cmd).await,
        AppCommand::Portfolio(cmd) => cli::portfolio::run(&ctx, cmd).await,
        AppCommand::Settings(cmd) => cli::settings::run(&ctx, cmd),
    }
}
