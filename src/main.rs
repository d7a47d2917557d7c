use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use stockboard::cli::portfolio::PortfolioCommand;
use stockboard::cli::settings::SettingsCommand;
use stockboard::cli::widget::WidgetCommand;
use stockboard::core::log::init_logging;

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

impl From<Commands> for stockboard::AppCommand {
    fn from(cmd: Commands) -> stockboard::AppCommand {
        match cmd {
            Commands::Refresh { force } => stockboard::AppCommand::Refresh { force },
            Commands::Advance { id } => stockboard::AppCommand::Advance { id },
            Commands::Watch => stockboard::AppCommand::Watch,
            Commands::Widget { command } => stockboard::AppCommand::Widget(command),
            Commands::Portfolio { command } => stockboard::AppCommand::Portfolio(command),
            Commands::Settings { command } => stockboard::AppCommand::Settings(command),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run one update cycle over every widget
    Refresh {
        /// Fetch new quotes even outside the update window or within the cache window
        #[arg(short, long)]
        force: bool,
    },
    /// Show a widget's next enabled view
    Advance { id: u32 },
    /// Keep refreshing widgets on the configured interval
    Watch,
    /// Manage widgets and their symbols
    Widget {
        #[command(subcommand)]
        command: WidgetCommand,
    },
    /// Manage portfolio holdings
    Portfolio {
        #[command(subcommand)]
        command: PortfolioCommand,
    },
    /// Read or change stored settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => stockboard::cli::setup::setup_at_path(path),
            None => stockboard::cli::setup::setup(),
        },
        Some(cmd) => stockboard::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
