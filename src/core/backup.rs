//! Portfolio and widget backups.
//!
//! Portfolio backups hold the holdings JSON document. Widget backups are a
//! small text format:
//!
//! ```text
//! Widgetsize: 2
//! Stock1: AAPL
//! Stock2: ^FTSE
//! ```

use crate::core::holding::holdings_from_json;
use crate::core::portfolio::PortfolioRepository;
use crate::core::quote::{DescriptionProvider, Symbol};
use crate::core::widget::{MAX_STOCKS, WidgetSettings};
use futures::future::join_all;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const NO_DESCRIPTION: &str = "No description";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid backup name '{0}': use letters, digits, spaces, '-' or '_'")]
    InvalidName(String),
    #[error("backup is for widget size {found}, this widget is size {expected}")]
    WidgetSizeMismatch { expected: i64, found: i64 },
    #[error("portfolio backup is not valid: {0}")]
    MalformedPortfolio(String),
    #[error("widget backup is not valid: {0}")]
    MalformedWidget(String),
    #[error("no backup named '{0}'")]
    NotFound(String),
    #[error("backup I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to save restored settings: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    Portfolio,
    Widget,
}

impl BackupKind {
    fn directory(self) -> &'static str {
        match self {
            BackupKind::Portfolio => "portfoliobackups",
            BackupKind::Widget => "widgetbackups",
        }
    }
}

/// Checks a user-supplied backup name. Runs before any file is touched.
pub fn validate_backup_name(name: &str) -> Result<(), BackupError> {
    let valid = !name.trim().is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '));
    if valid {
        Ok(())
    } else {
        Err(BackupError::InvalidName(name.to_string()))
    }
}

/// Named text blobs grouped by backup kind.
pub trait BackupStore: Send + Sync {
    fn write(&self, kind: BackupKind, name: &str, contents: &str) -> Result<(), BackupError>;
    fn read(&self, kind: BackupKind, name: &str) -> Result<String, BackupError>;
    fn list(&self, kind: BackupKind) -> Result<Vec<String>, BackupError>;
}

/// Stores backups as `<root>/<kind>/<name>.txt`.
pub struct FileBackupStore {
    root: PathBuf,
}

impl FileBackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, kind: BackupKind, name: &str) -> PathBuf {
        self.root.join(kind.directory()).join(format!("{name}.txt"))
    }
}

impl BackupStore for FileBackupStore {
    fn write(&self, kind: BackupKind, name: &str, contents: &str) -> Result<(), BackupError> {
        validate_backup_name(name)?;
        let path = self.path(kind, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        debug!("Wrote backup {}", path.display());
        Ok(())
    }

    fn read(&self, kind: BackupKind, name: &str) -> Result<String, BackupError> {
        validate_backup_name(name)?;
        let path = self.path(kind, name);
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackupError::NotFound(name.to_string()),
            _ => BackupError::Io(e),
        })
    }

    fn list(&self, kind: BackupKind) -> Result<Vec<String>, BackupError> {
        let dir = self.root.join(kind.directory());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "txt") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

pub fn backup_portfolio(
    store: &dyn BackupStore,
    portfolio: &PortfolioRepository,
    name: &str,
) -> Result<(), BackupError> {
    validate_backup_name(name)?;
    let json = portfolio
        .to_json()
        .map_err(|e| BackupError::MalformedPortfolio(e.to_string()))?;
    store.write(BackupKind::Portfolio, name, &json)?;
    info!("Backed up {} holdings to '{name}'", portfolio.len());
    Ok(())
}

/// Restores holdings from a backup and persists them. Nothing changes unless
/// the whole backup parses.
pub fn restore_portfolio(
    store: &dyn BackupStore,
    portfolio: &mut PortfolioRepository,
    name: &str,
) -> Result<usize, BackupError> {
    validate_backup_name(name)?;
    let raw = store.read(BackupKind::Portfolio, name)?;
    let restored =
        holdings_from_json(&raw).map_err(|e| BackupError::MalformedPortfolio(e.to_string()))?;
    let count = restored.len();
    portfolio
        .restore_matching(restored)
        .map_err(|e| BackupError::Storage(format!("{e:#}")))?;
    info!("Restored {count} holdings from '{name}'");
    Ok(count)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetBackup {
    pub size: i64,
    pub symbols: Vec<Symbol>,
}

impl WidgetBackup {
    pub fn from_widget(widget: &WidgetSettings) -> Self {
        Self {
            size: widget.size().code(),
            symbols: (1..=MAX_STOCKS).filter_map(|slot| widget.stock(slot)).collect(),
        }
    }

    pub fn to_text(&self) -> String {
        let mut text = format!("Widgetsize: {}\n", self.size);
        for (index, symbol) in self.symbols.iter().enumerate() {
            text.push_str(&format!("Stock{}: {symbol}\n", index + 1));
        }
        text
    }

    pub fn parse(text: &str) -> Result<Self, BackupError> {
        let mut size = None;
        let mut slots: Vec<(usize, Symbol)> = Vec::new();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| BackupError::MalformedWidget(format!("unexpected line '{line}'")))?;
            let (key, value) = (key.trim(), value.trim());

            if key == "Widgetsize" {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| BackupError::MalformedWidget(format!("bad size '{value}'")))?;
                size = Some(parsed);
            } else if let Some(slot) = key.strip_prefix("Stock").and_then(|n| n.parse::<usize>().ok()) {
                if !value.is_empty() {
                    slots.push((slot, Symbol::new(value)));
                }
            } else {
                return Err(BackupError::MalformedWidget(format!("unknown key '{key}'")));
            }
        }

        let size = size.ok_or_else(|| BackupError::MalformedWidget("missing Widgetsize".to_string()))?;
        slots.sort_by_key(|(slot, _)| *slot);
        Ok(Self {
            size,
            symbols: slots.into_iter().map(|(_, symbol)| symbol).collect(),
        })
    }
}

pub fn backup_widget(
    store: &dyn BackupStore,
    widget: &WidgetSettings,
    name: &str,
) -> Result<(), BackupError> {
    validate_backup_name(name)?;
    let backup = WidgetBackup::from_widget(widget);
    store.write(BackupKind::Widget, name, &backup.to_text())?;
    info!("Backed up widget {} to '{name}'", widget.id());
    Ok(())
}

/// Looks up a symbol description, falling back to [`NO_DESCRIPTION`] on
/// failure or timeout.
pub async fn describe_or_default(
    describer: &dyn DescriptionProvider,
    symbol: &Symbol,
    timeout: Duration,
) -> String {
    match tokio::time::timeout(timeout, describer.describe(symbol)).await {
        Ok(Ok(description)) if !description.trim().is_empty() => description,
        Ok(Ok(_)) => NO_DESCRIPTION.to_string(),
        Ok(Err(e)) => {
            warn!("Description lookup failed for {symbol}: {e:#}");
            NO_DESCRIPTION.to_string()
        }
        Err(_) => {
            warn!("Description lookup for {symbol} timed out");
            NO_DESCRIPTION.to_string()
        }
    }
}

/// Restores a widget's symbols from a backup made for the same widget size.
/// Symbols are written to consecutive slots starting at 1 in a single batch.
pub async fn restore_widget(
    store: &dyn BackupStore,
    widget: &WidgetSettings,
    describer: &dyn DescriptionProvider,
    description_timeout: Duration,
    name: &str,
) -> Result<usize, BackupError> {
    validate_backup_name(name)?;
    let raw = store.read(BackupKind::Widget, name)?;
    let backup = WidgetBackup::parse(&raw)?;

    let expected = widget.size().code();
    if backup.size != expected {
        return Err(BackupError::WidgetSizeMismatch {
            expected,
            found: backup.size,
        });
    }

    let symbols: Vec<Symbol> = backup.symbols.into_iter().take(MAX_STOCKS).collect();
    let descriptions = join_all(
        symbols
            .iter()
            .map(|symbol| describe_or_default(describer, symbol, description_timeout)),
    )
    .await;

    let stocks: Vec<(Symbol, String)> = symbols.iter().cloned().zip(descriptions).collect();
    widget
        .replace_stocks(&stocks)
        .map_err(|e| BackupError::Storage(format!("{e:#}")))?;
    info!("Restored {} symbols to widget {} from '{name}'", symbols.len(), widget.id());
    Ok(symbols.len())
}
