use super::{AppContext, ui};
use crate::core::backup::{backup_portfolio, restore_portfolio};
use crate::core::holding::HoldingRecord;
use crate::core::number::parse_decimal;
use crate::core::quote::Symbol;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use comfy_table::{Cell, CellAlignment};
use std::collections::HashMap;
use tracing::warn;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PortfolioCommand {
    /// Show holdings with current valuations
    Show,
    /// Create or update a holding. An empty value clears that field.
    Set(HoldingArgs),
    /// Remove a holding
    Remove { symbol: String },
    /// Save the portfolio under a backup name
    Backup { name: String },
    /// Restore holdings from a backup
    Restore { name: String },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct HoldingArgs {
    pub symbol: String,
    /// Price paid per unit
    #[arg(long)]
    pub price: Option<String>,
    /// Purchase date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub quantity: Option<String>,
    /// Alert when the price rises above this level
    #[arg(long)]
    pub limit_high: Option<String>,
    /// Alert when the price falls below this level
    #[arg(long)]
    pub limit_low: Option<String>,
    /// Name shown instead of the symbol
    #[arg(long)]
    pub label: Option<String>,
    #[arg(long)]
    pub secondary: Option<String>,
}

pub async fn run(ctx: &AppContext, command: PortfolioCommand) -> Result<()> {
    match command {
        PortfolioCommand::Show => show(ctx).await,
        PortfolioCommand::Set(args) => set(ctx, args),
        PortfolioCommand::Remove { symbol } => {
            let symbol = Symbol::new(symbol.trim());
            let mut portfolio = ctx.portfolio_mut();
            anyhow::ensure!(portfolio.remove(&symbol), "{symbol} is not in the portfolio");
            portfolio.persist().context("Failed to save portfolio")?;
            println!("Removed {symbol}");
            Ok(())
        }
        PortfolioCommand::Backup { name } => {
            backup_portfolio(&ctx.backups, &ctx.portfolio(), &name)?;
            println!("Backed up portfolio as '{name}'");
            Ok(())
        }
        PortfolioCommand::Restore { name } => {
            let restored = restore_portfolio(&ctx.backups, &mut ctx.portfolio_mut(), &name)?;
            println!("Restored {restored} holdings from '{name}'");
            Ok(())
        }
    }
}

/// `Some("")` clears the field, `None` leaves it alone.
fn apply(field: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        let value = value.trim();
        *field = (!value.is_empty()).then(|| value.to_string());
    }
}

fn check_number(name: &str, value: &Option<String>) -> Result<()> {
    if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
        parse_decimal(value).with_context(|| format!("Invalid {name}"))?;
    }
    Ok(())
}

fn set(ctx: &AppContext, args: HoldingArgs) -> Result<()> {
    check_number("price", &args.price)?;
    check_number("quantity", &args.quantity)?;
    check_number("high limit", &args.limit_high)?;
    check_number("low limit", &args.limit_low)?;
    if let Some(date) = args.date.as_deref().filter(|d| !d.trim().is_empty()) {
        NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{date}', expected YYYY-MM-DD"))?;
    }

    let symbol = Symbol::new(args.symbol.trim());
    anyhow::ensure!(!symbol.is_blank(), "Symbol must not be blank");

    let mut portfolio = ctx.portfolio_mut();
    let mut holding = portfolio
        .get(&symbol)
        .cloned()
        .unwrap_or_else(|| HoldingRecord::new(symbol.clone()));
    apply(&mut holding.buy_price, args.price);
    apply(&mut holding.buy_date, args.date);
    apply(&mut holding.quantity, args.quantity);
    apply(&mut holding.limit_high, args.limit_high);
    apply(&mut holding.limit_low, args.limit_low);
    apply(&mut holding.custom_label, args.label);
    apply(&mut holding.secondary_symbol, args.secondary);

    portfolio.upsert(holding);
    portfolio.persist().context("Failed to save portfolio")?;
    println!("Saved holding {symbol}");
    Ok(())
}

async fn show(ctx: &AppContext) -> Result<()> {
    let symbols = ctx.portfolio().sorted_symbols();
    if symbols.is_empty() {
        println!("Portfolio is empty");
        return Ok(());
    }

    let pb = ui::new_spinner("Fetching quotes...");
    let quotes = match ctx.orchestrator.cache().get_quotes(&symbols, false).await {
        Ok(cached) => cached.quotes,
        Err(e) => {
            warn!("Showing portfolio without quotes: {e}");
            HashMap::new()
        }
    };
    pb.finish_and_clear();

    let lines = ctx.portfolio().summaries(&quotes, Utc::now());

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("Bought"),
        ui::header_cell("Date"),
        ui::header_cell("Qty"),
        ui::header_cell("High"),
        ui::header_cell("Low"),
        ui::header_cell("Day % / P/L"),
        ui::header_cell("Total % / P/L"),
        ui::header_cell("Value"),
    ]);

    for line in lines {
        let right = |text: String| Cell::new(text).set_alignment(CellAlignment::Right);
        table.add_row(vec![
            Cell::new(line.symbol),
            Cell::new(line.name),
            right(line.price),
            right(line.buy_price),
            Cell::new(line.buy_date),
            right(line.quantity),
            right(line.limit_high),
            right(line.limit_low),
            right(line.last_change),
            right(line.total_change),
            right(line.value),
        ]);
    }

    println!("{}\n", ui::style_text("Portfolio", ui::StyleType::Title));
    println!("{table}");
    if quotes.is_empty() {
        println!(
            "{}",
            ui::style_text("Quotes unavailable, valuations omitted", ui::StyleType::Warning)
        );
    }
    Ok(())
}
