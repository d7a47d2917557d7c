use super::{AppContext, ui};
use crate::core::backup::{backup_widget, describe_or_default, restore_widget};
use crate::core::layout::WidgetSize;
use crate::core::quote::Symbol;
use crate::core::widget::{MAX_STOCKS, WidgetSettings};
use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::Cell;
use futures::future::join_all;
use tracing::info;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum WidgetCommand {
    /// Place a new widget showing the given symbols
    Add {
        /// Size class: 0 narrow, 1 wide, 2 large narrow, 3 large wide
        #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..=3))]
        size: i64,
        symbols: Vec<String>,
    },
    /// Remove a widget and its settings
    Remove { id: u32 },
    /// List placed widgets
    List,
    /// Put a symbol into a slot
    Set { id: u32, slot: usize, symbol: String },
    /// Save a widget's symbols under a backup name
    Backup { id: u32, name: String },
    /// Replace a widget's symbols from a backup
    Restore { id: u32, name: String },
}

pub async fn run(ctx: &AppContext, command: WidgetCommand) -> Result<()> {
    match command {
        WidgetCommand::Add { size, symbols } => add(ctx, size, &symbols).await,
        WidgetCommand::Remove { id } => remove(ctx, id).await,
        WidgetCommand::List => list(ctx),
        WidgetCommand::Set { id, slot, symbol } => set(ctx, id, slot, &symbol).await,
        WidgetCommand::Backup { id, name } => {
            ctx.ensure_widget(id)?;
            backup_widget(&ctx.backups, &ctx.orchestrator.widget(id)?, &name)?;
            println!("Backed up widget {id} as '{name}'");
            Ok(())
        }
        WidgetCommand::Restore { id, name } => {
            ctx.ensure_widget(id)?;
            let widget = ctx.orchestrator.widget(id)?;
            let restored = restore_widget(
                &ctx.backups,
                &widget,
                ctx.provider.as_ref(),
                ctx.config.restore.description_timeout(),
                &name,
            )
            .await?;
            ctx.orchestrator.cache().invalidate().await;
            println!("Restored {restored} symbols to widget {id} from '{name}'");
            Ok(())
        }
    }
}

async fn describe_all(ctx: &AppContext, symbols: &[Symbol]) -> Vec<String> {
    let timeout = ctx.config.restore.description_timeout();
    join_all(
        symbols
            .iter()
            .map(|symbol| describe_or_default(ctx.provider.as_ref(), symbol, timeout)),
    )
    .await
}

async fn add(ctx: &AppContext, size: i64, symbols: &[String]) -> Result<()> {
    let size = WidgetSize::from_code(size);
    anyhow::ensure!(
        symbols.len() <= size.row_count(),
        "A {size:?} widget shows at most {} symbols",
        size.row_count()
    );

    let symbols: Vec<Symbol> = symbols.iter().map(|s| Symbol::new(s.trim())).collect();
    let descriptions = describe_all(ctx, &symbols).await;

    let id = ctx.orchestrator.registry().register();
    let widget = ctx.orchestrator.widget(id)?;
    widget.set_size(size);
    for (index, (symbol, description)) in symbols.iter().zip(&descriptions).enumerate() {
        widget.set_stock(index + 1, symbol, Some(description.as_str()));
    }

    info!(widget = id, symbols = symbols.len(), "Placed widget");
    println!("Added widget {id}");
    Ok(())
}

async fn remove(ctx: &AppContext, id: u32) -> Result<()> {
    ctx.ensure_widget(id)?;
    ctx.orchestrator.widget(id)?.delete();
    ctx.orchestrator.registry().unregister(id);

    let remaining = ctx.orchestrator.widget_symbols()?;
    let dropped = {
        let mut portfolio = ctx.portfolio_mut();
        let dropped = portfolio.remove_unused(&remaining);
        if portfolio.is_dirty() {
            portfolio
                .persist()
                .context("Failed to save portfolio after removing widget")?;
        }
        dropped
    };
    ctx.orchestrator.prune_cache().await?;

    println!("Removed widget {id}");
    if dropped > 0 {
        println!("Dropped {dropped} unpriced holdings no longer shown on any widget");
    }
    Ok(())
}

async fn set(ctx: &AppContext, id: u32, slot: usize, symbol: &str) -> Result<()> {
    ctx.ensure_widget(id)?;
    anyhow::ensure!(
        (1..=MAX_STOCKS).contains(&slot),
        "Slot must be between 1 and {MAX_STOCKS}"
    );

    let widget = ctx.orchestrator.widget(id)?;
    let symbol = Symbol::new(symbol.trim());
    if symbol.is_blank() {
        widget.clear_stock(slot);
        println!("Cleared slot {slot} of widget {id}");
    } else {
        let description = describe_all(ctx, std::slice::from_ref(&symbol))
            .await
            .into_iter()
            .next();
        widget.set_stock(slot, &symbol, description.as_deref());
        println!("Widget {id} slot {slot} now shows {symbol}");
    }
    ctx.orchestrator.prune_cache().await?;
    Ok(())
}

fn symbol_list(widget: &WidgetSettings) -> String {
    let configured = widget.configured_stocks();
    if configured.is_empty() {
        return ui::style_text("(default index)", ui::StyleType::Subtle);
    }
    configured
        .iter()
        .map(|(_, symbol)| symbol.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn list(ctx: &AppContext) -> Result<()> {
    let ids = ctx.orchestrator.registry().ids();
    if ids.is_empty() {
        println!("No widgets placed yet");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Size"),
        ui::header_cell("View"),
        ui::header_cell("Symbols"),
    ]);

    for id in ids {
        let widget = ctx.orchestrator.widget(id)?;
        table.add_row(vec![
            Cell::new(id),
            Cell::new(format!("{:?}", widget.size())),
            Cell::new(widget.view()),
            Cell::new(symbol_list(&widget)),
        ]);
    }

    println!("{table}");
    Ok(())
}
