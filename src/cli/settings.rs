use super::{AppContext, ui};
use crate::store::SettingsCollection;
use anyhow::Result;
use clap::Subcommand;
use comfy_table::Cell;
use std::sync::Arc;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsCommand {
    /// Store a setting, e.g. `update_interval 900000` or `show_profit_abs true --widget 1`
    Set {
        key: String,
        value: String,
        /// Widget to change instead of the application settings
        #[arg(short, long)]
        widget: Option<u32>,
    },
    /// Show one setting, or every setting when no key is given
    Get {
        key: Option<String>,
        #[arg(short, long)]
        widget: Option<u32>,
    },
}

fn collection(ctx: &AppContext, widget: Option<u32>) -> Result<Arc<dyn SettingsCollection>> {
    match widget {
        Some(id) => {
            ctx.ensure_widget(id)?;
            ctx.store.widget(id)
        }
        None => Ok(ctx.app.clone()),
    }
}

fn display_value(settings: &dyn SettingsCollection, key: &str) -> String {
    settings
        .get_string(key)
        .unwrap_or_else(|| ui::style_text("(unset)", ui::StyleType::Subtle))
}

pub fn run(ctx: &AppContext, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Set { key, value, widget } => {
            let key = key.trim();
            anyhow::ensure!(!key.is_empty(), "Setting key must not be blank");
            let settings = collection(ctx, widget)?;
            settings.put_string(key, value.trim());
            println!("{key} = {}", value.trim());
        }
        SettingsCommand::Get {
            key: Some(key),
            widget,
        } => {
            let settings = collection(ctx, widget)?;
            println!("{}", display_value(settings.as_ref(), &key));
        }
        SettingsCommand::Get { key: None, widget } => {
            let settings = collection(ctx, widget)?;
            let mut keys = settings.keys();
            keys.sort();

            let mut table = ui::new_styled_table();
            table.set_header(vec![ui::header_cell("Key"), ui::header_cell("Value")]);
            for key in keys {
                table.add_row(vec![
                    Cell::new(&key),
                    Cell::new(display_value(settings.as_ref(), &key)),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
