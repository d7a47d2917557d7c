//! Per-widget configuration and the registry of widget ids.

use crate::core::layout::{RowOptions, WidgetSize};
use crate::core::quote::Symbol;
use crate::core::views::{EnabledViews, View};
use crate::store::{SettingChange, SettingsCollection};
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Highest stock slot number a widget can hold.
pub const MAX_STOCKS: usize = 16;

/// Shown when a widget has no symbols configured.
pub const DEFAULT_SYMBOL: &str = "^DJI";

pub const KEY_WIDGET_SIZE: &str = "widgetSize";
pub const KEY_WIDGET_VIEW: &str = "widgetView";
pub const KEY_HIDE_SUFFIX: &str = "hide_suffix";
pub const KEY_GREEN_ZERO: &str = "green_zero";
pub const KEY_WIDGET_IDS: &str = "widgetIds";

pub fn stock_key(slot: usize) -> String {
    format!("Stock{slot}")
}

pub fn summary_key(slot: usize) -> String {
    format!("Stock{slot}_summary")
}

/// Typed view over one widget's settings collection.
#[derive(Clone)]
pub struct WidgetSettings {
    id: u32,
    settings: Arc<dyn SettingsCollection>,
}

impl WidgetSettings {
    pub fn new(id: u32, settings: Arc<dyn SettingsCollection>) -> Self {
        Self { id, settings }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn size(&self) -> WidgetSize {
        WidgetSize::from_code(self.settings.get_int(KEY_WIDGET_SIZE).unwrap_or(0))
    }

    pub fn set_size(&self, size: WidgetSize) {
        self.settings.put_int(KEY_WIDGET_SIZE, size.code());
    }

    pub fn view(&self) -> View {
        let index = self.settings.get_int(KEY_WIDGET_VIEW).unwrap_or(0);
        View::from_index(usize::try_from(index).unwrap_or(0))
    }

    /// Stores `view` if it differs from the stored one. Returns whether a
    /// write happened.
    pub fn set_view(&self, view: View) -> bool {
        let stored = self.settings.get_int(KEY_WIDGET_VIEW);
        if stored == Some(view.index() as i64) {
            return false;
        }
        debug!(widget = self.id, %view, "Persisting view");
        self.settings.put_int(KEY_WIDGET_VIEW, view.index() as i64);
        true
    }

    pub fn stock(&self, slot: usize) -> Option<Symbol> {
        self.settings
            .get_string(&stock_key(slot))
            .map(|s| Symbol::new(s.trim()))
            .filter(|s| !s.is_blank())
    }

    pub fn stock_summary(&self, slot: usize) -> Option<String> {
        self.settings.get_string(&summary_key(slot))
    }

    pub fn set_stock(&self, slot: usize, symbol: &Symbol, summary: Option<&str>) {
        if !(1..=MAX_STOCKS).contains(&slot) {
            warn!("Ignoring stock slot {slot} outside 1..={MAX_STOCKS}");
            return;
        }
        self.settings.put_string(&stock_key(slot), symbol.as_str());
        match summary {
            Some(summary) => self.settings.put_string(&summary_key(slot), summary),
            None => self.settings.remove(&summary_key(slot)),
        }
    }

    pub fn clear_stock(&self, slot: usize) {
        self.settings.remove(&stock_key(slot));
        self.settings.remove(&summary_key(slot));
    }

    /// Writes `stocks` to consecutive slots from 1 and clears the rest, in one
    /// batch. Nothing changes when the write fails.
    pub fn replace_stocks(&self, stocks: &[(Symbol, String)]) -> Result<()> {
        let mut changes = Vec::with_capacity(MAX_STOCKS * 2);
        for slot in 1..=MAX_STOCKS {
            match stocks.get(slot - 1) {
                Some((symbol, summary)) => {
                    changes.push(SettingChange::Put(stock_key(slot), Value::from(symbol.as_str())));
                    changes.push(SettingChange::Put(summary_key(slot), Value::from(summary.as_str())));
                }
                None => {
                    changes.push(SettingChange::Remove(stock_key(slot)));
                    changes.push(SettingChange::Remove(summary_key(slot)));
                }
            }
        }
        self.settings
            .apply(changes)
            .with_context(|| format!("Failed to save stocks for widget {}", self.id))
    }

    /// Non-blank symbols in the slots visible at the current size, in slot
    /// order, paired with their slot number.
    pub fn configured_stocks(&self) -> Vec<(usize, Symbol)> {
        (1..=self.size().row_count())
            .filter_map(|slot| self.stock(slot).map(|symbol| (slot, symbol)))
            .collect()
    }

    /// Symbols to display. Falls back to the default index when every slot is
    /// blank.
    pub fn symbols(&self) -> Vec<Symbol> {
        let symbols: Vec<Symbol> = self
            .configured_stocks()
            .into_iter()
            .map(|(_, symbol)| symbol)
            .collect();
        if symbols.is_empty() {
            vec![Symbol::from(DEFAULT_SYMBOL)]
        } else {
            symbols
        }
    }

    pub fn view_preference(&self, view: View) -> bool {
        self.settings
            .get_bool(view.preference_key())
            .unwrap_or(view.enabled_by_default())
    }

    pub fn set_view_preference(&self, view: View, enabled: bool) {
        self.settings.put_bool(view.preference_key(), enabled);
    }

    pub fn enabled_views(&self, has_portfolio: bool) -> EnabledViews {
        EnabledViews::resolve(
            |view| self.view_preference(view),
            self.size().is_narrow(),
            has_portfolio,
        )
    }

    pub fn row_options(&self) -> RowOptions {
        RowOptions {
            hide_suffix: self.settings.get_bool(KEY_HIDE_SUFFIX).unwrap_or(false),
            green_zero: self.settings.get_bool(KEY_GREEN_ZERO).unwrap_or(false),
        }
    }

    /// Drops every stored key for this widget.
    pub fn delete(&self) {
        self.settings.clear();
    }
}

/// Ids of the widgets currently placed, stored as a JSON array in the
/// application settings.
#[derive(Clone)]
pub struct WidgetRegistry {
    app: Arc<dyn SettingsCollection>,
}

impl WidgetRegistry {
    pub fn new(app: Arc<dyn SettingsCollection>) -> Self {
        Self { app }
    }

    pub fn ids(&self) -> Vec<u32> {
        let Some(raw) = self.app.get(KEY_WIDGET_IDS) else {
            return Vec::new();
        };
        match serde_json::from_value::<Vec<u32>>(raw) {
            Ok(mut ids) => {
                ids.sort_unstable();
                ids.dedup();
                ids
            }
            Err(e) => {
                warn!("Ignoring malformed {KEY_WIDGET_IDS}: {e}");
                Vec::new()
            }
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids().contains(&id)
    }

    /// Registers a new widget and returns its id.
    pub fn register(&self) -> u32 {
        let mut ids = self.ids();
        let id = ids.last().map_or(1, |last| last + 1);
        ids.push(id);
        self.store(&ids);
        id
    }

    pub fn unregister(&self, id: u32) -> bool {
        let mut ids = self.ids();
        let before = ids.len();
        ids.retain(|existing| *existing != id);
        let removed = ids.len() != before;
        if removed {
            self.store(&ids);
        }
        removed
    }

    fn store(&self, ids: &[u32]) {
        self.app.put(KEY_WIDGET_IDS, Value::from(ids.to_vec()));
    }
}
