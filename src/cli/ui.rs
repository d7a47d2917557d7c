use crate::core::QuoteSource;
use crate::core::layout::{CellColor, WidgetDisplay};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Error,
    Warning,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Error => style(text).red(),
        StyleType::Warning => style(text).yellow(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Terminal color for a display cell, taken from its `#RRGGBB` value.
pub fn terminal_color(color: CellColor) -> Color {
    let hex = color.hex().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(0xFF)
    };
    Color::Rgb {
        r: channel(0..2),
        g: channel(2..4),
        b: channel(4..6),
    }
}

fn source_note(source: QuoteSource) -> &'static str {
    match source {
        QuoteSource::Fresh => "fresh",
        QuoteSource::Cache => "cached",
        QuoteSource::StaleFallback => "stale",
        QuoteSource::Unavailable => "unavailable",
    }
}

/// Renders a widget as a table with its footer line underneath.
pub fn render_widget(display: &WidgetDisplay) -> String {
    let mut table = new_styled_table();
    let narrow = display.size.is_narrow();

    for row in &display.rows {
        let cells = row
            .cells
            .iter()
            .enumerate()
            // Narrow widgets only have the first three columns.
            .filter(|(index, _)| !narrow || *index < 3)
            .map(|(index, cell)| {
                let alignment = if index == 0 {
                    CellAlignment::Left
                } else {
                    CellAlignment::Right
                };
                Cell::new(&cell.text)
                    .fg(terminal_color(cell.color))
                    .set_alignment(alignment)
            });
        table.add_row(cells);
    }

    let title = format!("Widget {} ({:?})", display.widget_id, display.size);
    let footer = format!(
        "{}  {}  {}",
        display.footer.timestamp,
        display.footer.view_label,
        style_text(source_note(display.source), StyleType::Subtle)
    );

    format!(
        "{}\n{}\n{}",
        style_text(&title, StyleType::Title),
        table,
        footer
    )
}

/// Creates a spinner shown while a cycle or fetch runs.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prints a separator line matching the terminal width.
pub fn print_separator() {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    println!("\n{}", "─".repeat(term_width));
}
