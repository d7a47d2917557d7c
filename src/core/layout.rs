//! Maps a view and widget width onto display columns.
//!
//! A row has five columns: `col0` name, `col1` price (or holding value on
//! profit/loss views), `col2` narrow change or wide volume, and `col3`/`col4`
//! the wide absolute and percent change. Which derived value lands in which
//! column is fixed by the tables below.

use crate::core::cache::QuoteSource;
use crate::core::holding::HoldingRecord;
use crate::core::number::parse_decimal;
use crate::core::quote::{Quote, Symbol};
use crate::core::valuation::ValuationRecord;
use crate::core::views::{VIEW_COUNT, View};
use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WidgetSize {
    /// 1x2, four rows
    Small = 0,
    /// 1x4, four rows
    SmallWide = 1,
    /// 2x2, ten rows
    Large = 2,
    /// 2x4, ten rows
    LargeWide = 3,
}

impl WidgetSize {
    pub fn from_code(code: i64) -> WidgetSize {
        match code {
            1 => WidgetSize::SmallWide,
            2 => WidgetSize::Large,
            3 => WidgetSize::LargeWide,
            _ => WidgetSize::Small,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn is_narrow(self) -> bool {
        matches!(self, WidgetSize::Small | WidgetSize::Large)
    }

    pub fn row_count(self) -> usize {
        match self {
            WidgetSize::Small | WidgetSize::SmallWide => 4,
            WidgetSize::Large | WidgetSize::LargeWide => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CellColor {
    White,
    Gray,
    Gain,
    Loss,
    AlertHigh,
    AlertLow,
    Volume,
    NotApplicable,
}

impl CellColor {
    pub fn hex(self) -> &'static str {
        match self {
            CellColor::White => "#FFFFFF",
            CellColor::Gray => "#888888",
            CellColor::Gain => "#CCFF66",
            CellColor::Loss => "#FF6666",
            CellColor::AlertHigh => "#FFEE33",
            CellColor::AlertLow => "#FF66FF",
            CellColor::Volume => "#CCCCCC",
            CellColor::NotApplicable => "#66CCCC",
        }
    }
}

/// Derived values that can be placed in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    DailyPercent,
    DailyChange,
    TotalPercent,
    TotalChange,
    AerPercent,
    AerChange,
    Holding,
    PlDailyChange,
    PlTotalChange,
    PlAerChange,
}

impl Metric {
    fn format(self, record: &ValuationRecord) -> Option<String> {
        match self {
            Metric::DailyPercent => record.daily_percent.map(|v| format!("{v:.2}%")),
            Metric::DailyChange => record.daily_change.map(|v| format!("{v:.2}")),
            Metric::TotalPercent => record.total_percent.map(|v| format!("{v:.1}%")),
            Metric::TotalChange => record.total_change.map(|v| format!("{v:.2}")),
            Metric::AerPercent => record.aer_percent.map(|v| format!("{v:.1}%")),
            Metric::AerChange => record.aer_change.map(|v| format!("{v:.2}")),
            Metric::Holding => record.holding_value.map(|v| format!("{v:.0}")),
            Metric::PlDailyChange => record.pl_daily_change.map(|v| format!("{v:.0}")),
            Metric::PlTotalChange => record.pl_total_change.map(|v| format!("{v:.0}")),
            Metric::PlAerChange => record.pl_aer_change.map(|v| format!("{v:.0}")),
        }
    }
}

/// Column assignment for one view at one widget width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Profit/loss view: col1 shows the holding value and alert colours are
    /// suppressed.
    pub profit_loss: bool,
    /// Change columns are money amounts and get a currency symbol.
    pub currency_change: bool,
    pub col1: Option<Metric>,
    /// `col2` on narrow widgets, `col3` on wide ones.
    pub change: Option<Metric>,
    /// `col4` on wide widgets, unused on narrow ones.
    pub percent: Option<Metric>,
}

const fn plain(change: Metric) -> ColumnLayout {
    ColumnLayout {
        profit_loss: false,
        currency_change: false,
        col1: None,
        change: Some(change),
        percent: None,
    }
}

const fn plain_wide(change: Metric, percent: Metric) -> ColumnLayout {
    ColumnLayout {
        profit_loss: false,
        currency_change: false,
        col1: None,
        change: Some(change),
        percent: Some(percent),
    }
}

const fn pl(change: Metric, currency_change: bool) -> ColumnLayout {
    ColumnLayout {
        profit_loss: true,
        currency_change,
        col1: Some(Metric::Holding),
        change: Some(change),
        percent: None,
    }
}

const fn pl_wide(change: Metric, percent: Metric) -> ColumnLayout {
    ColumnLayout {
        profit_loss: true,
        currency_change: true,
        col1: Some(Metric::Holding),
        change: Some(change),
        percent: Some(percent),
    }
}

/// Indexed by `View::index()`.
pub const NARROW_LAYOUT: [ColumnLayout; VIEW_COUNT] = [
    plain(Metric::DailyPercent),
    plain(Metric::DailyChange),
    plain(Metric::TotalPercent),
    plain(Metric::TotalChange),
    plain(Metric::AerPercent),
    pl(Metric::DailyPercent, false),
    pl(Metric::PlDailyChange, true),
    pl(Metric::TotalPercent, false),
    pl(Metric::PlTotalChange, true),
    pl(Metric::AerPercent, false),
];

/// Indexed by `View::index()`.
pub const WIDE_LAYOUT: [ColumnLayout; VIEW_COUNT] = [
    plain_wide(Metric::DailyChange, Metric::DailyPercent),
    plain_wide(Metric::DailyChange, Metric::DailyPercent),
    plain_wide(Metric::TotalChange, Metric::TotalPercent),
    plain_wide(Metric::TotalChange, Metric::TotalPercent),
    plain_wide(Metric::AerChange, Metric::AerPercent),
    pl_wide(Metric::PlDailyChange, Metric::DailyPercent),
    pl_wide(Metric::PlDailyChange, Metric::DailyPercent),
    pl_wide(Metric::PlTotalChange, Metric::TotalPercent),
    pl_wide(Metric::PlTotalChange, Metric::TotalPercent),
    pl_wide(Metric::PlAerChange, Metric::AerPercent),
];

pub fn column_layout(view: View, size: WidgetSize) -> &'static ColumnLayout {
    if size.is_narrow() {
        &NARROW_LAYOUT[view.index()]
    } else {
        &WIDE_LAYOUT[view.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayCell {
    pub text: String,
    pub color: CellColor,
}

impl DisplayCell {
    fn new(text: impl Into<String>, color: CellColor) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRow {
    pub cells: [DisplayCell; 5],
}

/// Per-widget display preferences that affect row contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowOptions {
    pub hide_suffix: bool,
    pub green_zero: bool,
}

pub fn currency_symbol(symbol: &Symbol) -> &'static str {
    let suffix = symbol
        .as_str()
        .rsplit_once('.')
        .map(|(_, s)| s)
        .unwrap_or("");
    match suffix {
        "L" => "£",
        "DE" | "PA" | "AS" | "MI" | "MC" | "BR" | "VI" => "€",
        "T" => "¥",
        "NS" | "BO" => "₹",
        "HK" => "HK$",
        "TO" => "C$",
        "AX" => "A$",
        _ => "$",
    }
}

/// Abbreviates a volume with a K, M, B or T suffix.
pub fn format_volume(volume: f64) -> String {
    if volume > 999_999_999_999.0 {
        format!("{:.0}T", volume / 1e12)
    } else if volume > 999_999_999.0 {
        format!("{:.0}B", volume / 1e9)
    } else if volume > 999_999.0 {
        format!("{:.0}M", volume / 1e6)
    } else if volume > 999.0 {
        format!("{:.0}K", volume / 1e3)
    } else {
        format!("{volume:.0}")
    }
}

/// Colour for a displayed change value. Works on the rounded text so that a
/// value shown as zero is coloured as zero.
pub fn change_color(text: &str, green_zero: bool) -> CellColor {
    match parse_decimal(text) {
        Ok(v) if v < 0.0 => CellColor::Loss,
        Ok(v) if v == 0.0 => {
            if green_zero {
                CellColor::Gain
            } else {
                CellColor::Gray
            }
        }
        _ => CellColor::Gain,
    }
}

/// Builds the display row for one symbol.
pub fn format_row(
    symbol: &Symbol,
    quote: Option<&Quote>,
    holding: Option<&HoldingRecord>,
    valuation: Option<&ValuationRecord>,
    view: View,
    size: WidgetSize,
    options: RowOptions,
) -> DisplayRow {
    let symbol_text = if options.hide_suffix {
        symbol.without_suffix()
    } else {
        symbol.as_str()
    };
    let mut cells = [
        DisplayCell::new(symbol_text, CellColor::White),
        DisplayCell::new("", CellColor::White),
        DisplayCell::new("", CellColor::White),
        DisplayCell::new("", CellColor::White),
        DisplayCell::new("", CellColor::White),
    ];

    let (quote, valuation) = match (quote, valuation) {
        (Some(q), Some(v)) if q.has_data() => (q, v),
        _ => {
            let (a, b) = if size.is_narrow() { (1, 2) } else { (3, 4) };
            cells[a] = DisplayCell::new("no", CellColor::Gray);
            cells[b] = DisplayCell::new("data", CellColor::Gray);
            return DisplayRow { cells };
        }
    };

    if size.is_narrow() {
        if let Some(text) = Metric::DailyPercent.format(valuation) {
            cells[2] = DisplayCell::new(text, CellColor::NotApplicable);
        }
    } else {
        if let Some(name) = &quote.name {
            cells[0].text = name.clone();
        }
        if let Some(volume) = quote.volume {
            cells[2] = DisplayCell::new(format_volume(volume), CellColor::Volume);
        }
        if let Some(text) = Metric::DailyChange.format(valuation) {
            cells[3] = DisplayCell::new(text, CellColor::NotApplicable);
        }
        if let Some(text) = Metric::DailyPercent.format(valuation) {
            cells[4] = DisplayCell::new(text, CellColor::NotApplicable);
        }
    }

    if let Some(label) = holding.and_then(|h| h.custom_label.as_ref()) {
        cells[0].text = label.clone();
    }

    if let Some(price) = quote.price {
        cells[1].text = format!("{price:.2}");
    }

    let layout = column_layout(view, size);
    let currency = currency_symbol(symbol);

    if !layout.profit_loss {
        if valuation.limit_high_triggered {
            cells[1].color = CellColor::AlertHigh;
        }
        if valuation.limit_low_triggered {
            cells[1].color = CellColor::AlertLow;
        }
    }

    match layout.col1.and_then(|m| m.format(valuation)) {
        Some(value) => cells[1].text = format!("{currency}{value}"),
        None if layout.profit_loss => cells[1].color = CellColor::NotApplicable,
        None => {}
    }

    let change_slot = if size.is_narrow() { 2 } else { 3 };
    if let Some(value) = layout.change.and_then(|m| m.format(valuation)) {
        let color = change_color(&value, options.green_zero);
        let text = if layout.currency_change {
            format!("{currency}{value}")
        } else {
            value
        };
        cells[change_slot] = DisplayCell::new(text, color);
    }
    if !size.is_narrow() {
        if let Some(value) = layout.percent.and_then(|m| m.format(valuation)) {
            let color = change_color(&value, options.green_zero);
            cells[4] = DisplayCell::new(value, color);
        }
    }

    DisplayRow { cells }
}

/// Footer timestamp: time of day for today's quotes, otherwise the date.
pub fn footer_timestamp(fetched_at: Option<DateTime<Local>>, now: DateTime<Local>) -> String {
    match fetched_at {
        None => "NO DATE SET".to_string(),
        Some(at) if at.date_naive() == now.date_naive() => at.format("%H:%M").to_string(),
        Some(at) => at.format("%d %b").to_string().to_uppercase(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Footer {
    pub timestamp: String,
    pub view_label: String,
}

/// Everything a rendering surface needs to draw one widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetDisplay {
    pub widget_id: u32,
    pub size: WidgetSize,
    pub view: View,
    pub rows: Vec<DisplayRow>,
    pub footer: Footer,
    pub source: QuoteSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::valuation::valuate;
    use chrono::{TimeZone, Utc};

    fn quote(symbol: &str, price: f64, change: f64, percent: f64) -> Quote {
        Quote {
            symbol: Symbol::from(symbol),
            name: Some("Example Corp".to_string()),
            price: Some(price),
            change: Some(change),
            percent: Some(percent),
            volume: Some(3_200_000.0),
            timestamp: Utc::now(),
        }
    }

    fn holding(symbol: &str) -> HoldingRecord {
        HoldingRecord {
            buy_price: Some("100".to_string()),
            buy_date: Some("2020-01-01".to_string()),
            quantity: Some("10".to_string()),
            ..HoldingRecord::new(Symbol::from(symbol))
        }
    }

    fn row(
        q: Option<&Quote>,
        h: Option<&HoldingRecord>,
        view: View,
        size: WidgetSize,
    ) -> DisplayRow {
        let now = Utc.with_ymd_and_hms(2021, 12, 31, 0, 0, 0).unwrap();
        let symbol = q.map(|q| q.symbol.clone()).unwrap_or_else(|| Symbol::from("AAPL"));
        let record = q.map(|q| valuate(q, h, now));
        format_row(&symbol, q, h, record.as_ref(), view, size, RowOptions::default())
    }

    #[test]
    fn test_tables_mark_profit_loss_views() {
        for view in View::ALL {
            assert_eq!(NARROW_LAYOUT[view.index()].profit_loss, view.is_profit_loss());
            assert_eq!(WIDE_LAYOUT[view.index()].profit_loss, view.is_profit_loss());
            assert!(WIDE_LAYOUT[view.index()].percent.is_some());
            assert!(NARROW_LAYOUT[view.index()].percent.is_none());
        }
    }

    #[test]
    fn test_missing_quote_shows_no_data() {
        let narrow = row(None, None, View::DailyPercent, WidgetSize::Small);
        assert_eq!(narrow.cells[1].text, "no");
        assert_eq!(narrow.cells[2].text, "data");
        assert_eq!(narrow.cells[2].color, CellColor::Gray);

        let wide = row(None, None, View::DailyPercent, WidgetSize::LargeWide);
        assert_eq!(wide.cells[3].text, "no");
        assert_eq!(wide.cells[4].text, "data");
        assert_eq!(wide.cells[1].text, "");
    }

    #[test]
    fn test_narrow_daily_views() {
        let q = quote("AAPL", 110.0, -1.25, -1.12);
        let r = row(Some(&q), None, View::DailyPercent, WidgetSize::Small);
        assert_eq!(r.cells[0].text, "AAPL");
        assert_eq!(r.cells[1].text, "110.00");
        assert_eq!(r.cells[2].text, "-1.12%");
        assert_eq!(r.cells[2].color, CellColor::Loss);

        let r = row(Some(&q), None, View::DailyChange, WidgetSize::Large);
        assert_eq!(r.cells[2].text, "-1.25");
    }

    #[test]
    fn test_wide_defaults_show_name_volume_and_both_changes() {
        let q = quote("AAPL", 110.0, 1.25, 1.15);
        let r = row(Some(&q), None, View::DailyChange, WidgetSize::SmallWide);
        assert_eq!(r.cells[0].text, "Example Corp");
        assert_eq!(r.cells[2].text, "3M");
        assert_eq!(r.cells[2].color, CellColor::Volume);
        assert_eq!(r.cells[3].text, "1.25");
        assert_eq!(r.cells[4].text, "1.15%");
        assert_eq!(r.cells[4].color, CellColor::Gain);
    }

    #[test]
    fn test_profit_loss_views_use_holding_value_and_currency() {
        let q = quote("BP.L", 110.0, 2.0, 1.85);
        let h = holding("BP.L");
        let r = row(Some(&q), Some(&h), View::PlChange, WidgetSize::Small);
        assert_eq!(r.cells[1].text, "£1100");
        assert_eq!(r.cells[2].text, "£100");

        let r = row(Some(&q), Some(&h), View::PlPercent, WidgetSize::Small);
        assert_eq!(r.cells[2].text, "10.0%");

        let r = row(Some(&q), Some(&h), View::PlPercentAer, WidgetSize::LargeWide);
        assert_eq!(r.cells[3].text, "£50");
        assert_eq!(r.cells[4].text, "5.0%");
    }

    #[test]
    fn test_profit_loss_view_without_holding_marks_price_na() {
        let q = quote("AAPL", 110.0, 2.0, 1.85);
        let r = row(Some(&q), None, View::PlChange, WidgetSize::Small);
        assert_eq!(r.cells[1].text, "110.00");
        assert_eq!(r.cells[1].color, CellColor::NotApplicable);
        // Daily percent default survives because the change column is undefined.
        assert_eq!(r.cells[2].text, "1.85%");
        assert_eq!(r.cells[2].color, CellColor::NotApplicable);
    }

    #[test]
    fn test_alerts_colour_price_outside_profit_loss_views() {
        let q = quote("AAPL", 110.0, 2.0, 1.85);
        let mut h = holding("AAPL");
        h.limit_high = Some("105".to_string());

        let r = row(Some(&q), Some(&h), View::PortfolioChange, WidgetSize::Small);
        assert_eq!(r.cells[1].color, CellColor::AlertHigh);

        let r = row(Some(&q), Some(&h), View::PlChange, WidgetSize::Small);
        assert_eq!(r.cells[1].color, CellColor::White);
    }

    #[test]
    fn test_custom_label_and_hidden_suffix() {
        let q = quote("BP.L", 110.0, 2.0, 1.85);
        let record = valuate(&q, None, Utc::now());
        let options = RowOptions {
            hide_suffix: true,
            green_zero: false,
        };
        let r = format_row(
            &q.symbol,
            Some(&q),
            None,
            Some(&record),
            View::DailyPercent,
            WidgetSize::Small,
            options,
        );
        assert_eq!(r.cells[0].text, "BP");

        let mut h = holding("BP.L");
        h.custom_label = Some("British Petroleum".to_string());
        let r = row(Some(&q), Some(&h), View::DailyPercent, WidgetSize::SmallWide);
        assert_eq!(r.cells[0].text, "British Petroleum");
    }

    #[test]
    fn test_zero_change_colour_follows_preference() {
        assert_eq!(change_color("0.00", false), CellColor::Gray);
        assert_eq!(change_color("0.0%", true), CellColor::Gain);
        assert_eq!(change_color("-0.00", false), CellColor::Gray);
        assert_eq!(change_color("-3.1%", false), CellColor::Loss);
        assert_eq!(change_color("$12", false), CellColor::Gain);
    }

    #[test]
    fn test_volume_and_currency_helpers() {
        assert_eq!(format_volume(950.0), "950");
        assert_eq!(format_volume(12_000.0), "12K");
        assert_eq!(format_volume(4_000_000_000.0), "4B");
        assert_eq!(currency_symbol(&Symbol::from("SAP.DE")), "€");
        assert_eq!(currency_symbol(&Symbol::from("^DJI")), "$");
    }
}
