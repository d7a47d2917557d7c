//! Per-holding valuation: daily, total, annualized and profit/loss figures.
//!
//! `valuate` is a pure function. Every derived field is `None` unless all of
//! its inputs parsed, and no division is performed against a zero or
//! non-finite divisor.

use crate::core::holding::HoldingRecord;
use crate::core::number::parse_field;
use crate::core::quote::Quote;
use chrono::{DateTime, NaiveDate, Utc};

/// Seconds in the fixed 365-day year used for annualizing.
pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValuationRecord {
    pub daily_change: Option<f64>,
    pub daily_percent: Option<f64>,
    pub total_change: Option<f64>,
    pub total_percent: Option<f64>,
    pub aer_change: Option<f64>,
    pub aer_percent: Option<f64>,
    pub holding_value: Option<f64>,
    pub pl_daily_change: Option<f64>,
    pub pl_total_change: Option<f64>,
    pub pl_aer_change: Option<f64>,
    pub limit_high_triggered: bool,
    pub limit_low_triggered: bool,
}

/// Years between a `yyyy-MM-dd` buy date (midnight UTC) and `now`.
pub fn years_elapsed(buy_date: &str, now: DateTime<Utc>) -> Option<f64> {
    let date = NaiveDate::parse_from_str(buy_date.trim(), "%Y-%m-%d").ok()?;
    let bought = date.and_hms_opt(0, 0, 0)?.and_utc();
    let seconds = (now - bought).num_milliseconds() as f64 / 1000.0;
    Some(seconds / SECONDS_PER_YEAR)
}

fn checked_div(numerator: Option<f64>, divisor: Option<f64>) -> Option<f64> {
    match (numerator, divisor) {
        (Some(n), Some(d)) if d != 0.0 && d.is_finite() => {
            let value = n / d;
            value.is_finite().then_some(value)
        }
        _ => None,
    }
}

fn product(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? * b?)
}

/// Values a quote against an optional holding at time `now`.
pub fn valuate(quote: &Quote, holding: Option<&HoldingRecord>, now: DateTime<Utc>) -> ValuationRecord {
    let price = quote.price;
    let daily_change = quote.change;

    let Some(holding) = holding else {
        return ValuationRecord {
            daily_change,
            daily_percent: quote.percent,
            ..Default::default()
        };
    };

    let buy_price = parse_field(holding.buy_price.as_deref());
    let quantity = parse_field(holding.quantity.as_deref());
    let limit_high = parse_field(holding.limit_high.as_deref());
    let limit_low = parse_field(holding.limit_low.as_deref());
    let years = holding
        .buy_date
        .as_deref()
        .and_then(|d| years_elapsed(d, now))
        .filter(|y| *y != 0.0 && y.is_finite());

    let price_change = match (price, buy_price) {
        (Some(p), Some(b)) => Some(p - b),
        _ => None,
    };
    let total_percent = checked_div(price_change.map(|c| 100.0 * c), buy_price);

    // Annualized figures need a non-zero cost basis as well as elapsed time.
    let basis_ok = total_percent.is_some();
    let aer_change = checked_div(price_change, years).filter(|_| basis_ok);
    let aer_percent = checked_div(total_percent, years);

    let pl_total_change = product(price_change, quantity);
    let pl_aer_change = checked_div(pl_total_change, years).filter(|_| basis_ok);

    ValuationRecord {
        daily_change,
        daily_percent: quote.percent,
        total_change: price_change,
        total_percent,
        aer_change,
        aer_percent,
        holding_value: product(price, quantity),
        pl_daily_change: product(daily_change, quantity),
        pl_total_change,
        pl_aer_change,
        limit_high_triggered: matches!((price, limit_high), (Some(p), Some(h)) if p > h),
        limit_low_triggered: matches!((price, limit_low), (Some(p), Some(l)) if p < l),
    }
}
