//! Widget domain logic: quotes, valuation, views, scheduling and storage of
//! widget and portfolio state.

pub mod backup;
pub mod cache;
pub mod config;
pub mod holding;
pub mod layout;
pub mod log;
pub mod number;
pub mod orchestrator;
pub mod portfolio;
pub mod quote;
pub mod schedule;
pub mod valuation;
pub mod views;
pub mod widget;

// Re-export main types for cleaner imports
pub use cache::{QuoteCache, QuoteSource};
pub use orchestrator::{CycleReport, WidgetOutcome, WidgetUpdateOrchestrator};
pub use quote::{DescriptionProvider, Quote, QuoteProvider, Symbol};
