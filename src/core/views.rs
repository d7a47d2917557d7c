//! Display metric views and the rotation state machine that picks one per
//! cycle.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const VIEW_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    DailyPercent = 0,
    DailyChange = 1,
    PortfolioPercent = 2,
    PortfolioChange = 3,
    PortfolioPercentAer = 4,
    PlDailyPercent = 5,
    PlDailyChange = 6,
    PlPercent = 7,
    PlChange = 8,
    PlPercentAer = 9,
}

impl View {
    pub const ALL: [View; VIEW_COUNT] = [
        View::DailyPercent,
        View::DailyChange,
        View::PortfolioPercent,
        View::PortfolioChange,
        View::PortfolioPercentAer,
        View::PlDailyPercent,
        View::PlDailyChange,
        View::PlPercent,
        View::PlChange,
        View::PlPercentAer,
    ];

    /// The view every widget can always show.
    pub const DEFAULT: View = View::DailyPercent;

    pub fn index(self) -> usize {
        self as usize
    }

    /// Maps a stored index back to a view. Out-of-range values wrap.
    pub fn from_index(index: usize) -> View {
        View::ALL[index % VIEW_COUNT]
    }

    fn next(self) -> View {
        View::from_index(self.index() + 1)
    }

    /// Settings key holding this view's enable flag.
    pub fn preference_key(self) -> &'static str {
        match self {
            View::DailyPercent => "show_percent_change",
            View::DailyChange => "show_absolute_change",
            View::PortfolioPercent => "show_portfolio_change",
            View::PortfolioChange => "show_portfolio_abs",
            View::PortfolioPercentAer => "show_portfolio_aer",
            View::PlDailyPercent => "show_profit_daily_change",
            View::PlDailyChange => "show_profit_daily_abs",
            View::PlPercent => "show_profit_change",
            View::PlChange => "show_profit_abs",
            View::PlPercentAer => "show_profit_aer",
        }
    }

    /// Value assumed for the enable flag when the key was never written.
    pub fn enabled_by_default(self) -> bool {
        matches!(self, View::DailyChange)
    }

    /// Offered on narrow widgets only; wide widgets already pair percent with
    /// absolute change.
    pub fn narrow_only(self) -> bool {
        matches!(
            self,
            View::DailyPercent | View::PortfolioPercent | View::PlDailyPercent | View::PlPercent
        )
    }

    pub fn requires_portfolio(self) -> bool {
        !matches!(self, View::DailyPercent | View::DailyChange)
    }

    pub fn is_profit_loss(self) -> bool {
        self.index() >= View::PlDailyPercent.index()
    }

    /// Footer label for the active view.
    pub fn label(self, narrow: bool) -> &'static str {
        if narrow {
            match self {
                View::DailyPercent => "",
                View::DailyChange => "DA",
                View::PortfolioPercent => "PF T%",
                View::PortfolioChange => "PF TA",
                View::PortfolioPercentAer => "PF AER",
                View::PlDailyPercent => "P/L D%",
                View::PlDailyChange => "P/L DA",
                View::PlPercent => "P/L T%",
                View::PlChange => "P/L TA",
                View::PlPercentAer => "P/L AER",
            }
        } else {
            match self {
                View::DailyPercent | View::DailyChange => "",
                View::PortfolioPercent | View::PortfolioChange => "PF T",
                View::PortfolioPercentAer => "PF AER",
                View::PlDailyPercent | View::PlDailyChange => "P/L D",
                View::PlPercent | View::PlChange => "P/L T",
                View::PlPercentAer => "P/L AER",
            }
        }
    }
}

impl Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            View::DailyPercent => "daily %",
            View::DailyChange => "daily change",
            View::PortfolioPercent => "portfolio %",
            View::PortfolioChange => "portfolio change",
            View::PortfolioPercentAer => "portfolio AER %",
            View::PlDailyPercent => "P/L daily %",
            View::PlDailyChange => "P/L daily change",
            View::PlPercent => "P/L %",
            View::PlChange => "P/L change",
            View::PlPercentAer => "P/L AER %",
        };
        f.write_str(name)
    }
}

/// Which views may be shown this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnabledViews([bool; VIEW_COUNT]);

impl EnabledViews {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_flags(flags: [bool; VIEW_COUNT]) -> Self {
        Self(flags)
    }

    pub fn only(views: &[View]) -> Self {
        let mut flags = [false; VIEW_COUNT];
        for view in views {
            flags[view.index()] = true;
        }
        Self(flags)
    }

    /// Applies the widget-shape and portfolio rules to raw preference flags.
    pub fn resolve(preference: impl Fn(View) -> bool, narrow: bool, has_portfolio: bool) -> Self {
        let mut flags = [false; VIEW_COUNT];
        for view in View::ALL {
            flags[view.index()] = preference(view)
                && (narrow || !view.narrow_only())
                && (has_portfolio || !view.requires_portfolio());
        }
        Self(flags)
    }

    pub fn is_enabled(&self, view: View) -> bool {
        self.0[view.index()]
    }

    /// Both portfolio-free views are available.
    pub fn has_default_pair(&self) -> bool {
        self.is_enabled(View::DailyPercent) && self.is_enabled(View::DailyChange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationOutcome {
    pub view: View,
    /// The view differs from the one stored before the transition and needs
    /// persisting.
    pub changed: bool,
}

/// Rotation state for one widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRotation {
    current: View,
}

impl ViewRotation {
    pub fn new(current: View) -> Self {
        Self { current }
    }

    pub fn current(&self) -> View {
        self.current
    }

    /// User-triggered move to the next enabled view.
    pub fn advance(&mut self, enabled: &EnabledViews) -> RotationOutcome {
        let previous = self.current;
        self.current = skip_to_enabled(self.current.next(), enabled);
        RotationOutcome {
            view: self.current,
            changed: self.current != previous,
        }
    }

    /// Passive refresh: keep the current view unless it is no longer enabled.
    pub fn revalidate(&mut self, enabled: &EnabledViews) -> RotationOutcome {
        let previous = self.current;
        self.current = skip_to_enabled(self.current, enabled);
        RotationOutcome {
            view: self.current,
            changed: self.current != previous,
        }
    }
}

fn skip_to_enabled(start: View, enabled: &EnabledViews) -> View {
    let mut view = start;
    for _ in 0..VIEW_COUNT {
        if enabled.is_enabled(view) {
            return view;
        }
        view = view.next();
    }
    View::DEFAULT
}
