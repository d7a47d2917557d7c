//! Refresh scheduling: cycle mode, next-cycle delay and the repeating timer.

use crate::store::SettingsCollection;
use chrono::{DateTime, Datelike, Local, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

pub const KEY_UPDATE_START: &str = "update_start";
pub const KEY_UPDATE_END: &str = "update_end";
pub const KEY_UPDATE_WEEKEND: &str = "update_weekend";
pub const KEY_UPDATE_INTERVAL: &str = "update_interval";
pub const KEY_LAST_UPDATE: &str = "last_update1";

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const LAST_UPDATE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    FullRefresh,
    CacheOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub weekend_updates: bool,
    pub interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            weekend_updates: false,
            interval: DEFAULT_INTERVAL,
        }
    }
}

fn parse_clock(raw: Option<String>, key: &str) -> Option<NaiveTime> {
    let raw = raw?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveTime::parse_from_str(raw, "%H:%M") {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("Ignoring malformed {key} '{raw}': {e}");
            None
        }
    }
}

impl ScheduleConfig {
    /// Reads the schedule from the application settings. Malformed values fall
    /// back to their defaults.
    pub fn load(settings: &dyn SettingsCollection) -> Self {
        let interval = match settings.get_string(KEY_UPDATE_INTERVAL) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    warn!("Ignoring malformed {KEY_UPDATE_INTERVAL} '{raw}'");
                    DEFAULT_INTERVAL
                }
            },
            None => DEFAULT_INTERVAL,
        };

        Self {
            start: parse_clock(settings.get_string(KEY_UPDATE_START), KEY_UPDATE_START),
            end: parse_clock(settings.get_string(KEY_UPDATE_END), KEY_UPDATE_END),
            weekend_updates: settings.get_bool(KEY_UPDATE_WEEKEND).unwrap_or(false),
            interval,
        }
    }
}

/// Full refresh inside the daily window on permitted days, cache-only
/// otherwise. `now` is local wall-clock time.
pub fn decide_cycle_mode(now: NaiveDateTime, schedule: &ScheduleConfig) -> CycleMode {
    let time = now.time();
    if schedule.start.is_some_and(|start| time < start) {
        debug!("Before update window start");
        return CycleMode::CacheOnly;
    }
    if schedule.end.is_some_and(|end| time > end) {
        debug!("After update window end");
        return CycleMode::CacheOnly;
    }
    if !schedule.weekend_updates && matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        debug!("Weekend updates disabled");
        return CycleMode::CacheOnly;
    }
    CycleMode::FullRefresh
}

/// Delay until the next cycle should fire. Fires immediately when no previous
/// update is known or the interval has already passed.
pub fn compute_next_delay<Tz: TimeZone>(
    now: DateTime<Tz>,
    last_update: Option<DateTime<Tz>>,
    interval: Duration,
) -> Duration {
    let Some(last_update) = last_update else {
        return Duration::ZERO;
    };
    let elapsed = (now - last_update).to_std().unwrap_or(Duration::ZERO);
    interval.saturating_sub(elapsed)
}

pub fn read_last_update(settings: &dyn SettingsCollection) -> Option<DateTime<Local>> {
    let raw = settings.get_string(KEY_LAST_UPDATE)?;
    let naive = NaiveDateTime::parse_from_str(raw.trim(), LAST_UPDATE_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

pub fn write_last_update(settings: &dyn SettingsCollection, at: DateTime<Local>) {
    settings.put_string(KEY_LAST_UPDATE, &at.format(LAST_UPDATE_FORMAT).to_string());
}

/// One firing of the refresh timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

/// Repeating, inexact cycle trigger.
///
/// Each `rearm` cancels the pending timer before scheduling a new one, so at
/// most one timer is ever pending. Generations keep increasing across
/// `cancel`, so a tick queued by an earlier timer never matches a later one.
pub struct RefreshTimer {
    sender: mpsc::UnboundedSender<Tick>,
    state: Mutex<TimerState>,
}

#[derive(Default)]
struct TimerState {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                state: Mutex::new(TimerState::default()),
            },
            receiver,
        )
    }

    /// Must be called from within a tokio runtime.
    pub fn rearm(&self, first_delay: Duration, interval: Duration) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = state.pending.take() {
            handle.abort();
        }
        state.generation += 1;
        let generation = state.generation;

        debug!(
            generation,
            first_delay_secs = first_delay.as_secs(),
            interval_secs = interval.as_secs(),
            "Arming refresh timer"
        );
        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + first_delay, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if sender.send(Tick { generation }).is_err() {
                    break;
                }
            }
        });
        state.pending = Some(handle);
        generation
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = state.pending.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
