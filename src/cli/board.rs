use super::{AppContext, ui};
use crate::core::schedule::{
    CycleMode, RefreshTimer, ScheduleConfig, compute_next_delay, decide_cycle_mode,
    read_last_update,
};
use crate::core::{CycleReport, WidgetOutcome};
use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info};

pub fn print_report(report: &CycleReport) {
    for display in &report.displays {
        println!("{}\n", ui::render_widget(display));
    }
    for id in &report.skipped {
        println!(
            "{}",
            ui::style_text(
                &format!("Widget {id}: no enabled view to show, display left as it was"),
                ui::StyleType::Subtle
            )
        );
    }
    for (id, error) in &report.failures {
        println!(
            "{}",
            ui::style_text(&format!("Widget {id} failed: {error}"), ui::StyleType::Error)
        );
    }
}

fn spinner_message(mode: CycleMode) -> &'static str {
    match mode {
        CycleMode::FullRefresh => "Refreshing quotes...",
        CycleMode::CacheOnly => "Outside the update window, redrawing from cache...",
    }
}

/// Runs one update cycle over every placed widget. Without `force` the cycle
/// mode follows the update window settings.
pub async fn refresh(ctx: &AppContext, force: bool) -> Result<()> {
    if ctx.orchestrator.registry().ids().is_empty() {
        println!("No widgets placed yet. Add one with `stockboard widget add`.");
        return Ok(());
    }

    let mode = if force {
        CycleMode::FullRefresh
    } else {
        let schedule = ScheduleConfig::load(ctx.app.as_ref());
        decide_cycle_mode(Local::now().naive_local(), &schedule)
    };
    debug!(?mode, force, "Refresh requested");

    let pb = ui::new_spinner(spinner_message(mode));
    let report = ctx.orchestrator.run_cycle(mode, force).await;
    pb.finish_and_clear();

    print_report(&report);
    Ok(())
}

pub async fn advance(ctx: &AppContext, id: u32) -> Result<()> {
    match ctx.orchestrator.advance(id).await? {
        WidgetOutcome::Displayed(display) => println!("{}", ui::render_widget(&display)),
        WidgetOutcome::Skipped => println!("Widget {id} has no other view enabled"),
    }
    Ok(())
}

/// Runs cycles on the refresh timer until Ctrl-C.
pub async fn watch(ctx: &AppContext) -> Result<()> {
    let schedule = ScheduleConfig::load(ctx.app.as_ref());
    let (timer, mut ticks) = RefreshTimer::new();

    let first_delay = compute_next_delay(
        Local::now(),
        read_last_update(ctx.app.as_ref()),
        schedule.interval,
    );
    let generation = timer.rearm(first_delay, schedule.interval);
    info!(
        first_delay_secs = first_delay.as_secs(),
        interval_secs = schedule.interval.as_secs(),
        "Watching widgets"
    );
    println!(
        "Refreshing every {} min, first cycle in {} s. Press Ctrl-C to stop.",
        schedule.interval.as_secs() / 60,
        first_delay.as_secs()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            tick = ticks.recv() => {
                let Some(tick) = tick else { break };
                if tick.generation != generation {
                    continue;
                }
                let mode = decide_cycle_mode(Local::now().naive_local(), &schedule);
                let report = ctx.orchestrator.run_cycle(mode, false).await;
                ui::print_separator();
                print_report(&report);
            }
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Stopping watch");
                break;
            }
        }
    }

    timer.cancel();
    Ok(())
}
