//! Operator commands that inspect or poke station state without running
//! the loop

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveTime};

use onair::config::Config;
use onair::history::HistoryTracker;
use onair::orchestrator::setup::{queue_manager, snapshot_sources};
use onair::pool::PoolManager;
use onair::queue::{FileSignal, LowWatermark};
use onair::resolver::TrackResolver;
use onair::schedule::{format_minute, parse_time, Schedule, ScheduleEngine};
use onair::storage::{JsonFile, Wishlist};

/// Resolve free text against the library the way a cycle would
pub async fn resolve(config: Config, text: String) -> Result<()> {
    let snapshot = snapshot_sources(&config)
        .load()
        .context("Failed to load station snapshot")?;
    let resolver = TrackResolver::new(config.resolver);

    println!("Resolving: {text}");
    println!("  Library: {} tracks", snapshot.library.len());
    println!("  Aliases: {}", snapshot.aliases.len());

    match resolver.resolve(&text, &snapshot.library, &snapshot.aliases) {
        Some(resolution) => {
            let history = HistoryTracker::load(
                &JsonFile::new(&config.paths.history),
                config.orchestrator.history_capacity,
            )
            .context("Failed to load history")?;

            println!("  Match: {}", resolution.path.display());
            println!("  Tier: {}", resolution.tier);
            println!("  Score: {:.3}", resolution.score);
            if history.contains(&resolution.track_id()) {
                println!("  Note: played recently, a cycle would treat this as a repeat");
            }
        }
        None => println!("  No match"),
    }

    Ok(())
}

/// Show the schedule state now or at a given time of day
pub async fn schedule(config: Config, at: Option<String>) -> Result<()> {
    let schedule = Schedule::load(&config.paths.schedule).context("Failed to load schedule")?;
    let engine = ScheduleEngine::new(config.orchestrator.transition_lookahead_secs);

    let now = match at {
        Some(at) => {
            let Some(minute) = parse_time(&at) else {
                bail!("Invalid time '{at}', expected HH:MM");
            };
            NaiveTime::from_num_seconds_from_midnight_opt(u32::from(minute % (24 * 60)) * 60, 0)
                .context("Invalid time of day")?
        }
        None => Local::now().time(),
    };

    println!("Schedule at {}", now.format("%H:%M:%S"));
    println!("=====================");
    for show in schedule.all_shows() {
        if show.is_default() {
            println!("  {:<16} (default) {}", show.id, show.name);
        } else {
            println!(
                "  {:<16} {}-{} {}",
                show.id,
                format_minute(show.start),
                format_minute(show.end),
                show.name
            );
        }
    }

    let summary = engine.summary(&schedule, now);
    println!();
    println!("  On air: {}", summary.active_show);
    if let (Some(next), Some(secs)) = (&summary.next_show, summary.seconds_to_transition) {
        println!("  Next: {next} in {}m {:02}s", secs / 60, secs % 60);
    }
    println!("  Transition imminent: {}", summary.transition_imminent);

    Ok(())
}

/// Print pool sizes and the next few entries per show
pub async fn pools(config: Config, show: Option<String>, limit: usize) -> Result<()> {
    let schedule = Schedule::load(&config.paths.schedule).context("Failed to load schedule")?;
    let mut manager = PoolManager::load(
        &JsonFile::new(&config.paths.pool_state),
        &config.paths.pool_dir,
        &schedule,
    )
    .context("Failed to load pool state")?;

    let ids: Vec<String> = match show {
        Some(id) => {
            if schedule.find(&id).is_none() {
                bail!("Unknown show '{id}'");
            }
            vec![id]
        }
        None => schedule.all_shows().map(|s| s.id.clone()).collect(),
    };

    println!("Show pools");
    println!("==========");
    for id in ids {
        let entries = manager.entries(&id);
        println!("  {id}: {} entries", entries.len());
        for entry in entries.iter().take(limit) {
            println!("    - {entry}");
        }
    }

    Ok(())
}

/// Print the most recent wishlist entries
pub async fn wishlist(config: Config, limit: usize) -> Result<()> {
    let wishlist = Wishlist::new(&config.paths.wishlist);
    let entries = wishlist.tail(limit).context("Failed to read wishlist")?;

    println!("Wishlist ({} most recent)", entries.len());
    println!("========");
    for entry in entries {
        println!(
            "  {} [{}] {}",
            entry.requested_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            entry.source,
            entry.requested_text
        );
    }

    Ok(())
}

/// Show or raise the low-queue signal
pub async fn signal(config: Config, raise: bool) -> Result<()> {
    let signal = FileSignal::new(&config.paths.signal);
    if raise {
        signal
            .raise()
            .with_context(|| format!("Failed to raise {}", signal.path().display()))?;
        println!("Signal raised: {}", signal.path().display());
        return Ok(());
    }

    let queue = queue_manager(&config);
    println!("Signal: {}", signal.path().display());
    println!("  Raised: {}", queue.low_watermark_reached());
    println!("  Queue: {}", queue.path().display());
    Ok(())
}
