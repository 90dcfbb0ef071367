//! Show Schedule Engine
//!
//! Pure functions of wall-clock time and the show table: which show is on
//! air, which one comes next, and whether the change is close enough that
//! the orchestrator should prepare the handover.

use chrono::{NaiveTime, Timelike};
use serde::Serialize;
use std::path::PathBuf;

use super::show::{Schedule, Show, MINUTES_PER_DAY};

/// Default look-ahead window for transitions, in seconds
pub const DEFAULT_LOOKAHEAD_SECS: u32 = 240;

const SECONDS_PER_DAY: u32 = MINUTES_PER_DAY as u32 * 60;

/// Schedule state at an instant, recomputed every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState<'a> {
    pub active_show: &'a Show,
    pub next_show: Option<&'a Show>,
    /// Seconds until `next_show` takes over
    pub seconds_to_transition: Option<u32>,
}

/// An imminent show change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<'a> {
    pub outgoing: &'a Show,
    pub incoming: &'a Show,
    pub seconds_to_transition: u32,
    /// Minute of day at which `incoming` starts
    pub boundary_minute: u16,
    /// Stinger to queue first: the incoming show's, else the outgoing show's
    pub signation: Option<&'a PathBuf>,
}

/// Owned summary for reports and CLI output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleSummary {
    pub active_show: String,
    pub next_show: Option<String>,
    pub seconds_to_transition: Option<u32>,
    pub transition_imminent: bool,
}

/// Stateless schedule evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEngine {
    lookahead_secs: u32,
}

impl Default for ScheduleEngine {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD_SECS)
    }
}

impl ScheduleEngine {
    pub fn new(lookahead_secs: u32) -> Self {
        Self { lookahead_secs }
    }

    pub fn lookahead_secs(&self) -> u32 {
        self.lookahead_secs
    }

    /// Active show, next show and time to the next change
    pub fn state_at<'a>(&self, schedule: &'a Schedule, now: NaiveTime) -> ScheduleState<'a> {
        let now_secs = now.num_seconds_from_midnight();
        let active_show = schedule.show_at_minute(minute_of(now_secs));

        let next = next_boundary(schedule, active_show, now_secs);

        ScheduleState {
            active_show,
            next_show: next.map(|(show, _, _)| show),
            seconds_to_transition: next.map(|(_, secs, _)| secs),
        }
    }

    /// The upcoming change, if it falls within the look-ahead window
    pub fn transition_at<'a>(&self, schedule: &'a Schedule, now: NaiveTime) -> Option<Transition<'a>> {
        let now_secs = now.num_seconds_from_midnight();
        let outgoing = schedule.show_at_minute(minute_of(now_secs));

        let (incoming, seconds_to_transition, boundary_minute) =
            next_boundary(schedule, outgoing, now_secs)?;
        if seconds_to_transition > self.lookahead_secs {
            return None;
        }

        Some(Transition {
            outgoing,
            incoming,
            seconds_to_transition,
            boundary_minute,
            signation: incoming.signation.as_ref().or(outgoing.signation.as_ref()),
        })
    }

    /// Whether a show change is within the look-ahead window
    pub fn is_transition_imminent(&self, schedule: &Schedule, now: NaiveTime) -> bool {
        self.transition_at(schedule, now).is_some()
    }

    /// Owned view of [`Self::state_at`] for display
    pub fn summary(&self, schedule: &Schedule, now: NaiveTime) -> ScheduleSummary {
        let state = self.state_at(schedule, now);
        ScheduleSummary {
            active_show: state.active_show.id.clone(),
            next_show: state.next_show.map(|s| s.id.clone()),
            seconds_to_transition: state.seconds_to_transition,
            transition_imminent: state
                .seconds_to_transition
                .is_some_and(|secs| secs <= self.lookahead_secs),
        }
    }
}

fn minute_of(secs: u32) -> u16 {
    ((secs / 60) % MINUTES_PER_DAY as u32) as u16
}

/// Nearest future boundary at which the on-air show changes
///
/// Returns the incoming show, seconds until it starts and its start minute.
fn next_boundary<'a>(
    schedule: &'a Schedule,
    active: &'a Show,
    now_secs: u32,
) -> Option<(&'a Show, u32, u16)> {
    let mut boundaries: Vec<u16> = schedule
        .shows()
        .iter()
        .flat_map(|s| [s.start, s.end % MINUTES_PER_DAY])
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut candidates: Vec<(u32, u16)> = boundaries
        .into_iter()
        .map(|minute| {
            let boundary_secs = u32::from(minute) * 60;
            let delta = (boundary_secs + SECONDS_PER_DAY - now_secs) % SECONDS_PER_DAY;
            (delta, minute)
        })
        .filter(|&(delta, _)| delta > 0)
        .collect();
    candidates.sort_unstable();

    candidates.into_iter().find_map(|(delta, minute)| {
        let show = schedule.show_at_minute(minute);
        (show.id != active.id).then_some((show, delta, minute))
    })
}
