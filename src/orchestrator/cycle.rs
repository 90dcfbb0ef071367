//! One orchestration cycle

use chrono::{DateTime, Local, NaiveDate};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::collaborators::{call_with_timeout, ContentRequest, ContextProvider, ShowContext};
use crate::error::Result;
use crate::metrics;
use crate::models::{ItemKind, ListenerRequest, QueueItem, SuggestionSource};
use crate::queue::QueueError;
use crate::resolver::normalize::display_name;
use crate::schedule::{format_minute, Show, Transition};
use crate::snapshot::StationSnapshot;

use super::cascade::{CascadeInput, Selection};
use super::{CycleOutcome, CyclePhase, CycleReport, Orchestrator, PendingDelivery};

impl Orchestrator {
    /// Run one cycle as if the wall clock read `now`
    ///
    /// Does not look at or clear the low-queue signal; see
    /// [`Orchestrator::poll_once`].
    pub async fn run_cycle_at(&mut self, now: DateTime<Local>) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", %cycle_id);
        self.cycle(cycle_id, now).instrument(span).await
    }

    async fn cycle(&mut self, cycle_id: Uuid, now: DateTime<Local>) -> Result<CycleReport> {
        let started = Instant::now();
        let snapshot = self.current_snapshot()?;

        // ScheduleCheck
        let mut phases = vec![CyclePhase::ScheduleCheck];
        let schedule = &snapshot.schedule;
        let state = self.engine.state_at(schedule, now.time());
        let transition = self.engine.transition_at(schedule, now.time());
        let show: &Show = transition.as_ref().map_or(state.active_show, |t| t.incoming);

        let handover = transition
            .as_ref()
            .map(|t| transition_key(t, now))
            .filter(|key| self.introduced.as_deref() != Some(key.as_str()));
        let signation = match (&handover, &transition) {
            (Some(_), Some(t)) => t.signation.cloned(),
            _ => None,
        };
        if let Some(t) = &transition {
            tracing::info!(
                outgoing = %t.outgoing.id,
                incoming = %t.incoming.id,
                seconds = t.seconds_to_transition,
                handover = handover.is_some(),
                "Show transition ahead"
            );
        }
        if signation.is_some() {
            phases.push(CyclePhase::SignationPending);
        }

        self.maybe_refresh_charts(now.date_naive());

        // SourceSelect
        phases.push(CyclePhase::SourceSelect);
        let listener_request = self.take_listener_request().await;
        let listener_count = self.listener_count().await;
        let power_save = listener_request.is_none() && listener_count == Some(0);

        tracing::info!(
            show = %show.id,
            power_save,
            listeners = ?listener_count,
            request = listener_request.as_ref().map(|r| r.text.as_str()),
            "Source selected"
        );

        let request = if power_save {
            None
        } else {
            Some(
                self.build_request(show, handover.is_some(), listener_request.as_ref())
                    .await,
            )
        };

        let output = self
            .cascade(
                &CascadeInput {
                    snapshot: &snapshot,
                    show,
                    power_save,
                    request: request.as_ref(),
                    listener_request: listener_request.is_some(),
                },
                &mut phases,
            )
            .await?;

        // Enqueue
        let mut items = Vec::with_capacity(3);
        if let Some(path) = signation {
            items.push(QueueItem::new(ItemKind::Signation, path));
        }

        let outcome = match output.selection {
            Selection::Fresh {
                hit,
                source,
                announcement,
            } => {
                if let Some(text) = announcement.filter(|_| !power_save) {
                    if let Some(path) = self.synthesize(&text).await {
                        items.push(QueueItem::new(ItemKind::Announcement, path));
                    }
                }
                if let SuggestionSource::Pool { show } = &source {
                    tracing::debug!(pool = %show, "Track came from a pool");
                }
                CycleOutcome::Success {
                    path: hit.path,
                    tier: hit.tier,
                }
            }
            Selection::ForcedRepeat { path } => CycleOutcome::ForcedRepeat { path },
        };

        let track_id = outcome.path().display().to_string();
        items.push(QueueItem::track(outcome.path().clone()));

        phases.push(CyclePhase::Enqueue);
        let written = self.queue.enqueue_batch(&items).await;
        if let Err(e) = written {
            if matches!(e, QueueError::WriteFailed { .. }) {
                tracing::error!(error = %e, items = items.len(), "Queue write failed, holding items back");
                self.pending = Some(PendingDelivery {
                    items,
                    track_id,
                    show: show.id.clone(),
                    handover,
                });
            } else {
                tracing::error!(error = %e, "Cycle output rejected by the queue");
            }
            return Err(e.into());
        }

        self.commit(&track_id, handover);

        metrics::record_cycle(
            outcome.as_str(),
            power_save,
            output.attempts.len(),
            started.elapsed().as_secs_f64(),
        );

        Ok(CycleReport {
            cycle_id,
            show: show.id.clone(),
            power_save,
            phases,
            attempts: output.attempts,
            outcome,
            enqueued: items,
        })
    }

    /// Current snapshot; pools are rebound when it changed
    fn current_snapshot(&mut self) -> Result<Arc<StationSnapshot>> {
        let snapshot = self.snapshots.refresh()?;
        let changed = self
            .configured_for
            .as_ref()
            .map_or(true, |previous| !Arc::ptr_eq(previous, &snapshot));
        if changed {
            self.pools.configure(&snapshot.schedule);
            self.configured_for = Some(Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }

    /// Content request for the effective show
    async fn build_request(
        &self,
        show: &Show,
        introduce: bool,
        listener_request: Option<&ListenerRequest>,
    ) -> ContentRequest {
        let mut request = ContentRequest::new(ShowContext {
            show_id: show.id.clone(),
            name: show.name.clone(),
            music_style: show.music_style.clone(),
            dj_personality: show.dj_personality.clone(),
            introduce,
        });

        request.last_track = self.history.last().map(|e| display_name(&e.track_id));
        request.listener_input = listener_request.map(|r| r.text.clone());
        request.blocklist = self
            .history
            .recent(self.settings.blocklist_size)
            .into_iter()
            .map(display_name)
            .collect();

        let limit = self.collaborators.timeouts.context;
        let news = self
            .collaborators
            .news
            .as_ref()
            .filter(|_| show.news_enabled);
        let (news, weather) = tokio::join!(
            fetch_context(news, limit),
            fetch_context(self.collaborators.weather.as_ref(), limit)
        );
        request.news = news;
        request.weather = weather;
        request
    }

    /// Consume a pending listener request, if any
    async fn take_listener_request(&self) -> Option<ListenerRequest> {
        let inbox = self.collaborators.inbox.as_ref()?;
        match call_with_timeout("inbox", self.collaborators.timeouts.probe, inbox.take()).await {
            Ok(request) => request,
            Err(e) => {
                metrics::record_collaborator_failure(e.name(), e.kind());
                tracing::warn!(error = %e, "Could not read listener requests");
                None
            }
        }
    }

    /// Listener count; `None` when unknown
    async fn listener_count(&self) -> Option<u32> {
        let probe = self.collaborators.listeners.as_ref()?;
        match call_with_timeout("listeners", self.collaborators.timeouts.probe, probe.listener_count())
            .await
        {
            Ok(count) => Some(count),
            Err(e) => {
                metrics::record_collaborator_failure(e.name(), e.kind());
                tracing::warn!(error = %e, "Listener count unknown");
                None
            }
        }
    }

    /// Render an announcement; `None` when speech is off or failed
    async fn synthesize(&self, text: &str) -> Option<std::path::PathBuf> {
        let speech = self.collaborators.speech.as_ref()?;
        let limit = self.collaborators.timeouts.speech;

        match call_with_timeout(
            speech.name(),
            limit,
            speech.synthesize(text, &self.settings.language),
        )
        .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                metrics::record_collaborator_failure(e.name(), e.kind());
                tracing::warn!(error = %e, "Announcement dropped, queueing the track alone");
                None
            }
        }
    }

    /// Spawn the charts job once per calendar day
    fn maybe_refresh_charts(&mut self, today: NaiveDate) {
        let Some(charts) = self.collaborators.charts.clone() else {
            return;
        };
        if self.charts_day == Some(today) {
            return;
        }
        self.charts_day = Some(today);

        let limit = self.collaborators.timeouts.charts;
        tokio::spawn(async move {
            match call_with_timeout("charts", limit, charts.refresh()).await {
                Ok(()) => tracing::info!(day = %today, "Daily charts refreshed"),
                Err(e) => {
                    metrics::record_collaborator_failure(e.name(), e.kind());
                    tracing::warn!(error = %e, "Daily charts refresh failed");
                }
            }
        });
    }
}

async fn fetch_context(
    provider: Option<&Arc<dyn ContextProvider>>,
    limit: Duration,
) -> Option<String> {
    let provider = provider?;
    match call_with_timeout(provider.name(), limit, provider.fetch()).await {
        Ok(text) => Some(text),
        Err(e) => {
            metrics::record_collaborator_failure(e.name(), e.kind());
            tracing::warn!(error = %e, "Context unavailable");
            None
        }
    }
}

/// Identity of a show boundary: incoming show, date and minute it starts
fn transition_key(transition: &Transition<'_>, now: DateTime<Local>) -> String {
    let starts = now + chrono::Duration::seconds(i64::from(transition.seconds_to_transition));
    format!(
        "{}@{}T{}",
        transition.incoming.id,
        starts.date_naive(),
        format_minute(transition.boundary_minute)
    )
}
