use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::config::{AppConfig, EngineConfig};
use crate::confidence_engine::event_bus::{EngineEvent, EventBus};
use crate::confidence_engine::factors::{compute_factors, session_confidence};
use crate::confidence_engine::feedback::UserFeedback;
use crate::confidence_engine::iteration::{AnalysisIteration, IterationInput};
use crate::confidence_engine::journal::SummaryJournal;
use crate::confidence_engine::policy::{critical_issues_for, decide};
use crate::confidence_engine::state::{ActionContext, EngagementAction, FeedbackRecord, SessionState};
use crate::confidence_engine::summary::SessionSummary;
use crate::errors::{UxMirrorError, UxMirrorResult};

type SessionHandle = Arc<RwLock<SessionState>>;

/// Owns every live session and drives the decision policy.
///
/// The session map lock is held only long enough to look up or insert a
/// handle. Each session has its own lock, so work on different sessions never
/// contends, and readers always see a session between operations.
pub struct ConfidenceEngine {
    config: EngineConfig,
    sessions: RwLock<HashMap<String, SessionHandle>>,
    events: EventBus,
    journal: Option<SummaryJournal>,
}

fn poisoned(what: &str) -> UxMirrorError {
    UxMirrorError::LockPoisoned(what.to_string())
}

fn read_session<'a>(id: &str, handle: &'a SessionHandle) -> UxMirrorResult<RwLockReadGuard<'a, SessionState>> {
    handle.read().map_err(|_| poisoned(id))
}

fn write_session<'a>(id: &str, handle: &'a SessionHandle) -> UxMirrorResult<RwLockWriteGuard<'a, SessionState>> {
    handle.write().map_err(|_| poisoned(id))
}

impl ConfidenceEngine {
    pub fn new(config: EngineConfig) -> Self {
        tracing::info!(
            ready = config.ready_threshold,
            low = config.low_threshold,
            max_iterations = config.max_iterations,
            "confidence engine initialised"
        );
        let events = EventBus::new(config.event_capacity);
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            events,
            journal: None,
        }
    }

    pub fn with_default() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Engine configured from the `[engine]` and `[journal]` sections.
    pub fn from_config(config: &AppConfig) -> Self {
        let engine = Self::new(config.engine.clone());
        if !config.journal.enabled {
            return engine;
        }
        let journal = match &config.journal.directory {
            Some(dir) => SummaryJournal::in_dir(dir),
            None => SummaryJournal::default_location(),
        };
        tracing::info!(path = %journal.path().display(), "summary journal enabled");
        engine.with_journal(journal)
    }

    pub fn with_journal(mut self, journal: SummaryJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn session(&self, id: &str) -> UxMirrorResult<SessionHandle> {
        let map = self.sessions.read().map_err(|_| poisoned("session map"))?;
        map.get(id)
            .cloned()
            .ok_or_else(|| UxMirrorError::SessionNotFound(id.to_string()))
    }

    // ── Session lifecycle ───────────────────────────────────────────────────

    pub fn start_session(
        &self,
        id: impl Into<String>,
        context: serde_json::Map<String, serde_json::Value>,
    ) -> UxMirrorResult<SessionState> {
        self.start_session_at(id, context, Utc::now())
    }

    /// Start a session under a freshly generated UUID.
    pub fn start_generated_session(
        &self,
        context: serde_json::Map<String, serde_json::Value>,
    ) -> UxMirrorResult<SessionState> {
        self.start_session(uuid::Uuid::new_v4().to_string(), context)
    }

    pub fn start_session_at(
        &self,
        id: impl Into<String>,
        context: serde_json::Map<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> UxMirrorResult<SessionState> {
        let id = id.into();
        let state = SessionState::new(id.clone(), context, now);
        {
            let mut map = self.sessions.write().map_err(|_| poisoned("session map"))?;
            if map.contains_key(&id) {
                return Err(UxMirrorError::DuplicateSession(id));
            }
            map.insert(id.clone(), Arc::new(RwLock::new(state.clone())));
        }

        tracing::info!(session_id = %id, "session started");
        self.events.publish(EngineEvent::SessionStarted {
            session_id: id,
            timestamp: now,
        });
        Ok(state)
    }

    /// Remove a session and return its final summary. The summary is also
    /// appended to the journal when one is attached; a journal failure is
    /// logged and does not resurrect the session.
    pub fn end_session(&self, id: &str) -> UxMirrorResult<SessionSummary> {
        self.end_session_at(id, Utc::now())
    }

    pub fn end_session_at(&self, id: &str, now: DateTime<Utc>) -> UxMirrorResult<SessionSummary> {
        let handle = {
            let mut map = self.sessions.write().map_err(|_| poisoned("session map"))?;
            map.remove(id)
                .ok_or_else(|| UxMirrorError::SessionNotFound(id.to_string()))?
        };
        let summary = SessionSummary::from_state(&*read_session(id, &handle)?, now);

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&summary) {
                tracing::warn!(session_id = %id, error = %e, "failed to journal session summary");
            }
        }

        tracing::info!(
            session_id = %id,
            iterations = summary.iterations_completed,
            final_confidence = summary.final_confidence,
            "session ended"
        );
        self.events.publish(EngineEvent::SessionEnded {
            session_id: id.to_string(),
            iterations: summary.iterations_completed,
            final_confidence: summary.final_confidence,
        });
        Ok(summary)
    }

    /// Ids of all live sessions, sorted.
    pub fn session_ids(&self) -> UxMirrorResult<Vec<String>> {
        let map = self.sessions.read().map_err(|_| poisoned("session map"))?;
        let mut ids: Vec<String> = map.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn has_session(&self, id: &str) -> UxMirrorResult<bool> {
        let map = self.sessions.read().map_err(|_| poisoned("session map"))?;
        Ok(map.contains_key(id))
    }

    /// Consistent copy of a session's full state.
    pub fn snapshot(&self, id: &str) -> UxMirrorResult<SessionState> {
        let handle = self.session(id)?;
        let state = read_session(id, &handle)?;
        Ok(state.clone())
    }

    // ── Iterations ──────────────────────────────────────────────────────────

    pub fn add_iteration(&self, id: &str, input: IterationInput) -> UxMirrorResult<AnalysisIteration> {
        self.add_iteration_at(id, input, Utc::now())
    }

    pub fn add_iteration_at(
        &self,
        id: &str,
        input: IterationInput,
        now: DateTime<Utc>,
    ) -> UxMirrorResult<AnalysisIteration> {
        let handle = self.session(id)?;
        let clean = input.sanitize()?;

        let (iteration, confidence, new_issues) = {
            let mut state = write_session(id, &handle)?;
            let factors = compute_factors(&state.iterations, &clean);
            let iteration = AnalysisIteration::new(state.iterations.len() + 1, now, clean, factors);
            let confidence = session_confidence(&factors, &state.confidence_trend);

            state.iterations.push(iteration.clone());
            state.current_confidence = confidence;
            state.confidence_trend.push(confidence);

            let new_issues: Vec<String> = critical_issues_for(&iteration)
                .into_iter()
                .filter(|issue| state.push_critical_issue(issue.clone()))
                .collect();
            (iteration, confidence, new_issues)
        };

        tracing::info!(
            session_id = %id,
            iteration = iteration.iteration_number,
            quality = iteration.quality_score,
            elements = iteration.ui_elements_detected,
            confidence,
            "iteration added"
        );
        self.events.publish(EngineEvent::IterationAdded {
            session_id: id.to_string(),
            iteration_number: iteration.iteration_number,
            confidence,
        });
        for issue in new_issues {
            tracing::warn!(session_id = %id, issue = %issue, "critical issue raised");
            self.events.publish(EngineEvent::CriticalIssueRaised {
                session_id: id.to_string(),
                issue,
            });
        }
        Ok(iteration)
    }

    // ── Decisions ───────────────────────────────────────────────────────────

    pub fn determine_action(&self, id: &str) -> UxMirrorResult<(EngagementAction, ActionContext)> {
        self.determine_action_at(id, Utc::now())
    }

    /// Recommended action as of `now`. Reads session state only.
    pub fn determine_action_at(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> UxMirrorResult<(EngagementAction, ActionContext)> {
        let handle = self.session(id)?;
        let state = read_session(id, &handle)?;
        let (action, context) = decide(&state, &self.config, now);
        tracing::debug!(
            session_id = %id,
            action = %action,
            confidence = context.confidence,
            iterations = context.iterations,
            "action determined"
        );
        Ok((action, context))
    }

    // ── Feedback ────────────────────────────────────────────────────────────

    pub fn add_user_feedback(&self, id: &str, feedback: UserFeedback) -> UxMirrorResult<()> {
        self.add_user_feedback_at(id, feedback, Utc::now())
    }

    /// Record feedback, mark the user as engaged at `now`, and nudge the
    /// current confidence. The confidence trend is left untouched, and a
    /// session with no iterations keeps its confidence at zero.
    pub fn add_user_feedback_at(
        &self,
        id: &str,
        feedback: UserFeedback,
        now: DateTime<Utc>,
    ) -> UxMirrorResult<()> {
        let handle = self.session(id)?;
        let raw_delta = feedback.confidence_delta();

        let (applied, confidence) = {
            let mut state = write_session(id, &handle)?;
            let before = state.current_confidence;
            let iteration_count = state.iterations.len();
            let after = if iteration_count == 0 {
                before
            } else {
                (before + raw_delta).clamp(0.0, 1.0)
            };
            state.user_feedback_history.push(FeedbackRecord {
                timestamp: now,
                iteration_count,
                confidence_at_time: before,
                applied_delta: after - before,
                feedback,
            });
            state.last_user_engagement = Some(now);
            state.current_confidence = after;
            (after - before, after)
        };

        tracing::info!(session_id = %id, delta = applied, confidence, "user feedback applied");
        self.events.publish(EngineEvent::FeedbackApplied {
            session_id: id.to_string(),
            delta: applied,
            confidence,
        });
        Ok(())
    }

    // ── Reporting ───────────────────────────────────────────────────────────

    pub fn get_session_summary(&self, id: &str) -> UxMirrorResult<SessionSummary> {
        self.get_session_summary_at(id, Utc::now())
    }

    pub fn get_session_summary_at(&self, id: &str, now: DateTime<Utc>) -> UxMirrorResult<SessionSummary> {
        let handle = self.session(id)?;
        let state = read_session(id, &handle)?;
        Ok(SessionSummary::from_state(&state, now))
    }
}

impl Default for ConfidenceEngine {
    fn default() -> Self {
        Self::with_default()
    }
}
