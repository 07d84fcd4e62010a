use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::confidence_engine::feedback::UserFeedback;
use crate::confidence_engine::iteration::AnalysisIteration;

/// What the caller should do next with a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementAction {
    ContinueAnalysis,
    RequestInput,
    ImmediateAttention,
    ReadyForReview,
    SessionComplete,
}

impl EngagementAction {
    pub fn as_str(self) -> &'static str {
        match self {
            EngagementAction::ContinueAnalysis => "continue_analysis",
            EngagementAction::RequestInput => "request_input",
            EngagementAction::ImmediateAttention => "immediate_attention",
            EngagementAction::ReadyForReview => "ready_for_review",
            EngagementAction::SessionComplete => "session_complete",
        }
    }
}

impl std::fmt::Display for EngagementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discretised confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.85 {
            ConfidenceLevel::VeryHigh
        } else if confidence >= 0.7 {
            ConfidenceLevel::High
        } else if confidence >= 0.5 {
            ConfidenceLevel::Moderate
        } else if confidence >= 0.3 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }
}

/// Snapshot returned alongside every decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    pub confidence: f64,
    pub iterations: usize,
    /// Seconds since the session started.
    pub session_duration: f64,
    pub confidence_level: ConfidenceLevel,
    pub critical_issues_count: usize,
}

/// One piece of user feedback as it was received, with the session's
/// position at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Utc>,
    pub iteration_count: usize,
    pub confidence_at_time: f64,
    /// Adjustment applied to the confidence (after clamping).
    pub applied_delta: f64,
    pub feedback: UserFeedback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    /// Caller-supplied context from `start_session`, carried through untouched.
    pub context: serde_json::Map<String, serde_json::Value>,
    pub iterations: Vec<AnalysisIteration>,
    pub current_confidence: f64,
    pub confidence_trend: Vec<f64>,
    /// Grows only; each message appears once.
    pub critical_issues: Vec<String>,
    pub user_feedback_history: Vec<FeedbackRecord>,
    pub last_user_engagement: Option<DateTime<Utc>>,
    pub session_start: DateTime<Utc>,
}

impl SessionState {
    pub fn new(
        session_id: impl Into<String>,
        context: serde_json::Map<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            context,
            iterations: Vec::new(),
            current_confidence: 0.0,
            confidence_trend: Vec::new(),
            critical_issues: Vec::new(),
            user_feedback_history: Vec::new(),
            last_user_engagement: None,
            session_start: now,
        }
    }

    /// Seconds elapsed since the session started, never negative.
    pub fn duration_secs(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = now.signed_duration_since(self.session_start);
        (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0)
    }

    /// Record a critical issue unless an identical message is already present.
    /// Returns true when the message was new.
    pub fn push_critical_issue(&mut self, issue: String) -> bool {
        if self.critical_issues.contains(&issue) {
            return false;
        }
        self.critical_issues.push(issue);
        true
    }
}
