use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::confidence_engine::state::{ConfidenceLevel, SessionState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub avg_quality_score: f64,
    pub total_ui_elements: u64,
    pub total_accessibility_issues: usize,
    /// Mean over iterations that reported a positive response time; 0 if none did.
    pub avg_response_time: f64,
}

/// Read-only aggregate of a session, suitable for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub generated_at: DateTime<Utc>,
    /// Seconds.
    pub duration: f64,
    pub iterations_completed: usize,
    pub final_confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub metrics: SessionMetrics,
    pub user_feedback_sessions: usize,
    pub critical_issues: Vec<String>,
    pub confidence_trend: Vec<f64>,
}

impl SessionMetrics {
    pub fn from_state(state: &SessionState) -> Self {
        let its = &state.iterations;
        let avg_quality_score = if its.is_empty() {
            0.0
        } else {
            its.iter().map(|i| i.quality_score).sum::<f64>() / its.len() as f64
        };
        let timed: Vec<f64> = its
            .iter()
            .filter_map(|i| i.response_time)
            .filter(|rt| *rt > 0.0)
            .collect();
        let avg_response_time = if timed.is_empty() {
            0.0
        } else {
            timed.iter().sum::<f64>() / timed.len() as f64
        };

        Self {
            avg_quality_score,
            total_ui_elements: its.iter().map(|i| i.ui_elements_detected).sum(),
            total_accessibility_issues: its.iter().map(|i| i.accessibility_issues.len()).sum(),
            avg_response_time,
        }
    }
}

impl SessionSummary {
    pub fn from_state(state: &SessionState, now: DateTime<Utc>) -> Self {
        Self {
            session_id: state.session_id.clone(),
            generated_at: now,
            duration: state.duration_secs(now),
            iterations_completed: state.iterations.len(),
            final_confidence: state.current_confidence,
            confidence_level: ConfidenceLevel::from_confidence(state.current_confidence),
            metrics: SessionMetrics::from_state(state),
            user_feedback_sessions: state.user_feedback_history.len(),
            critical_issues: state.critical_issues.clone(),
            confidence_trend: state.confidence_trend.clone(),
        }
    }
}
