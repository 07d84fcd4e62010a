/// Decision policy and critical-issue rules.
use chrono::{DateTime, Duration, Utc};

use crate::config::EngineConfig;
use crate::confidence_engine::iteration::AnalysisIteration;
use crate::confidence_engine::state::{ActionContext, ConfidenceLevel, EngagementAction, SessionState};

const CRITICAL_QUALITY: f64 = 0.3;
const CRITICAL_ISSUE_COUNT: usize = 5;

/// Critical-issue messages triggered by one iteration, in rule order.
pub fn critical_issues_for(iteration: &AnalysisIteration) -> Vec<String> {
    let mut issues = Vec::new();
    if iteration.quality_score < CRITICAL_QUALITY {
        issues.push(format!("Very low quality score: {:.2}", iteration.quality_score));
    }
    let issue_count = iteration.accessibility_issues.len();
    if issue_count > CRITICAL_ISSUE_COUNT {
        issues.push(format!("High accessibility issue count: {issue_count}"));
    }
    if iteration.ui_elements_detected == 0 {
        issues.push("No UI elements detected".to_string());
    }
    issues
}

/// A cooldown too long for `Duration` means engagement never goes stale.
fn engagement_is_stale(state: &SessionState, cooldown: Option<Duration>, now: DateTime<Utc>) -> bool {
    match (state.last_user_engagement, cooldown) {
        (None, _) => true,
        (Some(at), Some(cooldown)) => now.signed_duration_since(at) > cooldown,
        (Some(_), None) => false,
    }
}

/// Recommended next action for `state` at `now`. Pure: reads state only.
pub fn decide(
    state: &SessionState,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> (EngagementAction, ActionContext) {
    let confidence = state.current_confidence;
    let iterations = state.iterations.len();
    let cooldown = Duration::try_minutes(config.engagement_cooldown_minutes);

    let action = if !state.critical_issues.is_empty() {
        EngagementAction::ImmediateAttention
    } else if confidence >= config.ready_threshold {
        EngagementAction::ReadyForReview
    } else if iterations >= config.max_iterations {
        EngagementAction::SessionComplete
    } else if confidence < config.low_threshold
        && iterations >= config.min_iterations
        && engagement_is_stale(state, cooldown, now)
    {
        EngagementAction::RequestInput
    } else {
        EngagementAction::ContinueAnalysis
    };

    let context = ActionContext {
        confidence,
        iterations,
        session_duration: state.duration_secs(now),
        confidence_level: ConfidenceLevel::from_confidence(confidence),
        critical_issues_count: state.critical_issues.len(),
    };
    (action, context)
}
