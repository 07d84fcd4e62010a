/// Iteration records: the loosely-typed ingestion shape and the immutable
/// record stored in a session.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{UxMirrorError, UxMirrorResult};

/// Quality assumed when an analyzer reports none.
pub const DEFAULT_QUALITY: f64 = 0.5;

/// One analysis result as produced by a detector or an external vision service.
/// Every field is optional so partial payloads deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationInput {
    pub quality_score: Option<f64>,
    pub ui_elements_detected: Option<i64>,
    pub accessibility_issues: Vec<String>,
    pub recommendations: Vec<String>,
    /// Seconds.
    pub response_time: Option<f64>,
    pub change_score: Option<f64>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// `IterationInput` after defaults and clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanIteration {
    pub quality_score: f64,
    pub ui_elements_detected: u64,
    pub accessibility_issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub response_time: Option<f64>,
    pub change_score: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn finite(field: &str, value: Option<f64>) -> UxMirrorResult<Option<f64>> {
    match value {
        Some(v) if !v.is_finite() => Err(UxMirrorError::InvalidIterationData(format!(
            "{field} is not a finite number"
        ))),
        other => Ok(other),
    }
}

impl IterationInput {
    /// Fill neutral defaults and clamp noisy values. Only non-finite numbers
    /// are rejected.
    pub fn sanitize(self) -> UxMirrorResult<CleanIteration> {
        let quality = finite("quality_score", self.quality_score)?;
        let response = finite("response_time", self.response_time)?;
        let change = finite("change_score", self.change_score)?;

        Ok(CleanIteration {
            quality_score: quality.unwrap_or(DEFAULT_QUALITY).clamp(0.0, 1.0),
            ui_elements_detected: self.ui_elements_detected.unwrap_or(0).max(0) as u64,
            accessibility_issues: self.accessibility_issues,
            recommendations: self.recommendations,
            response_time: response.filter(|rt| *rt >= 0.0),
            change_score: change.unwrap_or(0.0).clamp(0.0, 1.0),
            metadata: self.metadata,
        })
    }
}

/// Per-iteration confidence factors, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub consistency: f64,
    pub completeness: f64,
    pub validation: f64,
    pub stability: f64,
    pub coverage: f64,
}

impl ConfidenceFactors {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("consistency", self.consistency),
            ("completeness", self.completeness),
            ("validation", self.validation),
            ("stability", self.stability),
            ("coverage", self.coverage),
        ]
        .into_iter()
    }
}

/// A stored iteration. Built once by the engine and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisIteration {
    pub iteration_number: usize,
    pub timestamp: DateTime<Utc>,
    pub quality_score: f64,
    pub ui_elements_detected: u64,
    pub accessibility_issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub response_time: Option<f64>,
    pub change_score: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub confidence_factors: ConfidenceFactors,
}

impl AnalysisIteration {
    pub fn new(
        iteration_number: usize,
        timestamp: DateTime<Utc>,
        clean: CleanIteration,
        confidence_factors: ConfidenceFactors,
    ) -> Self {
        Self {
            iteration_number,
            timestamp,
            quality_score: clean.quality_score,
            ui_elements_detected: clean.ui_elements_detected,
            accessibility_issues: clean.accessibility_issues,
            recommendations: clean.recommendations,
            response_time: clean.response_time,
            change_score: clean.change_score,
            metadata: clean.metadata,
            confidence_factors,
        }
    }
}
