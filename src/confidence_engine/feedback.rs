use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const RATING_STEP: f64 = 0.05;
const WORD_STEP: f64 = 0.02;

const POSITIVE_WORDS: &[&str] = &["good", "great", "excellent", "clear", "smooth", "responsive"];
const NEGATIVE_WORDS: &[&str] = &["bad", "poor", "confusing", "slow", "unclear", "difficult"];

/// Feedback from a human reviewer. Ratings are on a 1-5 scale; unknown keys
/// are kept in `extra` and stored with the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_responsiveness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_clarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_ease: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_experience: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn vocabulary() -> Option<&'static Regex> {
    static VOCABULARY: OnceLock<Option<Regex>> = OnceLock::new();
    VOCABULARY
        .get_or_init(|| {
            let words: Vec<&str> = POSITIVE_WORDS.iter().chain(NEGATIVE_WORDS).copied().collect();
            let pattern = format!(r"(?i)\b(?:{})\b", words.join("|"));
            match Regex::new(&pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::error!(error = %e, "feedback vocabulary failed to compile");
                    None
                }
            }
        })
        .as_ref()
}

fn rating_delta(rating: Option<f64>) -> f64 {
    match rating {
        Some(r) if r.is_finite() && r >= 4.0 => RATING_STEP,
        Some(r) if r.is_finite() && r <= 2.0 => -RATING_STEP,
        _ => 0.0,
    }
}

/// Signed adjustment from free text: each distinct vocabulary word counts once,
/// matched as a whole word regardless of case.
pub fn text_delta(text: &str) -> f64 {
    let Some(re) = vocabulary() else {
        return 0.0;
    };
    let found: BTreeSet<String> = re
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    found
        .iter()
        .map(|w| {
            if POSITIVE_WORDS.contains(&w.as_str()) {
                WORD_STEP
            } else {
                -WORD_STEP
            }
        })
        .sum()
}

impl UserFeedback {
    /// Unclamped confidence adjustment implied by this feedback.
    pub fn confidence_delta(&self) -> f64 {
        let ratings = rating_delta(self.ui_responsiveness)
            + rating_delta(self.visual_clarity)
            + rating_delta(self.navigation_ease);
        let words = self.overall_experience.as_deref().map(text_delta).unwrap_or(0.0);
        ratings + words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ratings_move_confidence_in_steps() {
        let fb = UserFeedback {
            ui_responsiveness: Some(5.0),
            visual_clarity: Some(4.0),
            navigation_ease: Some(1.0),
            ..Default::default()
        };
        assert!(approx(fb.confidence_delta(), 0.05));

        let neutral = UserFeedback {
            ui_responsiveness: Some(3.0),
            visual_clarity: Some(f64::NAN),
            ..Default::default()
        };
        assert!(approx(neutral.confidence_delta(), 0.0));
    }

    #[test]
    fn words_match_whole_words_once() {
        assert!(approx(text_delta("Great, really GREAT and smooth"), 0.04));
        assert!(approx(text_delta("unclear and slow"), -0.04));
        // "badge" and "goodness" are not vocabulary words.
        assert!(approx(text_delta("badge goodness"), 0.0));
        assert!(approx(text_delta("clear but confusing"), 0.0));
    }

    #[test]
    fn unknown_keys_round_trip_through_extra() {
        let fb: UserFeedback = serde_json::from_str(
            r#"{"visual_clarity": 2, "overall_experience": "bad", "reviewer": "qa"}"#,
        )
        .unwrap();
        assert_eq!(fb.visual_clarity, Some(2.0));
        assert_eq!(fb.extra["reviewer"], "qa");
        assert!(approx(fb.confidence_delta(), -0.07));

        let json = serde_json::to_value(&fb).unwrap();
        assert_eq!(json["reviewer"], "qa");
        assert!(json.get("navigation_ease").is_none());
    }
}
