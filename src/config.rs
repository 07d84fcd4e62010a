use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{UxMirrorError, UxMirrorResult};

const CONFIG_FILE_NAME: &str = "ux-mirror.toml";
const CONFIG_ENV_VAR: &str = "UX_MIRROR_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

/// Decision-policy thresholds for the confidence engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_ready_threshold")]
    pub ready_threshold: f64,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    #[serde(default = "default_min_iterations")]
    pub min_iterations: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Minimum gap since the last user engagement before input is requested again.
    #[serde(default = "default_engagement_cooldown_minutes")]
    pub engagement_cooldown_minutes: i64,
    /// Capacity of the broadcast channel carrying engine events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_ready_threshold() -> f64 {
    0.85
}

fn default_low_threshold() -> f64 {
    0.3
}

fn default_min_iterations() -> usize {
    3
}

fn default_max_iterations() -> usize {
    15
}

fn default_engagement_cooldown_minutes() -> i64 {
    10
}

fn default_event_capacity() -> usize {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ready_threshold: default_ready_threshold(),
            low_threshold: default_low_threshold(),
            min_iterations: default_min_iterations(),
            max_iterations: default_max_iterations(),
            engagement_cooldown_minutes: default_engagement_cooldown_minutes(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Tuning for the heuristic element detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorConfig {
    /// Elements scoring below this are dropped before deduplication.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_dedup_iou_threshold")]
    pub dedup_iou_threshold: f32,
    /// Grayscale standard deviation below which a region counts as flat-coloured.
    #[serde(default = "default_button_flatness")]
    pub button_max_stddev: f32,
    #[serde(default = "default_icon_region_size")]
    pub icon_region_size: u32,
    /// Upper bound on icon candidates emitted per frame (strongest corner clusters win).
    #[serde(default = "default_max_icon_candidates")]
    pub max_icon_candidates: usize,
    #[serde(default = "default_true")]
    pub enable_ocr: bool,
}

fn default_confidence_threshold() -> f32 {
    0.3
}

fn default_dedup_iou_threshold() -> f32 {
    0.5
}

fn default_button_flatness() -> f32 {
    30.0
}

fn default_icon_region_size() -> u32 {
    40
}

fn default_max_icon_candidates() -> usize {
    200
}

fn default_true() -> bool {
    true
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            dedup_iou_threshold: default_dedup_iou_threshold(),
            button_max_stddev: default_button_flatness(),
            icon_region_size: default_icon_region_size(),
            max_icon_candidates: default_max_icon_candidates(),
            enable_ocr: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JournalConfig {
    /// Append session summaries to a JSONL journal when a session ends.
    #[serde(default)]
    pub enabled: bool,
    /// Overrides the default journal directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn resolve_config_path() -> UxMirrorResult<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(explicit);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found via {CONFIG_ENV_VAR}");
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_ENV_VAR} points to a missing file");
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(UxMirrorError::Config(format!(
        "{CONFIG_FILE_NAME} not found via {CONFIG_ENV_VAR}, next to executable or in working directory"
    )))
}

pub fn load_config() -> UxMirrorResult<AppConfig> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

/// Like [`load_config`], but a missing or unreadable file yields the built-in defaults.
pub fn load_config_or_default() -> AppConfig {
    match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::info!(error = %e, "using default configuration");
            AppConfig::default()
        }
    }
}

pub fn load_config_from(path: &Path) -> UxMirrorResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> UxMirrorResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

impl AppConfig {
    pub fn validate(&self) -> UxMirrorResult<()> {
        let e = &self.engine;
        if !(0.0..=1.0).contains(&e.ready_threshold) || !(0.0..=1.0).contains(&e.low_threshold) {
            return Err(UxMirrorError::Config(
                "engine thresholds must lie within [0, 1]".into(),
            ));
        }
        if e.low_threshold > e.ready_threshold {
            return Err(UxMirrorError::Config(
                "engine.low_threshold must not exceed engine.ready_threshold".into(),
            ));
        }
        if e.min_iterations > e.max_iterations {
            return Err(UxMirrorError::Config(
                "engine.min_iterations must not exceed engine.max_iterations".into(),
            ));
        }
        if e.engagement_cooldown_minutes < 0 {
            return Err(UxMirrorError::Config(
                "engine.engagement_cooldown_minutes must be non-negative".into(),
            ));
        }
        if chrono::Duration::try_minutes(e.engagement_cooldown_minutes).is_none() {
            return Err(UxMirrorError::Config(
                "engine.engagement_cooldown_minutes is out of range".into(),
            ));
        }
        if e.event_capacity == 0 {
            return Err(UxMirrorError::Config("engine.event_capacity must be positive".into()));
        }
        let d = &self.detector;
        if !(0.0..=1.0).contains(&d.confidence_threshold)
            || !(0.0..=1.0).contains(&d.dedup_iou_threshold)
        {
            return Err(UxMirrorError::Config(
                "detector thresholds must lie within [0, 1]".into(),
            ));
        }
        if d.icon_region_size == 0 {
            return Err(UxMirrorError::Config("detector.icon_region_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.engine.ready_threshold, 0.85);
        assert_eq!(cfg.engine.low_threshold, 0.3);
        assert_eq!(cfg.engine.min_iterations, 3);
        assert_eq!(cfg.engine.max_iterations, 15);
        assert_eq!(cfg.engine.engagement_cooldown_minutes, 10);
        assert_eq!(cfg.detector.confidence_threshold, 0.3);
        assert_eq!(cfg.detector.dedup_iou_threshold, 0.5);
        assert!(!cfg.journal.enabled);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [engine]
            max_iterations = 20

            [detector]
            enable_ocr = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.engine.max_iterations, 20);
        assert_eq!(cfg.engine.min_iterations, 3);
        assert!(!cfg.detector.enable_ocr);
        assert_eq!(cfg.detector.icon_region_size, 40);
    }

    #[test]
    fn save_then_load_preserves_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut cfg = AppConfig::default();
        cfg.engine.ready_threshold = 0.9;
        cfg.journal.enabled = true;
        save_config_to(&cfg, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[engine]\nlow_threshold = 0.9\nready_threshold = 0.5\n").unwrap();
        assert!(matches!(load_config_from(&path), Err(UxMirrorError::Config(_))));
    }

    #[test]
    fn rejects_out_of_range_cooldown() {
        let mut cfg = AppConfig::default();
        cfg.engine.engagement_cooldown_minutes = i64::MAX;
        assert!(matches!(cfg.validate(), Err(UxMirrorError::Config(_))));

        cfg.engine.engagement_cooldown_minutes = 60 * 24 * 365;
        assert!(cfg.validate().is_ok());
    }
}
