use std::io::Write;
use std::path::{Path, PathBuf};

use crate::confidence_engine::summary::SessionSummary;
use crate::errors::UxMirrorResult;

const JOURNAL_FILE_NAME: &str = "session_summaries.jsonl";

/// Append-only JSONL file of finished session summaries. Reporting only:
/// nothing is ever read back into the engine.
pub struct SummaryJournal {
    file_path: PathBuf,
}

impl SummaryJournal {
    /// Journal inside `dir`, created on first append.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            file_path: dir.as_ref().join(JOURNAL_FILE_NAME),
        }
    }

    /// Journal under the platform data directory, falling back to the
    /// working directory.
    pub fn default_location() -> Self {
        Self::in_dir(data_dir_or_cwd())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn append(&self, summary: &SessionSummary) -> UxMirrorResult<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(summary)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(
            path = %self.file_path.display(),
            session_id = %summary.session_id,
            "session summary journaled"
        );
        Ok(())
    }
}

/// `~/.local/share/ux-mirror/reports` on Linux, `%LOCALAPPDATA%\ux-mirror\reports`
/// on Windows, the working directory otherwise.
fn data_dir_or_cwd() -> PathBuf {
    match dirs::data_local_dir() {
        Some(base) => base.join("ux-mirror").join("reports"),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence_engine::state::SessionState;
    use chrono::Utc;

    #[test]
    fn appends_one_line_per_summary() {
        let dir = tempfile::tempdir().unwrap();
        let journal = SummaryJournal::in_dir(dir.path().join("nested"));
        let now = Utc::now();
        for id in ["a", "b"] {
            let state = SessionState::new(id, serde_json::Map::new(), now);
            journal.append(&SessionSummary::from_state(&state, now)).unwrap();
        }

        let content = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: SessionSummary = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.session_id, "a");
        assert_eq!(first.iterations_completed, 0);
    }
}
