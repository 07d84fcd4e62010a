use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Notifications published by the engine as sessions evolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    SessionStarted {
        session_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    IterationAdded {
        session_id: String,
        iteration_number: usize,
        confidence: f64,
    },
    CriticalIssueRaised {
        session_id: String,
        issue: String,
    },
    FeedbackApplied {
        session_id: String,
        delta: f64,
        confidence: f64,
    },
    SessionEnded {
        session_id: String,
        iterations: usize,
        final_confidence: f64,
    },
}

/// Fan-out of engine events. Publishing never blocks and never fails: with no
/// subscribers the event is dropped, and slow subscribers observe `Lagged`.
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("engine event dropped: no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
