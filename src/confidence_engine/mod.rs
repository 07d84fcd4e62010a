pub mod engine;
pub mod event_bus;
pub mod factors;
pub mod feedback;
pub mod iteration;
pub mod journal;
pub mod policy;
pub mod state;
pub mod summary;

pub use engine::ConfidenceEngine;
pub use feedback::UserFeedback;
pub use iteration::{AnalysisIteration, ConfidenceFactors, IterationInput};
pub use state::{ActionContext, ConfidenceLevel, EngagementAction, SessionState};
pub use summary::SessionSummary;
