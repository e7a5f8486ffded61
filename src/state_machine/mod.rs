mod job;
mod state;

pub use job::{ExitInfo, Job, JobOutcome, JobRecord};
pub use state::{JobState, StateMachine};
