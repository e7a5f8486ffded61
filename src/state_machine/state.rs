use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::Job;
use crate::error::BatchError;

/// The three states of a submitted job.
///
/// Each job flows through: QUEUED → RUNNING → FINISHED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Finished,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Drives a `Job` through its lifecycle.
pub struct StateMachine;

impl StateMachine {
    /// Move the job to `to`, recording the previous state in its history.
    ///
    /// Only `Queued -> Running` and `Running -> Finished` are legal. Finished
    /// is terminal: there is no retry edge back to Queued.
    pub fn advance(job: &mut Job, to: JobState) -> Result<(), BatchError> {
        let legal = matches!(
            (job.state, to),
            (JobState::Queued, JobState::Running) | (JobState::Running, JobState::Finished)
        );
        if !legal {
            return Err(BatchError::IllegalTransition {
                ordinal: job.ordinal,
                from: job.state,
                to,
            });
        }

        job.state_history.push(job.state);
        job.state = to;
        Ok(())
    }
}
