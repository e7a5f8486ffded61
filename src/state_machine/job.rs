use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::JobState;

/// How an external process ended, as observed by a non-blocking poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Structured outcome of a finished job.
///
/// Every variant frees the job's slot; none of them causes a resubmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed { code: i32 },
    Killed,
    TimedOut,
    LaunchFailed { reason: String },
    /// The job's status could not be read; it was killed and abandoned.
    StatusUnknown { reason: String },
}

impl JobOutcome {
    pub fn from_exit(exit: ExitInfo) -> Self {
        if exit.success() {
            return JobOutcome::Succeeded;
        }
        match exit.code {
            Some(code) => JobOutcome::Failed { code },
            None => JobOutcome::Killed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::Succeeded => write!(f, "succeeded"),
            JobOutcome::Failed { code } => write!(f, "exited with status {code}"),
            JobOutcome::Killed => write!(f, "terminated by signal"),
            JobOutcome::TimedOut => write!(f, "timed out"),
            JobOutcome::LaunchFailed { reason } => write!(f, "launch failed: {reason}"),
            JobOutcome::StatusUnknown { reason } => write!(f, "status check failed: {reason}"),
        }
    }
}

/// A single analysis job: one sequence, one output path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub ordinal: usize,
    pub output_path: PathBuf,
    pub sequence: String,
    pub state: JobState,
    pub state_history: Vec<JobState>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(ordinal: usize, output_path: PathBuf, sequence: String) -> Self {
        Self {
            ordinal,
            output_path,
            sequence,
            state: JobState::Queued,
            state_history: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Record produced once a job has been observed finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub ordinal: usize,
    pub output_path: PathBuf,
    pub outcome: JobOutcome,
    pub state_transitions: Vec<JobState>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobRecord {
    /// Generate a record from a finished job.
    pub fn from_job(job: &Job, outcome: JobOutcome) -> Self {
        let now = Utc::now();
        let duration = now - job.created_at;
        let mut transitions = job.state_history.clone();
        transitions.push(job.state);

        Self {
            ordinal: job.ordinal,
            output_path: job.output_path.clone(),
            outcome,
            state_transitions: transitions,
            started_at: job.created_at,
            completed_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_creation_defaults() {
        let job = Job::new(7, PathBuf::from("/tmp/out/07"), "MKVL".into());
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.ordinal, 7);
        assert!(job.state_history.is_empty());
    }

    #[test]
    fn outcome_from_exit() {
        assert_eq!(JobOutcome::from_exit(ExitInfo { code: Some(0) }), JobOutcome::Succeeded);
        assert_eq!(
            JobOutcome::from_exit(ExitInfo { code: Some(2) }),
            JobOutcome::Failed { code: 2 }
        );
        assert_eq!(JobOutcome::from_exit(ExitInfo { code: None }), JobOutcome::Killed);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(JobOutcome::Failed { code: 1 }.to_string(), "exited with status 1");
        assert_eq!(
            JobOutcome::LaunchFailed {
                reason: "not found".into()
            }
            .to_string(),
            "launch failed: not found"
        );
        assert_eq!(
            JobOutcome::StatusUnknown {
                reason: "EIO".into()
            }
            .to_string(),
            "status check failed: EIO"
        );
    }

    #[test]
    fn record_from_job_includes_final_state() {
        let mut job = Job::new(1, PathBuf::from("1"), "M".into());
        job.state_history = vec![JobState::Queued, JobState::Running];
        job.state = JobState::Finished;

        let record = JobRecord::from_job(&job, JobOutcome::Succeeded);
        assert_eq!(
            record.state_transitions,
            vec![JobState::Queued, JobState::Running, JobState::Finished]
        );
        assert!(record.outcome.is_success());
        assert!(record.duration_ms >= 0);
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let json = serde_json::to_string(&JobOutcome::Failed { code: 3 }).unwrap();
        assert_eq!(json, r#"{"kind":"failed","code":3}"#);
    }
}
