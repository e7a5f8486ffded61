use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::BatchError;
use crate::fasta::SequenceRecord;
use crate::launch::{JobFactory, JobHandle, Launcher};
use crate::naming::NamingPolicy;
use crate::state_machine::{Job, JobOutcome, JobRecord, JobState, StateMachine};

/// Hard ceiling on concurrent jobs imposed by the remote service's fair-use policy.
pub const MAX_CONCURRENT_CEILING: usize = 20;

/// Default pause between two consecutive launches.
pub const DEFAULT_LAUNCH_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub launch_delay: Duration,
    /// Kill and free a job's slot once it has been running this long.
    pub job_timeout: Option<Duration>,
}

impl SchedulerConfig {
    /// Build a config, clamping `max_concurrent` into `1..=20`.
    pub fn new(max_concurrent: usize, poll_interval_secs: f64) -> Result<Self, BatchError> {
        if !poll_interval_secs.is_finite() || poll_interval_secs <= 0.0 {
            return Err(BatchError::Config(format!(
                "polling time must be a positive number of seconds, got {poll_interval_secs}"
            )));
        }
        let clamped = max_concurrent.clamp(1, MAX_CONCURRENT_CEILING);
        if clamped != max_concurrent {
            warn!(requested = max_concurrent, used = clamped, "clamped max concurrent jobs");
        }

        Ok(Self {
            max_concurrent: clamped,
            poll_interval: Duration::from_secs_f64(poll_interval_secs),
            launch_delay: DEFAULT_LAUNCH_DELAY,
            job_timeout: None,
        })
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Sleep between two single-job checks while the pool is full.
    fn poll_step(&self) -> Duration {
        self.poll_interval / self.max_concurrent as u32
    }
}

/// Phases of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fill free slots from the record source.
    Admitting,
    /// Pool is full: check one job at a time until a slot frees.
    Polling,
    /// Source exhausted: check all jobs every full poll interval.
    Draining,
    Done,
}

/// Receives scheduler events, e.g. to drive a progress display.
pub trait ProgressSink {
    fn admitted(&self, _job: &Job, _running: usize) {}
    fn finished(&self, _record: &JobRecord, _running: usize) {}
}

/// Sink that ignores every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Summary of a whole run, returned once every admitted job has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub admitted: usize,
    pub peak_running: usize,
    /// Records in completion order.
    pub jobs: Vec<JobRecord>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|j| j.outcome.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.iter().filter(|j| !j.outcome.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures().next().is_none()
    }
}

struct Slot<H> {
    job: Job,
    handle: H,
    launched_at: Instant,
}

/// Admission-controlled job scheduler.
///
/// Owns every in-flight job and its process handle. At most
/// `max_concurrent` jobs are running at any time; a job leaves its slot as
/// soon as it is observed finished, whatever its exit status.
pub struct Scheduler<L: Launcher> {
    config: SchedulerConfig,
    launcher: L,
    naming: NamingPolicy,
    factory: JobFactory,
    out_dir: PathBuf,
    run_id: Uuid,
    phase: Phase,
    slots: Vec<Option<Slot<L::Handle>>>,
    running: usize,
    poll_cursor: usize,
    exhausted: bool,
    admitted: usize,
    peak_running: usize,
    records: Vec<JobRecord>,
}

impl<L: Launcher> Scheduler<L> {
    pub fn new(
        config: SchedulerConfig,
        launcher: L,
        naming: NamingPolicy,
        factory: JobFactory,
        out_dir: PathBuf,
    ) -> Self {
        let slots = (0..config.max_concurrent).map(|_| None).collect();
        Self {
            config,
            launcher,
            naming,
            factory,
            out_dir,
            run_id: Uuid::new_v4(),
            phase: Phase::Admitting,
            slots,
            running: 0,
            poll_cursor: 0,
            exhausted: false,
            admitted: 0,
            peak_running: 0,
            records: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Drive the whole batch: admit, poll, drain. Returns once the source is
    /// exhausted and no job is left running.
    pub async fn run<I>(
        mut self,
        mut records: I,
        progress: &impl ProgressSink,
    ) -> Result<BatchReport, BatchError>
    where
        I: Iterator<Item = io::Result<SequenceRecord>>,
    {
        let started_at = Utc::now();
        info!(
            max_concurrent = self.config.max_concurrent,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "starting batch"
        );

        while self.phase != Phase::Done {
            self.phase = match self.phase {
                Phase::Admitting => {
                    self.admit(&mut records, progress).await?;
                    if self.exhausted {
                        debug!(running = self.running, "source exhausted, draining");
                        Phase::Draining
                    } else {
                        Phase::Polling
                    }
                }
                Phase::Polling => {
                    self.poll_next(progress).await?;
                    if self.running < self.config.max_concurrent {
                        Phase::Admitting
                    } else {
                        Phase::Polling
                    }
                }
                Phase::Draining => {
                    if self.running == 0 {
                        Phase::Done
                    } else {
                        sleep(self.config.poll_interval).await;
                        self.check_all(progress)?;
                        Phase::Draining
                    }
                }
                Phase::Done => Phase::Done,
            };
        }

        info!(admitted = self.admitted, "batch complete");
        Ok(BatchReport {
            run_id: self.run_id,
            started_at,
            finished_at: Utc::now(),
            admitted: self.admitted,
            peak_running: self.peak_running,
            jobs: self.records,
        })
    }

    async fn admit<I>(&mut self, records: &mut I, progress: &impl ProgressSink) -> Result<(), BatchError>
    where
        I: Iterator<Item = io::Result<SequenceRecord>>,
    {
        while self.running < self.config.max_concurrent && !self.exhausted {
            let Some(record) = records.next().transpose()? else {
                self.exhausted = true;
                break;
            };
            self.launch(record, progress)?;
            sleep(self.config.launch_delay).await;
        }
        Ok(())
    }

    fn launch(&mut self, record: SequenceRecord, progress: &impl ProgressSink) -> Result<(), BatchError> {
        let output_path = self.out_dir.join(self.naming.file_name(&record));
        let mut job = Job::new(record.index, output_path, record.residues);
        let request = self.factory.build(&job.sequence, &job.output_path);
        self.admitted += 1;

        let handle = match self.launcher.launch(&request) {
            Ok(handle) => handle,
            // A missing helper program fails every job the same way.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BatchError::Launch {
                    ordinal: job.ordinal,
                    source: e,
                });
            }
            Err(e) => {
                warn!(ordinal = job.ordinal, error = %e, "job failed to launch");
                let record = JobRecord::from_job(
                    &job,
                    JobOutcome::LaunchFailed {
                        reason: e.to_string(),
                    },
                );
                progress.finished(&record, self.running);
                self.records.push(record);
                return Ok(());
            }
        };

        StateMachine::advance(&mut job, JobState::Running)?;
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| BatchError::Config("no free slot for admitted job".into()))?;

        self.running += 1;
        self.peak_running = self.peak_running.max(self.running);
        debug_assert!(self.running <= self.config.max_concurrent);
        info!(
            ordinal = job.ordinal,
            output = %job.output_path.display(),
            running = self.running,
            "job launched"
        );
        progress.admitted(&job, self.running);

        self.slots[index] = Some(Slot {
            job,
            handle,
            launched_at: Instant::now(),
        });
        Ok(())
    }

    /// Check the next occupied slot after sleeping one poll step.
    async fn poll_next(&mut self, progress: &impl ProgressSink) -> Result<(), BatchError> {
        let len = self.slots.len();
        let Some(index) = (0..len)
            .map(|offset| (self.poll_cursor + offset) % len)
            .find(|&i| self.slots[i].is_some())
        else {
            return Ok(());
        };
        self.poll_cursor = (index + 1) % len;

        sleep(self.config.poll_step()).await;
        self.check_slot(index, progress)?;
        Ok(())
    }

    fn check_all(&mut self, progress: &impl ProgressSink) -> Result<(), BatchError> {
        for index in 0..self.slots.len() {
            self.check_slot(index, progress)?;
        }
        Ok(())
    }

    /// Non-blocking status check; frees the slot if the job is done or overdue.
    fn check_slot(&mut self, index: usize, progress: &impl ProgressSink) -> Result<(), BatchError> {
        let Some(slot) = self.slots[index].as_mut() else {
            return Ok(());
        };

        let outcome = match slot.handle.try_exit() {
            Ok(Some(exit)) => JobOutcome::from_exit(exit),
            Err(e) => {
                warn!(ordinal = slot.job.ordinal, error = %e, "status check failed, abandoning job");
                if let Err(kill_err) = slot.handle.kill() {
                    warn!(ordinal = slot.job.ordinal, error = %kill_err, "failed to kill abandoned job");
                }
                JobOutcome::StatusUnknown {
                    reason: e.to_string(),
                }
            }
            Ok(None) => match self.config.job_timeout {
                Some(timeout) if slot.launched_at.elapsed() >= timeout => {
                    if let Err(e) = slot.handle.kill() {
                        warn!(ordinal = slot.job.ordinal, error = %e, "failed to kill timed out job");
                    }
                    JobOutcome::TimedOut
                }
                _ => return Ok(()),
            },
        };

        let Some(mut slot) = self.slots[index].take() else {
            return Ok(());
        };
        self.running -= 1;
        StateMachine::advance(&mut slot.job, JobState::Finished)?;
        let record = JobRecord::from_job(&slot.job, outcome);

        if record.outcome.is_success() {
            info!(ordinal = record.ordinal, running = self.running, "job finished");
        } else {
            warn!(
                ordinal = record.ordinal,
                output = %record.output_path.display(),
                outcome = %record.outcome,
                "job finished unsuccessfully"
            );
        }
        progress.finished(&record, self.running);
        self.records.push(record);
        Ok(())
    }
}
