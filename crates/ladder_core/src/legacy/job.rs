//! At-least-once job queue for legacy record mapping.
//!
//! # Responsibility
//! - Hold pending mapper jobs and run them through a caller handler.
//! - Requeue retryable failures until the attempt budget is spent.
//!
//! # Invariants
//! - A job is attempted at most `max_attempts` times.
//! - A job that fails for good lands in the dead-letter list exactly once.
//! - Handlers must be idempotent: a job may run again after a partial run.

use super::LegacyFormat;
use crate::model::RecordId;
use log::{info, warn};
use std::collections::VecDeque;

pub type JobId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyJob {
    pub id: JobId,
    pub record_id: RecordId,
    pub format: LegacyFormat,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Outcome of one handler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Success,
    /// Failed; `retryable` failures go back on the queue.
    Failed { message: String, retryable: bool },
}

impl JobResult {
    pub fn retry(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            retryable: false,
        }
    }
}

pub trait JobHandler {
    fn execute(&mut self, job: &LegacyJob) -> JobResult;
}

impl<F> JobHandler for F
where
    F: FnMut(&LegacyJob) -> JobResult,
{
    fn execute(&mut self, job: &LegacyJob) -> JobResult {
        self(job)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub job: LegacyJob,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: usize,
    pub retried: usize,
    pub dead: usize,
}

#[derive(Debug)]
pub struct JobQueue {
    pending: VecDeque<LegacyJob>,
    dead: Vec<DeadLetter>,
    max_attempts: u32,
    next_id: JobId,
}

impl JobQueue {
    /// `max_attempts` of zero is treated as one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            dead: Vec::new(),
            max_attempts: max_attempts.max(1),
            next_id: 1,
        }
    }

    pub fn enqueue(&mut self, record_id: RecordId, format: LegacyFormat) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push_back(LegacyJob {
            id,
            record_id,
            format,
            attempts: 0,
            last_error: None,
        });
        info!("event=legacy_job_enqueue module=legacy status=ok job_id={id} record_id={record_id}");
        id
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn dead_letters(&self) -> &[DeadLetter] {
        &self.dead
    }

    /// Runs queued jobs until the queue is empty. Retryable failures are
    /// requeued at the back so other jobs make progress first.
    pub fn drain(&mut self, handler: &mut dyn JobHandler) -> DrainReport {
        let mut report = DrainReport::default();
        while let Some(mut job) = self.pending.pop_front() {
            job.attempts += 1;
            match handler.execute(&job) {
                JobResult::Success => {
                    report.succeeded += 1;
                    info!(
                        "event=legacy_job module=legacy status=ok job_id={} attempts={}",
                        job.id, job.attempts
                    );
                }
                JobResult::Failed { message, retryable } => {
                    job.last_error = Some(message.clone());
                    if retryable && job.attempts < self.max_attempts {
                        report.retried += 1;
                        warn!(
                            "event=legacy_job module=legacy status=retry job_id={} attempts={} error={message}",
                            job.id, job.attempts
                        );
                        self.pending.push_back(job);
                    } else {
                        report.dead += 1;
                        warn!(
                            "event=legacy_job module=legacy status=error job_id={} attempts={} error={message}",
                            job.id, job.attempts
                        );
                        self.dead.push(DeadLetter {
                            job,
                            error: message,
                        });
                    }
                }
            }
        }
        report
    }

    /// Moves every dead letter back onto the queue with a fresh attempt
    /// budget.
    pub fn requeue_dead(&mut self) -> usize {
        let count = self.dead.len();
        for letter in self.dead.drain(..) {
            let mut job = letter.job;
            job.attempts = 0;
            self.pending.push_back(job);
        }
        count
    }
}
