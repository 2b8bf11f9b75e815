//! Job completion polling
//!
//! `Polling → {Succeeded, Failed, TimedOut, Cancelled}`; every outcome is
//! terminal and the loop stops the moment a terminal status is observed.

use crate::{types::TranscriptionJob, ClientError, Config, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Repeatedly fetches a job until it finishes, times out or is cancelled
#[derive(Clone, Copy, Debug)]
pub struct JobPoller {
    interval: Duration,
    timeout: Duration,
}

impl JobPoller {
    /// Create a poller with an explicit interval and overall deadline
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Poller using the interval and deadline from the client config
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.poll_interval, config.poll_timeout)
    }

    /// Delay between fetches
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Overall deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `fetch` until the job reaches a terminal status
    ///
    /// A terminal snapshot whose output carries an error is returned as
    /// [`ClientError::Job`]; a `Failed` snapshot without an error message is
    /// returned as-is. Fetch errors propagate unchanged.
    pub async fn poll<F, Fut>(
        &self,
        job_id: &str,
        mut fetch: F,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionJob>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TranscriptionJob>>,
    {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            if Instant::now() >= deadline {
                return Err(timed_out(job_id, started, attempts));
            }

            attempts += 1;
            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                job = timeout_at(deadline, fetch()) => match job {
                    Ok(job) => job?,
                    Err(_) => return Err(timed_out(job_id, started, attempts)),
                },
            };
            debug!(%job_id, status = %job.status, attempts, "Fetched job status");

            if job.status.is_terminal() {
                return settle(job_id, job);
            }

            // The last sleep never runs past the deadline.
            let wake = (Instant::now() + self.interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = sleep_until(wake) => {}
            }
        }
    }
}

fn timed_out(job_id: &str, started: Instant, attempts: u32) -> ClientError {
    let elapsed = started.elapsed();
    warn!(%job_id, ?elapsed, attempts, "Gave up waiting for job");
    ClientError::Timeout {
        job_id: job_id.to_string(),
        elapsed,
    }
}

fn settle(job_id: &str, job: TranscriptionJob) -> Result<TranscriptionJob> {
    match job.error_message() {
        Some(message) => Err(ClientError::Job {
            job_id: job_id.to_string(),
            message: message.to_string(),
        }),
        None => Ok(job),
    }
}
