//! Instance status poller
//!
//! Provisioning, resizes and restarts all finish asynchronously. The poller
//! checks an instance's status at a fixed interval until it reaches the
//! target, enters a failure status, or the timeout expires. A timeout is a
//! hard failure, never a silent pass.

use super::models::{InstanceStatus, InstanceWrapper};
use super::DbaasClient;
use crate::client::ClientError;
use crate::config::PollConfig;
use crate::metrics;
use crate::poll::{wait_for_condition, CondCheckError, PollError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Where instance status comes from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Current status, or `None` when the instance no longer exists (404)
    async fn fetch_status(&self, id: &str) -> Result<Option<InstanceStatus>, ClientError>;
}

#[async_trait]
impl StatusSource for DbaasClient {
    async fn fetch_status(&self, id: &str) -> Result<Option<InstanceStatus>, ClientError> {
        let response = self.get_instance(id).await?;
        match response.status_code() {
            404 => Ok(None),
            200 => Ok(Some(response.json::<InstanceWrapper>()?.instance.status)),
            other => Err(ClientError::Decode(format!(
                "unexpected status {} while polling instance {}",
                other, id
            ))),
        }
    }
}

/// Wait errors
#[derive(Debug, Error)]
pub enum WaitError {
    #[error(
        "instance {id} did not reach {target} within {elapsed:?} ({attempts} checks, last seen {last:?})"
    )]
    Timeout {
        id: String,
        target: String,
        elapsed: Duration,
        attempts: u32,
        last: Option<InstanceStatus>,
    },

    #[error("instance {id} entered {status} while waiting for {target}")]
    FailedStatus {
        id: String,
        status: InstanceStatus,
        target: String,
    },

    #[error("instance {id} disappeared while waiting for {target}")]
    NotFound { id: String, target: String },

    #[error("status check for instance {id} failed: {source}")]
    Client {
        id: String,
        #[source]
        source: ClientError,
    },
}

/// Result of a successful wait
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// Final status, `None` once the instance is gone
    pub status: Option<InstanceStatus>,
    pub elapsed: Duration,
    pub attempts: u32,
    /// Statuses seen along the way, consecutive duplicates removed
    pub observed: Vec<InstanceStatus>,
}

/// Observations shared between checks of one wait
#[derive(Default)]
struct Observations {
    attempts: u32,
    seen: Vec<InstanceStatus>,
}

impl Observations {
    fn record(&mut self, status: Option<&InstanceStatus>) {
        self.attempts += 1;
        if let Some(status) = status {
            if self.seen.last() != Some(status) {
                self.seen.push(status.clone());
            }
        }
    }
}

/// Polls instance status at a fixed interval
pub struct InstancePoller<S> {
    source: S,
    interval: Duration,
    timeout: Duration,
}

impl<S: StatusSource> InstancePoller<S> {
    pub fn new(source: S, interval: Duration, timeout: Duration) -> Self {
        Self {
            source,
            interval,
            timeout,
        }
    }

    pub fn from_config(source: S, config: &PollConfig) -> Self {
        Self::new(source, config.interval(), config.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait until the instance reports `target`.
    ///
    /// ERROR and FAILED abort the wait unless they are the target.
    #[tracing::instrument(skip(self), fields(target = %target))]
    pub async fn wait_for_status(
        &self,
        id: &str,
        target: &InstanceStatus,
    ) -> Result<PollOutcome, WaitError> {
        let observations = Mutex::new(Observations::default());
        let start = Instant::now();

        let result = wait_for_condition(
            || async {
                let status = self.fetch(id).await?;
                observations.lock().record(status.as_ref());
                match status {
                    Some(status) if &status == target => Ok(status),
                    Some(status) if status.is_failure() => {
                        Err(CondCheckError::Failed(WaitError::FailedStatus {
                            id: id.to_string(),
                            status,
                            target: target.to_string(),
                        }))
                    }
                    Some(_) => Err(CondCheckError::NotYet),
                    None => Err(CondCheckError::Failed(WaitError::NotFound {
                        id: id.to_string(),
                        target: target.to_string(),
                    })),
                }
            },
            &self.interval,
            &self.timeout,
        )
        .await;

        self.finish("status", id, target.as_str(), start, observations, result.map(Some))
    }

    /// Wait for a resize to run its course: RESIZE must be observed before the
    /// instance counts as ACTIVE again.
    #[tracing::instrument(skip(self))]
    pub async fn wait_for_resize(&self, id: &str) -> Result<PollOutcome, WaitError> {
        let observations = Mutex::new(Observations::default());
        let start = Instant::now();
        let target = "RESIZE->ACTIVE";

        let result = wait_for_condition(
            || async {
                let status = self.fetch(id).await?;
                let mut observations = observations.lock();
                observations.record(status.as_ref());
                let resized = observations.seen.contains(&InstanceStatus::Resize);
                drop(observations);

                match status {
                    Some(InstanceStatus::Active) if resized => Ok(InstanceStatus::Active),
                    Some(status) if status.is_failure() => {
                        Err(CondCheckError::Failed(WaitError::FailedStatus {
                            id: id.to_string(),
                            status,
                            target: target.to_string(),
                        }))
                    }
                    Some(_) => Err(CondCheckError::NotYet),
                    None => Err(CondCheckError::Failed(WaitError::NotFound {
                        id: id.to_string(),
                        target: target.to_string(),
                    })),
                }
            },
            &self.interval,
            &self.timeout,
        )
        .await;

        self.finish("resize", id, target, start, observations, result.map(Some))
    }

    /// Wait until the instance is gone (404)
    #[tracing::instrument(skip(self))]
    pub async fn wait_for_deletion(&self, id: &str) -> Result<PollOutcome, WaitError> {
        let observations = Mutex::new(Observations::default());
        let start = Instant::now();

        let result = wait_for_condition(
            || async {
                let status = self.fetch(id).await?;
                observations.lock().record(status.as_ref());
                match status {
                    None => Ok(None),
                    Some(_) => Err(CondCheckError::NotYet),
                }
            },
            &self.interval,
            &self.timeout,
        )
        .await;

        self.finish("deletion", id, "404", start, observations, result)
    }

    async fn fetch(&self, id: &str) -> Result<Option<InstanceStatus>, WaitError> {
        self.source
            .fetch_status(id)
            .await
            .map_err(|source| WaitError::Client {
                id: id.to_string(),
                source,
            })
    }

    fn finish(
        &self,
        kind: &str,
        id: &str,
        target: &str,
        start: Instant,
        observations: Mutex<Observations>,
        result: Result<Option<InstanceStatus>, PollError<WaitError>>,
    ) -> Result<PollOutcome, WaitError> {
        let elapsed = start.elapsed();
        let Observations { attempts, seen } = observations.into_inner();

        match result {
            Ok(status) => {
                metrics::record_poll(kind, "ok", elapsed.as_secs_f64());
                tracing::info!(
                    instance = id,
                    target,
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    "Instance reached target"
                );
                Ok(PollOutcome {
                    status,
                    elapsed,
                    attempts,
                    observed: seen,
                })
            }
            Err(PollError::TimedOut { elapsed, attempts }) => {
                metrics::record_poll(kind, "timeout", elapsed.as_secs_f64());
                tracing::warn!(instance = id, target, attempts, observed = ?seen, "Wait timed out");
                Err(WaitError::Timeout {
                    id: id.to_string(),
                    target: target.to_string(),
                    elapsed,
                    attempts,
                    last: seen.last().cloned(),
                })
            }
            Err(PollError::PermanentError(e)) => {
                metrics::record_poll(kind, "failed", elapsed.as_secs_f64());
                tracing::warn!(instance = id, target, error = %e, "Wait failed");
                Err(e)
            }
        }
    }
}
