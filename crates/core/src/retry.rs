//! Delay schedules for polling operations.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// What one attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Done(T),
    /// Not ready yet; wait for the next slot.
    Retry,
}

/// A fixed schedule of waits, one before each attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self::new(delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect())
    }

    /// Number of attempts the schedule allows.
    pub fn attempts(&self) -> usize {
        self.delays.len()
    }

    /// Run `op` once per slot until it is done.
    ///
    /// Returns `Ok(None)` when every slot asked for a retry. An error ends the
    /// run immediately.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<Option<T>, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<Attempt<T>, E>>,
    {
        for (attempt, delay) in self.delays.iter().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            match op(attempt).await? {
                Attempt::Done(value) => return Ok(Some(value)),
                Attempt::Retry => {
                    debug!(attempt = attempt + 1, of = self.delays.len(), "Not ready, retrying");
                }
            }
        }
        Ok(None)
    }
}
