//! Replenishing-quota rate limiting toward the AI provider.
//!
//! A token bucket on a fair semaphore: callers take a token per provider
//! call and queue FIFO when the bucket is empty; a background task restores
//! one token per refill interval up to capacity. As long as the queue
//! drains at the refill rate no caller waits forever, and `shutdown`
//! releases every queued waiter immediately (unblocked, without a token).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::ExtractionError;

pub struct ProviderLimiter {
    semaphore: Arc<Semaphore>,
    refill_task: JoinHandle<()>,
}

impl ProviderLimiter {
    /// A limiter holding `capacity` tokens, restoring one every
    /// `refill_interval`. Must be created inside a tokio runtime.
    pub fn new(capacity: usize, refill_interval: Duration) -> Self {
        let semaphore = Arc::new(Semaphore::new(capacity));

        let refill_task = {
            let semaphore = Arc::clone(&semaphore);
            tokio::spawn(async move {
                // First refill one interval from now, not immediately
                let start = tokio::time::Instant::now() + refill_interval;
                let mut ticker = tokio::time::interval_at(start, refill_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if semaphore.is_closed() {
                        break;
                    }
                    if semaphore.available_permits() < capacity {
                        semaphore.add_permits(1);
                    }
                }
            })
        };

        Self {
            semaphore,
            refill_task,
        }
    }

    /// Take one token, waiting FIFO behind earlier callers when the bucket
    /// is empty. Fails with [`ExtractionError::Shutdown`] once the limiter
    /// is shut down — including for callers already queued.
    pub async fn acquire(&self) -> Result<(), ExtractionError> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ExtractionError::Shutdown)?;
        // Token-bucket semantics: the token is consumed, not returned on
        // drop; the refill task restores capacity.
        permit.forget();
        Ok(())
    }

    /// Tokens currently available without waiting.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Close the bucket: all queued and future `acquire` calls unblock
    /// with [`ExtractionError::Shutdown`].
    pub fn shutdown(&self) {
        debug!("provider limiter shutting down");
        self.semaphore.close();
    }
}

impl Drop for ProviderLimiter {
    fn drop(&mut self) {
        self.semaphore.close();
        self.refill_task.abort();
    }
}
