/// Bounded retry loop with count-based give-up
use std::fmt::Display;
use std::future::Future;
use tracing::{info, warn};

/// Retry settings for an operation that is re-run from scratch on failure
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub description: String,
}

/// Every attempt failed, or none was allowed
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: Option<E>,
}

/// Successful value and the attempt number (1-based) that produced it
#[derive(Debug)]
pub struct Attempted<T> {
    pub value: T,
    pub attempt: u32,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_attempts: u32, description: impl Into<String>) -> Self {
        Self {
            max_attempts,
            description: description.into(),
        }
    }

    /// Run `operation` until it succeeds or `max_attempts` attempts have failed
    ///
    /// The operation receives the 1-based attempt number. With
    /// `max_attempts == 0` the operation is never called.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<Attempted<T>, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_attempts {
            let attempt = attempts + 1;

            match operation(attempt).await {
                Ok(value) => {
                    info!(attempt, "✓ {}", self.description);
                    return Ok(Attempted { value, attempt });
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "{} failed: {}",
                        self.description,
                        e
                    );
                    last_error = Some(e);
                }
            }

            attempts += 1;
        }

        Err(RetryExhausted {
            attempts,
            last_error,
        })
    }
}
