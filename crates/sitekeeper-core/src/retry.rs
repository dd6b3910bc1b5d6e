//! Bounded retry for transient contention.
//!
//! Package managers and the bench serialize through their own locks. When a
//! lock is held by another process the command fails fast with a recognizable
//! message; that failure is retried with backoff. Every other failure is
//! returned on the first attempt.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::Result;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` means one attempt total.
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Whether the given retry number (0-indexed) is within budget.
    pub fn should_retry(&self, retry: u32) -> bool {
        retry < self.max_retries
    }

    /// Delay before retry number `retry` (0-indexed), capped at `max_delay_ms`.
    pub fn delay(&self, retry: u32) -> Duration {
        let ms = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Exponential => self
                .base_delay_ms
                .saturating_mul(2u64.saturating_pow(retry)),
        };
        Duration::from_millis(ms.min(self.max_delay_ms))
    }
}

impl Default for RetryPolicy {
    /// 5 retries, exponential from 2s, capped at 30s.
    fn default() -> Self {
        Self {
            max_retries: 5,
            strategy: BackoffStrategy::Exponential,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Transient detection
// ---------------------------------------------------------------------------

fn contention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(could not get lock|unable to acquire the dpkg|resource temporarily unavailable|lock wait timeout exceeded|is locked by another process|another process is using|bench is locked|temporary failure in name resolution)",
        )
        .unwrap()
    })
}

/// True when a failed command's output says another process holds a lock.
pub fn is_transient(output: &CommandOutput) -> bool {
    !output.success() && contention_re().is_match(&output.combined())
}

/// Run `spec`, retrying transient failures per `policy`. The final output is
/// returned as-is; callers decide whether a non-zero exit is an error.
pub fn run_with_retry(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    policy: &RetryPolicy,
) -> Result<CommandOutput> {
    let mut retry = 0;
    loop {
        let output = runner.run(spec)?;
        if !is_transient(&output) || !policy.should_retry(retry) {
            return Ok(output);
        }
        let delay = policy.delay(retry);
        tracing::warn!(
            command = %spec.display(),
            attempt = retry + 1,
            delay_ms = delay.as_millis() as u64,
            "lock held by another process, retrying"
        );
        std::thread::sleep(delay);
        retry += 1;
    }
}
