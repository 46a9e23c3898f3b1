//! Event loop configuration structures.

use serde::{Deserialize, Serialize};

/// Tuning parameters for an event loop and its managed worker pool.
///
/// All values are tuning constants, not correctness requirements: any
/// maximum wait large enough to avoid busy-waiting and small enough to
/// re-check timers promptly is acceptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Upper bound, in milliseconds, on a single blocking wait inside a
    /// loop pass. Bounds the wait even when no timer is pending so the loop
    /// periodically re-evaluates.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Number of managed worker threads started by `run_pool`.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Stack size for managed worker threads, in bytes.
    #[serde(default = "default_thread_stack_size")]
    pub thread_stack_size: usize,
    /// Name prefix for managed worker threads.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_max_wait_ms() -> u64 {
    // Roughly 65 seconds; breaking out of a wait early is fine, the loop
    // re-checks.
    0xFFFF
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_thread_stack_size() -> usize {
    2 * 1024 * 1024
}

fn default_thread_name_prefix() -> String {
    "el-worker".into()
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: default_max_wait_ms(),
            worker_count: default_worker_count(),
            thread_stack_size: default_thread_stack_size(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl LoopConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum blocking wait per loop pass.
    #[must_use]
    pub fn with_max_wait_ms(mut self, max_wait_ms: u64) -> Self {
        self.max_wait_ms = max_wait_ms;
        self
    }

    /// Sets the managed worker count used by `run_pool`.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Sets the stack size for managed worker threads.
    #[must_use]
    pub fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Sets the name prefix for managed worker threads.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_wait_ms == 0 {
            return Err("max_wait_ms must be greater than 0".into());
        }
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
