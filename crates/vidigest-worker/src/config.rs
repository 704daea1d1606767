//! Worker runtime configuration.

/// Knobs for the batch-consumption loop, from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Messages per receive call (SQS caps this at 10).
    pub batch_size: i32,
    /// Long-poll wait per receive call.
    pub wait_seconds: i32,
    /// Drain the queue once and exit instead of looping forever.
    pub run_once: bool,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            batch_size: env_or("WORKER_BATCH_SIZE", 10),
            wait_seconds: env_or("WORKER_WAIT_SECONDS", 20),
            run_once: std::env::var("WORKER_RUN_ONCE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn env_or(name: &str, default: i32) -> i32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_env();
        assert!(config.batch_size >= 1);
        assert!(config.wait_seconds >= 0);
    }
}
