//! Configuration for index synchronization.

use crate::error::IndexError;
use std::time::Duration;

/// Default maximum number of containers a view scope may expand to.
pub const MAX_CONTAINERS_PER_VIEW: usize = 10_000;

/// Default maximum number of columns in a view schema.
pub const MAX_COLUMNS_PER_VIEW: usize = 152;

/// Default container id of the global root folder.
pub const DEFAULT_ROOT_CONTAINER_ID: u64 = 4489;

/// Configuration shared by the status tracker, scope resolver and builder.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// How long a PROCESSING or FAILED status may sit unchanged before it is reset.
    pub staleness_timeout: Duration,
    /// Maximum containers in a view scope, before and after expansion.
    pub max_containers_per_view: usize,
    /// Maximum columns in a view schema.
    pub max_columns_per_view: usize,
    /// How long a rebuild waits for the exclusive lock.
    pub lock_timeout: Duration,
    /// Root container that project views reconcile against.
    pub root_container_id: u64,
    /// Time-to-live of cached default column models.
    pub default_column_ttl: Duration,
}

impl IndexConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            staleness_timeout: Duration::from_secs(10 * 60),
            max_containers_per_view: MAX_CONTAINERS_PER_VIEW,
            max_columns_per_view: MAX_COLUMNS_PER_VIEW,
            lock_timeout: Duration::from_secs(10 * 60),
            root_container_id: DEFAULT_ROOT_CONTAINER_ID,
            default_column_ttl: Duration::from_secs(60 * 60),
        }
    }

    /// Sets the staleness timeout.
    pub fn with_staleness_timeout(mut self, timeout: Duration) -> Self {
        self.staleness_timeout = timeout;
        self
    }

    /// Sets the container limit.
    pub fn with_max_containers_per_view(mut self, max: usize) -> Self {
        self.max_containers_per_view = max;
        self
    }

    /// Sets the column limit.
    pub fn with_max_columns_per_view(mut self, max: usize) -> Self {
        self.max_columns_per_view = max;
        self
    }

    /// Sets the exclusive lock timeout used by workers.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the root container id.
    pub fn with_root_container_id(mut self, id: u64) -> Self {
        self.root_container_id = id;
        self
    }

    /// Sets the default column cache TTL.
    pub fn with_default_column_ttl(mut self, ttl: Duration) -> Self {
        self.default_column_ttl = ttl;
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// How an index worker retries a build that failed with a retryable error.
///
/// Delays double from `base_delay` up to `max_delay`. A build that gave up
/// waiting for the object lock has already waited the lock timeout, so it is
/// retried after `base_delay` without backing off further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Builds attempted per message, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Retries up to `max_attempts - 1` times, starting at 100ms.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }

    /// A single attempt per message.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the delay before the first retry.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Returns true if a build that failed on `attempt` (1-based) may run again.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before retrying a build that failed on `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32, error: &IndexError) -> Duration {
        if matches!(error, IndexError::LockUnavailable { .. }) {
            return self.base_delay.min(self.max_delay);
        }
        let doublings = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << doublings)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_config_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.staleness_timeout, Duration::from_secs(600));
        assert_eq!(config.max_containers_per_view, 10_000);
        assert_eq!(config.max_columns_per_view, 152);
        assert_eq!(config.default_column_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn index_config_builder() {
        let config = IndexConfig::new()
            .with_staleness_timeout(Duration::from_secs(5))
            .with_max_containers_per_view(3)
            .with_root_container_id(1);

        assert_eq!(config.staleness_timeout, Duration::from_secs(5));
        assert_eq!(config.max_containers_per_view, 3);
        assert_eq!(config.root_container_id, 1);
    }

    #[test]
    fn single_attempt_never_retries() {
        let config = RetryConfig::no_retry();
        assert!(!config.allows_retry(1));
        assert_eq!(config.delay_after(1, &replica_down()), Duration::ZERO);
        assert!(!RetryConfig::new(0).allows_retry(1));
    }

    fn replica_down() -> IndexError {
        IndexError::Replication("replica offline".into())
    }

    #[test]
    fn delays_double_up_to_the_cap() {
        let config = RetryConfig::new(8)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500));

        let delays: Vec<Duration> = (1..=5)
            .map(|attempt| config.delay_after(attempt, &replica_down()))
            .collect();
        assert_eq!(
            delays,
            [100, 200, 400, 500, 500].map(Duration::from_millis).to_vec()
        );
        assert!(config.allows_retry(7));
        assert!(!config.allows_retry(8));
    }

    #[test]
    fn lock_timeouts_do_not_back_off() {
        let config = RetryConfig::new(5).with_base_delay(Duration::from_millis(20));
        let err = IndexError::LockUnavailable {
            key: "TABLE-LOCK-syn1".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(config.delay_after(4, &err), Duration::from_millis(20));
    }

    #[test]
    fn huge_attempt_counts_saturate() {
        let config = RetryConfig::new(u32::MAX).with_max_delay(Duration::from_secs(10));
        assert_eq!(config.delay_after(u32::MAX, &replica_down()), Duration::from_secs(10));
    }
}
