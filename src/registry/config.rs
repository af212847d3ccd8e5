//! Group manager configuration

use std::time::Duration;

/// How long empty groups are kept around
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Remove a group once it has had no producer for this long
    pub idle_group_timeout: Duration,

    /// Interval between cleanup runs
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_group_timeout: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    pub fn idle_group_timeout(mut self, timeout: Duration) -> Self {
        self.idle_group_timeout = timeout;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
