//! Group manager implementation
//!
//! Owns one [`Group`] per stream key. Groups are created on first reference
//! and outlive producer churn; a periodic cleanup drops the ones that have
//! been without a producer for longer than `idle_group_timeout`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::key::StreamKey;
use crate::config::GroupConfig;
use crate::group::{Group, GroupHooks, GroupStats};

/// Central registry for all groups
///
/// Thread-safe via `RwLock`. Lookups of existing groups (the common case for
/// subscribers and publishers alike) only take the read lock.
pub struct GroupManager {
    groups: RwLock<HashMap<StreamKey, Arc<Group>>>,
    config: RegistryConfig,
    group_config: GroupConfig,
    hooks: GroupHooks,
}

impl GroupManager {
    /// Create a manager with default configuration and no-op hooks
    pub fn new() -> Self {
        Self::with_config(
            RegistryConfig::default(),
            GroupConfig::default(),
            GroupHooks::default(),
        )
    }

    pub fn with_config(config: RegistryConfig, group_config: GroupConfig, hooks: GroupHooks) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            config,
            group_config,
            hooks,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn group_config(&self) -> &GroupConfig {
        &self.group_config
    }

    /// Get the group for `key`, creating it if needed
    pub async fn get_or_create_group(&self, key: &StreamKey) -> Arc<Group> {
        if let Some(group) = self.groups.read().await.get(key) {
            return Arc::clone(group);
        }

        let mut groups = self.groups.write().await;
        // Raced with another creator between the two locks
        if let Some(group) = groups.get(key) {
            return Arc::clone(group);
        }

        let group = Group::new(key.clone(), self.group_config.clone(), self.hooks.clone());
        tracing::info!(
            stream = %key,
            group = group.unique_key(),
            "Group created"
        );
        groups.insert(key.clone(), Arc::clone(&group));
        group
    }

    pub async fn get_group(&self, key: &StreamKey) -> Option<Arc<Group>> {
        self.groups.read().await.get(key).cloned()
    }

    /// Get total number of groups
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    /// Stats for every group
    pub async fn stats(&self) -> Vec<GroupStats> {
        self.groups
            .read()
            .await
            .values()
            .map(|group| group.stats())
            .collect()
    }

    /// Run cleanup once
    ///
    /// Removes groups that have no producer, no pull in progress, and have
    /// been in that state for at least `idle_group_timeout`.
    pub async fn cleanup(&self) {
        let mut groups = self.groups.write().await;
        let timeout = self.config.idle_group_timeout;

        let keys_to_remove: Vec<StreamKey> = groups
            .iter()
            .filter(|(_, group)| {
                group.is_idle()
                    && group
                        .idle_for()
                        .map(|idle| idle >= timeout)
                        .unwrap_or(false)
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in keys_to_remove {
            if let Some(group) = groups.remove(&key) {
                tracing::info!(
                    stream = %key,
                    group = group.unique_key(),
                    "Group removed by cleanup"
                );
            }
        }
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = manager.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.cleanup().await;
            }
        })
    }
}

impl Default for GroupManager {
    fn default() -> Self {
        Self::new()
    }
}
