//! Storage Node Addressing and Replica Selection
//!
//! A topic's data is spread over partitions, and each partition is served by
//! a set of replicas. The [`InstanceDirectory`] answers "how many partitions
//! does this topic have" and "which replicas are ready to serve partition p
//! right now"; the [`ReplicaPicker`] unions the ready replicas across all
//! partitions and picks one uniformly at random.
//!
//! Any node that is ready to serve some partition of the version can answer
//! a dictionary request, so no smarter selection is needed. Directory
//! failures are logged and collapse to "no replica"; the caller treats that
//! the same as any other transient fetch failure.

use crate::error::DirectoryError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

/// Network address of one storage node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub host: String,
    pub port: u16,
}

impl Instance {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL of this node, scheme chosen by the SSL setting.
    pub fn url(&self, ssl: bool) -> String {
        let scheme = if ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Read-only view of partition membership for served topics.
pub trait InstanceDirectory: Send + Sync {
    /// Number of partitions of the topic.
    fn partition_count(&self, topic: &str) -> Result<u32, DirectoryError>;

    /// Replicas currently ready to serve one partition of the topic.
    fn ready_to_serve_instances(
        &self,
        topic: &str,
        partition: u32,
    ) -> Result<Vec<Instance>, DirectoryError>;
}

/// Picks a random ready replica for a topic.
pub struct ReplicaPicker {
    directory: Arc<dyn InstanceDirectory>,
}

impl ReplicaPicker {
    pub fn new(directory: Arc<dyn InstanceDirectory>) -> Self {
        Self { directory }
    }

    /// Union the ready replicas of every partition, in partition order, and
    /// return one chosen uniformly at random. Returns `None` when no
    /// replica is ready or the directory lookup fails.
    pub fn pick(&self, topic: &str) -> Option<Instance> {
        let partitions = match self.directory.partition_count(topic) {
            Ok(count) => count,
            Err(error) => {
                warn!(topic = %topic, error = %error, "partition count lookup failed");
                return None;
            }
        };

        let mut replicas = Vec::new();
        for partition in 0..partitions {
            match self.directory.ready_to_serve_instances(topic, partition) {
                Ok(instances) => replicas.extend(instances),
                Err(error) => {
                    warn!(
                        topic = %topic,
                        partition,
                        error = %error,
                        "ready-to-serve lookup failed"
                    );
                    return None;
                }
            }
        }

        if replicas.is_empty() {
            return None;
        }

        let index = rand::thread_rng().gen_range(0..replicas.len());
        Some(replicas.swap_remove(index))
    }
}

/// Directory backed by a fixed in-memory table.
///
/// Used by embedding processes with static cluster membership and by tests.
#[derive(Default)]
pub struct StaticInstanceDirectory {
    topics: RwLock<HashMap<String, Vec<Vec<Instance>>>>,
}

impl StaticInstanceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-partition replica lists for a topic.
    pub fn set_partitions(&self, topic: impl Into<String>, partitions: Vec<Vec<Instance>>) {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.into(), partitions);
    }

    /// Convenience for a single-partition topic with one replica.
    pub fn set_single_replica(&self, topic: impl Into<String>, instance: Instance) {
        self.set_partitions(topic, vec![vec![instance]]);
    }

    /// Forget a topic entirely.
    pub fn remove_topic(&self, topic: &str) {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic);
    }
}

impl InstanceDirectory for StaticInstanceDirectory {
    fn partition_count(&self, topic: &str) -> Result<u32, DirectoryError> {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(|partitions| partitions.len() as u32)
            .ok_or_else(|| DirectoryError(format!("unknown topic: {topic}")))
    }

    fn ready_to_serve_instances(
        &self,
        topic: &str,
        partition: u32,
    ) -> Result<Vec<Instance>, DirectoryError> {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .and_then(|partitions| partitions.get(partition as usize))
            .cloned()
            .ok_or_else(|| {
                DirectoryError(format!("unknown topic or partition: {topic}/{partition}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_url() {
        let instance = Instance::new("node1.example.com", 8080);
        assert_eq!(instance.url(false), "http://node1.example.com:8080");
        assert_eq!(instance.url(true), "https://node1.example.com:8080");
    }

    #[test]
    fn test_pick_single_replica() {
        let directory = Arc::new(StaticInstanceDirectory::new());
        directory.set_single_replica("s_v1", Instance::new("a", 1));

        let picker = ReplicaPicker::new(directory);
        assert_eq!(picker.pick("s_v1"), Some(Instance::new("a", 1)));
    }

    #[test]
    fn test_pick_unions_all_partitions() {
        let directory = Arc::new(StaticInstanceDirectory::new());
        directory.set_partitions(
            "s_v1",
            vec![
                vec![Instance::new("a", 1)],
                vec![Instance::new("b", 2)],
                vec![Instance::new("c", 3)],
            ],
        );

        let picker = ReplicaPicker::new(directory);
        let union = [
            Instance::new("a", 1),
            Instance::new("b", 2),
            Instance::new("c", 3),
        ];
        for _ in 0..32 {
            let picked = picker.pick("s_v1").unwrap();
            assert!(union.contains(&picked));
        }
    }

    #[test]
    fn test_pick_unknown_topic_is_none() {
        let directory = Arc::new(StaticInstanceDirectory::new());
        let picker = ReplicaPicker::new(directory);
        assert!(picker.pick("missing_v1").is_none());
    }

    #[test]
    fn test_pick_no_ready_replicas_is_none() {
        let directory = Arc::new(StaticInstanceDirectory::new());
        directory.set_partitions("s_v1", vec![vec![], vec![]]);

        let picker = ReplicaPicker::new(directory);
        assert!(picker.pick("s_v1").is_none());
    }

    #[test]
    fn test_remove_topic() {
        let directory = Arc::new(StaticInstanceDirectory::new());
        directory.set_single_replica("s_v1", Instance::new("a", 1));
        directory.remove_topic("s_v1");

        let picker = ReplicaPicker::new(directory);
        assert!(picker.pick("s_v1").is_none());
    }
}
