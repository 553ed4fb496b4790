use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A shared insight, addressed by `(domain, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub domain: String,
    pub key: String,
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(
        domain: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            domain: domain.into(),
            key: key.into(),
            value,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Last-write-wins: `self` replaces `current` when it is newer. Equal
    /// timestamps are settled on the serialized value, so every replica
    /// converges on the same entry whatever order the writes arrive in.
    pub fn supersedes(&self, current: &KnowledgeEntry) -> bool {
        match self.timestamp.cmp(&current.timestamp) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.value.to_string() >= current.value.to_string(),
        }
    }
}
