//! Per-partition read positions.
//!
//! Offsets follow the Kafka commit convention: the value stored for a
//! partition is the offset of the *next* message to read, i.e. the last
//! processed offset plus one.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::RawMessage;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// Mapping from topic-partition to the next offset to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetSet {
    offsets: BTreeMap<TopicPartition, i64>,
}

impl OffsetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, topic: &str, partition: i32) -> Option<i64> {
        self.offsets
            .get(&TopicPartition::new(topic, partition))
            .copied()
    }

    pub fn insert(&mut self, topic: impl Into<String>, partition: i32, next_offset: i64) {
        self.offsets
            .insert(TopicPartition::new(topic, partition), next_offset);
    }

    pub fn contains(&self, topic: &str, partition: i32) -> bool {
        self.offsets
            .contains_key(&TopicPartition::new(topic, partition))
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TopicPartition, i64)> {
        self.offsets.iter().map(|(tp, offset)| (tp, *offset))
    }

    /// Move the position of the message's partition past that message.
    ///
    /// Positions never move backwards here; rewinding is the job of
    /// [`OffsetSet::rollback_target`] and the log client.
    pub fn observe(&mut self, message: &RawMessage) {
        let next = message.offset + 1;
        self.offsets
            .entry(TopicPartition::new(message.topic.as_str(), message.partition))
            .and_modify(|current| *current = (*current).max(next))
            .or_insert(next);
    }

    /// Positions after consuming `batch` on top of `self`.
    pub fn advanced_by(&self, batch: &[RawMessage]) -> OffsetSet {
        let mut advanced = self.clone();
        for message in batch {
            advanced.observe(message);
        }
        advanced
    }

    /// Positions to rewind to so that `batch` is fetched again.
    ///
    /// Covers exactly the partitions `batch` read from. Partitions present in
    /// `self` rewind to their stored offset; partitions that were never
    /// committed rewind to the first offset `batch` read from them.
    pub fn rollback_target(&self, batch: &[RawMessage]) -> OffsetSet {
        let mut target = OffsetSet::new();
        for message in batch {
            let tp = TopicPartition::new(message.topic.as_str(), message.partition);
            match self.offsets.get(&tp) {
                Some(committed) => {
                    target.offsets.insert(tp, *committed);
                }
                None => {
                    target
                        .offsets
                        .entry(tp)
                        .and_modify(|first| *first = (*first).min(message.offset))
                        .or_insert(message.offset);
                }
            }
        }
        target
    }

    /// The subset of `self` covering the partitions `batch` read from.
    pub fn restricted_to(&self, batch: &[RawMessage]) -> OffsetSet {
        batch
            .iter()
            .map(|message| TopicPartition::new(message.topic.as_str(), message.partition))
            .filter_map(|tp| self.offsets.get(&tp).copied().map(|offset| (tp, offset)))
            .collect()
    }
}

impl FromIterator<(TopicPartition, i64)> for OffsetSet {
    fn from_iter<I: IntoIterator<Item = (TopicPartition, i64)>>(iter: I) -> Self {
        Self {
            offsets: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for OffsetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (tp, offset)) in self.offsets.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{tp}@{offset}")?;
        }
        write!(f, "}}")
    }
}
