// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Buffer record model and key encoding.
//!
//! A [`BufferRecord`] is one pending mutation: the serialized domain
//! object plus enough routing information to replay it against the right
//! repository later. Records are stored under a byte-sortable key so that
//! plain iteration over the embedded store yields
//! `(priority, enqueued_at, id)` order.
//!
//! # Key Format
//!
//! ```text
//! [ priority : 1 byte ][ enqueued_at_nanos : 8 bytes BE ][ id : n bytes ]
//! ```
//!
//! Numeric components are fixed-width big-endian so byte-wise comparison
//! matches numeric comparison. Lower priority values sort first and drain
//! first; within one priority class records drain in enqueue order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Constants
// =============================================================================

/// Default drain priority assigned when none (or an out-of-range value)
/// is provided.
pub const DEFAULT_PRIORITY: u8 = 3;

/// Smallest (most urgent) admissible priority.
pub const MIN_PRIORITY: u8 = 1;

/// Largest (least urgent) admissible priority.
pub const MAX_PRIORITY: u8 = 5;

// =============================================================================
// Entity / Operation
// =============================================================================

/// The kind of domain object a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    /// A user profile document.
    Profile,
    /// A task document.
    Task,
}

impl Entity {
    /// Returns the wire name of the entity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Profile => "profile",
            Entity::Task => "task",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutation a record replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Insert-or-replace by id.
    Create,
    /// Unconditional write by id.
    Update,
    /// Delete by id; missing rows are tolerated.
    Delete,
}

impl Operation {
    /// Returns the wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// BufferRecord
// =============================================================================

/// One buffered mutation awaiting replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferRecord {
    /// Stable identifier, assigned on first enqueue and preserved across
    /// re-enqueues.
    pub id: String,

    /// Subject of the operation, kept for diagnostics.
    pub owner_id: String,

    /// Target entity kind.
    pub entity: Entity,

    /// Mutation kind.
    pub operation: Operation,

    /// Serialized domain object. Opaque to the buffer; the applier
    /// decodes it at replay time.
    pub payload: Vec<u8>,

    /// Drain priority in `[1, 5]`; lower drains first.
    pub priority: u8,

    /// Number of failed replay attempts so far.
    pub retries: u32,

    /// Timestamp of the (latest) enqueue.
    pub enqueued_at: DateTime<Utc>,

    /// Storage key handle, populated by the store on enqueue and batch
    /// reads. Never serialized.
    #[serde(skip)]
    pub storage_key: Option<Vec<u8>>,
}

impl BufferRecord {
    /// Creates a normalized record ready for enqueue.
    pub fn new(
        owner_id: impl Into<String>,
        entity: Entity,
        operation: Operation,
        payload: Vec<u8>,
        priority: u8,
    ) -> Self {
        let mut record = Self {
            id: String::new(),
            owner_id: owner_id.into(),
            entity,
            operation,
            payload,
            priority,
            retries: 0,
            enqueued_at: Utc::now(),
            storage_key: None,
        };
        record.normalize();
        record
    }

    /// Fills in missing fields: an empty id gets a fresh UUID and an
    /// out-of-range priority falls back to [`DEFAULT_PRIORITY`].
    pub fn normalize(&mut self) {
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        self.priority = normalize_priority(self.priority);
    }

    /// Returns the enqueue timestamp as nanoseconds since the epoch.
    pub fn enqueued_at_nanos(&self) -> i64 {
        self.enqueued_at.timestamp_nanos_opt().unwrap_or(0)
    }

    /// Computes the byte-sortable storage key for this record.
    pub fn key(&self) -> Vec<u8> {
        encode_key(self.priority, self.enqueued_at_nanos(), &self.id)
    }
}

/// Clamps a priority into `[MIN_PRIORITY, MAX_PRIORITY]`, falling back to
/// [`DEFAULT_PRIORITY`] for out-of-range values.
pub fn normalize_priority(priority: u8) -> u8 {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        priority
    } else {
        DEFAULT_PRIORITY
    }
}

/// Encodes the `(priority, enqueued_at, id)` storage key.
pub fn encode_key(priority: u8, enqueued_at_nanos: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + id.len());
    key.push(priority);
    key.extend_from_slice(&enqueued_at_nanos.to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_assigns_id() {
        let record = BufferRecord::new("u1", Entity::Profile, Operation::Update, vec![1], 3);
        assert!(!record.id.is_empty());
        assert_eq!(record.retries, 0);
    }

    #[test]
    fn test_normalize_priority_bounds() {
        assert_eq!(normalize_priority(0), DEFAULT_PRIORITY);
        assert_eq!(normalize_priority(6), DEFAULT_PRIORITY);
        assert_eq!(normalize_priority(1), 1);
        assert_eq!(normalize_priority(5), 5);
    }

    #[test]
    fn test_out_of_range_priority_falls_back() {
        let record = BufferRecord::new("u1", Entity::Task, Operation::Create, vec![], 99);
        assert_eq!(record.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_key_orders_by_priority_first() {
        let high = encode_key(1, 2_000, "b");
        let low = encode_key(4, 1_000, "a");
        assert!(high < low);
    }

    #[test]
    fn test_key_orders_by_time_within_priority() {
        let earlier = encode_key(3, 1_000, "z");
        let later = encode_key(3, 2_000, "a");
        assert!(earlier < later);
    }

    #[test]
    fn test_key_round_trips_id_suffix() {
        let key = encode_key(2, 42, "rec-1");
        assert_eq!(key[0], 2);
        assert_eq!(&key[1..9], &42i64.to_be_bytes());
        assert_eq!(&key[9..], b"rec-1");
    }

    #[test]
    fn test_entity_operation_wire_names() {
        assert_eq!(Entity::Profile.as_str(), "profile");
        assert_eq!(Operation::Delete.as_str(), "delete");
        assert_eq!(
            serde_json::to_string(&Entity::Task).unwrap(),
            "\"task\""
        );
        assert_eq!(
            serde_json::from_str::<Operation>("\"create\"").unwrap(),
            Operation::Create
        );
    }

    #[test]
    fn test_storage_key_not_serialized() {
        let mut record = BufferRecord::new("u1", Entity::Task, Operation::Update, vec![7], 4);
        record.storage_key = Some(vec![1, 2, 3]);

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("storage_key"));

        let back: BufferRecord = serde_json::from_str(&json).unwrap();
        assert!(back.storage_key.is_none());
        assert_eq!(back.id, record.id);
    }
}
