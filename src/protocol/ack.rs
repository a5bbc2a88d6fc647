//! Acknowledgment tracking for server-initiated messages.
//!
//! The coordinator remembers which outgoing messages expect an
//! `Acknowledge` reply and runs the registered continuation when the reply
//! arrives. A continuation runs at most once: the record is removed before it
//! is invoked, so a duplicated acknowledgment finds nothing to run.

use std::collections::HashMap;
use std::time::Instant;

use super::message::MessageId;

/// How a pending acknowledgment was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The peer acknowledged the message
    Acknowledged,
    /// The deadline passed without an acknowledgment
    TimedOut,
}

/// Callback run when a pending acknowledgment resolves
pub type AckContinuation = Box<dyn FnOnce(AckOutcome) + Send>;

struct AckRecord {
    continuation: Option<AckContinuation>,
    deadline: Option<Instant>,
}

/// Table of messages awaiting acknowledgment.
///
/// Private to a single session; not synchronized.
#[derive(Default)]
pub struct AckCoordinator {
    pending: HashMap<MessageId, AckRecord>,
}

impl AckCoordinator {
    /// Create an empty coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect an acknowledgment for `id` with no deadline.
    pub fn queue(&mut self, id: &str, continuation: Option<AckContinuation>) {
        self.insert(id, continuation, None);
    }

    /// Expect an acknowledgment for `id` before `deadline`.
    pub fn queue_with_deadline(
        &mut self,
        id: &str,
        deadline: Instant,
        continuation: Option<AckContinuation>,
    ) {
        self.insert(id, continuation, Some(deadline));
    }

    fn insert(&mut self, id: &str, continuation: Option<AckContinuation>, deadline: Option<Instant>) {
        let record = AckRecord {
            continuation,
            deadline,
        };
        if self.pending.insert(id.to_string(), record).is_some() {
            tracing::warn!(message_id = %id, "message already queued for acknowledgment, replacing");
        } else {
            tracing::trace!(message_id = %id, "queued for acknowledgment");
        }
    }

    /// Resolve the pending record for `id`.
    ///
    /// Returns `true` if a record existed. Unknown ids are logged and ignored.
    pub fn acknowledge(&mut self, id: &str) -> bool {
        match self.pending.remove(id) {
            Some(record) => {
                match record.continuation {
                    Some(continuation) => continuation(AckOutcome::Acknowledged),
                    None => tracing::debug!(message_id = %id, "no ack continuation, skipping"),
                }
                true
            },
            None => {
                tracing::error!(message_id = %id, "failed to ack message: id not pending");
                false
            },
        }
    }

    /// Drop every record whose deadline is at or before `now`.
    ///
    /// Continuations of expired records run with [`AckOutcome::TimedOut`].
    /// Returns the number of expired records.
    pub fn expire(&mut self, now: Instant) -> usize {
        let expired: Vec<MessageId> = self
            .pending
            .iter()
            .filter(|(_, record)| record.deadline.is_some_and(|deadline| deadline <= now))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(record) = self.pending.remove(id) {
                tracing::warn!(message_id = %id, "acknowledgment timed out");
                if let Some(continuation) = record.continuation {
                    continuation(AckOutcome::TimedOut);
                }
            }
        }

        expired.len()
    }

    /// Forget all pending records without running their continuations
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(count = self.pending.len(), "discarding pending acknowledgments");
        }
        self.pending.clear();
    }

    /// Check if `id` is awaiting acknowledgment
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of messages awaiting acknowledgment
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl std::fmt::Debug for AckCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckCoordinator")
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .finish()
    }
}
