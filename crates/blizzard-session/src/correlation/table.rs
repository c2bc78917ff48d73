//! Pending-Request Table
//!
//! Maps outstanding caller ids to their one-shot completions. Entries
//! are either pending or absent; there is no retained "completed" state.
//! [`RequestTable::take`] removes the entry as it returns it, which is
//! what makes at-most-once completion structural rather than a
//! convention.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::protocol::message::Reply;

use super::error::{CallResult, PendingLimitExceeded};

/// A request awaiting its reply
///
/// Holds the channel back to the caller plus enough context to make log
/// lines and post-mortems useful.
#[derive(Debug)]
pub struct PendingCall {
    sender: oneshot::Sender<CallResult<Reply>>,
    /// Method named in the outbound request
    pub method: String,
    /// When the request was registered (UTC), for diagnostics
    pub created_at: DateTime<Utc>,
}

impl PendingCall {
    /// Create a pending call around the caller's completion channel.
    pub fn new(sender: oneshot::Sender<CallResult<Reply>>, method: impl Into<String>) -> Self {
        Self {
            sender,
            method: method.into(),
            created_at: Utc::now(),
        }
    }

    /// Deliver the outcome to the caller.
    ///
    /// Returns `false` when the caller abandoned the completion; the
    /// outcome is dropped silently in that case, per the contract that a
    /// reply for an abandoned request produces no further effect.
    pub fn resolve(self, outcome: CallResult<Reply>) -> bool {
        self.sender.send(outcome).is_ok()
    }
}

/// Table of in-flight requests keyed by correlation id
#[derive(Debug)]
pub struct RequestTable {
    entries: DashMap<u32, PendingCall>,
    max_pending: usize,
}

impl RequestTable {
    /// Create a table; `max_pending` of 0 means unlimited.
    pub fn new(max_pending: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_pending,
        }
    }

    /// Register a pending call under `id`.
    ///
    /// The id comes from the sequence generator and is unique among live
    /// entries by construction.
    pub fn insert(&self, id: u32, call: PendingCall) -> Result<(), PendingLimitExceeded> {
        if self.max_pending > 0 && self.entries.len() >= self.max_pending {
            return Err(PendingLimitExceeded {
                limit: self.max_pending,
            });
        }
        debug!(id, method = %call.method, "registered pending request");
        self.entries.insert(id, call);
        Ok(())
    }

    /// Remove and return the pending call for `id`, if any.
    pub fn take(&self, id: u32) -> Option<PendingCall> {
        let taken = self.entries.remove(&id).map(|(_, call)| call);
        if taken.is_some() {
            trace!(id, "took pending request");
        }
        taken
    }

    /// Whether `id` has a pending entry.
    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of requests currently awaiting replies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn take_consumes_the_entry() {
        let table = RequestTable::new(0);
        assert!(table.is_empty());

        let (tx, mut rx) = oneshot::channel();
        table.insert(2, PendingCall::new(tx, "add")).unwrap();
        assert!(table.contains(2));

        let call = table.take(2).unwrap();
        assert!(table.is_empty());
        assert!(!table.contains(2));
        assert!(table.take(2).is_none());

        assert!(call.resolve(Ok(Reply::Json(json!(3)))));
        assert_eq!(rx.try_recv().unwrap(), Ok(Reply::Json(json!(3))));
    }

    #[test]
    fn resolve_after_abandonment_reports_false() {
        let table = RequestTable::new(0);
        let (tx, rx) = oneshot::channel();
        table.insert(4, PendingCall::new(tx, "add")).unwrap();
        drop(rx);

        let call = table.take(4).unwrap();
        assert!(!call.resolve(Ok(Reply::Json(json!(null)))));
    }

    #[test]
    fn capacity_limit_is_enforced() {
        let table = RequestTable::new(2);
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        let (tx3, _rx3) = oneshot::channel();

        table.insert(2, PendingCall::new(tx1, "a")).unwrap();
        table.insert(4, PendingCall::new(tx2, "b")).unwrap();
        let err = table.insert(6, PendingCall::new(tx3, "c")).unwrap_err();
        assert_eq!(err, PendingLimitExceeded { limit: 2 });
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let table = RequestTable::new(0);
        for id in 1..=64u32 {
            let (tx, _rx) = oneshot::channel();
            table.insert(id, PendingCall::new(tx, "m")).unwrap();
        }
        assert_eq!(table.len(), 64);
    }
}
