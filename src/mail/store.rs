use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::MessageRecord;
use crate::Result;

/// Immutable snapshot of the archive, keyed by message id.
///
/// Iteration is in message id order so every stage downstream is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStore {
    messages: BTreeMap<String, MessageRecord>,
}

/// What `ingest` did with its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub stored: usize,
    pub duplicates: usize,
    /// Records that failed to parse or had no message id
    pub failed: usize,
}

impl MessageStore {
    /// Build the store from normalizer output.
    ///
    /// Failed and id-less records are counted and dropped. On duplicate ids the
    /// record with the earlier timestamp is kept, and a record with an unknown
    /// timestamp counts as earliest.
    pub fn ingest<I>(records: I) -> (Self, IngestReport)
    where
        I: IntoIterator<Item = Result<MessageRecord>>,
    {
        let mut messages: BTreeMap<String, MessageRecord> = BTreeMap::new();
        let mut report = IngestReport::default();

        for record in records {
            let mut record = match record {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "dropping message");
                    report.failed += 1;
                    continue;
                }
            };

            let message_id = record.message_id.trim().to_string();
            if message_id.is_empty() {
                report.failed += 1;
                continue;
            }
            record.message_id = message_id.clone();

            match messages.entry(message_id) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(mut slot) => {
                    report.duplicates += 1;
                    if supersedes(&record, slot.get()) {
                        slot.insert(record);
                    }
                }
            }
        }

        report.stored = messages.len();
        info!(
            stored = report.stored,
            duplicates = report.duplicates,
            failed = report.failed,
            "message store built"
        );

        (Self { messages }, report)
    }

    pub fn get(&self, message_id: &str) -> Option<&MessageRecord> {
        self.messages.get(message_id)
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.messages.contains_key(message_id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Records in message id order
    pub fn iter(&self) -> impl Iterator<Item = &MessageRecord> {
        self.messages.values()
    }
}

/// Whether `incoming` replaces `stored` for the same message id
fn supersedes(incoming: &MessageRecord, stored: &MessageRecord) -> bool {
    match (stored.unixtime, incoming.unixtime) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(old), Some(new)) => new < old,
    }
}
