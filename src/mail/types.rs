use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized message. Created once by the scanner and never mutated
/// after it enters the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct MessageRecord {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    /// Send time in seconds since epoch
    #[serde(default)]
    pub unixtime: Option<i64>,
    #[serde(default)]
    pub subject: Option<String>,

    // Addresses are normalized (see `address::normalize_address`)
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub delivered_to: Option<String>,

    // Raw header values, split on demand
    #[serde(default)]
    pub x_forwarded_to: Option<String>,
    #[serde(default)]
    pub x_forwarded_for: Option<String>,

    /// Names of the headers present in the raw message, as written
    #[serde(default)]
    pub headers: BTreeSet<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl MessageRecord {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.unixtime
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }

    /// True when any of `names` is among the message headers. Header names
    /// are case-insensitive.
    pub fn has_any_header(&self, names: &[&str]) -> bool {
        self.headers
            .iter()
            .any(|h| names.iter().any(|name| h.eq_ignore_ascii_case(name)))
    }

    /// A message with no parent, or one that names itself as its parent
    pub fn is_thread_start(&self) -> bool {
        match self.in_reply_to.as_deref() {
            None => true,
            Some(parent) => parent == self.message_id,
        }
    }

    pub fn subject_display(&self) -> &str {
        self.subject.as_deref().unwrap_or("(no subject)")
    }
}

/// A conversation: every message sharing one resolved root, borrowed from the store.
#[derive(Debug, Clone, Serialize)]
pub struct Thread<'a> {
    pub thread_id: String,
    /// Ascending by send time, unknown times first
    pub messages: Vec<&'a MessageRecord>,
    pub main: &'a MessageRecord,
    pub main_is_first: bool,
}

impl Thread<'_> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// An online account: a service domain that writes to one of my addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub service_id: String,
    pub my_addr: String,
    pub joined: DateTime<Utc>,
    pub first_subject: Option<String>,
    pub last: DateTime<Utc>,
    pub threads: usize,
    pub generated: usize,
    pub domain_rank: Option<u32>,
}
