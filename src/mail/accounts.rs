//! Detects online accounts: third-party domains that write to one of my addresses.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use super::address::{address_domain, split_address};
use super::rank::DomainRank;
use super::types::{Account, Thread};

static NOREPLY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:info|notifications?|.*not?.?reply)").expect("valid no-reply regex")
});

/// Headers set by bulk senders' feedback loops
const GENERATED_HEADERS: &[&str] = &["Feedback-Id", "X-Feedback-Id"];

const JAVAMAIL_MARKER: &str = ".JavaMail.";

/// Per-thread signals, computed from the thread's main message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadFeatures {
    pub thread_id: String,
    pub datetime: Option<DateTime<Utc>>,
    pub subject: Option<String>,
    pub main_is_first: bool,
    pub from: Option<String>,
    pub from_domain: Option<String>,
    pub to_me: Option<String>,
    pub recipients_to: usize,
    pub recipients_all: usize,
    pub is_generated: bool,
    pub num_messages: usize,
}

impl ThreadFeatures {
    pub fn extract(thread: &Thread<'_>, my_addrs: &BTreeSet<String>) -> Self {
        let main = thread.main;

        let is_generated = main.message_id.contains(JAVAMAIL_MARKER)
            || main.from.as_deref().is_some_and(is_noreply_sender)
            || main.has_any_header(GENERATED_HEADERS);

        let from_domain = main
            .from
            .as_deref()
            .and_then(|from| address_domain(&from.to_lowercase()));

        let to_me = main.to.iter().find(|addr| my_addrs.contains(*addr)).cloned();

        let non_blank = |addrs: &[String]| addrs.iter().filter(|a| !a.trim().is_empty()).count();

        Self {
            thread_id: thread.thread_id.clone(),
            datetime: main.datetime(),
            subject: main.subject.clone(),
            main_is_first: thread.main_is_first,
            from: main.from.clone(),
            from_domain,
            to_me,
            recipients_to: non_blank(&main.to),
            recipients_all: non_blank(&main.to) + non_blank(&main.cc) + non_blank(&main.bcc),
            is_generated,
            num_messages: thread.len(),
        }
    }

    /// `(service_id, my_addr)` when this thread is mail from a third party to me
    pub fn account_key(&self, my_addrs: &BTreeSet<String>) -> Option<(String, String)> {
        if self.datetime.is_none() {
            return None;
        }
        let from = self.from.as_deref()?;
        if my_addrs.contains(from) {
            return None;
        }
        Some((self.from_domain.clone()?, self.to_me.clone()?))
    }
}

/// Whether the local part of `from` looks like an automated mailbox
pub fn is_noreply_sender(from: &str) -> bool {
    let local = split_address(from).map(|(local, _)| local).unwrap_or(from);
    NOREPLY_PATTERN.is_match(local)
}

pub fn thread_features(threads: &[Thread<'_>], my_addrs: &BTreeSet<String>) -> Vec<ThreadFeatures> {
    threads
        .iter()
        .map(|t| ThreadFeatures::extract(t, my_addrs))
        .collect()
}

/// Aggregate qualifying threads into one `Account` per `(service_id, my_addr)`,
/// ordered by that key.
pub fn aggregate(
    features: &[ThreadFeatures],
    my_addrs: &BTreeSet<String>,
    ranks: &dyn DomainRank,
) -> Vec<Account> {
    let mut by_account: BTreeMap<(String, String), Vec<&ThreadFeatures>> = BTreeMap::new();
    let mut unparseable = 0usize;

    for f in features {
        if f.from.is_some() && f.from_domain.is_none() {
            unparseable += 1;
            debug!(thread_id = %f.thread_id, from = ?f.from, "sender has no usable domain");
        }
        if let Some(key) = f.account_key(my_addrs) {
            by_account.entry(key).or_default().push(f);
        }
    }

    let accounts: Vec<Account> = by_account
        .into_iter()
        .filter_map(|((service_id, my_addr), mut threads)| {
            // account_key guarantees a datetime; stable sort keeps thread id order on ties
            threads.sort_by_key(|f| f.datetime);
            let first = threads.first()?;
            let joined = first.datetime?;
            let last = threads.last()?.datetime?;

            Some(Account {
                domain_rank: ranks.lookup(&service_id),
                first_subject: first.subject.clone(),
                joined,
                last,
                threads: threads.len(),
                generated: threads.iter().filter(|f| f.is_generated).count(),
                service_id,
                my_addr,
            })
        })
        .collect();

    info!(
        accounts = accounts.len(),
        threads = features.len(),
        unparseable_senders = unparseable,
        "detected accounts"
    );
    accounts
}

pub fn detect_accounts(
    threads: &[Thread<'_>],
    my_addrs: &BTreeSet<String>,
    ranks: &dyn DomainRank,
) -> Vec<Account> {
    aggregate(&thread_features(threads, my_addrs), my_addrs, ranks)
}
