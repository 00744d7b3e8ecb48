//! Infers which addresses belong to the archive owner.
//!
//! Mail addressed *to* the owner dominates the archive, so the most frequent
//! recipient among messages not yet explained by a known address is taken as
//! the next owner address. Repeats until enough messages are explained.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::address::split_forwarded;
use super::store::MessageStore;
use super::types::MessageRecord;

/// Mailing-list traffic says nothing about who owns the mailbox
pub const LISTING_HEADERS: &[&str] = &["List-Unsubscribe", "List-Id"];

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Below 1: fraction of candidate messages to cover. 1 or more: absolute count.
    pub min_coverage: f64,
    pub max_iterations: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            min_coverage: 0.99,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyAddress {
    pub address: String,
    /// Uncovered messages carrying this address when it was picked
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Coverage target reached
    Converged,
    /// Uncovered messages have no addresses left to pick
    Exhausted,
    /// Ran out of rounds before either of the above
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityInference {
    /// In discovery order, most significant first
    pub addresses: Vec<MyAddress>,
    pub outcome: Outcome,
    pub target: f64,
    pub candidate_messages: usize,
    /// Covered message count at the start of each round
    pub coverage: Vec<usize>,
}

impl IdentityInference {
    pub fn address_set(&self) -> BTreeSet<String> {
        self.addresses.iter().map(|a| a.address.clone()).collect()
    }
}

/// Sender and deduplicated recipient candidates of one message
struct Candidate<'a> {
    from: Option<&'a str>,
    addrs: Vec<&'a str>,
}

impl<'a> Candidate<'a> {
    fn new(msg: &'a MessageRecord) -> Self {
        let forwarded = [&msg.x_forwarded_to, &msg.x_forwarded_for]
            .into_iter()
            .flatten()
            .flat_map(|raw| split_forwarded(raw));

        let mut seen = HashSet::new();
        let addrs = msg
            .to
            .iter()
            .chain(&msg.cc)
            .chain(&msg.bcc)
            .map(|s| s.as_str())
            .chain(forwarded)
            .filter(|a| !a.is_empty() && seen.insert(*a))
            .collect();

        Self {
            from: msg.from.as_deref(),
            addrs,
        }
    }

    fn is_covered(&self, mine: &HashSet<&str>) -> bool {
        self.from.is_some_and(|f| mine.contains(f)) || self.addrs.iter().any(|a| mine.contains(a))
    }
}

/// Covered count and per-address occurrences among uncovered messages,
/// in first-seen order.
fn tally<'a>(candidates: &[Candidate<'a>], mine: &HashSet<&str>) -> (usize, Vec<(&'a str, usize)>) {
    let mut covered = 0;
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for candidate in candidates {
        if candidate.is_covered(mine) {
            covered += 1;
            continue;
        }
        for &addr in &candidate.addrs {
            match index.get(addr) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(addr, counts.len());
                    counts.push((addr, 1));
                }
            }
        }
    }

    (covered, counts)
}

/// Highest count; the earliest-seen address wins ties
fn most_common<'a>(counts: &[(&'a str, usize)]) -> Option<(&'a str, usize)> {
    let mut best: Option<(&str, usize)> = None;
    for &(addr, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((addr, count));
        }
    }
    best
}

pub fn infer_my_addresses(store: &MessageStore, config: &IdentityConfig) -> IdentityInference {
    let candidates: Vec<Candidate> = store
        .iter()
        .filter(|m| !m.has_any_header(LISTING_HEADERS))
        .map(Candidate::new)
        .collect();

    let target = if config.min_coverage < 1.0 {
        (config.min_coverage * candidates.len() as f64).max(1.0)
    } else {
        config.min_coverage
    };

    let mut mine: HashSet<&str> = HashSet::new();
    let mut addresses = Vec::new();
    let mut coverage = Vec::new();
    let mut outcome = None;

    for round in 0..config.max_iterations {
        let (covered, counts) = tally(&candidates, &mine);
        coverage.push(covered);

        if covered as f64 >= target {
            outcome = Some(Outcome::Converged);
            break;
        }
        let Some((addr, count)) = most_common(&counts) else {
            outcome = Some(Outcome::Exhausted);
            break;
        };

        debug!(round, address = addr, count, covered, "picked owner address");
        mine.insert(addr);
        addresses.push(MyAddress {
            address: addr.to_string(),
            count,
        });
    }

    let outcome = outcome.unwrap_or_else(|| {
        // The last pick may have reached the target on its own
        let (covered, _) = tally(&candidates, &mine);
        if covered as f64 >= target {
            Outcome::Converged
        } else {
            Outcome::IterationLimit
        }
    });

    info!(
        addresses = addresses.len(),
        candidates = candidates.len(),
        target,
        ?outcome,
        "inferred owner addresses"
    );

    IdentityInference {
        addresses,
        outcome,
        target,
        candidate_messages: candidates.len(),
        coverage,
    }
}
