use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use super::store::MessageStore;
use super::types::{MessageRecord, Thread};

/// Root assignment for every message in a store, plus the oddities met on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreadRoots {
    /// message_id -> first_id
    pub first_ids: BTreeMap<String, String>,
    /// Walks that closed a reply cycle
    pub cycles: usize,
    /// Walks that stopped on a message replying to itself
    pub self_references: usize,
    /// Walks that stopped on a parent missing from the store
    pub dangling: usize,
}

impl ThreadRoots {
    pub fn first_id(&self, message_id: &str) -> Option<&str> {
        self.first_ids.get(message_id).map(|s| s.as_str())
    }
}

/// How a single reply-chain walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkEnd {
    Root,
    SelfReference,
    Dangling,
    Cycle,
}

/// Label every message with the root of its reply chain.
pub fn resolve(store: &MessageStore) -> ThreadRoots {
    let mut roots = ThreadRoots::default();

    for msg in store.iter() {
        let (first_id, end) = walk_to_root(store, msg);
        match end {
            WalkEnd::Cycle => {
                debug!(message_id = %msg.message_id, root = %first_id, "reply cycle");
                roots.cycles += 1;
            }
            WalkEnd::SelfReference => roots.self_references += 1,
            WalkEnd::Dangling => roots.dangling += 1,
            WalkEnd::Root => {}
        }
        roots.first_ids.insert(msg.message_id.clone(), first_id);
    }

    info!(
        messages = roots.first_ids.len(),
        cycles = roots.cycles,
        self_references = roots.self_references,
        dangling = roots.dangling,
        "resolved thread roots"
    );
    roots
}

/// Follow `in_reply_to` links from `start` until the chain ends.
///
/// A closed cycle resolves to the message with the smallest known send time
/// seen during this walk. Unknown times only win when nothing on the walk
/// has a known time.
fn walk_to_root(store: &MessageStore, start: &MessageRecord) -> (String, WalkEnd) {
    let mut current = start;
    let mut earliest = start;
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(start.message_id.as_str());

    loop {
        let Some(parent_id) = current.in_reply_to.as_deref() else {
            return (current.message_id.clone(), WalkEnd::Root);
        };
        if parent_id == current.message_id {
            return (current.message_id.clone(), WalkEnd::SelfReference);
        }
        let Some(parent) = store.get(parent_id) else {
            return (current.message_id.clone(), WalkEnd::Dangling);
        };
        if !visited.insert(parent_id) {
            return (earliest.message_id.clone(), WalkEnd::Cycle);
        }

        current = parent;
        if let Some(time) = current.unixtime {
            if earliest.unixtime.is_none_or(|best| time < best) {
                earliest = current;
            }
        }
    }
}

/// Group messages into threads by resolved root, ordered by thread id.
pub fn group<'a>(store: &'a MessageStore, roots: &ThreadRoots) -> Vec<Thread<'a>> {
    let mut partitions: BTreeMap<&str, Vec<&'a MessageRecord>> = BTreeMap::new();
    for msg in store.iter() {
        if let Some(first_id) = roots.first_id(&msg.message_id) {
            partitions.entry(first_id).or_default().push(msg);
        }
    }

    partitions
        .into_iter()
        .filter_map(|(thread_id, mut messages)| {
            // Stable, so equal times keep message id order
            messages.sort_by_key(|m| m.unixtime.unwrap_or(0));

            let mut main = *messages.first()?;
            for &msg in &messages {
                if msg.message_id == thread_id {
                    main = msg;
                }
            }

            Some(Thread {
                thread_id: thread_id.to_string(),
                main_is_first: main.is_thread_start(),
                main,
                messages,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(
        id: &str,
        reply_to: Option<&str>,
        unixtime: Option<i64>,
    ) -> crate::Result<MessageRecord> {
        Ok(MessageRecord {
            message_id: id.to_string(),
            in_reply_to: reply_to.map(|s| s.to_string()),
            unixtime,
            ..Default::default()
        })
    }

    fn store(records: Vec<crate::Result<MessageRecord>>) -> MessageStore {
        MessageStore::ingest(records).0
    }

    /// Resolve a single walk as if `id` had just been ingested
    fn root_from(store: &MessageStore, id: &str) -> String {
        walk_to_root(store, store.get(id).unwrap()).0
    }

    #[test]
    fn test_linear_thread() {
        let store = store(vec![
            msg("1", None, Some(10)),
            msg("2", Some("1"), Some(20)),
            msg("3", Some("2"), Some(30)),
        ]);
        let roots = resolve(&store);
        for id in ["1", "2", "3"] {
            assert_eq!(roots.first_id(id), Some("1"));
        }

        let threads = group(&store, &roots);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].thread_id, "1");
        assert_eq!(threads[0].main.message_id, "1");
        assert!(threads[0].main_is_first);
        let order: Vec<&str> = threads[0]
            .messages
            .iter()
            .map(|m| m.message_id.as_str())
            .collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_two_cycle_resolves_to_earliest_on_walk() {
        let store = store(vec![
            msg("x", Some("y"), Some(100)),
            msg("y", Some("x"), Some(50)),
        ]);
        let roots = resolve(&store);
        assert_eq!(roots.first_id("x"), Some("y"));
        assert_eq!(roots.first_id("y"), Some("y"));
        assert_eq!(roots.cycles, 2);
    }

    #[test]
    fn test_cycle_earliest_is_local_to_walk() {
        // t -> a -> b -> a, where t is the oldest message on its own walk
        let store = store(vec![
            msg("t", Some("a"), Some(1)),
            msg("a", Some("b"), Some(30)),
            msg("b", Some("a"), Some(20)),
        ]);
        let roots = resolve(&store);
        assert_eq!(roots.first_id("t"), Some("t"));
        assert_eq!(roots.first_id("a"), Some("b"));
        assert_eq!(roots.first_id("b"), Some("b"));
    }

    #[test]
    fn test_cycle_without_known_times_keeps_start() {
        let store = store(vec![msg("x", Some("y"), None), msg("y", Some("x"), None)]);
        let roots = resolve(&store);
        assert_eq!(roots.first_id("x"), Some("x"));
        assert_eq!(roots.first_id("y"), Some("y"));
    }

    #[test]
    fn test_unknown_start_time_yields_to_known() {
        let store = store(vec![msg("x", Some("y"), None), msg("y", Some("x"), Some(500))]);
        let roots = resolve(&store);
        assert_eq!(roots.first_id("x"), Some("y"));
    }

    #[test]
    fn test_self_reference_and_dangling_parent() {
        let store = store(vec![
            msg("self", Some("self"), Some(1)),
            msg("child", Some("self"), Some(2)),
            msg("orphan", Some("missing"), Some(3)),
            msg("reply", Some("orphan"), Some(4)),
        ]);
        let roots = resolve(&store);
        assert_eq!(roots.first_id("self"), Some("self"));
        assert_eq!(roots.first_id("child"), Some("self"));
        assert_eq!(roots.first_id("orphan"), Some("orphan"));
        assert_eq!(roots.first_id("reply"), Some("orphan"));
        assert_eq!(roots.self_references, 2);
        assert_eq!(roots.dangling, 2);

        let threads = group(&store, &roots);
        let orphan = threads.iter().find(|t| t.thread_id == "orphan").unwrap();
        assert_eq!(orphan.main.message_id, "orphan");
        assert!(!orphan.main_is_first);
        let selfref = threads.iter().find(|t| t.thread_id == "self").unwrap();
        assert!(selfref.main_is_first);
    }

    #[test]
    fn test_idempotent_root() {
        let store = store(vec![
            msg("a", None, Some(5)),
            msg("b", Some("a"), Some(6)),
            msg("c", Some("d"), Some(9)),
            msg("d", Some("e"), Some(3)),
            msg("e", Some("c"), Some(7)),
            msg("f", Some("c"), Some(1)),
            msg("g", Some("nowhere"), None),
            msg("h", Some("h"), None),
        ]);
        let roots = resolve(&store);
        for (id, first_id) in &roots.first_ids {
            assert_eq!(&root_from(&store, first_id), first_id, "root of {}", id);
        }
    }

    #[test]
    fn test_unknown_times_sort_first() {
        let store = store(vec![
            msg("root", None, Some(100)),
            msg("late", Some("root"), Some(300)),
            msg("undated", Some("root"), None),
            msg("early", Some("root"), Some(200)),
        ]);
        let roots = resolve(&store);
        let threads = group(&store, &roots);
        let order: Vec<&str> = threads[0]
            .messages
            .iter()
            .map(|m| m.message_id.as_str())
            .collect();
        assert_eq!(order, vec!["undated", "root", "early", "late"]);
        assert_eq!(threads[0].main.message_id, "root");
    }

    #[test]
    fn test_cyclic_thread_main_is_not_first() {
        // Both walks close the cycle and land on "b"
        let store = store(vec![
            msg("a", Some("b"), Some(10)),
            msg("b", Some("a"), Some(5)),
        ]);
        let roots = resolve(&store);
        let threads = group(&store, &roots);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].main.message_id, "b");
        assert!(!threads[0].main_is_first);
    }

    #[test]
    fn test_groups_are_ordered_by_thread_id() {
        let store = store(vec![
            msg("z", None, Some(1)),
            msg("m", None, Some(2)),
            msg("a", None, Some(3)),
        ]);
        let threads = group(&store, &resolve(&store));
        let ids: Vec<&str> = threads.iter().map(|t| t.thread_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }
}
