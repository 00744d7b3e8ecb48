use std::path::Path;

use tracing::{info, warn};

use super::accounts::{ThreadFeatures, aggregate, thread_features};
use super::cache::{
    ACCOUNTS_FILE, MY_ADDRESSES_FILE, STORE_FILE, THREADS_FILE, load_store, save_store, write_json,
};
use super::identity::{IdentityConfig, IdentityInference, infer_my_addresses};
use super::rank::DomainRank;
use super::scan::scan_archive;
use super::store::{IngestReport, MessageStore};
use super::threading::{ThreadRoots, group, resolve};
use super::types::{Account, Thread};
use crate::Result;

/// Where this run's store came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSource {
    Cache,
    Scan(IngestReport),
}

/// Use the store cache in `cache_dir` unless `rescan` is set or it is unusable;
/// otherwise scan `exports_dir`, build the store and refresh the cache.
pub fn load_or_scan<F>(
    exports_dir: &Path,
    cache_dir: &Path,
    rescan: bool,
    progress: F,
) -> (MessageStore, StoreSource)
where
    F: Fn(usize, usize) + Sync,
{
    let cache_file = cache_dir.join(STORE_FILE);
    if !rescan {
        if let Some(store) = load_store(&cache_file) {
            return (store, StoreSource::Cache);
        }
    }

    let (store, report) = MessageStore::ingest(scan_archive(exports_dir, progress));
    if report.failed > 0 {
        warn!(failed = report.failed, "some messages could not be normalized");
    }

    // The cache only saves time on the next run
    if let Err(e) = save_store(&cache_file, &store) {
        warn!(error = %e, path = %cache_file.display(), "could not save store cache");
    }

    (store, StoreSource::Scan(report))
}

/// Every stage's output for one run over a finished store
#[derive(Debug, Clone)]
pub struct Analysis<'a> {
    pub roots: ThreadRoots,
    pub threads: Vec<Thread<'a>>,
    pub identity: IdentityInference,
    pub features: Vec<ThreadFeatures>,
    pub accounts: Vec<Account>,
}

impl<'a> Analysis<'a> {
    /// Resolve threads, infer my addresses and detect accounts
    pub fn run(store: &'a MessageStore, identity: &IdentityConfig, ranks: &dyn DomainRank) -> Self {
        let roots = resolve(store);
        let threads = group(store, &roots);
        let identity = infer_my_addresses(store, identity);

        let my_addrs = identity.address_set();
        let features = thread_features(&threads, &my_addrs);
        let accounts = aggregate(&features, &my_addrs, ranks);

        info!(
            messages = store.len(),
            threads = threads.len(),
            my_addresses = my_addrs.len(),
            accounts = accounts.len(),
            "analysis complete"
        );

        Self {
            roots,
            threads,
            identity,
            features,
            accounts,
        }
    }

    /// Write my addresses, accounts and per-thread features into `dir`
    pub fn write_results(&self, dir: &Path) -> Result<()> {
        write_json(&dir.join(MY_ADDRESSES_FILE), &self.identity.addresses)?;
        write_json(&dir.join(ACCOUNTS_FILE), &self.accounts)?;
        write_json(&dir.join(THREADS_FILE), &self.features)?;
        info!(dir = %dir.display(), "wrote results");
        Ok(())
    }
}
