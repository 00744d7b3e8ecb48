use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::store::MessageStore;
use crate::Result;

const CACHE_VERSION: u32 = 1;

pub const STORE_FILE: &str = "messages.bin";
pub const MY_ADDRESSES_FILE: &str = "my_email_addrs.json";
pub const ACCOUNTS_FILE: &str = "accounts.json";
pub const THREADS_FILE: &str = "threads.json";

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    store: MessageStore,
}

/// Same layout as `bincode::serialize`, but decoding may never claim more
/// bytes than the file holds
fn cache_options(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(limit)
}

/// Load the message store cache (binary format for speed).
///
/// Any problem with the file means "no cache": the caller rescans.
pub fn load_store(path: &Path) -> Option<MessageStore> {
    if !path.exists() {
        return None;
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!(error = %e, "cannot open store cache");
            return None;
        }
    };

    let len = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(e) => {
            debug!(error = %e, "cannot stat store cache");
            return None;
        }
    };

    let reader = BufReader::new(file);
    let cache: CacheFile = match cache_options(len).deserialize_from(reader) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "ignoring unreadable store cache");
            return None;
        }
    };

    if cache.version != CACHE_VERSION {
        debug!(found = cache.version, expected = CACHE_VERSION, "store cache version mismatch");
        return None;
    }

    info!(messages = cache.store.len(), path = %path.display(), "loaded store cache");
    Some(cache.store)
}

/// Save the message store cache
pub fn save_store(path: &Path, store: &MessageStore) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let cache = CacheFile {
        version: CACHE_VERSION,
        store: store.clone(),
    };

    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &cache)?;
    writer.flush()?;
    Ok(())
}

/// Write an analysis result as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
