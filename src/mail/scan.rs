use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use mail_parser::{Address, HeaderValue, Message, MessageParser};
use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::address::normalize_address;
use super::types::MessageRecord;
use crate::{Error, Result};

/// A file in the exports directory that holds mail
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArchiveFile {
    /// Many messages separated by `From ` lines
    Mbox(PathBuf),
    /// One message per file (maildir `cur/`/`new/` entries, `.eml`)
    Message(PathBuf),
}

impl ArchiveFile {
    pub fn path(&self) -> &Path {
        match self {
            ArchiveFile::Mbox(p) | ArchiveFile::Message(p) => p,
        }
    }
}

/// Find every mbox file and single-message file below `exports_dir`, sorted by path
pub fn discover(exports_dir: &Path) -> Vec<ArchiveFile> {
    let mut files: Vec<ArchiveFile> = WalkDir::new(exports_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| classify(entry.into_path()))
        .collect();

    files.sort_by(|a, b| a.path().cmp(b.path()));
    files
}

fn classify(path: PathBuf) -> Option<ArchiveFile> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match extension.as_deref() {
        Some("mbox") => return Some(ArchiveFile::Mbox(path)),
        Some("eml") => return Some(ArchiveFile::Message(path)),
        _ => {}
    }

    let in_maildir = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == "cur" || n == "new");
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));

    (in_maildir && !hidden).then_some(ArchiveFile::Message(path))
}

/// Split mbox content into raw messages, dropping the `From ` separator lines.
/// Anything before the first separator is ignored.
pub fn split_mbox(data: &[u8]) -> Vec<&[u8]> {
    let mut starts = Vec::new();
    if data.starts_with(b"From ") {
        starts.push(0);
    }
    starts.extend(
        data.windows(6)
            .enumerate()
            .filter(|(_, w)| *w == b"\nFrom ")
            .map(|(i, _)| i + 1),
    );

    let mut messages = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(data.len());
        let chunk = &data[start..end];
        let body = match chunk.iter().position(|&b| b == b'\n') {
            Some(nl) => &chunk[nl + 1..],
            None => continue,
        };
        if !body.iter().all(|b| b.is_ascii_whitespace()) {
            messages.push(body);
        }
    }
    messages
}

/// Normalize one raw RFC 5322 message.
///
/// An `In-Reply-To` listing several ids keeps only the last one.
pub fn parse_message(raw: &[u8]) -> Result<MessageRecord> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::Parse("not an RFC 5322 message".to_string()))?;

    let message_id = message
        .message_id()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(Error::MissingMessageId)?
        .to_string();

    let sender = message.from().and_then(|list| list.first());

    Ok(MessageRecord {
        message_id,
        in_reply_to: message
            .in_reply_to()
            .as_text()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        unixtime: message.date().map(|d| d.to_timestamp()),
        subject: message.subject().map(|s| s.to_string()),
        from: sender.and_then(|a| a.address()).map(normalize_address),
        from_name: sender.and_then(|a| a.name()).map(|s| s.to_string()),
        to: addresses(message.to()),
        cc: addresses(message.cc()),
        bcc: addresses(message.bcc()),
        reply_to: addresses(message.reply_to()).into_iter().next(),
        delivered_to: header_text(&message, "Delivered-To").map(|s| normalize_address(&s)),
        x_forwarded_to: header_text(&message, "X-Forwarded-To"),
        x_forwarded_for: header_text(&message, "X-Forwarded-For"),
        headers: message
            .headers()
            .iter()
            .map(|h| h.name().to_string())
            .collect(),
        labels: header_text(&message, "X-Gmail-Labels")
            .map(|labels| {
                labels
                    .split(',')
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn addresses(list: Option<&Address>) -> Vec<String> {
    list.map(|list| {
        list.iter()
            .filter_map(|a| a.address())
            .map(normalize_address)
            .collect()
    })
    .unwrap_or_default()
}

/// First value of a header as text, whatever mail-parser decoded it into
fn header_text(message: &Message, name: &str) -> Option<String> {
    let header = message
        .headers()
        .iter()
        .find(|h| h.name().eq_ignore_ascii_case(name))?;

    let text = match header.value() {
        HeaderValue::Address(list) => list
            .iter()
            .filter_map(|a| a.address())
            .collect::<Vec<_>>()
            .join(", "),
        value => value.as_text()?.to_string(),
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Parse every message of one archive file
fn parse_file(file: &ArchiveFile) -> Vec<Result<MessageRecord>> {
    let data = match std::fs::read(file.path()) {
        Ok(data) => data,
        Err(e) => return vec![Err(Error::Io(e))],
    };

    match file {
        ArchiveFile::Mbox(_) => split_mbox(&data).into_iter().map(parse_message).collect(),
        ArchiveFile::Message(_) => vec![parse_message(&data)],
    }
}

/// Scan the exports directory and normalize all mail in parallel.
///
/// Returns one result per message found (or per unreadable file), ready for
/// `MessageStore::ingest`. Output order follows file order.
pub fn scan_archive<F>(exports_dir: &Path, progress: F) -> Vec<Result<MessageRecord>>
where
    F: Fn(usize, usize) + Sync, // (files done, total files)
{
    let files = discover(exports_dir);
    let total = files.len();
    info!(files = total, dir = %exports_dir.display(), "scanning archive");
    progress(0, total);

    let processed = AtomicUsize::new(0);
    let per_file: Vec<Vec<Result<MessageRecord>>> = files
        .par_iter()
        .map(|file| {
            let records = parse_file(file);
            debug!(path = %file.path().display(), messages = records.len(), "parsed file");

            let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if current % 10 == 0 || current == total {
                progress(current, total);
            }
            records
        })
        .collect();

    per_file.into_iter().flatten().collect()
}
