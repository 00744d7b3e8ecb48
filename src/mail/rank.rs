//! Domain popularity lookup, backed by a `rank,domain` top-sites list.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::{Error, Result};

pub trait DomainRank {
    /// Popularity rank of a registrable domain; `None` when unlisted
    fn lookup(&self, domain: &str) -> Option<u32>;
}

/// Lookup that knows no domains
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRanks;

impl DomainRank for NoRanks {
    fn lookup(&self, _domain: &str) -> Option<u32> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct DomainRanks {
    ranks: HashMap<String, u32>,
}

impl DomainRanks {
    /// Load a CSV file of `rank,domain` lines. Malformed lines are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::DomainRank(format!("{}: {}", path.display(), e)))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Like `load`, but an unusable file degrades to an empty table
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(ranks) => ranks,
            Err(e) => {
                warn!(error = %e, "domain ranks unavailable, accounts will be unranked");
                Self::default()
            }
        }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut ranks = HashMap::new();
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                // Keep the best rank if a domain is listed twice
                Some((rank, domain)) => {
                    let best = ranks.entry(domain).or_insert(rank);
                    *best = (*best).min(rank);
                }
                None => skipped += 1,
            }
        }

        info!(domains = ranks.len(), skipped, "loaded domain ranks");
        Ok(Self { ranks })
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

impl DomainRank for DomainRanks {
    fn lookup(&self, domain: &str) -> Option<u32> {
        self.ranks.get(&domain.to_lowercase()).copied()
    }
}

fn parse_line(line: &str) -> Option<(u32, String)> {
    let (rank, domain) = line.split_once(',')?;
    let rank = rank.trim().parse().ok()?;
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() {
        return None;
    }
    Some((rank, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reader() {
        let csv = "1,google.com\n2,YouTube.com\nrank,domain\n\n3,\n4,google.com\n";
        let ranks = DomainRanks::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks.lookup("google.com"), Some(1));
        assert_eq!(ranks.lookup("youtube.com"), Some(2));
        assert_eq!(ranks.lookup("YOUTUBE.COM"), Some(2));
        assert_eq!(ranks.lookup("example.org"), None);
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ranks = DomainRanks::load_or_empty(&dir.path().join("top-1m.csv"));
        assert!(ranks.is_empty());
        assert_eq!(ranks.lookup("google.com"), None);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top-1m.csv");
        std::fs::write(&path, "1,google.com\n17,shop.example\n").unwrap();
        let ranks = DomainRanks::load(&path).unwrap();
        assert_eq!(ranks.lookup("shop.example"), Some(17));
    }

    #[test]
    fn test_no_ranks() {
        assert_eq!(NoRanks.lookup("google.com"), None);
    }
}
