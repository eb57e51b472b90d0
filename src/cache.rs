//! Content-addressed cache for model responses.
//!
//! The key is a 64-bit FNV-1a hash of `"<doc_type_tag>\n<candidates dump>"`,
//! so two documents that classify identically and yield identical local
//! candidates share one entry and cost one API call. Entries are immutable
//! once written; concurrent writers racing on the same key write equivalent
//! bytes, so plain write-then-close is enough. No fsync — losing an entry to
//! a crash just means one extra API call later.

use crate::error::ExtractError;
use fnv::FnvHasher;
use serde_json::{Map, Value};
use std::hash::Hasher;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Compute the cache key for a (doc type, local candidates) pair.
///
/// Pure function of its inputs: the candidates dump is key-ordered, so
/// identical inputs always hash identically across runs and processes.
pub fn cache_key(doc_type_tag: &str, candidates_dump: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(doc_type_tag.as_bytes());
    hasher.write(b"\n");
    hasher.write(candidates_dump.as_bytes());
    hasher.finish()
}

/// Directory-backed response cache. One `<key>.json` file per entry.
#[derive(Debug, Clone)]
pub struct ExtractionCache {
    dir: PathBuf,
}

impl ExtractionCache {
    /// Open (creating if needed) the cache directory. Creation failure is
    /// fatal to the run — a configured cache that silently does nothing would
    /// hide every cost the operator asked to avoid.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ExtractError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ExtractError::io(&dir, e))?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: u64) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Look up an entry. Unreadable or corrupt files count as misses.
    pub fn load(&self, key: u64) -> Option<Map<String, Value>> {
        let path = self.entry_path(key);
        let bytes = std::fs::read(&path).ok()?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => {
                debug!("cache hit: {}", path.display());
                Some(map)
            }
            Ok(_) | Err(_) => {
                warn!("ignoring corrupt cache entry: {}", path.display());
                None
            }
        }
    }

    /// Store an entry. Best-effort: a failed write is logged and the run
    /// continues without it.
    pub fn store(&self, key: u64, value: &Map<String, Value>) {
        let path = self.entry_path(key);
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&path, bytes) {
                    warn!("cache write failed for {}: {e}", path.display());
                }
            }
            Err(e) => warn!("cache serialization failed: {e}"),
        }
    }
}
