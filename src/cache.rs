//! response cache for repeated identical queries
//!
//! A successful reply is memoized under a content fingerprint of the request
//! so a repeated query is served without rescanning the corpus. Entries live
//! as flat files keyed by hash; expiry is lazy, an entry older than the TTL
//! is treated as absent on lookup and stays on disk until overwritten.
//! There is no eviction beyond the TTL, unbounded growth is accepted.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use sha1::{Digest, Sha1};

/// default entry lifetime, seconds
pub const DEFAULT_TTL_SECS: u64 = 3600;

pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    /// opens (and creates if needed) a cache directory
    pub fn new<P: Into<PathBuf>>(dir: P, ttl: Duration) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(ResponseCache { dir, ttl })
    } // end of new

    /// Content fingerprint of (operation name, request body).
    /// The body is re-serialized from its parsed form, which orders object
    /// keys canonically, so two semantically identical requests with permuted
    /// JSON keys produce the same key.
    pub fn fingerprint(operation: &str, body: &serde_json::Value) -> String {
        let payload = format!("{}:{}", operation, body);
        let mut hasher = Sha1::new();
        hasher.update(payload.as_bytes());
        format!("{:x}", hasher.finalize())
    } // end of fingerprint

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// cached reply if present and younger than the TTL
    pub fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        let metadata = fs::metadata(&path).ok()?;
        let modified = metadata.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;
        if age >= self.ttl {
            log::debug!("cache entry {} expired (age {}s)", key, age.as_secs());
            return None;
        }
        fs::read_to_string(&path).ok()
    } // end of get

    /// Stores a successful reply. Concurrent writers to the same key are
    /// last-writer-wins; a failed write only loses the memoization, so it is
    /// logged and swallowed.
    pub fn put(&self, key: &str, response: &str) {
        let path = self.entry_path(key);
        if let Err(e) = fs::write(&path, response) {
            log::warn!("could not write cache entry {}: {}", path.display(), e);
        }
    } // end of put
} // end of impl ResponseCache

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        let body: serde_json::Value =
            serde_json::from_str(r#"{"sequence": "AND", "threshold": 50.0}"#).unwrap();
        let key = ResponseCache::fingerprint("search_peptide", &body);
        assert!(cache.get(&key).is_none());
        cache.put(&key, r#"{"results": []}"#);
        assert_eq!(cache.get(&key).as_deref(), Some(r#"{"results": []}"#));
    }

    #[test]
    fn test_permuted_keys_share_a_fingerprint() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"sequence": "AND", "threshold": 50.0}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"threshold": 50.0, "sequence": "AND"}"#).unwrap();
        assert_eq!(
            ResponseCache::fingerprint("search_peptide", &a),
            ResponseCache::fingerprint("search_peptide", &b)
        );
    }

    #[test]
    fn test_fingerprint_separates_operations_and_bodies() {
        let body: serde_json::Value = serde_json::from_str(r#"{"sequence": "AND"}"#).unwrap();
        let other: serde_json::Value = serde_json::from_str(r#"{"sequence": "ANE"}"#).unwrap();
        assert_ne!(
            ResponseCache::fingerprint("search_peptide", &body),
            ResponseCache::fingerprint("search_codon", &body)
        );
        assert_ne!(
            ResponseCache::fingerprint("search_peptide", &body),
            ResponseCache::fingerprint("search_peptide", &other)
        );
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        // zero TTL : every entry is immediately stale
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(0)).unwrap();
        cache.put("somekey", "cached");
        assert!(cache.get("somekey").is_none());
        // the stale file is left in place until overwritten
        assert!(dir.path().join("somekey.json").is_file());
    }

    #[test]
    fn test_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        cache.put("k", "first");
        cache.put("k", "second");
        assert_eq!(cache.get("k").as_deref(), Some("second"));
    }
}
