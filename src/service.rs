//! the search service : request validation, cache wrapping, scan, reply
//!
//! The service owns the whole request boundary so a front door only forwards
//! a raw JSON body and ships the reply back verbatim. Every failure is turned
//! into a structured `{"error": ...}` body with an http-equivalent status;
//! nothing escapes as a fault. The cache wraps the scan explicitly here, not
//! in any http layer, so the fingerprint and TTL logic is unit testable on
//! its own.

use std::time::{Duration, SystemTime};

use cpu_time::ProcessTime;
use serde_json::{json, Value};

use crate::aa::matrix::SubstitutionMatrix;
use crate::aligner::{hits_to_results, run_aligner, AlignerConfig};
use crate::answer::{round2, SearchAnswer};
use crate::cache::ResponseCache;
use crate::error::SearchError;
use crate::records::{RecordStore, SearchKind};
use crate::scan::{normalize_query, rank_results, scan_corpus};
use crate::utils::parameters::ServiceParams;

/// a reply ready to be forwarded : an http-equivalent status and a JSON body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceReply {
    pub status: u16,
    pub body: String,
}

impl ServiceReply {
    fn ok(body: String) -> Self {
        ServiceReply { status: 200, body }
    }

    fn error(status: u16, message: &str) -> Self {
        ServiceReply {
            status,
            body: json!({ "error": message }).to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
} // end of impl ServiceReply

/// the similarity search service over one corpus
pub struct SearchService<S: RecordStore> {
    store: S,
    matrix: SubstitutionMatrix,
    params: ServiceParams,
    cache: Option<ResponseCache>,
    aligner: Option<AlignerConfig>,
}

impl<S: RecordStore> SearchService<S> {
    pub fn new(store: S, matrix: SubstitutionMatrix, params: ServiceParams) -> Self {
        SearchService {
            store,
            matrix,
            params,
            cache: None,
            aligner: None,
        }
    } // end of new

    /// memoize successful replies in the given cache
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// enable the external aligner variant; the wall clock bound comes from
    /// the service parameters
    pub fn with_aligner(mut self, mut config: AlignerConfig) -> Self {
        config.set_timeout(Duration::from_secs(self.params.get_aligner_timeout_secs()));
        self.aligner = Some(config);
        self
    }

    /// POST /search/peptide
    pub fn search_peptide(&self, raw_body: &str) -> ServiceReply {
        self.dispatch(SearchKind::Peptide, raw_body, false)
    }

    /// POST /search/codon
    pub fn search_codon(&self, raw_body: &str) -> ServiceReply {
        self.dispatch(SearchKind::Codon, raw_body, false)
    }

    /// same contract, scored by the configured external aligner
    pub fn search_aligned(&self, kind: SearchKind, raw_body: &str) -> ServiceReply {
        self.dispatch(kind, raw_body, true)
    }

    /// corpus statistics; never cached
    pub fn info(&self) -> ServiceReply {
        match self.store.stats() {
            Ok(stats) => ServiceReply::ok(
                json!({
                    "total_records": stats.total_records,
                    "unique_organisms": stats.unique_organisms,
                })
                .to_string(),
            ),
            Err(e) => {
                log::error!("info failed: {}", e);
                ServiceReply::error(500, &e.to_string())
            }
        }
    } // end of info

    /// liveness of the service and its collaborators; never cached
    pub fn health(&self) -> ServiceReply {
        let database = self.store.stats().is_ok();
        let mut body = json!({
            "status": "healthy",
            "database": database,
        });
        if let Some(config) = &self.aligner {
            body["aligner_database"] = json!(config.get_database().is_file());
        }
        ServiceReply::ok(body.to_string())
    } // end of health

    fn dispatch(&self, kind: SearchKind, raw_body: &str, aligned: bool) -> ServiceReply {
        // reject anything but a JSON object before touching the cache
        let body: Value = match serde_json::from_str(raw_body) {
            Ok(body @ Value::Object(_)) => body,
            _ => return ServiceReply::error(400, "No JSON data provided"),
        };
        let operation = if aligned {
            format!("{}_aligned", kind.operation())
        } else {
            kind.operation().to_string()
        };
        let key = ResponseCache::fingerprint(&operation, &body);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key) {
                log::info!("returning cached reply for {}", operation);
                return ServiceReply::ok(hit);
            }
        }
        match self.handle(kind, &body, aligned) {
            Ok(reply_body) => {
                // only successful, well-formed replies are memoized
                if let Some(cache) = &self.cache {
                    cache.put(&key, &reply_body);
                }
                ServiceReply::ok(reply_body)
            }
            Err(e) => {
                log::error!("{} failed: {}", operation, e);
                ServiceReply::error(e.status(), &e.to_string())
            }
        }
    } // end of dispatch

    fn handle(&self, kind: SearchKind, body: &Value, aligned: bool) -> Result<String, SearchError> {
        let start_t = SystemTime::now();
        let cpu_start = ProcessTime::now();
        //
        let sequence = body.get("sequence").and_then(|v| v.as_str()).unwrap_or("");
        if sequence.is_empty() {
            return Err(SearchError::InvalidInput("Sequence is required".to_string()));
        }
        let threshold = self.extract_threshold(body)?;
        let query = normalize_query(kind, sequence);
        if query.len() < kind.min_len() {
            let unit = match kind {
                SearchKind::Peptide => "amino acids",
                SearchKind::Codon => "nucleotides",
            };
            return Err(SearchError::InvalidInput(format!(
                "Sequence too short (minimum {} {})",
                kind.min_len(),
                unit
            )));
        }
        //
        let (mut results, algorithm) = if aligned {
            let config = self.aligner.as_ref().ok_or_else(|| {
                SearchError::Aligner("no external aligner configured".to_string())
            })?;
            let hits = run_aligner(config, &query, threshold)?;
            let results = hits_to_results(&self.store, &hits, config.get_label())?;
            (results, config.get_label().to_string())
        } else {
            let results = scan_corpus(&self.store, &self.matrix, kind, &query, threshold)?;
            (results, kind.algorithm().to_string())
        };
        rank_results(&mut results, self.params.get_max_results());
        //
        let search_time = start_t.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.);
        log::info!(
            "found {} matches in {:.2}s (cpu {:.2}s)",
            results.len(),
            search_time,
            cpu_start.elapsed().as_secs_f64()
        );
        let answer = SearchAnswer {
            total: results.len(),
            results,
            search_time: round2(search_time),
            query_length: query.len(),
            threshold,
            algorithm,
        };
        let reply_body = serde_json::to_string(&answer)?;
        Ok(reply_body)
    } // end of handle

    // a numeric threshold, or a numeric string as the historical front door
    // accepted, or the configured default when absent
    fn extract_threshold(&self, body: &Value) -> Result<f64, SearchError> {
        match body.get("threshold") {
            None | Some(Value::Null) => Ok(self.params.get_default_threshold()),
            Some(v) => v
                .as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
                .ok_or_else(|| SearchError::InvalidInput("Invalid threshold".to_string())),
        }
    } // end of extract_threshold
} // end of impl SearchService

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::records::{test_record, CorpusStats, MemoryStore, Record};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // counts projection fetches so tests can assert a scan never happened
    struct CountingStore {
        inner: MemoryStore,
        scans: Arc<AtomicUsize>,
    }

    impl CountingStore {
        fn new(records: Vec<Record>) -> (Self, Arc<AtomicUsize>) {
            let scans = Arc::new(AtomicUsize::new(0));
            (
                CountingStore {
                    inner: MemoryStore::new(records),
                    scans: scans.clone(),
                },
                scans,
            )
        }
    }

    impl RecordStore for CountingStore {
        fn projection(&self, kind: SearchKind) -> Result<Vec<(String, String)>, StoreError> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.inner.projection(kind)
        }

        fn record_by_identifier(&self, identifier: &str) -> Result<Option<Record>, StoreError> {
            self.inner.record_by_identifier(identifier)
        }

        fn stats(&self) -> Result<CorpusStats, StoreError> {
            self.inner.stats()
        }
    }

    fn corpus() -> Vec<Record> {
        vec![
            test_record("tm1", "AND", "aaaaaaaaaaaaaaa"),
            test_record("tm2", "ANDNYALAA", "aaataaataaataaa"),
            test_record("tm3", "WWW", "ttttttttttttttt"),
        ]
    }

    fn service() -> SearchService<MemoryStore> {
        SearchService::new(
            MemoryStore::new(corpus()),
            SubstitutionMatrix::blosum62(),
            ServiceParams::default(),
        )
    }

    #[test]
    fn test_peptide_search_exact_match() {
        let reply = service().search_peptide(r#"{"sequence": "AND", "threshold": 50}"#);
        assert_eq!(reply.status, 200);
        let answer: SearchAnswer = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(answer.algorithm, "BLOSUM62");
        assert_eq!(answer.query_length, 3);
        assert_eq!(answer.threshold, 50.);
        let top = &answer.results[0];
        assert_eq!(top.record.identifier, "tm1");
        assert_eq!(top.similarity, 100.0);
        assert_eq!(top.e_value, "N/A");
    }

    #[test]
    fn test_codon_search_scores() {
        let reply = service().search_codon(r#"{"sequence": "aaaaaaaaaaaaaaa", "threshold": 50}"#);
        assert_eq!(reply.status, 200);
        let answer: SearchAnswer = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(answer.algorithm, "Simple Nucleotide Alignment");
        assert_eq!(answer.total, 2);
        assert_eq!(answer.results[0].similarity, 100.0);
        assert_eq!(answer.results[1].similarity, 80.0);
    }

    #[test]
    fn test_default_threshold_applied() {
        let reply = service().search_peptide(r#"{"sequence": "AND"}"#);
        let answer: SearchAnswer = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(answer.threshold, 50.);
    }

    #[test]
    fn test_numeric_string_threshold_accepted() {
        let reply = service().search_peptide(r#"{"sequence": "AND", "threshold": "75"}"#);
        let answer: SearchAnswer = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(answer.threshold, 75.);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let reply = service().search_peptide(r#"{"sequence": "AND", "threshold": "plenty"}"#);
        assert_eq!(reply.status, 400);
        assert!(reply.body.contains("Invalid threshold"));
    }

    #[test]
    fn test_malformed_body_rejected() {
        for raw in ["", "null", "[1,2]", "not json"] {
            let reply = service().search_peptide(raw);
            assert_eq!(reply.status, 400, "body {:?} must be rejected", raw);
            assert!(reply.body.contains("No JSON data provided"));
        }
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let reply = service().search_peptide(r#"{"sequence": ""}"#);
        assert_eq!(reply.status, 400);
        assert!(reply.body.contains("Sequence is required"));
    }

    #[test]
    fn test_short_query_rejected_before_any_scan() {
        let (store, scans) = CountingStore::new(corpus());
        let service = SearchService::new(
            store,
            SubstitutionMatrix::blosum62(),
            ServiceParams::default(),
        );
        let reply = service.search_peptide(r#"{"sequence": "AN"}"#);
        assert_eq!(reply.status, 400);
        assert!(reply.body.contains("minimum 3 amino acids"));
        let reply = service.search_codon(r#"{"sequence": "aaaa"}"#);
        assert_eq!(reply.status, 400);
        assert!(reply.body.contains("minimum 15 nucleotides"));
        // the corpus was never fetched
        assert_eq!(scans.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_normalization_salvages_annotated_query() {
        // strips to "AND", length 3, passes the floor
        let reply = service().search_peptide(r#"{"sequence": " a*n?d \n"}"#);
        assert_eq!(reply.status, 200);
        let answer: SearchAnswer = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(answer.results[0].similarity, 100.0);
    }

    #[test]
    fn test_cache_round_trip_and_permuted_keys() {
        let dir = tempfile::tempdir().unwrap();
        let (store, scans) = CountingStore::new(corpus());
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        let service = SearchService::new(
            store,
            SubstitutionMatrix::blosum62(),
            ServiceParams::default(),
        )
        .with_cache(cache);
        //
        let first = service.search_peptide(r#"{"sequence": "AND", "threshold": 50.0}"#);
        assert_eq!(first.status, 200);
        assert_eq!(scans.load(Ordering::SeqCst), 1);
        // identical request : served from cache, byte identical, no rescan
        let second = service.search_peptide(r#"{"sequence": "AND", "threshold": 50.0}"#);
        assert_eq!(second.body, first.body);
        assert_eq!(scans.load(Ordering::SeqCst), 1);
        // key-order permuted request hits the same entry
        let permuted = service.search_peptide(r#"{"threshold": 50.0, "sequence": "AND"}"#);
        assert_eq!(permuted.body, first.body);
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expired_cache_entry_triggers_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let (store, scans) = CountingStore::new(corpus());
        // zero TTL : every entry is stale on the next lookup
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(0)).unwrap();
        let service = SearchService::new(
            store,
            SubstitutionMatrix::blosum62(),
            ServiceParams::default(),
        )
        .with_cache(cache);
        service.search_peptide(r#"{"sequence": "AND"}"#);
        service.search_peptide(r#"{"sequence": "AND"}"#);
        assert_eq!(scans.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_error_replies_are_never_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        let service = SearchService::new(
            MemoryStore::new(corpus()),
            SubstitutionMatrix::blosum62(),
            ServiceParams::default(),
        )
        .with_cache(cache);
        let reply = service.search_peptide(r#"{"sequence": ""}"#);
        assert_eq!(reply.status, 400);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_info() {
        let reply = service().info();
        assert_eq!(reply.status, 200);
        let body: Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body["total_records"], 3);
        assert_eq!(body["unique_organisms"], 3);
    }

    #[test]
    fn test_health() {
        let reply = service().health();
        assert_eq!(reply.status, 200);
        let body: Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], true);
    }

    #[test]
    fn test_aligned_search_without_aligner_fails() {
        let reply =
            service().search_aligned(SearchKind::Peptide, r#"{"sequence": "ANDNYALAA"}"#);
        assert_eq!(reply.status, 502);
        assert!(reply.body.contains("no external aligner configured"));
    }

    #[cfg(unix)]
    #[test]
    fn test_aligned_search_round_trip() {
        // sh stand-in emits one tabular hit for tm2 ($5 is the --out path)
        let config = AlignerConfig::new(
            "sh",
            &["-c", "printf 'tm2\\t97.3\\t4.1e-18\\t48.9\\t9\\n' > \"$5\""],
            "unused.dmnd",
            "DIAMOND",
        );
        let service = SearchService::new(
            MemoryStore::new(corpus()),
            SubstitutionMatrix::blosum62(),
            ServiceParams::default(),
        )
        .with_aligner(config);
        let reply = service.search_aligned(SearchKind::Peptide, r#"{"sequence": "ANDNYALAA"}"#);
        assert_eq!(reply.status, 200);
        let answer: SearchAnswer = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(answer.algorithm, "DIAMOND");
        assert_eq!(answer.total, 1);
        let hit = &answer.results[0];
        assert_eq!(hit.record.identifier, "tm2");
        assert_eq!(hit.similarity, 97.3);
        assert_eq!(hit.e_value, "4.1e-18");
        assert_eq!(hit.bit_score, Some(48.9));
        assert_eq!(hit.alignment_length, Some(9));
    }
}
