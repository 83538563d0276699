//! linear corpus scan, ranking and truncation
//!
//! The scan reads the whole projection into memory and scores every candidate
//! against the query. This is O(corpus size * sequence length) with no
//! indexing; the corpus is bounded and static so the brute force pass is the
//! intended behavior, not an oversight. Scoring of candidates is parallelized,
//! the result is ranked deterministically afterwards.

use rayon::prelude::*;

use crate::aa::matrix::SubstitutionMatrix;
use crate::aa::scoring::{normalize_peptide, peptide_similarity};
use crate::answer::ScoredResult;
use crate::dna::scoring::{normalize_codon, nucleotide_similarity};
use crate::error::SearchError;
use crate::records::{RecordStore, SearchKind};

/// normalization of a raw sequence for the given search kind
pub fn normalize_query(kind: SearchKind, raw: &str) -> String {
    match kind {
        SearchKind::Peptide => normalize_peptide(raw),
        SearchKind::Codon => normalize_codon(raw),
    }
}

/// Scores the whole corpus against a normalized query and returns every
/// record with `similarity >= threshold`, unranked.
/// Stored sequences are normalized with the same normalizer as the query and
/// candidates below the minimum viable length for the kind are skipped.
pub fn scan_corpus<S: RecordStore + ?Sized>(
    store: &S,
    matrix: &SubstitutionMatrix,
    kind: SearchKind,
    query: &str,
    threshold: f64,
) -> Result<Vec<ScoredResult>, SearchError> {
    let projection = store.projection(kind)?;
    log::info!(
        "scanning {} candidate sequences, threshold {}",
        projection.len(),
        threshold
    );
    //
    let scored: Vec<(String, f64)> = projection
        .par_iter()
        .filter_map(|(identifier, raw_seq)| {
            let candidate = normalize_query(kind, raw_seq);
            if candidate.len() < kind.min_len() {
                return None;
            }
            let similarity = match kind {
                SearchKind::Peptide => peptide_similarity(matrix, query, &candidate),
                SearchKind::Codon => nucleotide_similarity(query, &candidate),
            };
            if similarity >= threshold {
                Some((identifier.clone(), similarity))
            } else {
                None
            }
        })
        .collect();
    log::debug!("{} candidates above threshold", scored.len());
    //
    // matches are few compared to the corpus, fetch their full records now
    let per_result_algorithm = match kind {
        SearchKind::Peptide => Some(kind.algorithm()),
        SearchKind::Codon => None,
    };
    let mut results = Vec::with_capacity(scored.len());
    for (identifier, similarity) in scored {
        if let Some(record) = store.record_by_identifier(&identifier)? {
            results.push(ScoredResult::scored(record, similarity, per_result_algorithm));
        }
    }
    Ok(results)
} // end of scan_corpus

/// Sorts by similarity descending and truncates to `max_results`.
/// Equal similarities tie-break on identifier ascending so the order is
/// deterministic across runs.
pub fn rank_results(results: &mut Vec<ScoredResult>, max_results: usize) {
    results.sort_unstable_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.identifier.cmp(&b.record.identifier))
    });
    results.truncate(max_results);
} // end of rank_results
