//! tag peptide normalization and similarity scoring
//!
//! The scorer is a positional ungapped comparison : no insertion/deletion and
//! no gap penalty. Tag peptides are short enough that a substitution score
//! summed position by position is a sufficient similarity proxy.

use super::matrix::SubstitutionMatrix;

/// Strips annotation characters (`?`, `*`) and whitespace from a raw tag
/// peptide and uppercases it. Empty input gives empty output.
pub fn normalize_peptide(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '?' && *c != '*')
        .map(|c| c.to_ascii_uppercase())
        .collect()
} // end of normalize_peptide

/// Similarity percentage between two normalized peptides.
///
/// Both sequences are compared position by position over the overlap
/// `[0, min_len)`. The attainable maximum is the query's self score over the
/// same positions, so the function is NOT symmetric in its arguments :
/// `peptide_similarity(m, q, s)` and `peptide_similarity(m, s, q)` may differ.
/// A length penalty `min_len / max_len` downweights truncated overlaps.
/// Result is in [0, 100].
pub fn peptide_similarity(matrix: &SubstitutionMatrix, query: &str, subject: &str) -> f64 {
    let query: Vec<char> = query.chars().collect();
    let subject: Vec<char> = subject.chars().collect();
    let min_len = query.len().min(subject.len());
    let max_len = query.len().max(subject.len());
    if min_len == 0 {
        return 0.;
    }
    //
    let mut score = 0i64;
    let mut max_possible = 0i64;
    for i in 0..min_len {
        score += matrix.score(query[i], subject[i]) as i64;
        max_possible += matrix.score(query[i], query[i]) as i64;
    }
    let length_penalty = min_len as f64 / max_len as f64;
    if max_possible > 0 {
        let similarity = (score as f64 / max_possible as f64) * 100. * length_penalty;
        similarity.max(0.)
    } else {
        0.
    }
} // end of peptide_similarity
