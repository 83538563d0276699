//! codon region normalization and similarity scoring

/// Strips alignment gaps (`-`) and whitespace from a raw codon sequence and
/// lowercases it.
pub fn normalize_codon(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
} // end of normalize_codon

/// Positional identity percentage between two normalized codon sequences,
/// counted over the overlap `[0, min_len)`.
/// Unlike the peptide scorer there is no length penalty, so for equal length
/// inputs the function is symmetric.
pub fn nucleotide_similarity(query: &str, subject: &str) -> f64 {
    let query = query.as_bytes();
    let subject = subject.as_bytes();
    let min_len = query.len().min(subject.len());
    if min_len == 0 {
        return 0.;
    }
    let matches = (0..min_len)
        .filter(|&i| query[i].eq_ignore_ascii_case(&subject[i]))
        .count();
    (matches as f64 / min_len as f64) * 100.
} // end of nucleotide_similarity

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_codon() {
        assert_eq!(normalize_codon("GCT-AAA \ngat"), "gctaaagat");
        assert_eq!(normalize_codon("---"), "");
    }

    #[test]
    fn test_identity() {
        let q = "aaaaaaaaaaaaaaa"; // 15 a's
        assert_eq!(nucleotide_similarity(q, q), 100.);
    }

    #[test]
    fn test_three_mismatches_in_fifteen() {
        let q = "aaaaaaaaaaaaaaa";
        let s = "aaataaataaataaa"; // differs at positions 3, 7, 11
        assert_eq!(nucleotide_similarity(q, s), 80.);
    }

    #[test]
    fn test_symmetric_for_equal_length() {
        let q = "gctaaagat";
        let s = "gcaaaagac";
        assert_eq!(nucleotide_similarity(q, s), nucleotide_similarity(s, q));
    }

    #[test]
    fn test_overlap_only() {
        // 5 matching positions over a 5 long overlap, trailing tail ignored
        assert_eq!(nucleotide_similarity("aaaaa", "aaaaattttt"), 100.);
    }

    #[test]
    fn test_empty() {
        assert_eq!(nucleotide_similarity("", "acgt"), 0.);
        assert_eq!(nucleotide_similarity("acgt", ""), 0.);
    }
}
