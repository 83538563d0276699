//! reply shapes of the search service
//!
//! A scored result is the full stored record augmented with scoring metadata;
//! a search answer is the complete reply body the front door forwards as is.

use serde::{Deserialize, Serialize};

use crate::records::Record;

/// rounds to 2 decimals, the precision of every reported percentage and time
pub fn round2(x: f64) -> f64 {
    (x * 100.).round() / 100.
}

/// A record that matched a query, with its scoring metadata attached.
/// `bit_score` and `alignment_length` are only present when an external
/// aligner produced the match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredResult {
    #[serde(flatten)]
    pub record: Record,
    /// percentage in [0,100], rounded to 2 decimals
    pub similarity: f64,
    /// "N/A" for in-process scoring, the aligner's formatted value otherwise
    pub e_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment_length: Option<u64>,
}

impl ScoredResult {
    /// result of the in-process scorers
    pub fn scored(record: Record, similarity: f64, algorithm: Option<&str>) -> Self {
        ScoredResult {
            record,
            similarity: round2(similarity),
            e_value: "N/A".to_string(),
            algorithm: algorithm.map(|s| s.to_string()),
            bit_score: None,
            alignment_length: None,
        }
    }
} // end of impl ScoredResult

/// the successful reply body of a similarity search
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchAnswer {
    pub results: Vec<ScoredResult>,
    /// number of results after truncation
    pub total: usize,
    /// wall clock seconds, 2 decimals
    pub search_time: f64,
    /// normalized query length
    pub query_length: usize,
    pub threshold: f64,
    pub algorithm: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::test_record;

    #[test]
    fn test_round2() {
        assert_eq!(round2(33.333333), 33.33);
        assert_eq!(round2(66.666666), 66.67);
        assert_eq!(round2(100.0), 100.0);
    }

    #[test]
    fn test_scored_result_serialization() {
        let result =
            ScoredResult::scored(test_record("tm1", "AND", "gctaaagat"), 100.0, Some("BLOSUM62"));
        let json = serde_json::to_value(&result).unwrap();
        // record fields are flattened next to the scoring metadata
        assert_eq!(json["identifier"], "tm1");
        assert_eq!(json["similarity"], 100.0);
        assert_eq!(json["e_value"], "N/A");
        assert_eq!(json["algorithm"], "BLOSUM62");
        // aligner-only fields stay absent for in-process results
        assert!(json.get("bit_score").is_none());
        assert!(json.get("alignment_length").is_none());
    }
}
