//! tmsearch : similarity search over a fixed corpus of tmRNA records
//!
//! A query is a raw tag peptide or codon sequence plus a similarity
//! threshold. The service normalizes the query, scans the whole stored
//! corpus with the matching scorer (BLOSUM62 positional score for peptides,
//! positional identity for codons), ranks the matches and caps them at 500,
//! and memoizes successful replies under a content fingerprint of the
//! request. An external process-based aligner can replace the in-process
//! scorer; its tabular hits are folded into the same reply shape.
//!
//! The http front door is deliberately out of this crate : it forwards raw
//! JSON bodies to [service::SearchService] and ships back the
//! [service::ServiceReply] it gets.

pub mod aa;
pub mod dna;

pub mod aligner;
pub mod answer;
pub mod cache;
pub mod error;
pub mod records;
pub mod scan;
pub mod service;
pub mod utils;
