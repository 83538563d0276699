//! nucleotide (codon region) scoring

pub mod scoring;
