//! amino acid (tag peptide) scoring

pub mod matrix;
pub mod scoring;
