//! tmRNA records and corpus store access
//!
//! The corpus is bulk loaded once by external tooling and is strictly
//! read-only here. The store exposes the two access paths the scan needs :
//! a cheap projection of (identifier, sequence column) over the whole corpus,
//! and a point lookup of the full record by identifier.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One stored tmRNA entry. `identifier` is unique across the corpus and is
/// the join key between scan-time scoring and full record retrieval.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Record {
    pub identifier: String,
    /// raw tag peptide, may contain placeholder characters `?` / `*`
    pub tag_peptide: String,
    /// raw codon region, may contain alignment gaps `-`
    pub codons: String,
    pub tmrna_sequence: String,
    pub organism_name: Option<String>,
    pub accession: Option<String>,
    pub peptide_length: Option<i64>,
    pub sequence_length: Option<i64>,
}

/// which sequence column a search scans
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchKind {
    Peptide,
    Codon,
}

impl SearchKind {
    /// the corpus column holding the sequence this kind scores
    pub fn sequence_column(&self) -> &'static str {
        match self {
            SearchKind::Peptide => "tag_peptide",
            SearchKind::Codon => "codons",
        }
    }

    /// minimum viable normalized length, enforced on the query and on every
    /// stored candidate
    pub fn min_len(&self) -> usize {
        match self {
            SearchKind::Peptide => 3,
            SearchKind::Codon => 15,
        }
    }

    /// operation name used in cache fingerprints
    pub fn operation(&self) -> &'static str {
        match self {
            SearchKind::Peptide => "search_peptide",
            SearchKind::Codon => "search_codon",
        }
    }

    /// label reported in the reply `algorithm` field for in-process scoring
    pub fn algorithm(&self) -> &'static str {
        match self {
            SearchKind::Peptide => "BLOSUM62",
            SearchKind::Codon => "Simple Nucleotide Alignment",
        }
    }
} // end of impl SearchKind

/// corpus statistics, for the info reply
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_records: usize,
    pub unique_organisms: usize,
}

/// read access to the record corpus
pub trait RecordStore: Send + Sync {
    /// (identifier, raw sequence) for every record, restricted to the one
    /// column the scan needs
    fn projection(&self, kind: SearchKind) -> Result<Vec<(String, String)>, StoreError>;

    /// full record by identifier
    fn record_by_identifier(&self, identifier: &str) -> Result<Option<Record>, StoreError>;

    ///
    fn stats(&self) -> Result<CorpusStats, StoreError>;
} // end of trait RecordStore

//===========================================================

const RECORD_COLUMNS: &str = "identifier, tag_peptide, codons, tmrna_sequence, \
     organism_name, accession, peptide_length, sequence_length";

/// Corpus store backed by the sqlite file produced at ingestion.
/// The connection is opened read-only; a mutex makes it shareable across
/// concurrent requests.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    /// opens the corpus database read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StoreError::Unavailable(format!(
                "database file not found: {}",
                path.display()
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(path, flags)?;
        log::info!("opened corpus store {}", path.display());
        Ok(SqliteStore {
            connection: Mutex::new(connection),
        })
    } // end of open

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<Record> {
        Ok(Record {
            identifier: row.get(0)?,
            tag_peptide: row.get(1)?,
            codons: row.get(2)?,
            tmrna_sequence: row.get(3)?,
            organism_name: row.get(4)?,
            accession: row.get(5)?,
            peptide_length: row.get(6)?,
            sequence_length: row.get(7)?,
        })
    }
} // end of impl SqliteStore

impl RecordStore for SqliteStore {
    fn projection(&self, kind: SearchKind) -> Result<Vec<(String, String)>, StoreError> {
        let connection = self.connection.lock();
        let sql = format!(
            "SELECT identifier, {} FROM tmrna_data",
            kind.sequence_column()
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut projection = Vec::new();
        for row in rows {
            projection.push(row?);
        }
        Ok(projection)
    }

    fn record_by_identifier(&self, identifier: &str) -> Result<Option<Record>, StoreError> {
        let connection = self.connection.lock();
        let sql = format!(
            "SELECT {} FROM tmrna_data WHERE identifier = ?1",
            RECORD_COLUMNS
        );
        let record = connection
            .query_row(&sql, [identifier], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    fn stats(&self) -> Result<CorpusStats, StoreError> {
        let connection = self.connection.lock();
        let total_records: usize =
            connection.query_row("SELECT COUNT(*) FROM tmrna_data", [], |row| row.get(0))?;
        let unique_organisms: usize = connection.query_row(
            "SELECT COUNT(DISTINCT organism_name) FROM tmrna_data WHERE organism_name != ''",
            [],
            |row| row.get(0),
        )?;
        Ok(CorpusStats {
            total_records,
            unique_organisms,
        })
    }
} // end of impl RecordStore for SqliteStore

//===========================================================

/// In-memory corpus, for tests and small fixed datasets.
pub struct MemoryStore {
    records: Vec<Record>,
}

impl MemoryStore {
    pub fn new(records: Vec<Record>) -> Self {
        MemoryStore { records }
    }
}

impl RecordStore for MemoryStore {
    fn projection(&self, kind: SearchKind) -> Result<Vec<(String, String)>, StoreError> {
        let projection = self
            .records
            .iter()
            .map(|r| {
                let seq = match kind {
                    SearchKind::Peptide => r.tag_peptide.clone(),
                    SearchKind::Codon => r.codons.clone(),
                };
                (r.identifier.clone(), seq)
            })
            .collect();
        Ok(projection)
    }

    fn record_by_identifier(&self, identifier: &str) -> Result<Option<Record>, StoreError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.identifier == identifier)
            .cloned())
    }

    fn stats(&self) -> Result<CorpusStats, StoreError> {
        let mut organisms: Vec<&str> = self
            .records
            .iter()
            .filter_map(|r| r.organism_name.as_deref())
            .filter(|o| !o.is_empty())
            .collect();
        organisms.sort_unstable();
        organisms.dedup();
        Ok(CorpusStats {
            total_records: self.records.len(),
            unique_organisms: organisms.len(),
        })
    }
} // end of impl RecordStore for MemoryStore

#[cfg(test)]
pub(crate) fn test_record(identifier: &str, tag_peptide: &str, codons: &str) -> Record {
    Record {
        identifier: identifier.to_string(),
        tag_peptide: tag_peptide.to_string(),
        codons: codons.to_string(),
        tmrna_sequence: "acgt".to_string(),
        organism_name: Some(format!("organism of {}", identifier)),
        accession: Some(format!("ACC_{}", identifier)),
        peptide_length: Some(tag_peptide.len() as i64),
        sequence_length: Some(4),
    }
}
