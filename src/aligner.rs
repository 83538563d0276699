//! external aligner adapter
//!
//! Some deployments score with a process-based aligner (DIAMOND family flag
//! surface) instead of the in-process comparator. The adapter writes the
//! query to a temporary FASTA file, runs the program under a hard wall clock
//! bound and parses its tabular output back into the shared result shape, so
//! ranking and caching downstream never know which scorer produced a match.
//! Temporary files live in a scoped directory removed on every exit path.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::answer::{round2, ScoredResult};
use crate::error::SearchError;
use crate::records::RecordStore;

/// default wall clock bound on one aligner run, seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// default cap on reported targets
pub const DEFAULT_MAX_TARGETS: usize = 500;

/// how to invoke the external aligner
#[derive(Clone, Debug)]
pub struct AlignerConfig {
    program: PathBuf,
    /// leading arguments before the standard flags (e.g. the `blastp` mode)
    mode_args: Vec<String>,
    database: PathBuf,
    /// label reported as the algorithm of results this aligner produced
    label: String,
    timeout: Duration,
    max_targets: usize,
}

impl AlignerConfig {
    pub fn new<P: Into<PathBuf>>(
        program: P,
        mode_args: &[&str],
        database: P,
        label: &str,
    ) -> Self {
        AlignerConfig {
            program: program.into(),
            mode_args: mode_args.iter().map(|s| s.to_string()).collect(),
            database: database.into(),
            label: label.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_targets: DEFAULT_MAX_TARGETS,
        }
    } // end of new

    /// the peptide variant used in production
    pub fn diamond<P: Into<PathBuf>>(program: P, database: P) -> Self {
        Self::new(program, &["blastp"], database, "DIAMOND")
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn get_label(&self) -> &str {
        &self.label
    }

    pub fn get_database(&self) -> &Path {
        &self.database
    }
} // end of impl AlignerConfig

/// one parsed line of tabular aligner output
#[derive(Clone, Debug)]
pub struct AlignerHit {
    pub subject_id: String,
    pub percent_identity: f64,
    /// kept as the aligner formatted it
    pub e_value: String,
    pub bit_score: f64,
    pub alignment_length: u64,
}

// polls the child until exit or deadline; Ok(None) means the bound elapsed
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
} // end of wait_with_timeout

/// Runs the aligner on one query sequence and parses its hits.
/// The query is written to a scoped temporary directory which is removed
/// whether the run succeeds, fails or times out. On timeout the child is
/// killed and the run is reported failed, never retried.
pub fn run_aligner(
    config: &AlignerConfig,
    query: &str,
    threshold: f64,
) -> Result<Vec<AlignerHit>, SearchError> {
    let workdir = tempfile::tempdir()?;
    let query_path = workdir.path().join("query.fasta");
    fs::write(&query_path, format!(">query\n{}\n", query))?;
    let out_path = workdir.path().join("hits.tsv");
    //
    let mut command = Command::new(&config.program);
    command
        .args(&config.mode_args)
        .arg("--query")
        .arg(&query_path)
        .arg("--db")
        .arg(&config.database)
        .arg("--out")
        .arg(&out_path)
        .args(["--outfmt", "6", "sseqid", "pident", "evalue", "bitscore", "length"])
        .arg("--id")
        .arg(threshold.to_string())
        .arg("--max-target-seqs")
        .arg(config.max_targets.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    log::info!("invoking aligner {}", config.program.display());
    let start_t = Instant::now();
    let mut child = command
        .spawn()
        .map_err(|e| SearchError::Aligner(format!("{}: {}", config.program.display(), e)))?;
    //
    let status = match wait_with_timeout(&mut child, config.timeout)? {
        Some(status) => status,
        None => {
            log::error!(
                "aligner exceeded the {}s bound, killing it",
                config.timeout.as_secs()
            );
            let _ = child.kill();
            let _ = child.wait();
            return Err(SearchError::AlignerTimeout(config.timeout.as_secs()));
        }
    };
    if !status.success() {
        let mut diagnostic = String::new();
        if let Some(mut stderr) = child.stderr.take() {
            let _ = stderr.read_to_string(&mut diagnostic);
        }
        return Err(SearchError::Aligner(diagnostic.trim().to_string()));
    }
    log::info!("aligner finished in {:.2}s", start_t.elapsed().as_secs_f64());
    //
    let output = fs::File::open(&out_path)?;
    Ok(parse_tabular(output, threshold))
} // end of run_aligner

/// Parses tabular output lines
/// `subject_id  percent_identity  e_value  bit_score  alignment_length ...`
/// and drops rows under the identity threshold. A malformed line (wrong
/// field count, non numeric field) is skipped with a warning, it never fails
/// the whole request.
pub fn parse_tabular<R: Read>(reader: R, threshold: f64) -> Vec<AlignerHit> {
    let mut tsv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut hits = Vec::new();
    for (lineno, row) in tsv_reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                log::warn!("skipping unreadable aligner line {}: {}", lineno + 1, e);
                continue;
            }
        };
        if row.len() < 5 {
            log::warn!(
                "skipping aligner line {}: expected at least 5 fields, got {}",
                lineno + 1,
                row.len()
            );
            continue;
        }
        let percent_identity = row[1].parse::<f64>();
        let bit_score = row[3].parse::<f64>();
        let alignment_length = row[4].parse::<u64>();
        let (percent_identity, bit_score, alignment_length) =
            match (percent_identity, bit_score, alignment_length) {
                (Ok(p), Ok(b), Ok(l)) => (p, b, l),
                _ => {
                    log::warn!("skipping aligner line {}: non numeric field", lineno + 1);
                    continue;
                }
            };
        if percent_identity < threshold {
            continue;
        }
        hits.push(AlignerHit {
            subject_id: row[0].to_string(),
            percent_identity,
            e_value: row[2].to_string(),
            bit_score,
            alignment_length,
        });
    }
    hits
} // end of parse_tabular

/// joins surviving hits back to their full records
pub fn hits_to_results<S: RecordStore + ?Sized>(
    store: &S,
    hits: &[AlignerHit],
    label: &str,
) -> Result<Vec<ScoredResult>, SearchError> {
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        match store.record_by_identifier(&hit.subject_id)? {
            Some(record) => results.push(ScoredResult {
                record,
                similarity: round2(hit.percent_identity),
                e_value: hit.e_value.clone(),
                algorithm: Some(label.to_string()),
                bit_score: Some(hit.bit_score),
                alignment_length: Some(hit.alignment_length),
            }),
            None => {
                // aligner database and record store drifted apart
                log::warn!("aligner hit {} has no stored record", hit.subject_id);
            }
        }
    }
    Ok(results)
} // end of hits_to_results
