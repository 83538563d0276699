//! Module tmsearch
//! command line front door of the similarity search service
//!
//! tmsearchbin --db tmrna.db peptide --seq ANDNYALAA --threshold 50
//! tmsearchbin --db tmrna.db codon --seq gctaaagataattatgct
//! tmsearchbin --db tmrna.db info
//! tmsearchbin --db tmrna.db health
//!
//! - --db is the sqlite corpus produced at ingestion
//! - --cache enables reply memoization in the given directory
//! - --params reloads service parameters dumped next to the corpus
//! - --aligner/--aligner-db switch the searches to the external aligner
//!
//! The reply body is printed to stdout exactly as an http front door would
//! forward it; a non success status exits non zero.

use clap::{value_parser, Arg, Command};

use std::path::Path;
use std::time::Duration;

// for logging (debug mostly, switched at compile time in cargo.toml)
use env_logger::Builder;

// our crate
use tmsearch::aa::matrix::SubstitutionMatrix;
use tmsearch::aligner::AlignerConfig;
use tmsearch::cache::ResponseCache;
use tmsearch::records::{SearchKind, SqliteStore};
use tmsearch::service::{SearchService, ServiceReply};
use tmsearch::utils::parameters::ServiceParams;

// install a logger facility
pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    println!("\n ************** initializing logger *****************\n");
    1
}

fn search_args() -> [Arg; 2] {
    [
        Arg::new("sequence")
            .short('s')
            .long("seq")
            .help("query sequence, raw (annotation characters are stripped)")
            .required(true)
            .value_parser(value_parser!(String)),
        Arg::new("threshold")
            .short('t')
            .long("threshold")
            .help("minimum similarity percentage, defaults to the service parameter")
            .required(false)
            .value_parser(value_parser!(f64)),
    ]
}

fn request_body(matches: &clap::ArgMatches) -> String {
    let sequence = matches.get_one::<String>("sequence").unwrap();
    match matches.get_one::<f64>("threshold") {
        Some(threshold) => {
            serde_json::json!({"sequence": sequence, "threshold": threshold}).to_string()
        }
        None => serde_json::json!({ "sequence": sequence }).to_string(),
    }
}

fn main() -> Result<(), anyhow::Error> {
    init_log();
    let start_t = chrono::Local::now();
    log::info!("tmsearch begins at time:{:#?}", start_t);

    let matches = Command::new("tmsearch")
        .version("0.1.0")
        .about("tmRNA tag peptide and codon similarity search over a sqlite corpus")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(
            Arg::new("database")
                .short('b')
                .long("db")
                .help("path of the sqlite corpus database")
                .required(true)
                .value_parser(value_parser!(String)),
        )
        .arg(
            Arg::new("cache_dir")
                .long("cache")
                .help("directory for reply memoization, disabled when absent")
                .required(false)
                .value_parser(value_parser!(String)),
        )
        .arg(
            Arg::new("params_dir")
                .long("params")
                .help("directory containing a parameters.json dump to reload")
                .required(false)
                .value_parser(value_parser!(String)),
        )
        .arg(
            Arg::new("aligner")
                .long("aligner")
                .help("external aligner program; searches go through it instead of the in-process scorer")
                .required(false)
                .value_parser(value_parser!(String)),
        )
        .arg(
            Arg::new("aligner_db")
                .long("aligner-db")
                .help("database handle passed to the external aligner")
                .required(false)
                .value_parser(value_parser!(String)),
        )
        .subcommand(
            Command::new("peptide")
                .about("tag peptide similarity search (BLOSUM62 positional score)")
                .args(search_args()),
        )
        .subcommand(
            Command::new("codon")
                .about("codon similarity search (positional nucleotide identity)")
                .args(search_args()),
        )
        .subcommand(Command::new("info").about("corpus statistics"))
        .subcommand(Command::new("health").about("service liveness"))
        .get_matches();

    let db_path = matches.get_one::<String>("database").unwrap();
    let store = SqliteStore::open(db_path)?;

    let params = match matches.get_one::<String>("params_dir") {
        Some(dir) => ServiceParams::reload_json(Path::new(dir))
            .map_err(anyhow::Error::msg)?,
        None => ServiceParams::default(),
    };

    let mut service = SearchService::new(store, SubstitutionMatrix::blosum62(), params);
    if let Some(cache_dir) = matches.get_one::<String>("cache_dir") {
        let ttl = Duration::from_secs(params.get_cache_ttl_secs());
        service = service.with_cache(ResponseCache::new(cache_dir, ttl)?);
    }
    let aligned = matches.contains_id("aligner");
    if aligned {
        let program = matches.get_one::<String>("aligner").unwrap().clone();
        let aligner_db = matches
            .get_one::<String>("aligner_db")
            .ok_or_else(|| anyhow::anyhow!("--aligner-db is mandatory with --aligner"))?
            .clone();
        service = service.with_aligner(AlignerConfig::diamond(program, aligner_db));
    }

    let reply: ServiceReply = match matches.subcommand() {
        Some(("peptide", sub)) => {
            let body = request_body(sub);
            if aligned {
                service.search_aligned(SearchKind::Peptide, &body)
            } else {
                service.search_peptide(&body)
            }
        }
        Some(("codon", sub)) => {
            let body = request_body(sub);
            if aligned {
                service.search_aligned(SearchKind::Codon, &body)
            } else {
                service.search_codon(&body)
            }
        }
        Some(("info", _)) => service.info(),
        Some(("health", _)) => service.health(),
        _ => unreachable!("subcommand_required"),
    };

    println!("{}", reply.body);
    let end_t = chrono::Local::now();
    log::info!("tmsearch ends at time:{:#?}", end_t);
    if !reply.is_success() {
        log::error!("request failed with status {}", reply.status);
        std::process::exit(1);
    }
    Ok(())
} // end of main
