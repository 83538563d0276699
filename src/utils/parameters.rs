//! structures related to service parameters

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::to_writer;

use crate::cache::DEFAULT_TTL_SECS;
use crate::aligner::DEFAULT_TIMEOUT_SECS;

/// Tunables of the search service.
/// The same values must be used by every front door over one corpus, so the
/// structure is json serialized next to the database.
#[derive(Copy, Clone, Serialize, Deserialize)]
pub struct ServiceParams {
    /// threshold applied when the request carries none
    default_threshold: f64,
    /// result cap after ranking
    max_results: usize,
    /// cache entry lifetime in seconds
    cache_ttl_secs: u64,
    /// wall clock bound on one external aligner run, seconds
    aligner_timeout_secs: u64,
}

impl Default for ServiceParams {
    fn default() -> Self {
        ServiceParams {
            default_threshold: 50.,
            max_results: 500,
            cache_ttl_secs: DEFAULT_TTL_SECS,
            aligner_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
} // end of default for ServiceParams

impl ServiceParams {
    pub fn new(
        default_threshold: f64,
        max_results: usize,
        cache_ttl_secs: u64,
        aligner_timeout_secs: u64,
    ) -> Self {
        ServiceParams {
            default_threshold,
            max_results,
            cache_ttl_secs,
            aligner_timeout_secs,
        }
    }

    pub fn get_default_threshold(&self) -> f64 {
        self.default_threshold
    }

    pub fn get_max_results(&self) -> usize {
        self.max_results
    }

    pub fn get_cache_ttl_secs(&self) -> u64 {
        self.cache_ttl_secs
    }

    pub fn get_aligner_timeout_secs(&self) -> u64 {
        self.aligner_timeout_secs
    }

    pub fn dump_json(&self, dirpath: &Path) -> Result<(), String> {
        //
        let filepath = dirpath.join("parameters.json");
        //
        log::info!("dumping ServiceParams in json file : {:?}", filepath);
        //
        let fileres = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&filepath);
        if fileres.is_err() {
            log::error!(
                "ServiceParams dump : dump could not open file {:?}",
                filepath.as_os_str()
            );
            return Err("ServiceParams dump failed".to_string());
        }
        //
        let mut writer = BufWriter::new(fileres.unwrap());
        to_writer(&mut writer, &self).map_err(|e| e.to_string())?;
        //
        Ok(())
    } // end of dump_json

    /// reload from a json dump. Used to ensure coherence between front doors
    pub fn reload_json(dirpath: &Path) -> Result<Self, String> {
        //
        let filepath = dirpath.join("parameters.json");
        let fileres = OpenOptions::new().read(true).open(&filepath);
        if fileres.is_err() {
            log::error!(
                "ServiceParams reload_json : reload could not open file {:?}",
                filepath.as_os_str()
            );
            return Err("ServiceParams reload_json could not open file".to_string());
        }
        //
        let loadfile = fileres.unwrap();
        let reader = BufReader::new(loadfile);
        let params: Self = serde_json::from_reader(reader).map_err(|e| e.to_string())?;
        //
        log::info!(
            "ServiceParams reload, default threshold : {}, max results : {}",
            params.default_threshold,
            params.max_results
        );
        //
        Ok(params)
    } // end of reload_json
} // end of impl ServiceParams

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ServiceParams::default();
        assert_eq!(params.get_default_threshold(), 50.);
        assert_eq!(params.get_max_results(), 500);
        assert_eq!(params.get_cache_ttl_secs(), 3600);
        assert_eq!(params.get_aligner_timeout_secs(), 60);
    }

    #[test]
    fn test_dump_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let params = ServiceParams::new(60., 100, 120, 30);
        params.dump_json(dir.path()).unwrap();
        let reloaded = ServiceParams::reload_json(dir.path()).unwrap();
        assert_eq!(reloaded.get_default_threshold(), 60.);
        assert_eq!(reloaded.get_max_results(), 100);
        assert_eq!(reloaded.get_cache_ttl_secs(), 120);
        assert_eq!(reloaded.get_aligner_timeout_secs(), 30);
    }
}
