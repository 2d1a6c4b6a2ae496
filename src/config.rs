//! Pipeline configuration.
//!
//! [`PipelineConfig`] is read from TOML (every field optional) and then
//! overridden from the command line. Directory layout under `data_dir`:
//!
//! ```text
//! <data_dir>/<orig_dir>/*.jsonl                        raw documents
//! <data_dir>/<orig_dir>/entity_db/entity_mappings/     raw index
//! <data_dir>/filter_temp/                              first-stage output (removed)
//! <data_dir>/<subfolder_name>/*.jsonl                  filtered corpus
//! <data_dir>/<subfolder_name>/entity_db/entity_mappings/
//! <data_dir>/<subfolder_name>/stats/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filter::PredicateName;
use crate::parallel::DEFAULT_IN_FLIGHT_PER_WORKER;

/// Index directory inside an input or output root.
pub const ENTITY_DB_SUBDIR: &str = "entity_db/entity_mappings";
/// First-stage scratch directory under `data_dir`.
pub const TEMP_SUBDIR: &str = "filter_temp";
/// Statistics directory inside the output root.
pub const STATS_SUBDIR: &str = "stats";

// =============================================================================
// Configuration
// =============================================================================

/// Options of one filter run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root for inputs and outputs.
    pub data_dir: PathBuf,
    /// Input subdirectory of `data_dir`.
    pub orig_dir: String,
    /// Output subdirectory of `data_dir`.
    pub subfolder_name: String,
    /// Name of the sentence predicate.
    pub sentence_filter: String,
    /// JSON list read by the `entity_ids` / `aliases` predicates.
    pub filter_file: Option<PathBuf>,
    /// JSON list of disambiguation entity ids.
    pub disambig_file: Option<PathBuf>,
    /// Drop mentions of disambiguation entities.
    pub filter_disambig_entities: bool,
    /// Also treat entities titled "... (disambiguation)" as disambiguation entities.
    pub detect_disambig_titles: bool,
    /// Keep sentences whose mentions were all excluded.
    pub keep_unlinked_sentences: bool,
    /// Candidate cap per alias in the rebuilt index.
    pub max_candidates: usize,
    /// Require every kept mention's entity among its alias' candidates.
    pub train_in_candidates: bool,
    /// Keep every raw entity title after pruning.
    pub retain_all_entities: bool,
    /// JSON list of protected entity ids.
    pub benchmark_qids: Option<PathBuf>,
    /// Worker pool size.
    pub processes: usize,
    /// Files in flight per worker.
    pub in_flight_per_worker: usize,
    /// Show progress bars.
    pub progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/wiki_dump"),
            orig_dir: "orig".to_string(),
            subfolder_name: "filtered_data".to_string(),
            sentence_filter: PredicateName::KeepAll.as_str().to_string(),
            filter_file: None,
            disambig_file: None,
            filter_disambig_entities: true,
            detect_disambig_titles: false,
            keep_unlinked_sentences: false,
            max_candidates: 30,
            train_in_candidates: true,
            retain_all_entities: false,
            benchmark_qids: None,
            processes: 20,
            in_flight_per_worker: DEFAULT_IN_FLIGHT_PER_WORKER,
            progress: false,
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Check option values.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a zero cap or pool size, an unknown predicate,
    /// a predicate without its filter file, or an empty directory name.
    pub fn validate(&self) -> Result<()> {
        if self.max_candidates == 0 {
            return Err(Error::config("max_candidates must be at least 1"));
        }
        if self.processes == 0 {
            return Err(Error::config("processes must be at least 1"));
        }
        if self.in_flight_per_worker == 0 {
            return Err(Error::config("in_flight_per_worker must be at least 1"));
        }
        let predicate = self.predicate()?;
        if predicate.needs_filter_file() && self.filter_file.is_none() {
            return Err(Error::config(format!(
                "sentence_filter {} needs filter_file",
                predicate
            )));
        }
        if self.orig_dir.trim().is_empty() || self.subfolder_name.trim().is_empty() {
            return Err(Error::config("orig_dir and subfolder_name must not be empty"));
        }
        if self.subfolder_name == TEMP_SUBDIR || self.subfolder_name == self.orig_dir {
            return Err(Error::config(format!(
                "subfolder_name {:?} would overwrite another pipeline directory",
                self.subfolder_name
            )));
        }
        Ok(())
    }

    /// The configured sentence predicate.
    pub fn predicate(&self) -> Result<PredicateName> {
        self.sentence_filter.parse().map_err(Error::config)
    }

    /// Raw document directory.
    #[must_use]
    pub fn input_dir(&self) -> PathBuf {
        self.data_dir.join(&self.orig_dir)
    }

    /// Raw index directory.
    #[must_use]
    pub fn input_index_dir(&self) -> PathBuf {
        self.input_dir().join(ENTITY_DB_SUBDIR)
    }

    /// First-stage scratch directory.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join(TEMP_SUBDIR)
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join(&self.subfolder_name)
    }

    /// Rebuilt index directory.
    #[must_use]
    pub fn output_index_dir(&self) -> PathBuf {
        self.output_dir().join(ENTITY_DB_SUBDIR)
    }

    /// Statistics directory.
    #[must_use]
    pub fn stats_dir(&self) -> PathBuf {
        self.output_dir().join(STATS_SUBDIR)
    }

    /// Where the effective configuration is saved.
    #[must_use]
    pub fn saved_config_path(&self) -> PathBuf {
        self.output_dir()
            .join(format!("{}_filter_data_config.json", self.subfolder_name))
    }

    /// Write the effective configuration as JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
