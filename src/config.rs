//! Benchmark configuration.
//!
//! Defaults cover every setting. An optional YAML file, named by the
//! `BENCHY_CONFIG_FILE` environment variable, may replace any of the four
//! top-level sections (`global`, `IO`, `synthetic`, `full`). The merge is
//! shallow: a section present in the file replaces the default section as a
//! whole, so it must spell out every key of that section.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BenchyError;
use crate::phase::Phase;

/// Environment variable naming the optional override file.
pub const CONFIG_ENV_VAR: &str = "BENCHY_CONFIG_FILE";

/// Which ranks start the external profiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfilerMode {
    /// Rank 0 only.
    #[default]
    Single,
    /// Every rank.
    All,
    /// Never started.
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Interim throughput is logged every `report_freq` steps; 0 disables it.
    pub report_freq: usize,
    pub exit_after_tests: bool,
    pub profiler_mode: ProfilerMode,
    pub output_filename: String,
    pub output_dir: PathBuf,
    pub use_distributed_barrier: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            report_freq: 10,
            exit_after_tests: true,
            profiler_mode: ProfilerMode::Single,
            output_filename: "benchy_result.json".to_string(),
            output_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            use_distributed_barrier: false,
        }
    }
}

impl GlobalConfig {
    /// Full path of the JSON report.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_filename)
    }
}

/// Trial settings for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub run_benchmark: bool,
    /// Batches per trial, capped by the loader length when it is known.
    pub nbatches: usize,
    pub ntrials: usize,
    pub nwarmup: usize,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            run_benchmark: true,
            nbatches: 50,
            ntrials: 3,
            nwarmup: 1,
        }
    }
}

impl PhaseConfig {
    /// Trials the phase runs in total, warmups included.
    pub fn total_trials(&self) -> usize {
        self.ntrials + self.nwarmup
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub global: GlobalConfig,
    #[serde(rename = "IO")]
    pub io: PhaseConfig,
    pub synthetic: PhaseConfig,
    pub full: PhaseConfig,
}

/// Top-level sections a user file may override.
#[derive(Debug, Deserialize)]
struct Overrides {
    global: Option<GlobalConfig>,
    #[serde(rename = "IO")]
    io: Option<PhaseConfig>,
    synthetic: Option<PhaseConfig>,
    full: Option<PhaseConfig>,
}

impl Config {
    pub fn phase(&self, phase: Phase) -> &PhaseConfig {
        match phase {
            Phase::Io => &self.io,
            Phase::Synthetic => &self.synthetic,
            Phase::Full => &self.full,
        }
    }

    /// Defaults with the sections found in `text` swapped in.
    pub fn from_yaml_str(text: &str) -> Result<Self, BenchyError> {
        let overrides: Overrides = serde_yaml::from_str(text)?;
        let mut config = Config::default();
        if let Some(global) = overrides.global {
            config.global = global;
        }
        if let Some(io) = overrides.io {
            config.io = io;
        }
        if let Some(synthetic) = overrides.synthetic {
            config.synthetic = synthetic;
        }
        if let Some(full) = overrides.full {
            config.full = full;
        }
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, BenchyError> {
        let text = fs::read_to_string(path).map_err(|e| BenchyError::ConfigRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&text)
    }

    /// Reads the override file from `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, BenchyError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    /// Path named by `BENCHY_CONFIG_FILE`, if set and non-empty.
    pub fn env_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }
}
