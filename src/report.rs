//! Results aggregate, summary lines and the JSON report.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BenchyError;
use crate::phase::Phase;
use crate::rate::mean_std;

/// Measured trials of one phase, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseResults {
    /// Per-step rates, one inner list per trial.
    pub rates: Vec<Vec<f64>>,
    /// Average rate of each trial.
    pub avg_throughput: Vec<f64>,
}

impl PhaseResults {
    pub fn trials(&self) -> usize {
        self.avg_throughput.len()
    }
}

/// Everything the harness measured in one session.
///
/// Serializes as a flat object: one key per phase that ran (`IO`,
/// `SYNTHETIC`, `FULL`) next to `nranks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsAggregate {
    pub nranks: usize,
    #[serde(flatten)]
    pub phases: BTreeMap<Phase, PhaseResults>,
}

impl ResultsAggregate {
    pub fn new(nranks: usize) -> Self {
        Self {
            nranks,
            phases: BTreeMap::new(),
        }
    }

    /// Make sure `phase` has an entry, even if no trial completes.
    pub fn ensure_phase(&mut self, phase: Phase) -> &mut PhaseResults {
        self.phases.entry(phase).or_default()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseResults> {
        self.phases.get(&phase)
    }

    /// Append one completed trial.
    pub fn record_trial(&mut self, phase: Phase, rates: Vec<f64>, average: f64) {
        let entry = self.ensure_phase(phase);
        entry.rates.push(rates);
        entry.avg_throughput.push(average);
    }
}

/// One summary line per phase present: mean and population std of the
/// trial averages.
pub fn summary_lines(results: &ResultsAggregate) -> Vec<String> {
    results
        .phases
        .iter()
        .map(|(phase, entry)| {
            let (mean, std) = mean_std(&entry.avg_throughput).unwrap_or((f64::NAN, f64::NAN));
            format!("BENCHY::SUMMARY::{phase} average trial throughput: {mean:.3} +/- {std:.3}")
        })
        .collect()
}

pub fn log_summary(results: &ResultsAggregate) {
    for line in summary_lines(results) {
        info!("{line}");
    }
}

/// Write `results` as JSON to `path`, creating the parent directory and
/// replacing any existing file.
pub fn write_report(path: &Path, results: &ResultsAggregate) -> Result<(), BenchyError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string(results)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn read_report(path: &Path) -> Result<ResultsAggregate, BenchyError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
