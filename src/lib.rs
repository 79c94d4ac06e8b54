// src/lib.rs
pub use config::{CONFIG_ENV_VAR, Config, GlobalConfig, PhaseConfig, ProfilerMode};
pub use error::BenchyError;
pub use iter::{KnownLen, Producer, Step, TimedIter, TrialSettings};
pub use loader::{BenchmarkLoader, Loader};
pub use phase::{Phase, TrialLabel};
pub use rate::{RateTracker, mean_std};
pub use report::{PhaseResults, ResultsAggregate};
pub use runtime::Runtime;
pub use session::{Completion, Epoch, Session};

mod config;
mod error;
mod iter;
mod loader;
pub mod logging;
mod phase;
mod rate;
pub mod report;
pub mod runtime;
mod session;

#[cfg(test)]
mod tests;
