//! Per-process benchmark state and the phase schedule.
//!
//! A [`Session`] owns everything that outlives a single trial: the resolved
//! configuration, this participant's rank, the trial counters and the results
//! aggregate. It drives the phases in a fixed order:
//!
//! 1. IO, eagerly, through [`Session::run_io_benchmark`];
//! 2. synthetic, one trial per [`Session::next_trial`] call, cached mode;
//! 3. full, one trial per call, live batches.
//!
//! Once both synthetic and full are used up, `next_trial` hands the producer
//! back untouched for the rest of the session.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::{Config, ProfilerMode};
use crate::error::BenchyError;
use crate::iter::{Producer, TimedIter, TrialSettings};
use crate::phase::{Phase, TrialLabel};
use crate::report::{self, ResultsAggregate};
use crate::runtime::Runtime;

/// One epoch as handed to the host loop.
pub enum Epoch<'a, P: Producer> {
    /// A benchmark trial wrapping the producer.
    Timed(TimedIter<'a, P>),
    /// Nothing left to benchmark; the producer as-is.
    Plain(P),
}

impl<P> Epoch<'_, P>
where
    P: Producer,
{
    pub fn is_timed(&self) -> bool {
        matches!(self, Epoch::Timed(_))
    }
}

impl<P> Iterator for Epoch<'_, P>
where
    P: Producer,
    P::Item: Clone,
{
    type Item = Result<P::Item, BenchyError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Epoch::Timed(trial) => trial.next(),
            Epoch::Plain(source) => source.fetch().map(Ok),
        }
    }
}

/// What [`Session::finalize`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Where the report was written; `None` on ranks other than 0.
    pub report: Option<PathBuf>,
    /// The configuration asks for the process to exit now.
    pub exit_requested: bool,
}

pub struct Session {
    rank: usize,
    world_size: usize,
    config: Config,
    runtime: Runtime,
    synth_count: usize,
    full_count: usize,
    results: ResultsAggregate,
    finalized: bool,
}

impl Session {
    /// Resolve the topology and start the profiler as configured.
    pub fn new(config: Config, runtime: Runtime) -> Self {
        let (rank, world_size) = runtime.topology();
        start_profiler(config.global.profiler_mode, rank, &runtime);
        debug!(event = "Session", phase = "Created", rank, world_size);
        Self {
            rank,
            world_size,
            config,
            runtime,
            synth_count: 0,
            full_count: 0,
            results: ResultsAggregate::new(world_size),
            finalized: false,
        }
    }

    /// Like [`Session::new`], with the configuration taken from
    /// `BENCHY_CONFIG_FILE` when it is set.
    pub fn from_env(runtime: Runtime) -> Result<Self, BenchyError> {
        let (rank, _) = runtime.topology();
        let path = Config::env_path();
        if rank == 0 {
            match &path {
                Some(path) => info!(
                    "BENCHY::INFO::Message: Using benchy configuration file {}.",
                    path.display()
                ),
                None => info!("BENCHY::INFO::Message: Using default benchy configuration."),
            }
        }
        let config = Config::load(path.as_deref())?;
        Ok(Self::new(config, runtime))
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn results(&self) -> &ResultsAggregate {
        &self.results
    }

    /// Synthetic trials handed out so far, warmups included.
    pub fn synthetic_trials_started(&self) -> usize {
        self.synth_count
    }

    /// Full trials handed out so far, warmups included.
    pub fn full_trials_started(&self) -> usize {
        self.full_count
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn settings(&self, phase: Phase, batch_size: usize) -> TrialSettings {
        let global = &self.config.global;
        TrialSettings {
            batch_size,
            report_freq: global.report_freq,
            nbatches: self.config.phase(phase).nbatches,
            cached: phase.is_cached(),
            distributed_barrier: global.use_distributed_barrier,
            rank: self.rank,
            world_size: self.world_size,
        }
    }

    /// Run every IO trial back to back, each on a fresh producer.
    pub fn run_io_benchmark<P, F>(&mut self, batch_size: usize, mut factory: F) -> Result<(), BenchyError>
    where
        P: Producer,
        P::Item: Clone,
        F: FnMut() -> P,
    {
        let io = self.config.io;
        if !io.run_benchmark {
            return Ok(());
        }
        for ordinal in 0..io.total_trials() {
            let label = TrialLabel::from_ordinal(Phase::Io, ordinal, io.nwarmup);
            let settings = self.settings(Phase::Io, batch_size);
            let mut trial = TimedIter::new(
                factory(),
                label,
                settings,
                &mut self.results,
                &self.runtime,
            );
            trial.drain()?;
        }
        Ok(())
    }

    /// The phase and ordinal of the next synthetic or full trial, if any.
    fn next_scheduled(&self) -> Option<(Phase, usize)> {
        [
            (Phase::Synthetic, self.synth_count),
            (Phase::Full, self.full_count),
        ]
        .into_iter()
        .find(|(phase, started)| {
            let phase_config = self.config.phase(*phase);
            phase_config.run_benchmark && *started < phase_config.total_trials()
        })
    }

    pub fn has_pending_trial(&self) -> bool {
        self.next_scheduled().is_some()
    }

    /// Wrap `source` in the next synthetic or full trial.
    ///
    /// Returns [`Epoch::Plain`] with `source` unchanged once both phases have
    /// run all their trials.
    pub fn next_trial<P>(&mut self, batch_size: usize, source: P) -> Epoch<'_, P>
    where
        P: Producer,
        P::Item: Clone,
    {
        let Some((phase, ordinal)) = self.next_scheduled() else {
            return Epoch::Plain(source);
        };
        if phase == Phase::Synthetic {
            self.synth_count += 1;
        } else {
            self.full_count += 1;
        }
        let label = TrialLabel::from_ordinal(phase, ordinal, self.config.phase(phase).nwarmup);
        let settings = self.settings(phase, batch_size);
        Epoch::Timed(TimedIter::new(
            source,
            label,
            settings,
            &mut self.results,
            &self.runtime,
        ))
    }

    /// Log the summary and write the JSON report (rank 0 only).
    ///
    /// The caller decides what to do with [`Completion::exit_requested`].
    pub fn finalize(&mut self) -> Result<Completion, BenchyError> {
        let mut written = None;
        if self.rank == 0 {
            report::log_summary(&self.results);
            let path = self.config.global.output_path();
            info!(
                "BENCHY::INFO::Message: Writing JSON output to {}.",
                path.display()
            );
            report::write_report(&path, &self.results)?;
            written = Some(path);
        }
        self.finalized = true;

        let exit_requested = self.config.global.exit_after_tests;
        if exit_requested && self.rank == 0 {
            info!("BENCHY::INFO::Message: Tests completed.... exiting.");
        }
        Ok(Completion {
            report: written,
            exit_requested,
        })
    }
}

fn start_profiler(mode: ProfilerMode, rank: usize, runtime: &Runtime) {
    match mode {
        ProfilerMode::Single => {
            if rank == 0 {
                info!(
                    "BENCHY::INFO::Message: Profiling mode single. Starting profiler on rank 0 only."
                );
                runtime.profiler.start();
            }
        }
        ProfilerMode::All => {
            if rank == 0 {
                info!("BENCHY::INFO::Message: Profiling mode all. Starting profiler on all ranks.");
            }
            runtime.profiler.start();
        }
        ProfilerMode::Off => debug!(event = "Profiler", phase = "Disabled"),
    }
}
