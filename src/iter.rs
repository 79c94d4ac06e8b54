//! Timed iteration over a batch producer.
//!
//! [`TimedIter`] wraps one trial's worth of batches. Every call to
//! [`TimedIter::step`] marks a step boundary: it waits on the barrier, closes
//! the previous step's profiler region, timestamps the boundary and then
//! fetches the next batch. After `trial_len` batches the next call closes the
//! trial, logs the average throughput and, for measured trials, appends the
//! results to the session aggregate.
//!
//! In cached mode the first call fetches a single real batch and hands it out
//! untimed; every timed step afterwards replays a clone of it, so the trial
//! measures the training loop without the loader.

use tracing::{debug, info};

use crate::error::BenchyError;
use crate::phase::TrialLabel;
use crate::rate::RateTracker;
use crate::report::ResultsAggregate;
use crate::runtime::Runtime;

/// Anything that yields batches and may know how many it has left.
pub trait Producer {
    type Item;

    fn fetch(&mut self) -> Option<Self::Item>;

    /// Remaining batches, when the producer can tell.
    fn len_hint(&self) -> Option<usize>;
}

impl<I: Iterator> Producer for I {
    type Item = I::Item;

    fn fetch(&mut self) -> Option<Self::Item> {
        self.next()
    }

    fn len_hint(&self) -> Option<usize> {
        match self.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(lower),
            _ => None,
        }
    }
}

/// Attaches a known length to an iterator whose `size_hint` is inexact.
#[derive(Debug, Clone)]
pub struct KnownLen<I> {
    inner: I,
    remaining: usize,
}

impl<I> KnownLen<I> {
    pub fn new(inner: I, len: usize) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }
}

impl<I: Iterator> Iterator for KnownLen<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        self.remaining = self.remaining.saturating_sub(1);
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Outcome of one [`TimedIter::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    Batch(T),
    /// The trial ran its full length.
    Finished,
    /// The producer ran dry before the trial was complete.
    Exhausted,
}

/// Per-trial knobs, resolved from the session configuration.
#[derive(Debug, Clone, Copy)]
pub struct TrialSettings {
    pub batch_size: usize,
    pub report_freq: usize,
    pub nbatches: usize,
    pub cached: bool,
    pub distributed_barrier: bool,
    pub rank: usize,
    pub world_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unstarted,
    Timing,
    Done,
    Exhausted,
    Failed,
}

enum Feed<T> {
    Live,
    Cached(Option<T>),
}

pub struct TimedIter<'a, P: Producer> {
    source: P,
    label: TrialLabel,
    settings: TrialSettings,
    trial_len: usize,
    feed: Feed<P::Item>,
    state: State,
    count: usize,
    window: usize,
    tracker: RateTracker,
    results: Option<&'a mut ResultsAggregate>,
    runtime: &'a Runtime,
}

impl<'a, P> TimedIter<'a, P>
where
    P: Producer,
    P::Item: Clone,
{
    /// Wrap `source` for one trial.
    ///
    /// Warmup trials never touch `results`. Measured trials register their
    /// phase right away, so the phase shows up in the report even if none of
    /// its trials completes.
    pub fn new(
        source: P,
        label: TrialLabel,
        settings: TrialSettings,
        results: &'a mut ResultsAggregate,
        runtime: &'a Runtime,
    ) -> Self {
        let trial_len = match source.len_hint() {
            Some(len) => len.min(settings.nbatches),
            None => settings.nbatches,
        };
        let results = if label.is_warmup() {
            None
        } else {
            results.ensure_phase(label.phase());
            Some(results)
        };
        debug!(
            event = "Trial",
            phase = "Created",
            label = label.to_string(),
            trial_len,
            cached = settings.cached
        );
        Self {
            source,
            label,
            settings,
            trial_len,
            feed: if settings.cached {
                Feed::Cached(None)
            } else {
                Feed::Live
            },
            state: State::Unstarted,
            count: 0,
            window: 0,
            tracker: RateTracker::new(settings.batch_size, settings.world_size),
            results,
            runtime,
        }
    }

    pub fn label(&self) -> TrialLabel {
        self.label
    }

    /// Number of timed steps this trial runs.
    pub fn trial_len(&self) -> usize {
        self.trial_len
    }

    /// Rates recorded so far.
    pub fn rates(&self) -> &[f64] {
        self.tracker.rates()
    }

    /// Advance by one step.
    pub fn step(&mut self) -> Result<Step<P::Item>, BenchyError> {
        match self.state {
            State::Done | State::Failed => return Ok(Step::Finished),
            State::Exhausted => return Ok(Step::Exhausted),
            State::Unstarted | State::Timing => {}
        }

        if self.trial_len == 0 {
            debug!(event = "Trial", phase = "Empty", label = self.label.to_string());
            self.state = State::Done;
            return Ok(Step::Finished);
        }

        if let Feed::Cached(slot @ None) = &mut self.feed {
            let Some(item) = self.source.fetch() else {
                self.state = State::Exhausted;
                return Ok(Step::Exhausted);
            };
            *slot = Some(item.clone());
            return Ok(Step::Batch(item));
        }

        let runtime = self.runtime;
        if let Err(err) = runtime.barrier(self.settings.distributed_barrier) {
            if self.state == State::Timing {
                runtime.profiler.pop_range();
                runtime.profiler.pop_range();
            }
            self.state = State::Failed;
            return Err(err);
        }

        let profiler = &runtime.profiler;
        if self.state == State::Unstarted {
            self.tracker.start(runtime.clock.now());
            profiler.push_range(&self.trial_region());
            profiler.push_range(&self.step_region());
            self.state = State::Timing;
        } else {
            profiler.pop_range();
            profiler.push_range(&self.step_region());
            let rate = self.tracker.record(runtime.clock.now());

            if self.window == self.settings.report_freq {
                if let (0, Some(rate)) = (self.settings.rank, rate) {
                    info!("BENCHY::{}::Throughput: {rate:?}", self.label);
                }
                self.window = 0;
            }

            if self.count == self.trial_len {
                self.complete();
                return Ok(Step::Finished);
            }
        }

        let item = match &self.feed {
            Feed::Cached(Some(item)) => item.clone(),
            _ => {
                profiler.push_range(&format!("{}::DATA_{}", self.trial_region(), self.count));
                let fetched = self.source.fetch();
                profiler.pop_range();
                let Some(item) = fetched else {
                    info!("BENCHY::INFO::Message: stopped!");
                    profiler.pop_range();
                    profiler.pop_range();
                    self.state = State::Exhausted;
                    return Ok(Step::Exhausted);
                };
                item
            }
        };

        self.count += 1;
        self.window += 1;
        Ok(Step::Batch(item))
    }

    fn complete(&mut self) {
        self.state = State::Done;
        let profiler = &self.runtime.profiler;
        profiler.pop_range();
        profiler.pop_range();

        if self.settings.rank != 0 {
            return;
        }
        let Some(average) = self.tracker.average() else {
            return;
        };
        info!("BENCHY::{}::Avg Throughput: {average:?}", self.label);
        if let Some(results) = self.results.take() {
            results.record_trial(self.label.phase(), self.tracker.rates().to_vec(), average);
        }
    }

    fn trial_region(&self) -> String {
        format!("BENCHY::{}", self.label)
    }

    fn step_region(&self) -> String {
        format!("{}::STEP_{}", self.trial_region(), self.count)
    }

    /// Run the trial to its end, discarding the batches.
    pub fn drain(&mut self) -> Result<(), BenchyError> {
        while let Step::Batch(_) = self.step()? {}
        Ok(())
    }
}

impl<P> Iterator for TimedIter<'_, P>
where
    P: Producer,
    P::Item: Clone,
{
    type Item = Result<P::Item, BenchyError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Step::Batch(item)) => Some(Ok(item)),
            Ok(Step::Finished | Step::Exhausted) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
