//! Drop-in benchmarking wrapper for a re-iterable data loader.
//!
//! [`BenchmarkLoader`] stands in for the loader in a training loop. Building
//! it runs the IO phase straight away. After that, every
//! [`BenchmarkLoader::epoch`] call hands out the next synthetic or full
//! trial; once those are used up it writes the report, exits the process if
//! configured to, and otherwise serves plain epochs from the loader.
//!
//! ```ignore
//! let session = Session::from_env(Runtime::default())?;
//! let mut loader = BenchmarkLoader::new(|| dataset.batches(32), 32, session)?;
//! loop {
//!     for batch in loader.epoch()? {
//!         train_step(batch?);
//!     }
//! }
//! ```

use crate::error::BenchyError;
use crate::iter::Producer;
use crate::session::{Epoch, Session};

/// Something that can start a fresh pass over its data.
pub trait Loader {
    type Source: Producer;

    fn epoch(&mut self) -> Self::Source;
}

impl<F, P> Loader for F
where
    F: FnMut() -> P,
    P: Producer,
{
    type Source = P;

    fn epoch(&mut self) -> P {
        self()
    }
}

pub struct BenchmarkLoader<L> {
    loader: L,
    batch_size: usize,
    session: Session,
}

impl<L> BenchmarkLoader<L>
where
    L: Loader,
    <L::Source as Producer>::Item: Clone,
{
    /// Wrap `loader` and run the IO phase on it.
    pub fn new(mut loader: L, batch_size: usize, mut session: Session) -> Result<Self, BenchyError> {
        session.run_io_benchmark(batch_size, || loader.epoch())?;
        Ok(Self {
            loader,
            batch_size,
            session,
        })
    }

    /// Start the next pass over the loader.
    pub fn epoch(&mut self) -> Result<Epoch<'_, L::Source>, BenchyError> {
        let source = self.loader.epoch();
        if self.session.has_pending_trial() {
            return Ok(self.session.next_trial(self.batch_size, source));
        }
        self.finish()?;
        Ok(Epoch::Plain(source))
    }

    fn finish(&mut self) -> Result<(), BenchyError> {
        if self.session.is_finalized() {
            return Ok(());
        }
        let completion = self.session.finalize()?;
        if completion.exit_requested {
            self.session.runtime().process.exit(0);
        }
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}
