//! Example: benchmarking a simulated data loader.
//!
//! The loader sleeps a fixed time per batch to stand in for decoding and
//! augmentation, and the "training step" sleeps a shorter time. The IO phase
//! runs when the wrapper is built; the synthetic and full phases run as the
//! loop asks for epochs. With the default configuration the process exits
//! once the report is written.
//!
//! To run:
//! ```bash
//! cargo run --example synthetic_loader
//! BENCHY_CONFIG_FILE=benchy.yaml cargo run --example synthetic_loader
//! RUST_LOG=debug cargo run --example synthetic_loader
//! ```

use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use benchy::runtime::TracingProfiler;
use benchy::{BenchmarkLoader, KnownLen, Runtime, Session, logging};

const BATCH_SIZE: usize = 32;
const BATCHES_PER_EPOCH: usize = 60;

/// Every tenth shard is corrupt and skipped.
const SKIPPED_PER_EPOCH: usize = BATCHES_PER_EPOCH / 10;

/// A loader whose batches take `latency` each to produce.
///
/// Dropping the corrupt shards leaves the iterator with an inexact
/// `size_hint`, so the batch count is attached with `KnownLen`.
fn slow_batches(latency: Duration) -> KnownLen<impl Iterator<Item = Vec<f32>>> {
    let batches = (0..BATCHES_PER_EPOCH)
        .filter(|shard| shard % 10 != 9)
        .map(move |shard| {
            thread::sleep(latency);
            vec![shard as f32; BATCH_SIZE]
        });
    KnownLen::new(batches, BATCHES_PER_EPOCH - SKIPPED_PER_EPOCH)
}

fn train_step(batch: &[f32]) -> f32 {
    thread::sleep(Duration::from_millis(2));
    batch.iter().sum()
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let runtime = Runtime::default().with_profiler(Arc::new(TracingProfiler::default()));
    let session = Session::from_env(runtime)?;
    let mut loader = BenchmarkLoader::new(
        || slow_batches(Duration::from_millis(5)),
        BATCH_SIZE,
        session,
    )?;

    // Synthetic, then full, then plain epochs once the report is out.
    for epoch in 0..10 {
        let mut loss = 0.0;
        for batch in loader.epoch()? {
            loss += train_step(&batch?);
        }
        tracing::debug!(event = "Epoch", phase = "Done", epoch, loss);
    }
    Ok(())
}
