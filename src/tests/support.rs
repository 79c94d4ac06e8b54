//! Fakes for the runtime collaborators and a batch source driven by a
//! manual clock, so timing assertions are exact.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::BenchyError;
use crate::runtime::{Clock, Coordinator, ProcessControl, Profiler};

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6 * b.abs().max(1.0)
}

/// Clock that only moves when told to, or by a fixed tick per reading.
pub struct ManualClock {
    now: Mutex<Instant>,
    tick: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::ticking(Duration::ZERO)
    }

    pub fn ticking(tick: Duration) -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            tick,
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut now = self.now.lock().unwrap();
        let reading = *now;
        *now += self.tick;
        reading
    }
}

/// Yields `offset, offset + 1, ...`, advancing the clock by `latency` per
/// batch to model a loader with constant fetch time.
pub struct TickingSource {
    clock: Arc<ManualClock>,
    latency: Duration,
    remaining: usize,
    next: usize,
    offset: usize,
    report_len: bool,
    fetched: Arc<AtomicUsize>,
}

impl TickingSource {
    pub fn new(clock: Arc<ManualClock>, latency: Duration, len: usize) -> Self {
        Self {
            clock,
            latency,
            remaining: len,
            next: 0,
            offset: 0,
            report_len: true,
            fetched: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn without_len(mut self) -> Self {
        self.report_len = false;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Count fetches into a shared counter, so several epochs add up.
    pub fn counting_into(mut self, fetched: Arc<AtomicUsize>) -> Self {
        self.fetched = fetched;
        self
    }

    pub fn fetched(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetched)
    }
}

impl Iterator for TickingSource {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.clock.advance(self.latency);
        self.fetched.fetch_add(1, Ordering::SeqCst);
        self.remaining -= 1;
        let item = self.offset + self.next;
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.report_len {
            (self.remaining, Some(self.remaining))
        } else {
            (0, None)
        }
    }
}

#[derive(Default)]
pub struct RecordingProfiler {
    events: Mutex<Vec<String>>,
    starts: AtomicUsize,
}

impl RecordingProfiler {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Every pop matches an earlier push and nothing is left open.
    pub fn is_balanced(&self) -> bool {
        let mut depth: i64 = 0;
        for event in self.events() {
            depth += if event == "pop" { -1 } else { 1 };
            if depth < 0 {
                return false;
            }
        }
        depth == 0
    }
}

impl Profiler for RecordingProfiler {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn push_range(&self, name: &str) {
        self.events.lock().unwrap().push(format!("push {name}"));
    }

    fn pop_range(&self) {
        self.events.lock().unwrap().push("pop".to_string());
    }
}

pub struct FakeGroup {
    rank: usize,
    world_size: usize,
    fail_after: Option<usize>,
    barriers: AtomicUsize,
}

impl FakeGroup {
    pub fn new(rank: usize, world_size: usize) -> Self {
        Self {
            rank,
            world_size,
            fail_after: None,
            barriers: AtomicUsize::new(0),
        }
    }

    pub fn failing(self) -> Self {
        self.failing_after(0)
    }

    /// Barriers succeed `ok` times, then fail.
    pub fn failing_after(mut self, ok: usize) -> Self {
        self.fail_after = Some(ok);
        self
    }

    pub fn barriers(&self) -> usize {
        self.barriers.load(Ordering::SeqCst)
    }
}

impl Coordinator for FakeGroup {
    fn is_available(&self) -> bool {
        true
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn barrier(&self) -> Result<(), BenchyError> {
        let done = self.barriers.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|ok| done >= ok) {
            return Err(BenchyError::Barrier("peer went away".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingProcess {
    codes: Mutex<Vec<i32>>,
}

impl RecordingProcess {
    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().unwrap().clone()
    }
}

impl ProcessControl for RecordingProcess {
    fn exit(&self, code: i32) {
        self.codes.lock().unwrap().push(code);
    }
}

#[derive(Clone, Default)]
pub struct SharedLogBuffer(Arc<Mutex<Vec<u8>>>);

pub struct SharedLogWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedLogBuffer {
    type Writer = SharedLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedLogWriter(Arc::clone(&self.0))
    }
}

impl std::io::Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` under a thread-local subscriber that formats lines the way
/// [`crate::logging::init`] does, and return everything it logged.
pub fn capture_logs<F: FnOnce()>(f: F) -> String {
    let buffer = SharedLogBuffer::default();
    let subscriber = crate::logging::bare_format()
        .with_max_level(tracing::Level::INFO)
        .with_writer(buffer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}
