//! Collaborators the harness talks to while timing trials.
//!
//! The harness never reaches for a device runtime, a process group or a
//! profiler directly. Each capability sits behind a small trait, and
//! [`Runtime`] bundles one implementation of each. `Runtime::default()` wires
//! up the single-process, no-device variants, so a plain CPU loader can be
//! benchmarked with no setup at all.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use benchy::runtime::{Coordinator, Runtime};
//!
//! struct MyProcessGroup { /* ... */ }
//!
//! impl Coordinator for MyProcessGroup {
//!     fn is_available(&self) -> bool { true }
//!     fn is_initialized(&self) -> bool { true }
//!     fn rank(&self) -> usize { 0 }
//!     fn world_size(&self) -> usize { 8 }
//!     fn barrier(&self) -> Result<(), benchy::BenchyError> { Ok(()) }
//! }
//!
//! let runtime = Runtime::default().with_coordinator(Arc::new(MyProcessGroup {}));
//! ```

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::BenchyError;

/// Distributed coordination facility.
///
/// Rank and world size are only consulted when the facility is both
/// available and initialized; otherwise the process runs as rank 0 of 1.
pub trait Coordinator: Send + Sync {
    fn is_available(&self) -> bool;
    fn is_initialized(&self) -> bool;
    fn rank(&self) -> usize;
    fn world_size(&self) -> usize;

    /// Block until every participant reaches this point.
    fn barrier(&self) -> Result<(), BenchyError>;

    /// Whether collective calls can be made right now.
    fn is_active(&self) -> bool {
        self.is_available() && self.is_initialized()
    }
}

/// Device synchronization primitive.
pub trait DeviceSync: Send + Sync {
    /// Block until previously queued asynchronous work has completed.
    fn synchronize(&self);
}

/// Profiler or tracer that marks region boundaries for external inspection.
///
/// Regions are pushed and popped in strict nested order.
pub trait Profiler: Send + Sync {
    fn start(&self);
    fn push_range(&self, name: &str);
    fn pop_range(&self);
}

/// Monotonic clock used to timestamp step boundaries.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Process termination.
pub trait ProcessControl: Send + Sync {
    fn exit(&self, code: i32);
}

/// A lone process, no process group.
pub struct SingleProcess;

impl Coordinator for SingleProcess {
    fn is_available(&self) -> bool {
        false
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<(), BenchyError> {
        Ok(())
    }
}

/// Host-only execution; there is no queued device work to wait for.
pub struct NoDevice;

impl DeviceSync for NoDevice {
    fn synchronize(&self) {}
}

/// Profiler that drops every call.
pub struct NoOpProfiler;

impl Profiler for NoOpProfiler {
    fn start(&self) {}
    fn push_range(&self, _name: &str) {}
    fn pop_range(&self) {}
}

/// Profiler backend that reports region boundaries as `tracing` events.
///
/// Useful when no native profiler is attached: run with a `debug` filter and
/// every trial, step and data fetch shows up in the log with its depth.
#[derive(Default)]
pub struct TracingProfiler {
    stack: Mutex<Vec<String>>,
}

impl Profiler for TracingProfiler {
    fn start(&self) {
        debug!(event = "Profiler", phase = "Start");
    }

    fn push_range(&self, name: &str) {
        let Ok(mut stack) = self.stack.lock() else {
            return;
        };
        stack.push(name.to_string());
        debug!(event = "Range", phase = "Push", range = name, depth = stack.len());
    }

    fn pop_range(&self) {
        let Ok(mut stack) = self.stack.lock() else {
            return;
        };
        match stack.pop() {
            Some(name) => {
                debug!(event = "Range", phase = "Pop", range = name, depth = stack.len() + 1)
            }
            None => warn!(event = "Range", phase = "Pop", "pop without matching push"),
        }
    }
}

/// Wall-clock time from [`Instant::now`].
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Terminates through [`std::process::exit`].
pub struct StdProcess;

impl ProcessControl for StdProcess {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

/// One implementation of every collaborator.
#[derive(Clone)]
pub struct Runtime {
    pub coordinator: Arc<dyn Coordinator>,
    pub device: Arc<dyn DeviceSync>,
    pub profiler: Arc<dyn Profiler>,
    pub clock: Arc<dyn Clock>,
    pub process: Arc<dyn ProcessControl>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            coordinator: Arc::new(SingleProcess),
            device: Arc::new(NoDevice),
            profiler: Arc::new(NoOpProfiler),
            clock: Arc::new(SystemClock),
            process: Arc::new(StdProcess),
        }
    }
}

impl Runtime {
    pub fn with_coordinator(mut self, coordinator: Arc<dyn Coordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_device(mut self, device: Arc<dyn DeviceSync>) -> Self {
        self.device = device;
        self
    }

    pub fn with_profiler(mut self, profiler: Arc<dyn Profiler>) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_process(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = process;
        self
    }

    /// Rank and world size, `(0, 1)` unless the coordinator is active.
    pub fn topology(&self) -> (usize, usize) {
        if self.coordinator.is_active() {
            (self.coordinator.rank(), self.coordinator.world_size())
        } else {
            (0, 1)
        }
    }

    /// Step boundary: drain the device, then optionally meet the other ranks.
    pub fn barrier(&self, distributed: bool) -> Result<(), BenchyError> {
        self.device.synchronize();
        if distributed && self.coordinator.is_active() {
            self.coordinator.barrier()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGroup {
        active: bool,
        barriers: AtomicUsize,
    }

    impl Coordinator for CountingGroup {
        fn is_available(&self) -> bool {
            true
        }

        fn is_initialized(&self) -> bool {
            self.active
        }

        fn rank(&self) -> usize {
            3
        }

        fn world_size(&self) -> usize {
            4
        }

        fn barrier(&self) -> Result<(), BenchyError> {
            self.barriers.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDevice(AtomicUsize);

    impl DeviceSync for CountingDevice {
        fn synchronize(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_default_runtime_is_single_process() {
        let runtime = Runtime::default();
        assert_eq!(runtime.topology(), (0, 1));
        assert!(runtime.barrier(true).is_ok());
    }

    #[test]
    fn test_topology_requires_initialized_group() {
        let group = Arc::new(CountingGroup {
            active: false,
            barriers: AtomicUsize::new(0),
        });
        let runtime = Runtime::default().with_coordinator(group);
        assert_eq!(runtime.topology(), (0, 1));

        let group = Arc::new(CountingGroup {
            active: true,
            barriers: AtomicUsize::new(0),
        });
        let runtime = Runtime::default().with_coordinator(group);
        assert_eq!(runtime.topology(), (3, 4));
    }

    #[test]
    fn test_barrier_always_synchronizes_device() {
        let group = Arc::new(CountingGroup {
            active: true,
            barriers: AtomicUsize::new(0),
        });
        let device = Arc::new(CountingDevice::default());
        let runtime = Runtime::default()
            .with_coordinator(group.clone())
            .with_device(device.clone());

        runtime.barrier(false).unwrap();
        assert_eq!(device.0.load(Ordering::SeqCst), 1);
        assert_eq!(group.barriers.load(Ordering::SeqCst), 0);

        runtime.barrier(true).unwrap();
        assert_eq!(device.0.load(Ordering::SeqCst), 2);
        assert_eq!(group.barriers.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tracing_profiler_tolerates_unbalanced_pop() {
        let profiler = TracingProfiler::default();
        profiler.start();
        profiler.push_range("BENCHY::IO_0");
        profiler.pop_range();
        profiler.pop_range();
        assert!(profiler.stack.lock().unwrap().is_empty());
    }
}
