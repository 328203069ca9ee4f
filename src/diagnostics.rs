//! Performance counters
//!
//! Each named counter accumulates a hit count and total elapsed time. Timing
//! is scoped: `start_stopwatch` returns a guard that records on drop, so every
//! exit path of the measured region is covered.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceCounter {
    /// Host-initiated calls into script code
    Execution,
    /// Coroutine resumes
    Resume,
}

impl fmt::Display for PerformanceCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceCounter::Execution => f.write_str("Execution"),
            PerformanceCounter::Resume => f.write_str("Resume"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CounterSample {
    pub count: u64,
    pub total: Duration,
}

#[derive(Debug, Default)]
pub struct PerformanceStats {
    enabled: bool,
    counters: RefCell<HashMap<PerformanceCounter, CounterSample>>,
}

impl PerformanceStats {
    pub fn new(enabled: bool) -> Rc<Self> {
        Rc::new(PerformanceStats {
            enabled,
            counters: RefCell::default(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start timing a region; `None` when stats are disabled
    pub fn start_stopwatch(self: &Rc<Self>, counter: PerformanceCounter) -> Option<Stopwatch> {
        self.enabled.then(|| Stopwatch {
            stats: Rc::clone(self),
            counter,
            started: Instant::now(),
        })
    }

    pub fn sample(&self, counter: PerformanceCounter) -> CounterSample {
        self.counters
            .borrow()
            .get(&counter)
            .copied()
            .unwrap_or_default()
    }

    pub fn reset(&self) {
        self.counters.borrow_mut().clear();
    }

    fn record(&self, counter: PerformanceCounter, elapsed: Duration) {
        let mut counters = self.counters.borrow_mut();
        let sample = counters.entry(counter).or_default();
        sample.count += 1;
        sample.total += elapsed;
    }
}

/// Records elapsed time into its counter when dropped
pub struct Stopwatch {
    stats: Rc<PerformanceStats>,
    counter: PerformanceCounter,
    started: Instant,
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        self.stats.record(self.counter, self.started.elapsed());
    }
}
