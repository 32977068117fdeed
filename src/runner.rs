use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::StressConfig;
use crate::{CountingSemaphore, SemResult, SemaphoreError};

#[derive(Default)]
struct Tally {
    woken: AtomicUsize,
    timed_out: AtomicUsize,
    failed: AtomicUsize,
}

/// What the waiters saw once every one of them has been joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaiterOutcome {
    pub woken: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub remaining_count: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StressReport {
    pub waiters: usize,
    pub signals: usize,
    pub initial_count: i32,
    pub woken: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub remaining_count: u32,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl StressReport {
    /// Every unit that was available or posted went to exactly one waiter,
    /// or is still in the semaphore.
    pub fn is_balanced(&self) -> bool {
        let available = match usize::try_from(self.initial_count) {
            Ok(initial) => initial.checked_add(self.signals),
            Err(_) => None,
        };

        self.failed == 0
            && self.woken.checked_add(self.timed_out) == Some(self.waiters)
            && available.is_some()
            && self.woken.checked_add(self.remaining_count as usize) == available
    }
}

pub struct StressRunner {
    semaphore: Arc<CountingSemaphore>,
    tally: Arc<Tally>,
    waiters: Vec<JoinHandle<()>>,
}

impl StressRunner {
    pub fn spawn(config: &StressConfig) -> SemResult<StressRunner> {
        let semaphore = Arc::new(CountingSemaphore::with_count(
            config.semaphore.initial_count,
        )?);
        let tally = Arc::new(Tally::default());

        log::info!(
            "Starting {} waiters (timeout {:?}, initial count {})",
            config.workload.waiters,
            config.workload.wait_timeout,
            config.semaphore.initial_count
        );

        let waiters = (0..config.workload.waiters)
            .map(|_| {
                let semaphore = Arc::clone(&semaphore);
                let tally = Arc::clone(&tally);
                let timeout = config.workload.wait_timeout;

                thread::spawn(move || match semaphore.wait_for(timeout) {
                    Ok(()) => {
                        tally.woken.fetch_add(1, Ordering::AcqRel);
                    }
                    Err(SemaphoreError::TimedOut) => {
                        tally.timed_out.fetch_add(1, Ordering::AcqRel);
                    }
                    Err(e) => {
                        log::error!("waiter failed: {}", e);
                        tally.failed.fetch_add(1, Ordering::AcqRel);
                    }
                })
            })
            .collect();

        Ok(StressRunner {
            semaphore,
            tally,
            waiters,
        })
    }

    pub fn signal(&self, count: usize, interval: Duration) -> SemResult<()> {
        log::info!("Posting {} signals", count);
        for _ in 0..count {
            self.semaphore.signal()?;
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }

        Ok(())
    }

    pub fn join_all(self) -> SemResult<WaiterOutcome> {
        for waiter in self.waiters {
            if waiter.join().is_err() {
                self.tally.failed.fetch_add(1, Ordering::AcqRel);
            }
        }

        Ok(WaiterOutcome {
            woken: self.tally.woken.load(Ordering::Acquire),
            timed_out: self.tally.timed_out.load(Ordering::Acquire),
            failed: self.tally.failed.load(Ordering::Acquire),
            remaining_count: self.semaphore.count()?,
        })
    }

    pub fn run(config: &StressConfig) -> SemResult<StressReport> {
        let start = Instant::now();
        let runner = StressRunner::spawn(config)?;

        // waiters are joined even when posting fails
        let signalled = runner.signal(config.workload.signals, config.workload.signal_interval);
        let outcome = runner.join_all();
        signalled?;
        let outcome = outcome?;

        let report = StressReport {
            waiters: config.workload.waiters,
            signals: config.workload.signals,
            initial_count: config.semaphore.initial_count,
            woken: outcome.woken,
            timed_out: outcome.timed_out,
            failed: outcome.failed,
            remaining_count: outcome.remaining_count,
            elapsed: start.elapsed(),
        };

        log::info!("Stress run done in {:?}", report.elapsed);

        Ok(report)
    }
}
