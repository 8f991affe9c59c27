//! Background tick thread.
//!
//! Spawns one thread that owns the [`TickScheduler`], ticks it at a fixed
//! rate on a [`Clock`], and publishes the latest [`TickReport`] over a
//! bounded channel. The thread is shut down and joined when the `Ticker`
//! is dropped.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use stepgen_traits::{Clock, StepEmitter};

use crate::scheduler::{TickReport, TickScheduler};

pub struct Ticker<E: StepEmitter + Send + 'static> {
    rx: xch::Receiver<TickReport>,
    ticks: Arc<AtomicU64>,
    overruns: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<TickScheduler<E>>>,
}

impl<E: StepEmitter + Send + 'static> Ticker<E> {
    pub fn spawn<C: Clock + Send + Sync + 'static>(
        mut scheduler: TickScheduler<E>,
        hz: u32,
        clock: C,
    ) -> Self {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));
        let overruns = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicBool::new(false));
        let period = Duration::from_micros(crate::util::period_us(hz));

        let (shutdown_t, ticks_t, overruns_t, failed_t) = (
            Arc::clone(&shutdown),
            Arc::clone(&ticks),
            Arc::clone(&overruns),
            Arc::clone(&failed),
        );

        let join_handle = std::thread::spawn(move || {
            let mut deadline = clock.now() + period;
            while !shutdown_t.load(Ordering::Relaxed) {
                match scheduler.tick() {
                    Ok(report) => {
                        ticks_t.fetch_add(1, Ordering::Relaxed);
                        // full means nobody read the previous report; drop this one
                        let _ = tx.try_send(report);
                    }
                    Err(e) => {
                        tracing::error!(error = %format!("{e:#}"), "tick failed; ticker stopping");
                        failed_t.store(true, Ordering::Relaxed);
                        break;
                    }
                }

                let now = clock.now();
                if now > deadline + period {
                    overruns_t.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        late_us = u64::try_from((now - deadline).as_micros()).unwrap_or(u64::MAX),
                        "tick deadline overrun"
                    );
                    deadline = now + period;
                    continue;
                }
                clock.sleep(deadline.saturating_duration_since(now));
                deadline += period;
            }
            tracing::trace!("ticker thread exiting");
            scheduler
        });

        Self {
            rx,
            ticks,
            overruns,
            failed,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Most recent report not yet consumed, if any.
    pub fn latest(&self) -> Option<TickReport> {
        self.rx.try_iter().last()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// True once a tick returned an error and the thread stopped.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// Stop the thread and hand the scheduler back.
    pub fn stop(mut self) -> Option<TickScheduler<E>> {
        self.join()
    }

    fn join(&mut self) -> Option<TickScheduler<E>> {
        self.shutdown.store(true, Ordering::Relaxed);
        let handle = self.join_handle.take()?;
        match handle.join() {
            Ok(scheduler) => Some(scheduler),
            Err(e) => {
                tracing::warn!(?e, "ticker thread panicked");
                None
            }
        }
    }
}

impl<E: StepEmitter + Send + 'static> Drop for Ticker<E> {
    fn drop(&mut self) {
        let _ = self.join();
    }
}
