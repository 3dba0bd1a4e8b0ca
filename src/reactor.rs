//! Single-threaded cooperative reactor.
//!
//! Built directly on Tokio's current-thread runtime rather than a bespoke
//! poll loop: `schedule_now` / `schedule_after` map onto `spawn_local` /
//! `time::sleep`. All callbacks the engine registers are suspension points;
//! none hold a lock across `.await`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::LocalSet;

/// Opaque handle returned by `schedule_after`; dropping it does not cancel
/// the timer — call [`TimerHandle::cancel`] explicitly.
pub struct TimerHandle {
    id: u64,
    cancelled: Rc<RefCell<HashSet<u64>>>,
}

impl TimerHandle {
    pub fn cancel(self) {
        self.cancelled.borrow_mut().insert(self.id);
    }
}

/// A `Pollable` tracked by the watchdog: anything with an absolute
/// wall-clock deadline that should be force-closed if it elapses.
pub trait Pollable {
    /// Absolute deadline, if one is set via `set_timeout`.
    fn deadline(&self) -> Option<Instant>;
    /// Force-close this object; called by the watchdog sweep.
    fn force_close(&self);
}

const WATCHDOG_PERIOD: Duration = Duration::from_secs(10);

/// The reactor itself. Not `Send`/`Sync`: all registered callbacks run on
/// the thread that calls [`Reactor::run`].
pub struct Reactor {
    local: LocalSet,
    break_tx: watch::Sender<bool>,
    break_rx: watch::Receiver<bool>,
    cancelled_timers: Rc<RefCell<HashSet<u64>>>,
    next_timer_id: Rc<RefCell<u64>>,
    watched: Rc<RefCell<HashMap<u64, Rc<dyn Pollable>>>>,
    next_watch_id: Rc<RefCell<u64>>,
    /// Number of outstanding schedule_now/schedule_after tasks not yet run.
    /// `run()` exits when this reaches zero and no break has been requested.
    pending: Rc<AtomicUsize>,
    idle: Rc<tokio::sync::Notify>,
}

impl Reactor {
    pub fn new() -> Self {
        let (break_tx, break_rx) = watch::channel(false);
        Self {
            local: LocalSet::new(),
            break_tx,
            break_rx,
            cancelled_timers: Rc::new(RefCell::new(Default::default())),
            next_timer_id: Rc::new(RefCell::new(0)),
            watched: Rc::new(RefCell::new(HashMap::new())),
            next_watch_id: Rc::new(RefCell::new(0)),
            pending: Rc::new(AtomicUsize::new(0)),
            idle: Rc::new(tokio::sync::Notify::new()),
        }
    }

    fn track<F>(&self, fut: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let pending = self.pending.clone();
        let idle = self.idle.clone();
        self.local.spawn_local(async move {
            fut.await;
            if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
        });
    }

    /// Invoke `fut` once after `delay`; never recurses synchronously.
    /// Returns a cancellable handle.
    pub fn schedule_after<F>(&self, delay: Duration, fut: F) -> TimerHandle
    where
        F: Future<Output = ()> + 'static,
    {
        let id = {
            let mut next = self.next_timer_id.borrow_mut();
            let id = *next;
            *next += 1;
            id
        };
        let cancelled = self.cancelled_timers.clone();
        self.track(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if cancelled.borrow().contains(&id) {
                return;
            }
            fut.await;
        });
        TimerHandle { id, cancelled: self.cancelled_timers.clone() }
    }

    /// Invoke `fut` on the next loop iteration — never synchronously on the
    /// calling stack. This is the universal trampoline used to break
    /// re-entrancy during connect retries, DNS teardown, and transport
    /// close.
    pub fn schedule_now<F>(&self, fut: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.track(async move {
            tokio::task::yield_now().await;
            fut.await;
        });
    }

    /// Register a [`Pollable`] with the watchdog sweep. Returns an id that
    /// can be passed to `unwatch`.
    pub fn watch(&self, pollable: Rc<dyn Pollable>) -> u64 {
        let mut next = self.next_watch_id.borrow_mut();
        let id = *next;
        *next += 1;
        self.watched.borrow_mut().insert(id, pollable);
        id
    }

    pub fn unwatch(&self, id: u64) {
        self.watched.borrow_mut().remove(&id);
    }

    /// Drive the loop until `break_loop()` is called or no pending
    /// registrations remain. Spawns the watchdog as a background local task.
    pub async fn run(&self) -> Result<(), crate::error::Error> {
        let watched = self.watched.clone();
        let mut watchdog_break = self.break_rx.clone();
        self.local.spawn_local(async move {
            let mut ticker = tokio::time::interval(WATCHDOG_PERIOD);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let dead: Vec<u64> = watched
                            .borrow()
                            .iter()
                            .filter(|(_, p)| p.deadline().is_some_and(|d| d <= now))
                            .map(|(id, _)| *id)
                            .collect();
                        for id in dead {
                            if let Some(p) = watched.borrow_mut().remove(&id) {
                                p.force_close();
                            }
                        }
                    }
                    _ = watchdog_break.changed() => {
                        if *watchdog_break.borrow() {
                            return;
                        }
                    }
                }
            }
        });

        let mut break_rx = self.break_rx.clone();
        let pending = self.pending.clone();
        let idle = self.idle.clone();
        self.local
            .run_until(async move {
                loop {
                    if *break_rx.borrow() {
                        return;
                    }
                    if pending.load(Ordering::SeqCst) == 0 {
                        return;
                    }
                    tokio::select! {
                        _ = break_rx.changed() => {}
                        _ = idle.notified() => {}
                    }
                }
            })
            .await;
        Ok(())
    }

    /// Cause `run()` to return after the current callback completes. The
    /// only cancellation primitive at the reactor level.
    pub fn break_loop(&self) {
        let _ = self.break_tx.send(true);
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as O};
    use std::sync::Arc;

    #[tokio::test]
    async fn schedule_now_runs_later_not_synchronously() {
        let reactor = Reactor::new();
        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        reactor.schedule_now(async move {
            *ran2.borrow_mut() = true;
        });
        // Not yet run: schedule_now must not execute synchronously.
        assert!(!*ran.borrow());
        reactor.run().await.unwrap();
        assert!(*ran.borrow());
    }

    #[tokio::test]
    async fn schedule_after_invokes_once() {
        let reactor = Reactor::new();
        let count = Arc::new(AtomicU32::new(0));
        let c2 = count.clone();
        reactor.schedule_after(Duration::from_millis(1), async move {
            c2.fetch_add(1, O::SeqCst);
        });
        reactor.run().await.unwrap();
        assert_eq!(count.load(O::SeqCst), 1);
    }

    #[tokio::test]
    async fn break_loop_stops_pending_work() {
        let reactor = Reactor::new();
        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        reactor.schedule_after(Duration::from_secs(3600), async move {
            *ran2.borrow_mut() = true;
        });
        reactor.break_loop();
        reactor.run().await.unwrap();
        assert!(!*ran.borrow());
    }
}
