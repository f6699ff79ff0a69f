//! Timers and deferred calls.
//!
//! A single process-wide sweep drives all timers: backend bridges call
//! [`sweep`] roughly every 10 ms (usually via
//! [`crate::backend::process_events`]). Everything runs on the calling
//! thread; the registry is thread-local to match the single-threaded
//! cooperative model of the core.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Handle to a registered timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct TimerEntry {
    interval: Duration,
    oneshot: bool,
    /// A nolag timer advances its deadline by exactly `interval`, so N
    /// fires take N * interval; otherwise the deadline drifts to
    /// now + interval.
    nolag: bool,
    next_due: Instant,
    running: bool,
    callback: Box<dyn FnMut()>,
}

#[derive(Default)]
struct TimerRegistry {
    timers: Vec<(TimerId, TimerEntry)>,
    next_id: u64,
    /// One-shot jobs keyed by deadline; drained by the same sweep.
    deferred: BTreeMap<Instant, Vec<Box<dyn FnOnce()>>>,
}

thread_local! {
    static REGISTRY: RefCell<TimerRegistry> = RefCell::new(TimerRegistry::default());
}

/// A repeating or one-shot timer driven by the process-wide sweep.
///
/// Dropping the handle does not stop the timer; call [`Timer::destroy`].
#[derive(Debug)]
pub struct Timer {
    id: TimerId,
}

impl Timer {
    /// Register a timer. It does not run until [`Timer::start`].
    pub fn new<F: FnMut() + 'static>(callback: F) -> Timer {
        let id = REGISTRY.with(|r| {
            let mut reg = r.borrow_mut();
            let id = TimerId(reg.next_id);
            reg.next_id += 1;
            reg.timers.push((
                id,
                TimerEntry {
                    interval: Duration::from_millis(100),
                    oneshot: false,
                    nolag: false,
                    next_due: Instant::now(),
                    running: false,
                    callback: Box::new(callback),
                },
            ));
            id
        });
        Timer { id }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Start (or restart) with the given interval.
    pub fn start(&self, interval_ms: u64, oneshot: bool) {
        REGISTRY.with(|r| {
            let mut reg = r.borrow_mut();
            if let Some((_, entry)) = reg.timers.iter_mut().find(|(id, _)| *id == self.id) {
                entry.interval = Duration::from_millis(interval_ms);
                entry.oneshot = oneshot;
                entry.next_due = Instant::now() + entry.interval;
                entry.running = true;
            }
        });
    }

    /// Advance deadlines by exactly `interval` instead of `now + interval`.
    pub fn set_nolag(&self, nolag: bool) {
        REGISTRY.with(|r| {
            let mut reg = r.borrow_mut();
            if let Some((_, entry)) = reg.timers.iter_mut().find(|(id, _)| *id == self.id) {
                entry.nolag = nolag;
            }
        });
    }

    /// Takes effect before the next sweep.
    pub fn stop(&self) {
        REGISTRY.with(|r| {
            let mut reg = r.borrow_mut();
            if let Some((_, entry)) = reg.timers.iter_mut().find(|(id, _)| *id == self.id) {
                entry.running = false;
            }
        });
    }

    pub fn is_running(&self) -> bool {
        REGISTRY.with(|r| {
            r.borrow()
                .timers
                .iter()
                .find(|(id, _)| *id == self.id)
                .map(|(_, e)| e.running)
                .unwrap_or(false)
        })
    }

    /// Remove the timer from the registry entirely.
    pub fn destroy(self) {
        REGISTRY.with(|r| {
            r.borrow_mut().timers.retain(|(id, _)| *id != self.id);
        });
    }
}

/// Run `f` once after `delay_secs` seconds, on a later sweep.
pub fn call_later<F: FnOnce() + 'static>(delay_secs: f64, f: F) {
    let deadline = Instant::now() + Duration::from_secs_f64(delay_secs.max(0.0));
    REGISTRY.with(|r| {
        r.borrow_mut()
            .deferred
            .entry(deadline)
            .or_default()
            .push(Box::new(f));
    });
}

/// Fire every due timer and drain due deferred calls.
///
/// Returns the number of callbacks invoked. Callbacks run outside the
/// registry borrow, so they may start/stop timers or register new
/// deferred calls.
pub fn sweep() -> usize {
    sweep_at(Instant::now())
}

/// Sweep against an explicit clock; lets tests drive time deterministically.
pub fn sweep_at(now: Instant) -> usize {
    // Collect due callbacks under the borrow, run them after releasing it.
    let mut due_timers: Vec<TimerId> = Vec::new();
    let mut due_jobs: Vec<Box<dyn FnOnce()>> = Vec::new();

    REGISTRY.with(|r| {
        let mut reg = r.borrow_mut();
        for (id, entry) in reg.timers.iter_mut() {
            if entry.running && entry.next_due <= now {
                due_timers.push(*id);
                if entry.oneshot {
                    entry.running = false;
                } else if entry.nolag {
                    entry.next_due += entry.interval;
                } else {
                    entry.next_due = now + entry.interval;
                }
            }
        }
        let deadlines: Vec<Instant> = reg
            .deferred
            .range(..=now)
            .map(|(k, _)| *k)
            .collect();
        for key in deadlines {
            if let Some(jobs) = reg.deferred.remove(&key) {
                due_jobs.extend(jobs);
            }
        }
    });

    let mut fired = 0;
    for id in due_timers {
        // Temporarily take the callback so the timer may mutate the
        // registry (stop itself, start others) while running.
        let cb = REGISTRY.with(|r| {
            let mut reg = r.borrow_mut();
            reg.timers
                .iter_mut()
                .find(|(tid, _)| *tid == id)
                .map(|(_, e)| std::mem::replace(&mut e.callback, Box::new(|| {})))
        });
        if let Some(mut cb) = cb {
            cb();
            fired += 1;
            REGISTRY.with(|r| {
                let mut reg = r.borrow_mut();
                if let Some((_, e)) = reg.timers.iter_mut().find(|(tid, _)| *tid == id) {
                    e.callback = cb;
                }
            });
        }
    }
    for job in due_jobs {
        job();
        fired += 1;
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn nolag_timer_fires_n_times_in_n_intervals() {
        let count = Rc::new(Cell::new(0u32));
        let c = count.clone();
        let timer = Timer::new(move || c.set(c.get() + 1));
        timer.set_nolag(true);
        timer.start(100, false);

        // Drive a virtual clock: 10 sweeps spaced exactly one interval
        // apart must produce exactly 10 fires.
        let t0 = Instant::now();
        for i in 1..=10 {
            sweep_at(t0 + Duration::from_millis(100 * i));
        }
        assert_eq!(count.get(), 10);
        timer.destroy();
    }

    #[test]
    fn nolag_timer_catches_up_after_late_sweep() {
        let count = Rc::new(Cell::new(0u32));
        let c = count.clone();
        let timer = Timer::new(move || c.set(c.get() + 1));
        timer.set_nolag(true);
        timer.start(100, false);

        let t0 = Instant::now();
        // One very late sweep fires once, but the deadline only advances
        // by a single interval, so the next on-time sweep fires again.
        sweep_at(t0 + Duration::from_millis(350));
        sweep_at(t0 + Duration::from_millis(360));
        sweep_at(t0 + Duration::from_millis(370));
        assert_eq!(count.get(), 3);
        timer.destroy();
    }

    #[test]
    fn oneshot_fires_once() {
        let count = Rc::new(Cell::new(0u32));
        let c = count.clone();
        let timer = Timer::new(move || c.set(c.get() + 1));
        timer.start(10, true);
        let t0 = Instant::now();
        sweep_at(t0 + Duration::from_millis(20));
        sweep_at(t0 + Duration::from_millis(40));
        assert_eq!(count.get(), 1);
        assert!(!timer.is_running());
        timer.destroy();
    }

    #[test]
    fn stop_takes_effect_before_next_sweep() {
        let count = Rc::new(Cell::new(0u32));
        let c = count.clone();
        let timer = Timer::new(move || c.set(c.get() + 1));
        timer.start(10, false);
        timer.stop();
        sweep_at(Instant::now() + Duration::from_millis(50));
        assert_eq!(count.get(), 0);
        timer.destroy();
    }

    #[test]
    fn call_later_drains_on_due_sweep() {
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        call_later(0.0, move || h.set(true));
        sweep_at(Instant::now() + Duration::from_millis(1));
        assert!(hit.get());
    }
}
