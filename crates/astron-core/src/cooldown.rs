//! Per-handler, per-invoker cooldowns.
//!
//! [`CooldownTracker`] stores one expiry timestamp per `(handler, invoker)`
//! pair. Expired entries are removed by a single background sweeper driven by
//! a min-heap of deadlines; overwriting an entry bumps its generation, so the
//! earlier deadline no longer removes it. When no tokio runtime is available
//! the sweeper is never started and expired entries are purged on read.
//!
//! All timestamps are passed in explicitly, which keeps the gate logic
//! deterministic under test.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

type Key = (String, String);

#[derive(Debug, Clone, Copy)]
struct Entry {
    expires_at: Instant,
    generation: u64,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    expires_at: Instant,
    generation: u64,
    key: Key,
}

#[derive(Default)]
struct State {
    entries: HashMap<Key, Entry>,
    schedule: BinaryHeap<Reverse<Scheduled>>,
    next_generation: u64,
}

impl State {
    /// Pops every deadline at or before `now`, removing entries whose
    /// generation still matches. Returns the next pending deadline.
    fn purge_expired(&mut self, now: Instant) -> Option<Instant> {
        while let Some(Reverse(next)) = self.schedule.peek() {
            if next.expires_at > now {
                return Some(next.expires_at);
            }
            let Some(Reverse(due)) = self.schedule.pop() else {
                break;
            };
            if self
                .entries
                .get(&due.key)
                .is_some_and(|entry| entry.generation == due.generation)
            {
                trace!(handler = %due.key.0, invoker = %due.key.1, "Cooldown expired");
                self.entries.remove(&due.key);
            }
        }
        None
    }

    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live_entry(&mut self, key: &Key, now: Instant) -> Option<Entry> {
        let entry = *self.entries.get(key)?;
        if now < entry.expires_at {
            Some(entry)
        } else {
            self.entries.remove(key);
            None
        }
    }
}

struct Shared {
    state: Mutex<State>,
    notify: Notify,
}

/// Tracks which invokers are still cooling down on which handlers.
pub struct CooldownTracker {
    shared: Arc<Shared>,
    sweeper_started: AtomicBool,
    cancel: CancellationToken,
}

impl CooldownTracker {
    /// Creates an empty tracker.
    ///
    /// The sweeper task is started on the first [`record`](Self::record)
    /// made from inside a tokio runtime.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
            }),
            sweeper_started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns `true` if `invoker` is still cooling down on `handler` at `now`.
    pub fn is_blocked(&self, handler: &str, invoker: &str, now: Instant) -> bool {
        let key = (handler.to_string(), invoker.to_string());
        self.shared.state.lock().live_entry(&key, now).is_some()
    }

    /// Time left until `invoker` may use `handler` again; zero if not blocked.
    pub fn remaining(&self, handler: &str, invoker: &str, now: Instant) -> Duration {
        let key = (handler.to_string(), invoker.to_string());
        self.shared
            .state
            .lock()
            .live_entry(&key, now)
            .map(|entry| entry.expires_at.saturating_duration_since(now))
            .unwrap_or_default()
    }

    /// Starts a cooldown of `cooldown` for `invoker` on `handler` at `now`,
    /// replacing any existing one.
    pub fn record(&self, handler: &str, invoker: &str, cooldown: Duration, now: Instant) {
        let key = (handler.to_string(), invoker.to_string());
        let expires_at = now + cooldown;

        {
            let mut state = self.shared.state.lock();
            state.purge_expired(now);
            state.next_generation += 1;
            let generation = state.next_generation;
            state.entries.insert(
                key.clone(),
                Entry {
                    expires_at,
                    generation,
                },
            );
            state.schedule.push(Reverse(Scheduled {
                expires_at,
                generation,
                key,
            }));
        }

        self.ensure_sweeper();
        self.shared.notify.notify_one();
    }

    /// Number of stored entries, including ones not yet swept.
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_sweeper(&self) {
        if self.sweeper_started.load(Ordering::Acquire) {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        if self
            .sweeper_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            handle.spawn(sweep(self.shared.clone(), self.cancel.clone()));
        }
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CooldownTracker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for CooldownTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CooldownTracker")
            .field("entries", &self.len())
            .field("sweeper_started", &self.sweeper_started.load(Ordering::Relaxed))
            .finish()
    }
}

async fn sweep(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        let next = shared.state.lock().purge_expired(Instant::now());
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.notify.notified() => {}
            _ = sleep_until(next) => {}
        }
    }
    trace!("Cooldown sweeper stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
