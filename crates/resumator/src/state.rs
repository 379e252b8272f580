use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Shared state for one watchdog instance.
///
/// Single-threaded cooperative scheduling makes the sharing here trivially
/// safe, but the accessors keep it correct even when the embedder runs the
/// tasks on a multi-threaded runtime. `active` changes only through
/// [`ScriptState::toggle`]/[`ScriptState::set_active`] (driven by the toggle
/// control), and `last_action` only through [`ScriptState::record_action`]
/// after a successful recovery click.
#[derive(Debug)]
pub struct ScriptState {
    active: AtomicBool,
    last_action: Mutex<Option<Instant>>,
}

impl Default for ScriptState {
    fn default() -> Self {
        // The watchdog starts armed, matching user expectations for a tool
        // whose whole job is unattended recovery.
        Self {
            active: AtomicBool::new(true),
            last_action: Mutex::new(None),
        }
    }
}

impl ScriptState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    /// Flip the active flag, returning the new value.
    pub fn toggle(&self) -> bool {
        // fetch_xor(true) flips the flag atomically and returns the old value
        !self.active.fetch_xor(true, Ordering::Relaxed)
    }

    /// Record that a recovery action was taken at `now`.
    pub fn record_action(&self, now: Instant) {
        *self.last_action.lock().expect("state lock poisoned") = Some(now);
    }

    pub fn last_action(&self) -> Option<Instant> {
        *self.last_action.lock().expect("state lock poisoned")
    }

    /// Whether `now` still falls inside the cooldown window after the last
    /// recorded action.
    pub fn in_cooldown(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_action() {
            Some(last) => now.duration_since(last) < cooldown,
            None => false,
        }
    }
}
