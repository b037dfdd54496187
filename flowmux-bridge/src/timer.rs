//! Timer bridge: the engine's single polling deadline
//!
//! The engine's contract is "call my action entry point after N
//! milliseconds, or never". One reactor timer realizes it: every new
//! deadline supersedes the previous one by resetting the same sleep, and
//! `None` disarms it. A superseded or cleared deadline never fires
//! stale because the armed flag gates polling entirely.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Deadlines beyond this are clamped; the engine refreshes its deadline
/// on every callback anyway, long before a month passes.
const MAX_DELAY: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// One resettable reactor timer driving the engine's time-based polling
pub(crate) struct TimerBridge {
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl TimerBridge {
    pub(crate) fn new() -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(Duration::ZERO)),
            armed: false,
        }
    }

    /// Arm (or re-arm) the deadline at now + `delay`
    pub(crate) fn set(&mut self, delay: Duration) {
        let delay = delay.min(MAX_DELAY);
        self.sleep.as_mut().reset(Instant::now() + delay);
        self.armed = true;
    }

    /// Disarm the deadline; a pending fire is forgotten
    pub(crate) fn clear(&mut self) {
        self.armed = false;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    /// Wait for the armed deadline to expire
    ///
    /// Completing disarms the timer. Callers must only poll this while
    /// [`TimerBridge::is_armed`] is true; the event pump gates on it.
    pub(crate) async fn fired(&mut self) {
        self.sleep.as_mut().await;
        self.armed = false;
    }
}
