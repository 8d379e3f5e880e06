use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub type EventBits = u32;

pub const BIT0: EventBits = 1 << 0;
pub const BIT1: EventBits = 1 << 1;
pub const BIT3: EventBits = 1 << 3;

/// PPP link is up and has an IP address
pub const CONNECT_BIT: EventBits = BIT0;
/// PPP session has been torn down
pub const STOP_BIT: EventBits = BIT1;
/// MQTT subscription to the test topic is acknowledged
pub const SUBSCRIBED_BIT: EventBits = BIT3;

/// A set of boolean flags that callbacks set and a single task waits on.
///
/// Mirrors a FreeRTOS event group: `set` and `clear` are atomic with respect
/// to each other, and `wait_bits` blocks until the requested pattern appears.
#[derive(Debug, Default)]
pub struct EventGroup {
    bits: Mutex<EventBits>,
    changed: Condvar,
}

impl EventGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `mask` and wakes any waiter. Returns the bits after the update.
    pub fn set(&self, mask: EventBits) -> EventBits {
        let mut bits = self.bits.lock().unwrap_or_else(|e| e.into_inner());
        *bits |= mask;
        self.changed.notify_all();
        *bits
    }

    /// Clears `mask`. Returns the bits before the update.
    pub fn clear(&self, mask: EventBits) -> EventBits {
        let mut bits = self.bits.lock().unwrap_or_else(|e| e.into_inner());
        let previous = *bits;
        *bits &= !mask;
        previous
    }

    pub fn get(&self) -> EventBits {
        *self.bits.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until the bits in `mask` are set (all of them when
    /// `wait_for_all`, any of them otherwise) or `timeout` elapses.
    ///
    /// `None` waits forever. Returns the bits observed when the wait ended;
    /// on timeout the caller checks them against `mask` itself. When the
    /// condition was met and `clear_on_exit` is true, the bits in `mask` are
    /// cleared before returning.
    pub fn wait_bits(
        &self,
        mask: EventBits,
        clear_on_exit: bool,
        wait_for_all: bool,
        timeout: Option<Duration>,
    ) -> EventBits {
        let satisfied = |bits: EventBits| {
            if wait_for_all {
                bits & mask == mask
            } else {
                bits & mask != 0
            }
        };

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut bits = self.bits.lock().unwrap_or_else(|e| e.into_inner());

        while !satisfied(*bits) {
            match deadline {
                None => {
                    bits = self.changed.wait(bits).unwrap_or_else(|e| e.into_inner());
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return *bits;
                    }
                    bits = self
                        .changed
                        .wait_timeout(bits, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0;
                }
            }
        }

        let observed = *bits;
        if clear_on_exit {
            *bits &= !mask;
        }
        observed
    }
}
