/// After a long stall (backgrounded tab, suspended process) the timer skips
/// ahead instead of bursting out every tick it missed.
pub const MAX_CATCH_UP_TICKS: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Clone, Copy, Debug)]
struct ActiveInterval {
    handle: TimerHandle,
    interval_ms: f64,
    next_due_ms: f64,
}

/// Coarse fixed-rate repeating timer driven by a caller-supplied clock in
/// milliseconds. At most one interval is live; arming again replaces it.
#[derive(Debug, Default)]
pub struct IntervalTimer {
    next_handle: u64,
    active: Option<ActiveInterval>,
}

impl IntervalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start repeating every `interval_ms`, first firing one interval after `now_ms`.
    pub fn arm(&mut self, interval_ms: f64, now_ms: f64) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.active = Some(ActiveInterval {
            handle,
            interval_ms,
            next_due_ms: now_ms + interval_ms,
        });
        handle
    }

    /// Cancelling a stale or already-cancelled handle does nothing.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.active {
            Some(active) if active.handle == handle => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.active.is_some()
    }

    pub fn interval_ms(&self) -> Option<f64> {
        self.active.map(|a| a.interval_ms)
    }

    pub fn next_due_ms(&self) -> Option<f64> {
        self.active.map(|a| a.next_due_ms)
    }

    /// Number of ticks that came due at or before `now_ms`.
    pub fn poll(&mut self, now_ms: f64) -> u32 {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };
        let mut fired = 0;
        while active.next_due_ms <= now_ms {
            fired += 1;
            active.next_due_ms += active.interval_ms;
            if fired == MAX_CATCH_UP_TICKS {
                if active.next_due_ms <= now_ms {
                    let behind = ((now_ms - active.next_due_ms) / active.interval_ms).floor() + 1.0;
                    active.next_due_ms += behind * active.interval_ms;
                }
                break;
            }
        }
        fired
    }
}
