use std::time::Duration;
use web_time::Instant;

struct Pending<T> {
    value: T,
    due: Instant,
    seq: u64,
}

/// Holds at most one pending value and releases it once the window has
/// passed without another [`schedule`](Debouncer::schedule).
///
/// Every schedule bumps a sequence number, so a response to an older request
/// can be recognized with [`is_latest`](Debouncer::is_latest) and dropped.
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<Pending<T>>,
    seq: u64,
}

impl<T> Debouncer<T> {
    /// Debouncer with a fixed quiescence window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            seq: 0,
        }
    }

    /// Quiescence window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replaces the pending value and restarts the window. Returns the new
    /// sequence number.
    pub fn schedule(&mut self, value: T, now: Instant) -> u64 {
        self.seq += 1;
        self.pending = Some(Pending {
            value,
            due: now + self.window,
            seq: self.seq,
        });
        self.seq
    }

    /// Takes the pending value when its window has closed.
    pub fn poll(&mut self, now: Instant) -> Option<(u64, T)> {
        if self.pending.as_ref().is_some_and(|pending| pending.due <= now) {
            return self.pending.take().map(|pending| (pending.seq, pending.value));
        }
        None
    }

    /// When the pending value becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.due)
    }

    /// Whether a value waits for its window.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether `seq` is the most recent schedule.
    pub fn is_latest(&self, seq: u64) -> bool {
        seq == self.seq
    }

    /// Drops the pending value without releasing it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

impl<T> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("window", &self.window)
            .field("pending", &self.is_pending())
            .field("seq", &self.seq)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_after_quiet_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.schedule("a", start);
        assert_eq!(debouncer.poll(start + Duration::from_millis(99)), None);
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(100)),
            Some((1, "a"))
        );
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn reschedule_restarts_window_and_keeps_latest() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.schedule("a", start);
        let seq = debouncer.schedule("b", start + Duration::from_millis(60));

        assert_eq!(debouncer.poll(start + Duration::from_millis(120)), None);
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(160)),
            Some((seq, "b"))
        );
        assert!(debouncer.is_latest(seq));
        assert!(!debouncer.is_latest(seq - 1));
    }
}
