//! Trailing debounce and leading-edge rate limiting driven by frame time.
//!
//! Both types own their pending value and deadline; nothing fires unless the
//! owner polls with the current time, and `cancel` drops pending work
//! synchronously.

/// Emits the latest value once no new value arrived for `delay_ms`.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay_ms: f64,
    pending: Option<(T, f64)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: f64) -> Self {
        Self {
            delay_ms: delay_ms.max(0.0),
            pending: None,
        }
    }

    /// Replace the pending value and restart the quiet period.
    pub fn call(&mut self, value: T, now_ms: f64) {
        self.pending = Some((value, now_ms + self.delay_ms));
    }

    /// Take the pending value if its quiet period has elapsed.
    pub fn poll(&mut self, now_ms: f64) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if now_ms >= *deadline => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Fires immediately when idle, then at most once per `interval_ms` with the
/// most recent value seen during the interval.
#[derive(Debug, Clone)]
pub struct RateLimiter<T> {
    interval_ms: f64,
    last_fire: Option<f64>,
    trailing: Option<T>,
}

impl<T> RateLimiter<T> {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms: interval_ms.max(0.0),
            last_fire: None,
            trailing: None,
        }
    }

    /// Offer a value. Returns it back when it may be emitted right away,
    /// otherwise keeps it as the trailing value.
    pub fn call(&mut self, value: T, now_ms: f64) -> Option<T> {
        if self.ready(now_ms) {
            self.last_fire = Some(now_ms);
            self.trailing = None;
            Some(value)
        } else {
            self.trailing = Some(value);
            None
        }
    }

    /// Emit the trailing value once the interval has elapsed.
    pub fn poll(&mut self, now_ms: f64) -> Option<T> {
        if self.trailing.is_some() && self.ready(now_ms) {
            self.last_fire = Some(now_ms);
            return self.trailing.take();
        }
        None
    }

    pub fn cancel(&mut self) {
        self.trailing = None;
    }

    pub fn is_pending(&self) -> bool {
        self.trailing.is_some()
    }

    fn ready(&self, now_ms: f64) -> bool {
        match self.last_fire {
            None => true,
            Some(last) => now_ms - last >= self.interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debouncer_emits_latest_after_quiet_period() {
        let mut d = Debouncer::new(100.0);
        d.call(1, 0.0);
        d.call(2, 50.0);
        assert_eq!(d.poll(120.0), None, "second call restarted the timer");
        assert!(d.is_pending());
        assert_eq!(d.poll(150.0), Some(2));
        assert!(!d.is_pending());
        assert_eq!(d.poll(500.0), None);
    }

    #[test]
    fn debouncer_cancel_drops_value() {
        let mut d = Debouncer::new(10.0);
        d.call("x", 0.0);
        d.cancel();
        assert_eq!(d.poll(100.0), None);
        assert!(!d.is_pending());
    }

    #[test]
    fn rate_limiter_leading_then_trailing() {
        let mut r = RateLimiter::new(50.0);
        assert_eq!(r.call(1, 0.0), Some(1));
        assert_eq!(r.call(2, 10.0), None);
        assert_eq!(r.call(3, 20.0), None);
        assert!(r.is_pending());
        assert_eq!(r.poll(40.0), None);
        assert_eq!(r.poll(50.0), Some(3));
        // Interval restarts from the trailing fire.
        assert_eq!(r.call(4, 70.0), None);
        assert_eq!(r.call(5, 100.0), Some(5));
        assert!(!r.is_pending());
    }

    #[test]
    fn rate_limiter_cancel() {
        let mut r = RateLimiter::new(50.0);
        r.call(1, 0.0);
        r.call(2, 1.0);
        r.cancel();
        assert_eq!(r.poll(100.0), None);
    }
}
