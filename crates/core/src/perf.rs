//! Frame timing statistics, collected only when `perf_debug` is enabled.

use std::collections::VecDeque;

/// Source of monotonic milliseconds for measuring phase durations.
///
/// The host frame timestamp only marks the start of a frame, so phases are
/// timed with a separate clock the host supplies.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Clock backed by `std::time::Instant`.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct InstantClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for InstantClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Lifetime mean plus a mean over the last `max_buffer_size` samples.
#[derive(Debug, Clone)]
pub struct RunningStatistics {
    count: u64,
    mean: f64,
    last: f64,
    buffer: VecDeque<f64>,
    max_buffer_size: usize,
}

impl RunningStatistics {
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            count: 0,
            mean: 0.0,
            last: 0.0,
            buffer: VecDeque::with_capacity(max_buffer_size),
            max_buffer_size: max_buffer_size.max(1),
        }
    }

    pub fn add_value(&mut self, value: f64) {
        self.last = value;
        if self.buffer.len() == self.max_buffer_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
        self.mean = (self.mean * self.count as f64 + value) / (self.count + 1) as f64;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn buffer_mean(&self) -> f64 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        self.buffer.iter().sum::<f64>() / self.buffer.len() as f64
    }
}

impl Default for RunningStatistics {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Per-phase timings of the frame scheduler.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub actions_ms: RunningStatistics,
    pub relayout_ms: RunningStatistics,
    pub redraw_ms: RunningStatistics,
    pub total_ms: RunningStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_mean_tracks_recent_values() {
        let mut stats = RunningStatistics::new(2);
        stats.add_value(10.0);
        stats.add_value(20.0);
        stats.add_value(30.0);
        assert_eq!(stats.count(), 3);
        assert_eq!(stats.mean(), 20.0);
        assert_eq!(stats.buffer_mean(), 25.0);
        assert_eq!(stats.last(), 30.0);
    }

    #[test]
    fn empty_statistics() {
        let stats = RunningStatistics::default();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.buffer_mean(), 0.0);
    }
}
