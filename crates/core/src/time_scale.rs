use serde::{Deserialize, Serialize};

/// A closed time interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    pub fn intersects(&self, start: f64, end: f64) -> bool {
        end >= self.start && start <= self.end
    }

    /// Whether `other` lies completely inside this span.
    pub fn covers(&self, other: &TimeSpan) -> bool {
        self.start <= other.start && self.end >= other.end
    }
}

/// Linear mapping between a time span and a horizontal pixel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    span: TimeSpan,
    start_px: f64,
    end_px: f64,
}

impl TimeScale {
    pub fn new(span: TimeSpan, start_px: f64, end_px: f64) -> Self {
        Self {
            span,
            start_px,
            end_px,
        }
    }

    pub fn span(&self) -> TimeSpan {
        self.span
    }

    pub fn width_px(&self) -> f64 {
        self.end_px - self.start_px
    }

    pub fn set_limits_px(&mut self, start_px: f64, end_px: f64) {
        self.start_px = start_px;
        self.end_px = end_px;
    }

    pub fn set_span(&mut self, span: TimeSpan) {
        self.span = span;
    }

    /// Seconds per pixel. Zero when either side is degenerate.
    pub fn resolution(&self) -> f64 {
        let width = self.width_px();
        if width <= 0.0 {
            return 0.0;
        }
        self.span.duration() / width
    }

    pub fn time_to_px(&self, t: f64) -> f64 {
        let duration = self.span.duration();
        if duration <= 0.0 {
            return self.start_px;
        }
        self.start_px + (t - self.span.start) / duration * self.width_px()
    }

    pub fn px_to_time(&self, px: f64) -> f64 {
        let width = self.width_px();
        if width <= 0.0 {
            return self.span.start;
        }
        self.span.start + (px - self.start_px) / width * self.span.duration()
    }

    pub fn delta_time_to_px(&self, dt: f64) -> f64 {
        let duration = self.span.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        dt / duration * self.width_px()
    }

    pub fn delta_px_to_duration(&self, dpx: f64) -> f64 {
        dpx * self.resolution()
    }
}
