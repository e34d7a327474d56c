//! Data-layer snapshots consumed by tracks.
//!
//! A snapshot covers `[start, end]` at a given resolution and holds
//! index-aligned series sorted by start time. Anything a track needs outside
//! the covered span is drawn as loading, never treated as an error.

use lanescope_protocol::SharedStr;
use serde::{Deserialize, Serialize};

use crate::colorizer::SchedState;
use crate::time_scale::TimeSpan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceData {
    pub start: f64,
    pub end: f64,
    pub resolution: f64,
    pub ids: Vec<u64>,
    pub starts: Vec<f64>,
    pub ends: Vec<f64>,
    pub depths: Vec<u32>,
    pub titles: Vec<SharedStr>,
}

impl SliceData {
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn max_depth(&self) -> u32 {
        self.depths.iter().copied().max().unwrap_or(0)
    }

    /// Whether the parallel series have matching lengths.
    pub fn is_aligned(&self) -> bool {
        let n = self.starts.len();
        self.ids.len() == n
            && self.ends.len() == n
            && self.depths.len() == n
            && self.titles.len() == n
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterData {
    pub start: f64,
    pub end: f64,
    pub resolution: f64,
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}

impl CounterData {
    pub fn is_aligned(&self) -> bool {
        self.timestamps.len() == self.values.len()
    }

    /// Value range with zero included, widened when flat.
    pub fn value_range(&self) -> (f64, f64) {
        let (lo, hi) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if !lo.is_finite() || !hi.is_finite() {
            return (0.0, 1.0);
        }
        let (lo, hi) = (lo.min(0.0), hi.max(0.0));
        if lo == hi { (lo, lo + 1.0) } else { (lo, hi) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadStateData {
    pub start: f64,
    pub end: f64,
    pub resolution: f64,
    pub starts: Vec<f64>,
    pub ends: Vec<f64>,
    pub states: Vec<SchedState>,
}

impl ThreadStateData {
    pub fn is_aligned(&self) -> bool {
        self.starts.len() == self.ends.len() && self.starts.len() == self.states.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackData {
    Slices(SliceData),
    Counter(CounterData),
    ThreadState(ThreadStateData),
}

impl TrackData {
    /// Time span the snapshot covers.
    pub fn coverage(&self) -> TimeSpan {
        match self {
            Self::Slices(d) => TimeSpan::new(d.start, d.end),
            Self::Counter(d) => TimeSpan::new(d.start, d.end),
            Self::ThreadState(d) => TimeSpan::new(d.start, d.end),
        }
    }

    pub fn is_aligned(&self) -> bool {
        match self {
            Self::Slices(d) => d.is_aligned(),
            Self::Counter(d) => d.is_aligned(),
            Self::ThreadState(d) => d.is_aligned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_range_includes_zero() {
        let data = CounterData {
            start: 0.0,
            end: 1.0,
            resolution: 0.0,
            timestamps: vec![0.0, 0.5],
            values: vec![3.0, 7.0],
        };
        assert_eq!(data.value_range(), (0.0, 7.0));
    }

    #[test]
    fn flat_counter_range_is_widened() {
        let data = CounterData {
            start: 0.0,
            end: 1.0,
            resolution: 0.0,
            timestamps: vec![0.0],
            values: vec![0.0],
        };
        assert_eq!(data.value_range(), (0.0, 1.0));
    }

    #[test]
    fn snapshot_is_internally_tagged() {
        let json = r#"{"kind":"thread_state","start":0.0,"end":2.0,"resolution":0.001,
            "starts":[0.0],"ends":[1.0],"states":["Running"]}"#;
        let data: Option<TrackData> = serde_json::from_str(json).ok();
        let data = data.unwrap_or_else(|| panic!("snapshot should parse"));
        assert_eq!(data.coverage(), TimeSpan::new(0.0, 2.0));
        assert!(data.is_aligned());
    }

    #[test]
    fn thread_states_parse_kernel_codes() {
        let json = r#"{"start":0.0,"end":4.0,"resolution":0.001,
            "starts":[0.0,1.0,2.0,3.0],"ends":[1.0,2.0,3.0,4.0],
            "states":["Running","R+","DK","I"]}"#;
        let data: ThreadStateData = serde_json::from_str(json).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            data.states,
            [
                SchedState::Running,
                SchedState::Runnable,
                SchedState::Uninterruptible { io: false },
                SchedState::Sleeping,
            ]
        );
        let out = serde_json::to_string(&data.states).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(out, r#"["Running","R","DK","S"]"#);
    }
}
