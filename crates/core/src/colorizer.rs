//! Deterministic color assignment for threads, CPUs, slices and scheduling
//! states.
//!
//! All accessors return an owned [`Color`]; callers tint their copy for
//! hover and selection without affecting the palette.

use lanescope_protocol::Color;
use serde::{Deserialize, Serialize};

/// Material-style palette that hashed identities are folded into.
const MD_PALETTE: [Color; 18] = [
    Color::hsl("red", 4.0, 90.0, 58.0),
    Color::hsl("pink", 340.0, 82.0, 52.0),
    Color::hsl("purple", 291.0, 64.0, 42.0),
    Color::hsl("deep purple", 262.0, 52.0, 47.0),
    Color::hsl("indigo", 231.0, 48.0, 48.0),
    Color::hsl("blue", 207.0, 90.0, 54.0),
    Color::hsl("light blue", 199.0, 98.0, 48.0),
    Color::hsl("cyan", 187.0, 100.0, 42.0),
    Color::hsl("teal", 174.0, 100.0, 29.0),
    Color::hsl("green", 122.0, 39.0, 49.0),
    Color::hsl("light green", 88.0, 50.0, 53.0),
    Color::hsl("lime", 66.0, 70.0, 54.0),
    Color::hsl("amber", 45.0, 100.0, 51.0),
    Color::hsl("orange", 36.0, 100.0, 50.0),
    Color::hsl("deep orange", 14.0, 100.0, 57.0),
    Color::hsl("brown", 16.0, 25.0, 38.0),
    Color::hsl("blue gray", 200.0, 18.0, 46.0),
    Color::hsl("yellow", 54.0, 100.0, 62.0),
];

const GREY: Color = Color::hsl("grey", 0.0, 0.0, 62.0);

const RUNNING: Color = Color::hsl("dark green", 120.0, 44.0, 34.0);
const RUNNABLE: Color = Color::hsl("lime green", 75.0, 55.0, 47.0);
const UNINTERRUPTIBLE_IO: Color = Color::hsl("orange", 36.0, 100.0, 50.0);
const UNINTERRUPTIBLE: Color = Color::hsl("desat red", 3.0, 30.0, 49.0);
const SLEEPING: Color = Color::hsl("light grey", 0.0, 0.0, 85.0);
const OTHER_STATE: Color = Color::hsl("indigo", 231.0, 48.0, 48.0);

/// FNV-1a over `bytes`, folded into `[0, max)`.
fn hash(bytes: &[u8], max: usize) -> usize {
    let mut hash: u32 = 0x811c_9dc5 & 0x0fff_ffff;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash as usize % max
}

/// Palette color for a numeric identity (thread id, process id, ...).
pub fn color_for_tid(tid: i64) -> Color {
    let idx = hash(tid.to_string().as_bytes(), MD_PALETTE.len());
    MD_PALETTE[idx].clone()
}

/// Palette color for a slice title; equal names share a hue.
pub fn color_for_slice(name: &str) -> Color {
    MD_PALETTE[hash(name.as_bytes(), MD_PALETTE.len())].clone()
}

/// Identity of a thread as far as coloring is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDesc {
    pub tid: i64,
    pub pid: Option<i64>,
}

/// Color for a thread, grouped by process when the pid is known so sibling
/// threads share a hue. Grey when there is no thread.
pub fn color_for_thread(thread: Option<&ThreadDesc>) -> Color {
    match thread {
        None => GREY.clone(),
        Some(t) => color_for_tid(t.pid.unwrap_or(t.tid)),
    }
}

/// Hue in degrees for a CPU index. Adjacent CPUs get related but distinct
/// hues.
pub fn hue_for_cpu(cpu: u32) -> u32 {
    ((128 + 32 * u64::from(cpu)) % 256) as u32
}

/// Scheduling state categories with fixed, application-wide colors.
///
/// Serialized as kernel state codes, so snapshots can carry the raw
/// scheduler values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SchedState {
    Running,
    Runnable,
    /// Uninterruptible sleep; `io` when blocked on I/O.
    Uninterruptible { io: bool },
    Sleeping,
    Other,
}

impl SchedState {
    /// Parse a kernel scheduler state code (`R`, `R+`, `D`, `DK`, `S`, ...).
    ///
    /// Unknown codes map to [`SchedState::Other`].
    pub fn from_code(code: &str) -> Self {
        match code {
            "Running" => Self::Running,
            "R" | "R+" => Self::Runnable,
            "D" => Self::Uninterruptible { io: true },
            "DK" | "DW" => Self::Uninterruptible { io: false },
            "S" | "I" => Self::Sleeping,
            _ => Self::Other,
        }
    }

    /// Canonical code; [`SchedState::from_code`] maps it back.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Runnable => "R",
            Self::Uninterruptible { io: true } => "D",
            Self::Uninterruptible { io: false } => "DK",
            Self::Sleeping => "S",
            Self::Other => "?",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Runnable => "Runnable",
            Self::Uninterruptible { io: true } => "Uninterruptible Sleep",
            Self::Uninterruptible { io: false } => "Uninterruptible Sleep (non-IO)",
            Self::Sleeping => "Sleeping",
            Self::Other => "Unknown",
        }
    }
}

impl From<String> for SchedState {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<SchedState> for String {
    fn from(state: SchedState) -> Self {
        state.code().to_string()
    }
}

/// Fixed color for a scheduling state. Not hashed: the same state must look
/// the same everywhere.
pub fn color_for_state(state: SchedState) -> Color {
    match state {
        SchedState::Running => RUNNING,
        SchedState::Runnable => RUNNABLE,
        SchedState::Uninterruptible { io: true } => UNINTERRUPTIBLE_IO,
        SchedState::Uninterruptible { io: false } => UNINTERRUPTIBLE,
        SchedState::Sleeping => SLEEPING,
        SchedState::Other => OTHER_STATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tid_color_is_an_independent_copy() {
        let a = color_for_tid(1234);
        let mut b = color_for_tid(1234);
        assert_eq!(a, b);
        b = b.lighten(30.0);
        assert_ne!(a, b);
        // The palette itself is untouched by the caller's tint.
        assert_eq!(color_for_tid(1234), a);
    }

    #[test]
    fn tid_color_is_deterministic_and_in_palette() {
        for tid in [0, 1, 2, 99, 4096, -7] {
            let c = color_for_tid(tid);
            assert_eq!(c, color_for_tid(tid));
            assert!(MD_PALETTE.contains(&c));
            assert!((0.0..360.0).contains(&c.h));
            assert!((0.0..=100.0).contains(&c.s));
            assert!((0.0..=100.0).contains(&c.l));
        }
    }

    #[test]
    fn hash_spreads_ids() {
        let distinct: std::collections::HashSet<_> = (0..64)
            .map(|tid| color_for_tid(tid).name.into_owned())
            .collect();
        assert!(distinct.len() > 4, "only {} hues for 64 ids", distinct.len());
    }

    #[test]
    fn thread_color_prefers_pid() {
        let a = ThreadDesc { tid: 10, pid: Some(3) };
        let b = ThreadDesc { tid: 11, pid: Some(3) };
        assert_eq!(color_for_thread(Some(&a)), color_for_thread(Some(&b)));
        let orphan = ThreadDesc { tid: 42, pid: None };
        assert_eq!(color_for_thread(Some(&orphan)), color_for_tid(42));
        assert_eq!(color_for_thread(None).name, "grey");
    }

    #[test]
    fn cpu_hues() {
        assert_eq!(hue_for_cpu(0), 128);
        assert_eq!(hue_for_cpu(1), 160);
        assert_eq!(hue_for_cpu(4), 0);
        assert_eq!(hue_for_cpu(5), 32);
        assert_eq!(hue_for_cpu(u32::MAX), 96);
    }

    #[test]
    fn state_colors_are_fixed() {
        assert_eq!(color_for_state(SchedState::Running).name, "dark green");
        assert_eq!(color_for_state(SchedState::from_code("R+")), RUNNABLE);
        assert_eq!(
            color_for_state(SchedState::from_code("D")),
            color_for_state(SchedState::Uninterruptible { io: true })
        );
        assert_eq!(SchedState::from_code("Z"), SchedState::Other);
        assert_eq!(SchedState::from_code("S").label(), "Sleeping");
    }
}
