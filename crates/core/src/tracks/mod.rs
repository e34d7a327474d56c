//! Concrete panels.
//!
//! Every data track follows the same render contract: checkerboard the part
//! of the visible window its snapshot does not cover, draw only elements that
//! intersect the window (located with the binary-search primitives), keep
//! every element at least `min_rendered_width` wide, and tint hover and
//! selection on a copy of the element's color.

mod counter;
mod group;
mod slice;
mod thread_state;
mod time_axis;

pub use counter::CounterTrack;
pub use group::{GroupHeader, GroupState};
pub use slice::SliceTrack;
pub use thread_state::ThreadStateTrack;
pub use time_axis::TimeAxis;

use lanescope_protocol::{Color, Point, TextAlign, ThemeToken};

use crate::canvas::Canvas;
use crate::checkerboard::{checkerboard, checkerboard_except};
use crate::context::TimelineView;
use crate::search::search;
use crate::time_scale::TimeSpan;

const TITLE_FONT_SIZE: f64 = 10.0;
const HOVER_LIGHTEN: f64 = 10.0;
const SELECTED_DESATURATE: f64 = 30.0;

/// Checkerboard the visible window minus the snapshot's coverage.
fn checkerboard_uncovered(
    canvas: &mut Canvas,
    height: f64,
    view: &TimelineView,
    coverage: Option<TimeSpan>,
) {
    let (start_px, end_px) = view.window_px();
    match coverage {
        Some(covered) => checkerboard_except(
            canvas,
            height,
            start_px,
            end_px,
            view.scale.time_to_px(covered.start),
            view.scale.time_to_px(covered.end),
        ),
        None => checkerboard(canvas, height, start_px, end_px),
    }
}

/// Pixel extent of `[start, end]`, clipped to the visible window and
/// widened to the minimum rendered width.
fn element_px(view: &TimelineView, start: f64, end: f64) -> (f64, f64) {
    let (win_x0, win_x1) = view.window_px();
    let x0 = view.scale.time_to_px(start).max(win_x0);
    let x1 = view.scale.time_to_px(end).min(win_x1);
    (x0, (x1 - x0).max(view.min_rendered_width))
}

/// Index range of non-overlapping intervals (`starts` and `ends` both
/// sorted) that intersect the visible window.
fn visible_range(starts: &[f64], ends: &[f64], window: TimeSpan) -> std::ops::Range<usize> {
    let first = search(ends, window.start).map_or(0, |i| i + 1);
    let last = search(starts, window.end).map_or(0, |i| i + 1);
    first..last.max(first)
}

/// Interval under time `t`, allowing for the minimum rendered width.
fn interval_at(
    starts: &[f64],
    ends: &[f64],
    t: f64,
    min_duration: f64,
) -> Option<usize> {
    let i = search(starts, t)?;
    let end = ends.get(i).copied()?;
    (t <= end.max(starts[i] + min_duration)).then_some(i)
}

fn hover_tint(color: &Color) -> Color {
    color.clone().lighten(HOVER_LIGHTEN)
}

fn selected_tint(color: &Color) -> Color {
    color.clone().desaturate(SELECTED_DESATURATE)
}

fn draw_title(canvas: &mut Canvas, title: &str) {
    canvas.text(
        Point::new(4.0, TITLE_FONT_SIZE + 2.0),
        title,
        ThemeToken::TextSecondary,
        TITLE_FONT_SIZE,
        TextAlign::Left,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_range_skips_intervals_outside_window() {
        let starts = [0.0, 2.0, 4.0, 6.0, 8.0];
        let ends = [1.0, 3.0, 5.0, 7.0, 9.0];
        assert_eq!(visible_range(&starts, &ends, TimeSpan::new(2.5, 6.5)), 1..4);
        assert_eq!(visible_range(&starts, &ends, TimeSpan::new(9.5, 10.0)), 5..5);
        assert_eq!(visible_range(&starts, &ends, TimeSpan::new(-2.0, -1.0)), 0..0);
    }

    #[test]
    fn interval_at_honours_min_duration() {
        let starts = [0.0, 10.0];
        let ends = [0.001, 11.0];
        assert_eq!(interval_at(&starts, &ends, 0.5, 0.0), None);
        assert_eq!(interval_at(&starts, &ends, 0.5, 1.0), Some(0));
        assert_eq!(interval_at(&starts, &ends, 10.5, 0.0), Some(1));
        assert_eq!(interval_at(&starts, &ends, -1.0, 0.0), None);
    }

    #[test]
    fn element_width_has_a_floor() {
        let view = TimelineView::new(TimeSpan::new(0.0, 1000.0), 100.0);
        let (x, w) = element_px(&view, 10.0, 10.001);
        assert_eq!(x, 1.0);
        assert_eq!(w, 1.0);
    }
}
