use lanescope_protocol::{Point, Rect, Size, TextAlign, ThemeToken};

use super::element_px;
use crate::canvas::Canvas;
use crate::context::TimelineView;
use crate::panel::Panel;

const AXIS_HEIGHT: f64 = 24.0;
const MAJOR_TICK_HEIGHT: f64 = 10.0;
const MEDIUM_TICK_HEIGHT: f64 = 6.0;
const MINOR_TICK_HEIGHT: f64 = 3.0;
const FONT_SIZE: f64 = 10.0;
const LABEL_Y: f64 = 12.0;
const MIN_MAJOR_SPACING_PX: f64 = 80.0;

/// Time ruler pinned above the tracks. Also shows the hover cursor and the
/// extent of the area selection.
#[derive(Debug, Default)]
pub struct TimeAxis;

impl TimeAxis {
    pub fn new() -> Self {
        Self
    }
}

impl Panel for TimeAxis {
    fn height(&self) -> f64 {
        AXIS_HEIGHT
    }

    fn render_canvas(&mut self, canvas: &mut Canvas, size: Size, view: &TimelineView) {
        canvas.fill_bordered(
            Rect::new(0.0, 0.0, size.width, size.height),
            ThemeToken::LaneHeaderBackground,
            ThemeToken::LaneBorder,
        );

        if let Some(selection) = &view.selection
            && view.window.intersects(selection.start, selection.end)
        {
            let (x, w) = element_px(view, selection.start, selection.end);
            canvas.fill_rect(Rect::new(x, 0.0, w, size.height), ThemeToken::SelectionFill);
        }

        draw_ticks(canvas, size, view);

        if let Some(ts) = view.hovered_ts
            && view.window.contains(ts)
        {
            let x = view.scale.time_to_px(ts);
            canvas.line(
                Point::new(x, 0.0),
                Point::new(x, size.height),
                ThemeToken::HoverCursor,
                1.0,
            );
        }
    }
}

fn draw_ticks(canvas: &mut Canvas, size: Size, view: &TimelineView) {
    let window = view.window;
    let width = view.scale.width_px();
    if window.duration() <= 0.0 || width <= 0.0 {
        return;
    }
    let (major, subdivisions) = nice_interval(window.duration(), width);
    // Two minor ticks per medium tick.
    let per_major = i64::from(subdivisions) * 2;
    let minor = major / per_major as f64;

    let first = (window.start / minor).ceil() as i64;
    let last = (window.end / minor).floor() as i64;
    for k in first..=last {
        let t = k as f64 * minor;
        let x = view.scale.time_to_px(t);
        if k.rem_euclid(per_major) == 0 {
            canvas.line(
                Point::new(x, size.height - MAJOR_TICK_HEIGHT),
                Point::new(x, size.height),
                ThemeToken::LaneBorder,
                1.0,
            );
            canvas.text(
                Point::new(x + 3.0, LABEL_Y),
                format_time_label(t),
                ThemeToken::TextPrimary,
                FONT_SIZE,
                TextAlign::Left,
            );
        } else {
            let tick = if k.rem_euclid(2) == 0 {
                MEDIUM_TICK_HEIGHT
            } else {
                MINOR_TICK_HEIGHT
            };
            canvas.line(
                Point::new(x, size.height - tick),
                Point::new(x, size.height),
                ThemeToken::TextMuted,
                0.5,
            );
        }
    }
}

/// Major tick interval in seconds on a 1-2-5 sequence, aiming for one
/// major tick per `MIN_MAJOR_SPACING_PX`. Returns (interval, subdivisions).
fn nice_interval(duration: f64, width_px: f64) -> (f64, u32) {
    let target_count = (width_px / MIN_MAJOR_SPACING_PX).max(2.0);
    let raw = duration / target_count;
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    if normalized <= 1.0 {
        (magnitude, 2)
    } else if normalized <= 2.0 {
        (2.0 * magnitude, 2)
    } else if normalized <= 5.0 {
        (5.0 * magnitude, 5)
    } else {
        (10.0 * magnitude, 2)
    }
}

/// Format a timestamp in seconds as a human-readable label.
fn format_time_label(seconds: f64) -> String {
    let abs = seconds.abs();
    if abs == 0.0 {
        "0s".to_string()
    } else if abs >= 60.0 {
        let mins = (seconds / 60.0).trunc();
        let secs = seconds - mins * 60.0;
        format!("{mins:.0}m{:.1}s", secs.abs())
    } else if abs >= 1.0 {
        format!("{seconds:.3}s")
    } else if abs >= 1e-3 {
        format!("{:.2}ms", seconds * 1e3)
    } else if abs >= 1e-6 {
        format!("{:.1}µs", seconds * 1e6)
    } else {
        format!("{:.0}ns", seconds * 1e9)
    }
}

#[cfg(test)]
mod tests {
    use lanescope_protocol::{Paint, RenderCommand};

    use super::*;
    use crate::selection::AreaSelection;
    use crate::time_scale::TimeSpan;

    fn render(view: &TimelineView) -> Canvas {
        let mut canvas = Canvas::new();
        TimeAxis::new().render_canvas(&mut canvas, Size::new(800.0, AXIS_HEIGHT), view);
        canvas
    }

    #[test]
    fn nice_interval_selects_reasonable_value() {
        // 1 second over 800px: about ten majors.
        let (interval, _subs) = nice_interval(1.0, 800.0);
        assert!((0.05..=0.2).contains(&interval), "interval={interval}");
        let (interval, subs) = nice_interval(30.0, 800.0);
        assert_eq!((interval, subs), (5.0, 5));
    }

    #[test]
    fn renders_labelled_major_ticks() {
        let view = TimelineView::new(TimeSpan::new(0.0, 1.0), 800.0);
        let canvas = render(&view);
        let labels: Vec<String> = canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawText { text, .. } => Some(text.to_string()),
                _ => None,
            })
            .collect();
        assert!(labels.len() >= 10, "labels={labels:?}");
        assert_eq!(labels[0], "0s");
        assert_eq!(labels[1], "100.00ms");
    }

    #[test]
    fn shows_hover_cursor_and_selection_extent() {
        let mut view = TimelineView::new(TimeSpan::new(0.0, 1.0), 800.0);
        view.hovered_ts = Some(0.5);
        view.selection = AreaSelection::new(0.25, 0.5, Vec::new(), 1).ok();
        let canvas = render(&view);

        let cursor = canvas.commands().iter().find_map(|c| match c {
            RenderCommand::DrawLine {
                from,
                color: Paint::Token(ThemeToken::HoverCursor),
                ..
            } => Some(from.x),
            _ => None,
        });
        assert_eq!(cursor, Some(400.0));

        let extent = canvas.commands().iter().find_map(|c| match c {
            RenderCommand::DrawRect {
                rect,
                color: Paint::Token(ThemeToken::SelectionFill),
                ..
            } => Some((rect.x, rect.w)),
            _ => None,
        });
        assert_eq!(extent, Some((200.0, 200.0)));
    }

    #[test]
    fn format_labels() {
        assert_eq!(format_time_label(0.0005), "500.0µs");
        assert_eq!(format_time_label(0.0015), "1.50ms");
        assert_eq!(format_time_label(1.5), "1.500s");
        assert_eq!(format_time_label(90.0), "1m30.0s");
    }
}
