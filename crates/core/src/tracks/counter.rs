use std::rc::Rc;

use lanescope_protocol::{Point, Rect, SharedStr, Size, TextAlign, ThemeToken};

use super::{checkerboard_uncovered, draw_title, element_px, hover_tint};
use crate::canvas::Canvas;
use crate::colorizer::color_for_slice;
use crate::context::TimelineView;
use crate::data::{CounterData, TrackData};
use crate::panel::Panel;
use crate::search::{search, search_segment};
use crate::time_scale::TimeSpan;

const TRACK_HEIGHT: f64 = 40.0;
const PADDING_TOP: f64 = 14.0;
const PADDING_BOTTOM: f64 = 2.0;
const VALUE_FONT_SIZE: f64 = 10.0;

/// A counter drawn as a step chart: each sample holds until the next one.
pub struct CounterTrack {
    id: SharedStr,
    title: SharedStr,
    hovered: Option<usize>,
}

impl CounterTrack {
    pub fn new(id: impl Into<SharedStr>, title: impl Into<SharedStr>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            hovered: None,
        }
    }

    /// Index of the sample under the pointer.
    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    fn snapshot(&self, view: &TimelineView) -> Option<Rc<TrackData>> {
        view.track_data(&self.id)
            .filter(|data| matches!(**data, TrackData::Counter(_)))
    }
}

/// Sample ids whose step intersects the window. The sample at or before the
/// window start is included since its step extends into the window.
fn visible_samples(timestamps: &[f64], window: TimeSpan) -> std::ops::Range<usize> {
    let first = search(timestamps, window.start).unwrap_or(0);
    let last = search(timestamps, window.end).map_or(0, |i| i + 1);
    first..last.max(first)
}

fn format_value(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.2}G", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

impl Panel for CounterTrack {
    fn height(&self) -> f64 {
        TRACK_HEIGHT
    }

    fn render_canvas(&mut self, canvas: &mut Canvas, size: Size, view: &TimelineView) {
        let data = self.snapshot(view);
        let counter = match data.as_deref() {
            Some(TrackData::Counter(counter)) => Some(counter),
            _ => None,
        };
        checkerboard_uncovered(
            canvas,
            size.height,
            view,
            counter.map(|c| TimeSpan::new(c.start, c.end)),
        );
        draw_title(canvas, &self.title);
        let Some(counter) = counter else {
            return;
        };

        let (lo, hi) = counter.value_range();
        let chart_height = (size.height - PADDING_TOP - PADDING_BOTTOM).max(0.0);
        let y_of = |v: f64| PADDING_TOP + (hi - v) / (hi - lo) * chart_height;
        let zero_y = y_of(0.0);
        let base = color_for_slice(&self.title);

        for i in visible_samples(&counter.timestamps, view.window) {
            let seg_end = counter
                .timestamps
                .get(i + 1)
                .copied()
                .unwrap_or(counter.end);
            let (x, w) = element_px(view, counter.timestamps[i], seg_end);
            let y = y_of(counter.values[i]);
            let color = if self.hovered == Some(i) {
                hover_tint(&base)
            } else {
                base.clone()
            };
            canvas.fill_rect(Rect::new(x, y.min(zero_y), w, (zero_y - y).abs()), color);
            canvas.line(Point::new(x, y), Point::new(x + w, y), ThemeToken::CounterLine, 1.0);
        }

        if let Some(i) = self.hovered
            && let Some(value) = counter.values.get(i)
        {
            canvas.text(
                Point::new(size.width - 4.0, PADDING_TOP - 3.0),
                format_value(*value),
                ThemeToken::TextPrimary,
                VALUE_FONT_SIZE,
                TextAlign::Right,
            );
        }
    }

    fn on_mouse_move(&mut self, pos: Point, view: &TimelineView) {
        let data = self.snapshot(view);
        self.hovered = match data.as_deref() {
            Some(TrackData::Counter(counter)) => sample_at(counter, view.scale.px_to_time(pos.x)),
            _ => None,
        };
    }

    fn on_mouse_out(&mut self) {
        self.hovered = None;
    }
}

fn sample_at(counter: &CounterData, t: f64) -> Option<usize> {
    if t > counter.end {
        return None;
    }
    search_segment(&counter.timestamps, t).0
}

#[cfg(test)]
mod tests {
    use lanescope_protocol::{Paint, RenderCommand};

    use super::*;

    fn data() -> TrackData {
        TrackData::Counter(CounterData {
            start: 0.0,
            end: 100.0,
            resolution: 0.1,
            timestamps: vec![0.0, 20.0, 50.0, 80.0],
            values: vec![10.0, 30.0, 0.0, 20.0],
        })
    }

    fn step_rects(canvas: &Canvas) -> Vec<Rect> {
        canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawRect {
                    rect,
                    color: Paint::Color(_),
                    ..
                } => Some(*rect),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn draws_steps_touching_the_window() {
        let view = TimelineView::new(TimeSpan::new(25.0, 65.0), 400.0).with_track_data("c", data());
        let mut track = CounterTrack::new("c", "mem");
        let mut canvas = Canvas::new();
        track.render_canvas(&mut canvas, Size::new(400.0, TRACK_HEIGHT), &view);
        // The step starting at 20 reaches into the window; the one at 80 does not.
        let rects = step_rects(&canvas);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].x, 0.0);
        assert_eq!(rects[1].x, 250.0);
    }

    #[test]
    fn tallest_step_reaches_the_top_of_the_chart() {
        let view = TimelineView::new(TimeSpan::new(0.0, 100.0), 100.0).with_track_data("c", data());
        let mut track = CounterTrack::new("c", "mem");
        let mut canvas = Canvas::new();
        track.render_canvas(&mut canvas, Size::new(100.0, TRACK_HEIGHT), &view);
        let rects = step_rects(&canvas);
        assert_eq!(rects[1].y, PADDING_TOP);
        assert_eq!(rects[1].bottom(), TRACK_HEIGHT - PADDING_BOTTOM);
    }

    #[test]
    fn hover_picks_the_sample_holding_at_the_pointer() {
        let view = TimelineView::new(TimeSpan::new(0.0, 100.0), 100.0).with_track_data("c", data());
        let mut track = CounterTrack::new("c", "mem");
        track.on_mouse_move(Point::new(55.0, 20.0), &view);
        assert_eq!(track.hovered(), Some(2));

        let mut canvas = Canvas::new();
        track.render_canvas(&mut canvas, Size::new(100.0, TRACK_HEIGHT), &view);
        assert!(canvas.commands().iter().any(|c| matches!(
            c,
            RenderCommand::DrawText { text, .. } if text == "0"
        )));

        track.on_mouse_out();
        assert_eq!(track.hovered(), None);
    }

    #[test]
    fn values_are_abbreviated() {
        assert_eq!(format_value(12.0), "12");
        assert_eq!(format_value(0.5), "0.50");
        assert_eq!(format_value(2_500.0), "2.50K");
        assert_eq!(format_value(3_000_000.0), "3.00M");
    }
}
