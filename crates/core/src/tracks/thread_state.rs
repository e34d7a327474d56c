use std::rc::Rc;

use lanescope_protocol::{Point, Rect, SharedStr, Size, TextAlign, ThemeToken};

use super::{
    checkerboard_uncovered, draw_title, element_px, hover_tint, interval_at, visible_range,
};
use crate::canvas::Canvas;
use crate::colorizer::{SchedState, color_for_state};
use crate::context::TimelineView;
use crate::data::TrackData;
use crate::panel::Panel;
use crate::time_scale::TimeSpan;

const TRACK_HEIGHT: f64 = 32.0;
const BAR_TOP: f64 = 14.0;
const BAR_HEIGHT: f64 = 14.0;
const LABEL_MIN_WIDTH_PX: f64 = 40.0;
const LABEL_FONT_SIZE: f64 = 9.0;

/// Scheduling state of one thread over time, one colored bar per interval.
pub struct ThreadStateTrack {
    id: SharedStr,
    title: SharedStr,
    hovered: Option<usize>,
}

impl ThreadStateTrack {
    pub fn new(id: impl Into<SharedStr>, title: impl Into<SharedStr>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            hovered: None,
        }
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    fn snapshot(&self, view: &TimelineView) -> Option<Rc<TrackData>> {
        view.track_data(&self.id)
            .filter(|data| matches!(**data, TrackData::ThreadState(_)))
    }
}

impl Panel for ThreadStateTrack {
    fn height(&self) -> f64 {
        TRACK_HEIGHT
    }

    fn render_canvas(&mut self, canvas: &mut Canvas, size: Size, view: &TimelineView) {
        let data = self.snapshot(view);
        let states = match data.as_deref() {
            Some(TrackData::ThreadState(states)) => Some(states),
            _ => None,
        };
        checkerboard_uncovered(
            canvas,
            size.height,
            view,
            states.map(|s| TimeSpan::new(s.start, s.end)),
        );
        draw_title(canvas, &self.title);
        let Some(states) = states else {
            return;
        };

        for i in visible_range(&states.starts, &states.ends, view.window) {
            let state = states.states[i];
            let (x, w) = element_px(view, states.starts[i], states.ends[i]);
            // Sleeping stretches stay empty so running time stands out.
            if state == SchedState::Sleeping && self.hovered != Some(i) {
                continue;
            }
            let base = color_for_state(state);
            let color = if self.hovered == Some(i) {
                hover_tint(&base)
            } else {
                base
            };
            let label = (w >= LABEL_MIN_WIDTH_PX).then(|| SharedStr::from(state.label()));
            canvas.fill_item(Rect::new(x, BAR_TOP, w, BAR_HEIGHT), color, label, i as u64);
        }

        if let Some(i) = self.hovered
            && let Some(state) = states.states.get(i)
        {
            canvas.text(
                Point::new(size.width - 4.0, BAR_TOP - 3.0),
                state.label(),
                ThemeToken::TextPrimary,
                LABEL_FONT_SIZE,
                TextAlign::Right,
            );
        }
    }

    fn on_mouse_move(&mut self, pos: Point, view: &TimelineView) {
        let data = self.snapshot(view);
        self.hovered = match data.as_deref() {
            Some(TrackData::ThreadState(states)) => {
                let t = view.scale.px_to_time(pos.x);
                let min_duration = view.scale.delta_px_to_duration(view.min_rendered_width);
                interval_at(&states.starts, &states.ends, t, min_duration)
            }
            _ => None,
        };
    }

    fn on_mouse_out(&mut self) {
        self.hovered = None;
    }
}

#[cfg(test)]
mod tests {
    use lanescope_protocol::RenderCommand;

    use super::*;
    use crate::data::ThreadStateData;

    fn data() -> TrackData {
        TrackData::ThreadState(ThreadStateData {
            start: 0.0,
            end: 40.0,
            resolution: 0.1,
            starts: vec![0.0, 10.0, 20.0, 30.0],
            ends: vec![10.0, 20.0, 30.0, 40.0],
            states: vec![
                SchedState::Running,
                SchedState::Sleeping,
                SchedState::Runnable,
                SchedState::Uninterruptible { io: true },
            ],
        })
    }

    fn bars(canvas: &Canvas) -> Vec<u64> {
        canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawRect { item_id, .. } => *item_id,
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sleeping_intervals_are_left_empty() {
        let view = TimelineView::new(TimeSpan::new(0.0, 40.0), 400.0).with_track_data("t", data());
        let mut track = ThreadStateTrack::new("t", "worker 12");
        let mut canvas = Canvas::new();
        track.render_canvas(&mut canvas, Size::new(400.0, TRACK_HEIGHT), &view);
        assert_eq!(bars(&canvas), [0, 2, 3]);
    }

    #[test]
    fn uncovered_time_is_checkerboarded() {
        let view = TimelineView::new(TimeSpan::new(0.0, 80.0), 400.0).with_track_data("t", data());
        let mut track = ThreadStateTrack::new("t", "worker 12");
        let mut canvas = Canvas::new();
        track.render_canvas(&mut canvas, Size::new(400.0, TRACK_HEIGHT), &view);
        let loading = canvas.commands().iter().find_map(|c| match c {
            RenderCommand::DrawRect {
                rect,
                color: lanescope_protocol::Paint::Token(ThemeToken::LoadingBackground),
                ..
            } => Some(*rect),
            _ => None,
        });
        assert_eq!(loading.map(|r| r.x), Some(200.0));
    }

    #[test]
    fn hovering_labels_the_state() {
        let view = TimelineView::new(TimeSpan::new(0.0, 40.0), 400.0).with_track_data("t", data());
        let mut track = ThreadStateTrack::new("t", "worker 12");
        track.on_mouse_move(Point::new(150.0, BAR_TOP + 1.0), &view);
        assert_eq!(track.hovered(), Some(1));

        let mut canvas = Canvas::new();
        track.render_canvas(&mut canvas, Size::new(400.0, TRACK_HEIGHT), &view);
        assert_eq!(bars(&canvas), [0, 1, 2, 3]);
        let label = SchedState::Sleeping.label();
        assert!(canvas.commands().iter().any(|c| matches!(
            c,
            RenderCommand::DrawText { text, .. } if text == label
        )));
    }
}
