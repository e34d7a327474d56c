use std::rc::Rc;

use lanescope_protocol::{Point, Rect, SharedStr, Size, TextAlign, ThemeToken};
use tracing::trace;

use super::{
    checkerboard_uncovered, draw_title, element_px, hover_tint, interval_at, selected_tint,
    visible_range,
};
use crate::canvas::Canvas;
use crate::colorizer::color_for_slice;
use crate::context::TimelineView;
use crate::data::{SliceData, TrackData};
use crate::panel::Panel;
use crate::time_scale::TimeSpan;

const SLICE_HEIGHT: f64 = 18.0;
const PADDING_TOP: f64 = 16.0;
const PADDING_BOTTOM: f64 = 4.0;
const LABEL_MIN_WIDTH_PX: f64 = 24.0;
const LABEL_FONT_SIZE: f64 = 10.0;

/// Slices of one depth, sorted by start. Slices at the same depth never
/// overlap, so their ends are sorted too.
#[derive(Debug, Default)]
struct DepthRow {
    indices: Vec<usize>,
    starts: Vec<f64>,
    ends: Vec<f64>,
}

#[derive(Debug)]
struct DepthIndex {
    source: Rc<TrackData>,
    rows: Vec<DepthRow>,
    max_depth: u32,
}

impl DepthIndex {
    fn build(source: Rc<TrackData>, data: &SliceData) -> Self {
        let mut rows: Vec<DepthRow> = Vec::new();
        for (i, &depth) in data.depths.iter().enumerate() {
            let depth = depth as usize;
            if rows.len() <= depth {
                rows.resize_with(depth + 1, DepthRow::default);
            }
            let row = &mut rows[depth];
            row.indices.push(i);
            row.starts.push(data.starts[i]);
            row.ends.push(data.ends[i]);
        }
        Self {
            source,
            rows,
            max_depth: data.max_depth(),
        }
    }
}

/// Depth-stacked slices (function calls, spans, async events).
pub struct SliceTrack {
    id: SharedStr,
    title: SharedStr,
    /// Rows reserved before data arrives.
    min_depth: u32,
    index: Option<DepthIndex>,
    hovered: Option<usize>,
    selected: Option<u64>,
}

impl SliceTrack {
    pub fn new(id: impl Into<SharedStr>, title: impl Into<SharedStr>, min_depth: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            min_depth,
            index: None,
            hovered: None,
            selected: None,
        }
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Id of the clicked slice.
    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    /// Deepest row laid out: the indexed snapshot's, never less than the
    /// reserved depth.
    fn depth(&self) -> u32 {
        let indexed = self.index.as_ref().map_or(0, |index| index.max_depth);
        self.min_depth.max(indexed)
    }

    fn snapshot(&mut self, view: &TimelineView) -> Option<Rc<TrackData>> {
        let Some(data) = view.track_data(&self.id) else {
            self.index = None;
            return None;
        };
        if !matches!(*data, TrackData::Slices(_)) {
            trace!(track = %self.id, "snapshot of another kind; drawn as loading");
            self.index = None;
            return None;
        }
        let stale = self
            .index
            .as_ref()
            .is_none_or(|index| !Rc::ptr_eq(&index.source, &data));
        if stale && let TrackData::Slices(slices) = &*data {
            self.index = Some(DepthIndex::build(Rc::clone(&data), slices));
        }
        Some(data)
    }

    fn slice_at(&mut self, pos: Point, view: &TimelineView) -> Option<usize> {
        self.snapshot(view)?;
        let index = self.index.as_ref()?;
        let depth = ((pos.y - PADDING_TOP) / SLICE_HEIGHT).floor();
        if depth < 0.0 {
            return None;
        }
        let row = index.rows.get(depth as usize)?;
        let t = view.scale.px_to_time(pos.x);
        let min_duration = view.scale.delta_px_to_duration(view.min_rendered_width);
        let i = interval_at(&row.starts, &row.ends, t, min_duration)?;
        row.indices.get(i).copied()
    }
}

impl Panel for SliceTrack {
    fn height(&self) -> f64 {
        PADDING_TOP + f64::from(self.depth() + 1) * SLICE_HEIGHT + PADDING_BOTTOM
    }

    fn sync(&mut self, view: &TimelineView) -> bool {
        let before = self.depth();
        self.snapshot(view);
        self.depth() != before
    }

    fn render_canvas(&mut self, canvas: &mut Canvas, size: Size, view: &TimelineView) {
        let data = self.snapshot(view);
        let slices = match data.as_deref() {
            Some(TrackData::Slices(slices)) => Some(slices),
            _ => None,
        };
        checkerboard_uncovered(
            canvas,
            size.height,
            view,
            slices.map(|s| TimeSpan::new(s.start, s.end)),
        );
        draw_title(canvas, &self.title);

        let (Some(slices), Some(index)) = (slices, self.index.as_ref()) else {
            return;
        };
        for (depth, row) in index.rows.iter().enumerate() {
            let y = PADDING_TOP + depth as f64 * SLICE_HEIGHT;
            for k in visible_range(&row.starts, &row.ends, view.window) {
                let i = row.indices[k];
                let (x, w) = element_px(view, row.starts[k], row.ends[k]);
                let title = &slices.titles[i];
                let base = color_for_slice(title);
                let color = if self.hovered == Some(i) {
                    hover_tint(&base)
                } else {
                    base
                };
                let rect = Rect::new(x, y, w, SLICE_HEIGHT - 1.0);
                let slice_id = slices.ids[i];
                if self.selected == Some(slice_id) {
                    canvas.fill_bordered(rect, selected_tint(&color), ThemeToken::SelectionOutline);
                } else {
                    let label = (w >= LABEL_MIN_WIDTH_PX).then(|| title.clone());
                    canvas.fill_item(rect, color, label, slice_id);
                }
            }
        }

        if let Some(i) = self.hovered
            && let Some(title) = slices.titles.get(i)
        {
            let x = view.scale.time_to_px(slices.starts[i]).max(0.0);
            canvas.text(
                Point::new(x, PADDING_TOP - 3.0),
                title.clone(),
                ThemeToken::TextPrimary,
                LABEL_FONT_SIZE,
                TextAlign::Left,
            );
        }
    }

    fn on_mouse_move(&mut self, pos: Point, view: &TimelineView) {
        self.hovered = self.slice_at(pos, view);
    }

    fn on_mouse_out(&mut self) {
        self.hovered = None;
    }

    fn on_mouse_click(&mut self, pos: Point, view: &TimelineView) -> bool {
        let Some(i) = self.slice_at(pos, view) else {
            return false;
        };
        let id = self.index.as_ref().and_then(|index| match &*index.source {
            TrackData::Slices(slices) => slices.ids.get(i).copied(),
            _ => None,
        });
        self.selected = id;
        id.is_some()
    }
}
