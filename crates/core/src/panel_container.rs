//! A virtualized, vertically stacked list of panels drawn onto one surface.
//!
//! When the parent scrolls, the surface is `overdraw_factor` times the
//! parent height and is anchored around the last backed scroll position.
//! Scrolls that stay inside the overdrawn margin only move the surface;
//! anything further re-anchors it and repaints.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use lanescope_protocol::{Point, Rect, SharedStr, Size, SurfaceSize, ThemeToken};
use tracing::{debug, error, trace};

use crate::canvas::Canvas;
use crate::context::{ApplicationContext, TimelineView};
use crate::error::EngineError;
use crate::panel::{LayoutSource, PanelEntry, PanelPosition, Surface, SurfaceHost};
use crate::perf::RunningStatistics;
use crate::scheduler::FrameCallback;
use crate::search::search;

const SELECTION_STROKE_WIDTH: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAttrs {
    pub id: SharedStr,
    /// Whether the parent region scrolls independently.
    pub scrolls: bool,
    /// Whether rendered panels are reported as the visible track set.
    pub reports_visible_tracks: bool,
}

impl ContainerAttrs {
    /// The main track list: scrolls and reports visible tracks.
    pub fn scrolling(id: impl Into<SharedStr>) -> Self {
        Self {
            id: id.into(),
            scrolls: true,
            reports_visible_tracks: true,
        }
    }

    /// A fixed strip such as the time axis or pinned tracks.
    pub fn pinned(id: impl Into<SharedStr>) -> Self {
        Self {
            id: id.into(),
            scrolls: false,
            reports_visible_tracks: false,
        }
    }
}

/// What a scroll event cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEffect {
    /// The surface was moved; its contents are still valid.
    Translated,
    /// The surface was resized and re-anchored; a redraw is scheduled.
    Repainted,
}

#[derive(Debug, Clone, Copy)]
struct DragArea {
    start: Point,
    current: Point,
    dirty: bool,
    released: bool,
}

#[derive(Debug, Default)]
struct ContainerState {
    parent_width: f64,
    parent_height: f64,
    applied_parent: Option<(f64, f64)>,
    scroll_top: f64,
    scroll_anchor: f64,
    canvas_height: f64,
    canvas_y_start: f64,
    total_height: f64,
    positions: Vec<PanelPosition>,
    panel_tops: Vec<f64>,
    hovered: Option<usize>,
    drag: Option<DragArea>,
}

impl ContainerState {
    /// Index of the panel under content-space `y`.
    fn panel_at(&self, y: f64) -> Option<usize> {
        let i = search(&self.panel_tops, y)?;
        let pos = self.positions.get(i)?;
        (y < pos.y + pos.height).then_some(i)
    }
}

fn overlaps_canvas(y_start: f64, y_end: f64, canvas_height: f64) -> bool {
    y_end > 0.0 && y_start < canvas_height
}

pub struct PanelContainer {
    ctx: Rc<ApplicationContext>,
    attrs: ContainerAttrs,
    layout: Box<dyn LayoutSource>,
    dpr: f64,
    surface: RefCell<Box<dyn Surface>>,
    panels: RefCell<Vec<PanelEntry>>,
    state: RefCell<ContainerState>,
    redraw: FrameCallback,
    panel_stats: RefCell<HashMap<SharedStr, RunningStatistics>>,
}

impl PanelContainer {
    /// Create the container's surface and register its redraw with the
    /// scheduler. Fails when the host has no surface to give.
    pub fn mount(
        ctx: &Rc<ApplicationContext>,
        attrs: ContainerAttrs,
        layout: Box<dyn LayoutSource>,
        host: &dyn SurfaceHost,
    ) -> Result<Rc<Self>, EngineError> {
        let Some(surface) = host.create_surface(&attrs.id) else {
            error!(container = %attrs.id, "host could not create a drawing surface");
            return Err(EngineError::MissingContext);
        };
        let dpr = host.device_pixel_ratio();
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };

        let container = Rc::new_cyclic(|this: &Weak<Self>| {
            let weak = this.clone();
            let redraw: FrameCallback = Rc::new(move |_now_ms| match weak.upgrade() {
                Some(container) => container.redraw_canvas(),
                None => Ok(()),
            });
            Self {
                ctx: Rc::clone(ctx),
                attrs,
                layout,
                dpr,
                surface: RefCell::new(surface),
                panels: RefCell::new(Vec::new()),
                state: RefCell::new(ContainerState::default()),
                redraw,
                panel_stats: RefCell::new(HashMap::new()),
            }
        });
        ctx.scheduler().add_redraw_callback(&container.redraw);
        debug!(
            container = %container.attrs.id,
            scrolls = container.attrs.scrolls,
            dpr,
            "panel container mounted"
        );
        Ok(container)
    }

    /// Stop receiving redraws. Dropping the container does the same.
    pub fn unmount(&self) {
        self.ctx.scheduler().remove_redraw_callback(&self.redraw);
        debug!(container = %self.attrs.id, "panel container unmounted");
    }

    pub fn id(&self) -> &SharedStr {
        &self.attrs.id
    }

    /// Replace the panel list and re-measure.
    pub fn set_panels(&self, panels: Vec<PanelEntry>) -> Result<(), EngineError> {
        {
            let mut state = self.state.borrow_mut();
            state.hovered = None;
            state.drag = None;
        }
        *self.panels.borrow_mut() = panels;
        self.on_update().map(|_| ())
    }

    /// Rebuild the panel list from the current one. Entries carried over
    /// keep their panel state, hover follows its panel by id, and a drag in
    /// progress survives.
    pub fn rebuild_panels(
        &self,
        rebuild: impl FnOnce(Vec<PanelEntry>) -> Vec<PanelEntry>,
    ) -> Result<(), EngineError> {
        let previous = std::mem::take(&mut *self.panels.borrow_mut());
        let hovered_id = self
            .state
            .borrow()
            .hovered
            .and_then(|i| previous.get(i))
            .map(|entry| entry.id.clone());
        let panels = rebuild(previous);
        let hovered = hovered_id.and_then(|id| panels.iter().position(|entry| entry.id == id));
        self.state.borrow_mut().hovered = hovered;
        *self.panels.borrow_mut() = panels;
        self.on_update().map(|_| ())
    }

    pub fn panel_count(&self) -> usize {
        self.panels.borrow().len()
    }

    /// The parent region changed size.
    pub fn on_resize(&self, width: f64, height: f64) -> Result<(), EngineError> {
        {
            let mut state = self.state.borrow_mut();
            state.parent_width = width.max(0.0);
            state.parent_height = height.max(0.0);
        }
        self.ctx.set_timeline_width(width);
        self.on_update().map(|_| ())
    }

    /// Re-measure panel geometry. The surface is resized only when the
    /// total panel height or the parent size changed; returns whether
    /// anything changed.
    pub fn on_update(&self) -> Result<bool, EngineError> {
        self.sync_panels();
        let changed = self.remeasure()?;
        if changed {
            self.ctx.scheduler().schedule_redraw();
        }
        Ok(changed)
    }

    /// Let every panel pick up new data snapshots. Returns whether any
    /// panel height changed.
    fn sync_panels(&self) -> bool {
        let view = self.ctx.view();
        self.panels
            .borrow_mut()
            .iter_mut()
            .fold(false, |changed, entry| entry.panel.sync(&view) | changed)
    }

    fn remeasure(&self) -> Result<bool, EngineError> {
        let width = self.state.borrow().parent_width;
        let (positions, panel_count) = {
            let panels = self.panels.borrow();
            (self.layout.measure(&panels, width), panels.len())
        };
        if positions.len() != panel_count {
            error!(
                container = %self.attrs.id,
                panels = panel_count,
                positions = positions.len(),
                "layout returned misaligned positions"
            );
            return Err(EngineError::LayoutMismatch {
                panels: panel_count,
                positions: positions.len(),
            });
        }
        let total = positions
            .iter()
            .fold(0.0_f64, |bottom, p| bottom.max(p.y + p.height));

        let mut state = self.state.borrow_mut();
        let geometry_changed = state.positions != positions;
        let parent = (state.parent_width, state.parent_height);
        let size_changed = total != state.total_height || state.applied_parent != Some(parent);

        state.panel_tops = positions.iter().map(|p| p.y).collect();
        state.positions = positions;
        state.total_height = total;
        if size_changed {
            state.applied_parent = Some(parent);
            self.update_canvas_dimensions(&mut state);
            self.reposition_canvas(&mut state);
        }
        drop(state);
        Ok(size_changed || geometry_changed)
    }

    /// Half of the extra backed height, measured on the floored surface
    /// height so the margin matches what is actually painted.
    fn overdraw_per_side(&self, state: &ContainerState) -> f64 {
        let backed = (state.parent_height * self.ctx.config().overdraw_factor).floor();
        (backed - state.parent_height).max(0.0) / 2.0
    }

    fn update_canvas_dimensions(&self, state: &mut ContainerState) {
        state.canvas_height = if self.attrs.scrolls {
            (state.parent_height * self.ctx.config().overdraw_factor).floor()
        } else {
            state.total_height.floor()
        };
        let size = SurfaceSize {
            width: state.parent_width,
            height: state.canvas_height,
            dpr: self.dpr,
        };
        trace!(container = %self.attrs.id, ?size, "resize surface");
        self.surface.borrow_mut().resize(size);
    }

    fn reposition_canvas(&self, state: &mut ContainerState) {
        state.scroll_anchor = state.scroll_top;
        state.canvas_y_start = if self.attrs.scrolls {
            (state.scroll_anchor - self.overdraw_per_side(state)).floor()
        } else {
            0.0
        };
        self.surface
            .borrow_mut()
            .set_offset_y(state.canvas_y_start - state.scroll_top);
    }

    /// The parent scrolled to `scroll_top`.
    pub fn on_scroll(&self, scroll_top: f64) -> ScrollEffect {
        let mut state = self.state.borrow_mut();
        state.scroll_top = scroll_top;
        let drift = (scroll_top - state.scroll_anchor).abs();
        if !self.attrs.scrolls || drift <= self.overdraw_per_side(&state) {
            self.surface
                .borrow_mut()
                .set_offset_y(state.canvas_y_start - scroll_top);
            return ScrollEffect::Translated;
        }
        self.update_canvas_dimensions(&mut state);
        self.reposition_canvas(&mut state);
        drop(state);
        self.ctx.scheduler().schedule_redraw();
        ScrollEffect::Repainted
    }

    pub fn canvas_height(&self) -> f64 {
        self.state.borrow().canvas_height
    }

    /// Content-space y of the surface's top edge.
    pub fn canvas_y_start(&self) -> f64 {
        self.state.borrow().canvas_y_start
    }

    pub fn total_height(&self) -> f64 {
        self.state.borrow().total_height
    }

    pub fn positions(&self) -> Vec<PanelPosition> {
        self.state.borrow().positions.clone()
    }

    /// Render statistics for one panel, collected when `perf_debug` is on.
    pub fn panel_render_stats(&self, id: &str) -> Option<RunningStatistics> {
        self.panel_stats.borrow().get(id).cloned()
    }

    /// Ids of selectable panels whose rectangle intersects the region given
    /// in content coordinates. Collapsed groups add their children.
    pub fn panels_in_region(&self, x0: f64, x1: f64, y0: f64, y1: f64) -> Vec<SharedStr> {
        let region = Rect::from_corners(Point::new(x0, y0), Point::new(x1, y1));
        let state = self.state.borrow();
        let panels = self.panels.borrow();
        let mut ids = Vec::new();
        for (entry, pos) in panels.iter().zip(&state.positions) {
            if !entry.selectable {
                continue;
            }
            let rect = Rect::new(pos.x, pos.y, pos.width, pos.height);
            if !rect.intersects(&region) {
                continue;
            }
            ids.push(entry.id.clone());
            if let Some(children) = entry.panel.collapsed_children() {
                ids.extend(children.iter().cloned());
            }
        }
        ids
    }

    fn redraw_canvas(&self) -> Result<(), EngineError> {
        self.handle_area_selection()?;
        // A snapshot that changed a panel's height is laid out before this
        // frame paints.
        if self.sync_panels() {
            debug!(container = %self.attrs.id, "panel height changed with new data");
            self.remeasure()?;
        }

        let view = self.ctx.view();
        let clock = self.ctx.clock().filter(|_| self.ctx.config().perf_debug);
        let state = self.state.borrow();
        let mut panels = self.panels.borrow_mut();
        if panels.len() != state.positions.len() {
            return Err(EngineError::LayoutMismatch {
                panels: panels.len(),
                positions: state.positions.len(),
            });
        }

        let mut canvas = Canvas::with_capacity(panels.len() * 8);
        canvas.scale(self.dpr);
        canvas.clear_rect(Rect::new(0.0, 0.0, state.parent_width, state.canvas_height));

        let mut rendered = Vec::new();
        for (entry, pos) in panels.iter_mut().zip(&state.positions) {
            let y_on_canvas = pos.y - state.canvas_y_start;
            if !overlaps_canvas(y_on_canvas, y_on_canvas + pos.height, state.canvas_height) {
                continue;
            }
            let started = clock.map(|c| c.now_ms());

            canvas.begin_group(entry.id.clone(), None);
            canvas.translate(pos.x, y_on_canvas);
            canvas.clip(Rect::new(0.0, 0.0, pos.width, pos.height));
            let mut panel_canvas = Canvas::new();
            entry.panel.render_canvas(
                &mut panel_canvas,
                Size::new(pos.width, pos.height),
                &view,
            );
            canvas.append(panel_canvas);
            canvas.unclip();
            canvas.restore();
            canvas.end_group();

            if let (Some(clock), Some(started)) = (clock, started) {
                self.panel_stats
                    .borrow_mut()
                    .entry(entry.id.clone())
                    .or_default()
                    .add_value(clock.now_ms() - started);
            }
            rendered.push(entry.id.clone());
        }

        self.draw_top_layer(&mut canvas, &state, &view);
        canvas.restore();
        trace!(
            container = %self.attrs.id,
            rendered = rendered.len(),
            total = panels.len(),
            "redraw"
        );
        drop(panels);
        drop(state);

        self.surface.borrow_mut().present(canvas.into_commands());
        if self.attrs.reports_visible_tracks {
            self.ctx.set_visible_tracks(rendered);
        }
        Ok(())
    }

    /// Turn a changed drag rectangle into an area selection.
    fn handle_area_selection(&self) -> Result<(), EngineError> {
        let drag = {
            let mut state = self.state.borrow_mut();
            let Some(drag) = state.drag.as_mut() else {
                return Ok(());
            };
            if !drag.dirty {
                return Ok(());
            }
            drag.dirty = false;
            let snapshot = *drag;
            if snapshot.released {
                state.drag = None;
            }
            snapshot
        };
        let (a, b) = (drag.start, drag.current);
        let track_ids = self.panels_in_region(a.x, b.x, a.y, b.y);
        let scale = self.ctx.time_scale();
        let start = scale.px_to_time(a.x.min(b.x));
        let end = scale.px_to_time(a.x.max(b.x));
        self.ctx.select_area(start, end, track_ids)?;
        Ok(())
    }

    /// Outline of the area selection across all selected panels of this
    /// container, drawn above every panel.
    fn draw_top_layer(&self, canvas: &mut Canvas, state: &ContainerState, view: &TimelineView) {
        let Some(area) = &view.selection else {
            return;
        };
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for pos in &state.positions {
            if area.contains_track(&pos.id) {
                min_y = min_y.min(pos.y);
                max_y = max_y.max(pos.y + pos.height);
            }
        }
        if !min_y.is_finite() {
            return;
        }
        let x0 = view.scale.time_to_px(area.start);
        let x1 = view.scale.time_to_px(area.end);
        canvas.stroke_rect(
            Rect::new(x0, min_y - state.canvas_y_start, x1 - x0, max_y - min_y),
            ThemeToken::SelectionOutline,
            SELECTION_STROKE_WIDTH,
        );
    }

    fn to_content(&self, state: &ContainerState, pos: Point) -> Point {
        Point::new(pos.x, pos.y + state.scroll_top)
    }

    /// Pointer moved to `pos` (relative to the visible top-left corner of
    /// the container). Returns whether a panel is under it.
    pub fn on_mouse_move(&self, pos: Point) -> bool {
        let view = self.ctx.view();
        let (target, previous, drag_active) = {
            let mut state = self.state.borrow_mut();
            let content = self.to_content(&state, pos);
            let target = state.panel_at(content.y).and_then(|i| {
                let p = state.positions.get(i)?;
                Some((i, Point::new(content.x - p.x, content.y - p.y)))
            });
            let previous = std::mem::replace(&mut state.hovered, target.map(|(i, _)| i));
            let mut drag_active = false;
            if let Some(drag) = state.drag.as_mut() {
                drag.current = content;
                drag.dirty = true;
                drag_active = true;
            }
            (target, previous, drag_active)
        };
        {
            let mut panels = self.panels.borrow_mut();
            if let Some(prev) = previous
                && previous != target.map(|(i, _)| i)
                && let Some(entry) = panels.get_mut(prev)
            {
                entry.panel.on_mouse_out();
            }
            if let Some((i, local)) = target
                && let Some(entry) = panels.get_mut(i)
            {
                entry.panel.on_mouse_move(local, &view);
            }
        }
        let shell = self.ctx.config().track_shell_width;
        let hovered_ts = (target.is_some() && pos.x >= shell).then(|| view.scale.px_to_time(pos.x));
        self.ctx.set_hovered_ts(hovered_ts);
        if target.is_some() || drag_active {
            self.ctx.scheduler().schedule_redraw();
        }
        target.is_some()
    }

    pub fn on_mouse_out(&self) {
        let previous = self.state.borrow_mut().hovered.take();
        if let Some(prev) = previous
            && let Some(entry) = self.panels.borrow_mut().get_mut(prev)
        {
            entry.panel.on_mouse_out();
        }
        self.ctx.set_hovered_ts(None);
        self.ctx.scheduler().schedule_redraw();
    }

    /// Forward a click to the panel under `pos`. A handled click may change
    /// panel structure, so it requests a full redraw.
    pub fn on_mouse_click(&self, pos: Point) -> bool {
        let view = self.ctx.view();
        let target = {
            let state = self.state.borrow();
            let content = self.to_content(&state, pos);
            state.panel_at(content.y).and_then(|i| {
                let p = state.positions.get(i)?;
                Some((i, Point::new(content.x - p.x, content.y - p.y)))
            })
        };
        let Some((i, local)) = target else {
            return false;
        };
        let handled = self
            .panels
            .borrow_mut()
            .get_mut(i)
            .is_some_and(|entry| entry.panel.on_mouse_click(local, &view));
        if handled {
            self.ctx.scheduler().schedule_full_redraw();
        }
        handled
    }

    /// Begin an area-selection drag at `pos`.
    pub fn on_drag_start(&self, pos: Point) {
        let mut state = self.state.borrow_mut();
        let content = self.to_content(&state, pos);
        state.drag = Some(DragArea {
            start: content,
            current: content,
            dirty: false,
            released: false,
        });
    }

    /// Extend the drag to `pos`; the selection is resolved on the next frame.
    pub fn on_drag(&self, pos: Point) {
        {
            let mut state = self.state.borrow_mut();
            let content = self.to_content(&state, pos);
            let Some(drag) = state.drag.as_mut() else {
                return;
            };
            drag.current = content;
            drag.dirty = true;
        }
        self.ctx.scheduler().schedule_redraw();
    }

    pub fn on_drag_end(&self, pos: Point) {
        self.on_drag(pos);
        if let Some(drag) = self.state.borrow_mut().drag.as_mut() {
            drag.released = true;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.state.borrow().drag.is_some()
    }
}

impl Drop for PanelContainer {
    fn drop(&mut self) {
        self.ctx.scheduler().remove_redraw_callback(&self.redraw);
    }
}
