use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lanescope_core::{
    ActionLog, ApplicationContext, ContainerAttrs, EngineConfig, PanelContainer,
    PollingFrameSource, StackedLayout, Surface, SurfaceHost, TimelineModel, TrackData,
};
use lanescope_protocol::{AreaSelectionRecord, Point, RenderCommand, SurfaceSize};
use serde::Serialize;
use wasm_bindgen::prelude::*;

const AXIS_HEIGHT: f64 = 24.0;
const AXIS_ID: &str = "axis";
const TRACKS_ID: &str = "tracks";

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// Latest state of one container's surface, as handed to JavaScript.
#[derive(Debug, Default, Serialize)]
struct HostedFrame {
    size: Option<SurfaceSize>,
    offset_y: f64,
    commands: Vec<RenderCommand>,
    #[serde(skip)]
    fresh: bool,
}

type Frames = Rc<RefCell<HashMap<String, Rc<RefCell<HostedFrame>>>>>;

struct HostedSurface(Rc<RefCell<HostedFrame>>);

impl Surface for HostedSurface {
    fn resize(&mut self, size: SurfaceSize) {
        let mut frame = self.0.borrow_mut();
        frame.size = Some(size);
        frame.fresh = true;
    }

    fn set_offset_y(&mut self, offset_y: f64) {
        let mut frame = self.0.borrow_mut();
        frame.offset_y = offset_y;
        frame.fresh = true;
    }

    fn present(&mut self, commands: Vec<RenderCommand>) {
        let mut frame = self.0.borrow_mut();
        frame.commands = commands;
        frame.fresh = true;
    }
}

struct Host {
    frames: Frames,
    dpr: f64,
}

impl SurfaceHost for Host {
    fn create_surface(&self, container_id: &str) -> Option<Box<dyn Surface>> {
        let frame = Rc::new(RefCell::new(HostedFrame::default()));
        self.frames
            .borrow_mut()
            .insert(container_id.to_string(), Rc::clone(&frame));
        Some(Box::new(HostedSurface(frame)))
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.dpr
    }
}

/// One mounted timeline: a pinned time axis over a scrolling track list.
///
/// JavaScript drives it by polling [`Timeline::needs_frame`] from
/// `requestAnimationFrame`, calling [`Timeline::on_frame`], then pulling
/// display lists with [`Timeline::take_display_list`].
#[wasm_bindgen]
pub struct Timeline {
    model: Rc<TimelineModel>,
    ctx: Rc<ApplicationContext>,
    source: Rc<PollingFrameSource>,
    actions: Rc<ActionLog>,
    axis: Rc<PanelContainer>,
    tracks: Rc<PanelContainer>,
    frames: Frames,
}

#[wasm_bindgen]
impl Timeline {
    /// Load a timeline document and mount it at `width` by `height` CSS
    /// pixels. `config_json` overrides the document's engine config.
    #[wasm_bindgen(constructor)]
    pub fn new(
        document_json: &str,
        config_json: Option<String>,
        width: f64,
        height: f64,
        dpr: f64,
    ) -> Result<Timeline, JsError> {
        let model = Rc::new(TimelineModel::from_json_str(document_json).map_err(js_err)?);
        let config = match config_json {
            Some(json) => EngineConfig::from_json_str(&json).map_err(js_err)?,
            None => model.config().clone(),
        };

        let source = Rc::new(PollingFrameSource::new());
        let actions = Rc::new(ActionLog::new());
        let ctx = ApplicationContext::initialize(config, source.clone(), actions.clone())
            .map_err(js_err)?;

        let frames = Frames::default();
        let host = Host {
            frames: Rc::clone(&frames),
            dpr,
        };
        let axis = PanelContainer::mount(
            &ctx,
            ContainerAttrs::pinned(AXIS_ID),
            Box::new(StackedLayout),
            &host,
        )
        .map_err(js_err)?;
        let tracks = PanelContainer::mount(
            &ctx,
            ContainerAttrs::scrolling(TRACKS_ID),
            Box::new(StackedLayout),
            &host,
        )
        .map_err(js_err)?;
        ctx.scheduler()
            .set_relayout(Some(TimelineModel::relayout_callback(&model, &tracks)));

        let timeline = Timeline {
            model,
            ctx,
            source,
            actions,
            axis,
            tracks,
            frames,
        };
        timeline.resize(width, height)?;
        timeline
            .axis
            .set_panels(timeline.model.pinned_panels())
            .map_err(js_err)?;
        timeline
            .tracks
            .set_panels(timeline.model.scrolling_panels())
            .map_err(js_err)?;
        if let Some(window) = timeline.model.initial_window() {
            timeline.ctx.set_visible_window(window);
        }
        timeline.model.publish_data(&timeline.ctx);
        Ok(timeline)
    }

    /// Whether the engine asked for an animation frame since the last call.
    pub fn needs_frame(&self) -> bool {
        self.source.take_request()
    }

    pub fn on_frame(&self, now_ms: f64) -> Result<(), JsError> {
        self.ctx.on_frame(now_ms).map_err(js_err)
    }

    /// `{size, offset_y, commands}` for a container, or `undefined` when
    /// nothing changed since the last call.
    pub fn take_display_list(&self, container_id: &str) -> Result<Option<String>, JsError> {
        let frames = self.frames.borrow();
        let frame = frames
            .get(container_id)
            .ok_or_else(|| JsError::new(&format!("unknown container: {container_id}")))?;
        let mut frame = frame.borrow_mut();
        if !frame.fresh {
            return Ok(None);
        }
        frame.fresh = false;
        serde_json::to_string(&*frame).map(Some).map_err(js_err)
    }

    /// Actions dispatched since the last call, as a JSON array.
    pub fn take_actions(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.actions.take()).map_err(js_err)
    }

    /// Apply a selection record broadcast by another view. Returns whether it
    /// replaced the local selection.
    pub fn merge_remote_selection(&self, record_json: &str) -> Result<bool, JsError> {
        let record: AreaSelectionRecord = serde_json::from_str(record_json).map_err(js_err)?;
        self.ctx.merge_remote_selection(record).map_err(js_err)
    }

    /// Hand a data snapshot (a `TrackData` JSON object) for one track to the
    /// engine. Tracks re-measure and repaint on the next frame.
    pub fn publish_track_data(&self, track_id: &str, snapshot_json: &str) -> Result<(), JsError> {
        let data: TrackData = serde_json::from_str(snapshot_json).map_err(js_err)?;
        self.ctx.publish_track_data(track_id, data);
        Ok(())
    }

    /// Drop a track's snapshot; the track draws as loading again.
    pub fn clear_track_data(&self, track_id: &str) {
        self.ctx.clear_track_data(track_id);
    }

    pub fn resize(&self, width: f64, height: f64) -> Result<(), JsError> {
        self.axis.on_resize(width, AXIS_HEIGHT).map_err(js_err)?;
        self.tracks
            .on_resize(width, (height - AXIS_HEIGHT).max(0.0))
            .map_err(js_err)
    }

    /// Scroll the track list; returns the container's total content height.
    pub fn scroll_to(&self, scroll_top: f64) -> f64 {
        self.tracks.on_scroll(scroll_top);
        self.tracks.total_height()
    }

    pub fn total_height(&self) -> f64 {
        self.tracks.total_height()
    }

    pub fn pointer_move(&self, x: f64, y: f64) {
        self.tracks.on_mouse_move(Point::new(x, y));
    }

    pub fn pointer_out(&self) {
        self.tracks.on_mouse_out();
    }

    pub fn click(&self, x: f64, y: f64) -> bool {
        self.tracks.on_mouse_click(Point::new(x, y))
    }

    pub fn drag_start(&self, x: f64, y: f64) {
        self.tracks.on_drag_start(Point::new(x, y));
    }

    pub fn drag(&self, x: f64, y: f64) {
        self.tracks.on_drag(Point::new(x, y));
    }

    pub fn drag_end(&self, x: f64, y: f64) {
        self.tracks.on_drag_end(Point::new(x, y));
    }

    pub fn pan(&self, dx: f64) -> bool {
        self.ctx.pan_by_px(dx)
    }

    pub fn zoom(&self, x: f64, factor: f64) -> bool {
        self.ctx.zoom_at(x, factor)
    }

    pub fn reset_zoom(&self, duration_ms: f64) {
        if let Some(window) = self.model.initial_window() {
            self.ctx.animate_to_window(window, duration_ms);
        }
    }

    pub fn deselect(&self) {
        self.ctx.deselect_area();
    }

    pub fn set_all_collapsed(&self, collapsed: bool) {
        self.model.set_all_collapsed(collapsed);
        self.ctx.scheduler().schedule_full_redraw();
    }

    /// Visible window as `[start, end]` seconds.
    pub fn visible_window(&self) -> Vec<f64> {
        let window = self.ctx.visible_window();
        vec![window.start, window.end]
    }
}

impl Drop for Timeline {
    fn drop(&mut self) {
        self.ctx.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "groups": [{
            "id": "g", "title": "Group",
            "tracks": [{
                "id": "t", "title": "Track", "kind": "slices",
                "data": {
                    "kind": "slices", "start": 0.0, "end": 4.0, "resolution": 0.01,
                    "ids": [1], "starts": [1.0], "ends": [3.0],
                    "depths": [0], "titles": ["work"]
                }
            }]
        }]
    }"#;

    fn timeline() -> Timeline {
        Timeline::new(DOC, None, 400.0, 124.0, 1.0).unwrap_or_else(|_| panic!("mount failed"))
    }

    fn drain(t: &Timeline) {
        let mut now = 0.0;
        while t.needs_frame() && now < 1000.0 {
            now += 16.0;
            assert!(t.on_frame(now).is_ok());
        }
    }

    #[test]
    fn frames_produce_display_lists_once() {
        let t = timeline();
        drain(&t);
        let list = t
            .take_display_list(TRACKS_ID)
            .unwrap_or_else(|_| panic!("unknown container"))
            .unwrap_or_else(|| panic!("no frame"));
        let value: serde_json::Value =
            serde_json::from_str(&list).unwrap_or_else(|e| panic!("{e}"));
        assert!(value["commands"].as_array().is_some_and(|c| !c.is_empty()));
        assert!(matches!(t.take_display_list(TRACKS_ID), Ok(None)));
        assert_eq!(t.visible_window(), vec![0.0, 4.0]);
    }

    #[test]
    fn late_snapshots_resize_the_track() {
        let t = timeline();
        drain(&t);
        let before = t.total_height();
        let deeper = r#"{
            "kind": "slices", "start": 0.0, "end": 4.0, "resolution": 0.01,
            "ids": [1, 2], "starts": [1.0, 1.5], "ends": [3.0, 2.0],
            "depths": [0, 1], "titles": ["work", "detail"]
        }"#;
        assert!(t.publish_track_data("t", deeper).is_ok());
        drain(&t);
        assert_eq!(t.total_height(), before + 18.0);

        t.clear_track_data("t");
        drain(&t);
        assert_eq!(t.total_height(), before);
    }

    #[test]
    fn collapsing_shrinks_the_track_list() {
        let t = timeline();
        drain(&t);
        let expanded = t.total_height();
        t.set_all_collapsed(true);
        drain(&t);
        assert!(t.total_height() < expanded);
    }
}
