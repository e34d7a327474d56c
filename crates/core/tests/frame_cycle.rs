//! Drives a whole frame cycle through the public API: document → context →
//! containers → frames → pointer input → broadcasts.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lanescope_core::{
    Action, ActionLog, ApplicationContext, ContainerAttrs, PanelContainer, PollingFrameSource,
    ScrollEffect, SliceData, StackedLayout, Surface, SurfaceHost, TimelineModel, TrackData,
};
use lanescope_protocol::{Paint, Point, RenderCommand, SurfaceSize, ThemeToken};

const DOC: &str = r#"{
    "groups": [
        {
            "id": "renderer",
            "title": "Renderer",
            "tracks": [
                {
                    "id": "main", "title": "Main thread", "kind": "slices",
                    "data": {
                        "kind": "slices", "start": 0.0, "end": 10.0, "resolution": 0.01,
                        "ids": [7, 8], "starts": [1.0, 6.0], "ends": [4.0, 9.0],
                        "depths": [0, 0], "titles": ["layout", "paint"]
                    }
                },
                {
                    "id": "mem", "title": "Memory", "kind": "counter",
                    "data": {
                        "kind": "counter", "start": 0.0, "end": 10.0, "resolution": 0.01,
                        "timestamps": [0.0, 5.0], "values": [100.0, 300.0]
                    }
                }
            ]
        },
        {
            "id": "gpu",
            "title": "GPU",
            "collapsed": true,
            "tracks": [
                {
                    "id": "gpu-state", "title": "GPU thread", "kind": "thread_state",
                    "data": {
                        "kind": "thread_state", "start": 0.0, "end": 10.0, "resolution": 0.01,
                        "starts": [0.0], "ends": [10.0], "states": ["Running"]
                    }
                }
            ]
        }
    ]
}"#;

#[derive(Default)]
struct SurfaceLog {
    resizes: Vec<SurfaceSize>,
    offsets: Vec<f64>,
    frames: Vec<Vec<RenderCommand>>,
}

struct RecordingSurface(Rc<RefCell<SurfaceLog>>);

impl Surface for RecordingSurface {
    fn resize(&mut self, size: SurfaceSize) {
        self.0.borrow_mut().resizes.push(size);
    }

    fn set_offset_y(&mut self, offset_y: f64) {
        self.0.borrow_mut().offsets.push(offset_y);
    }

    fn present(&mut self, commands: Vec<RenderCommand>) {
        self.0.borrow_mut().frames.push(commands);
    }
}

#[derive(Default)]
struct Host {
    surfaces: RefCell<HashMap<String, Rc<RefCell<SurfaceLog>>>>,
}

impl Host {
    fn log(&self, id: &str) -> Rc<RefCell<SurfaceLog>> {
        self.surfaces
            .borrow()
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("no surface {id}"))
    }
}

impl SurfaceHost for Host {
    fn create_surface(&self, container_id: &str) -> Option<Box<dyn Surface>> {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        self.surfaces
            .borrow_mut()
            .insert(container_id.to_string(), Rc::clone(&log));
        Some(Box::new(RecordingSurface(log)))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Answer frame requests until the engine goes idle or `until_ms` passes.
fn run_frames(source: &PollingFrameSource, ctx: &ApplicationContext, now: &mut f64, until_ms: f64) {
    while *now < until_ms && source.take_request() {
        *now += 16.0;
        if let Err(err) = ctx.on_frame(*now) {
            panic!("frame failed: {err}");
        }
    }
}

fn item_ids(frame: &[RenderCommand]) -> Vec<u64> {
    frame
        .iter()
        .filter_map(|c| match c {
            RenderCommand::DrawRect { item_id, .. } => *item_id,
            _ => None,
        })
        .collect()
}

fn last_frame(host: &Host, id: &str) -> Vec<RenderCommand> {
    host.log(id).borrow().frames.last().cloned().unwrap_or_default()
}

fn has_selected_slice(frame: &[RenderCommand]) -> bool {
    frame.iter().any(|c| {
        matches!(
            c,
            RenderCommand::DrawRect {
                border_color: Some(Paint::Token(ThemeToken::SelectionOutline)),
                ..
            }
        )
    })
}

#[test]
fn full_frame_cycle() {
    init_tracing();

    let model = Rc::new(TimelineModel::from_json_str(DOC).unwrap_or_else(|e| panic!("{e}")));
    let source = Rc::new(PollingFrameSource::new());
    let log = Rc::new(ActionLog::new());
    let ctx = ApplicationContext::initialize(model.config().clone(), source.clone(), log.clone())
        .unwrap_or_else(|e| panic!("{e}"));
    let host = Host::default();

    let axis = PanelContainer::mount(
        &ctx,
        ContainerAttrs::pinned("axis"),
        Box::new(StackedLayout),
        &host,
    )
    .unwrap_or_else(|e| panic!("{e}"));
    let tracks = PanelContainer::mount(
        &ctx,
        ContainerAttrs::scrolling("tracks"),
        Box::new(StackedLayout),
        &host,
    )
    .unwrap_or_else(|e| panic!("{e}"));
    ctx.scheduler()
        .set_relayout(Some(TimelineModel::relayout_callback(&model, &tracks)));

    assert!(axis.on_resize(800.0, 24.0).is_ok());
    assert!(tracks.on_resize(800.0, 100.0).is_ok());
    assert!(axis.set_panels(model.pinned_panels()).is_ok());
    assert!(tracks.set_panels(model.scrolling_panels()).is_ok());
    let window = model.initial_window().unwrap_or_else(|| panic!("no window"));
    assert!(ctx.set_visible_window(window));
    assert_eq!(model.publish_data(&ctx), 3);

    // Header 28 + slices 38 + counter 40 + collapsed header 28.
    assert_eq!(tracks.total_height(), 134.0);
    assert_eq!(tracks.canvas_height(), 120.0);
    let backed = host.log("tracks").borrow().resizes.last().map(|s| s.height);
    assert_eq!(backed, Some(120.0));

    let mut now = 0.0;
    run_frames(&source, &ctx, &mut now, 40.0);

    let tracks_log = host.log("tracks");
    let frame = tracks_log
        .borrow()
        .frames
        .last()
        .cloned()
        .unwrap_or_default();
    let mut ids = item_ids(&frame);
    ids.sort_unstable();
    assert_eq!(ids, [7, 8]);
    let axis_frame = host.log("axis").borrow().frames.last().cloned().unwrap_or_default();
    assert!(axis_frame.iter().any(|c| matches!(
        c,
        RenderCommand::DrawText { text, .. } if text == "0s"
    )));
    assert!(log.take().iter().any(|a| matches!(
        a,
        Action::SetVisibleTracks(ids) if ids.len() == 4
    )));

    // Click "layout" (slice 7, 1s..4s) in the main track.
    assert!(tracks.on_mouse_click(Point::new(200.0, 50.0)));
    run_frames(&source, &ctx, &mut now, 60.0);
    assert!(has_selected_slice(&last_frame(&host, "tracks")));

    // Expanding the collapsed group rebuilds the panel list on the next frame
    // without losing the slice picked in the other group.
    assert!(tracks.on_mouse_click(Point::new(20.0, 110.0)));
    run_frames(&source, &ctx, &mut now, 100.0);
    assert_eq!(tracks.panel_count(), 5);
    assert_eq!(tracks.total_height(), 166.0);
    assert!(has_selected_slice(&last_frame(&host, "tracks")));

    // Small scrolls move the surface; larger ones repaint.
    assert_eq!(tracks.on_scroll(5.0), ScrollEffect::Translated);
    assert_eq!(tracks.on_scroll(0.0), ScrollEffect::Translated);
    assert!(tracks_log.borrow().offsets.contains(&-15.0));

    // Drag across the slice and counter tracks from 1s to 5s.
    tracks.on_drag_start(Point::new(80.0, 30.0));
    tracks.on_drag(Point::new(240.0, 50.0));
    tracks.on_drag_end(Point::new(400.0, 70.0));
    run_frames(&source, &ctx, &mut now, 420.0);
    assert!(!tracks.is_dragging());
    let selection = ctx.selected_area().unwrap_or_else(|| panic!("nothing selected"));
    assert_eq!((selection.start, selection.end), (1.0, 5.0));
    assert_eq!(selection.track_ids, ["main", "mem"]);

    let broadcasts: Vec<Action> = log
        .take()
        .into_iter()
        .filter(|a| matches!(a, Action::SelectArea(_)))
        .collect();
    assert_eq!(broadcasts.len(), 1, "debounced to the final selection");
    assert!(!ctx.has_pending_broadcast());

    assert_eq!(tracks.on_scroll(40.0), ScrollEffect::Repainted);
    assert_eq!(tracks.canvas_y_start(), 30.0);

    drop(tracks);
    drop(axis);
    assert_eq!(ctx.scheduler().redraw_callback_count(), 0);
}

const LATE_DOC: &str = r#"{
    "window": { "start": 0.0, "end": 10.0 },
    "groups": [
        {
            "id": "renderer",
            "title": "Renderer",
            "tracks": [{ "id": "main", "title": "Main thread", "kind": "slices" }]
        }
    ]
}"#;

fn slices(depths: Vec<u32>) -> TrackData {
    let n = depths.len();
    TrackData::Slices(SliceData {
        start: 0.0,
        end: 10.0,
        resolution: 0.01,
        ids: (1..=n as u64).collect(),
        starts: (0..n).map(|i| 1.0 + i as f64).collect(),
        ends: (0..n).map(|i| 6.0 - i as f64).collect(),
        depths,
        titles: ["outer", "middle", "inner"].iter().take(n).map(|&t| t.into()).collect(),
    })
}

#[test]
fn slice_track_follows_snapshots_published_after_mount() {
    init_tracing();

    let model = Rc::new(TimelineModel::from_json_str(LATE_DOC).unwrap_or_else(|e| panic!("{e}")));
    let source = Rc::new(PollingFrameSource::new());
    let ctx = ApplicationContext::initialize(
        model.config().clone(),
        source.clone(),
        Rc::new(ActionLog::new()),
    )
    .unwrap_or_else(|e| panic!("{e}"));
    let host = Host::default();
    let tracks = PanelContainer::mount(
        &ctx,
        ContainerAttrs::scrolling("tracks"),
        Box::new(StackedLayout),
        &host,
    )
    .unwrap_or_else(|e| panic!("{e}"));
    assert!(tracks.on_resize(800.0, 200.0).is_ok());
    assert!(tracks.set_panels(model.scrolling_panels()).is_ok());
    let window = model.initial_window().unwrap_or_else(|| panic!("no window"));
    assert!(ctx.set_visible_window(window));

    let mut now = 0.0;
    run_frames(&source, &ctx, &mut now, 40.0);
    // Header 28 + one reserved slice row.
    assert_eq!(tracks.total_height(), 28.0 + 38.0);

    ctx.publish_track_data("main", slices(vec![0, 1, 2]));
    run_frames(&source, &ctx, &mut now, 100.0);
    let main = tracks
        .positions()
        .into_iter()
        .find(|p| p.id == "main")
        .unwrap_or_else(|| panic!("main not laid out"));
    assert_eq!(main.height, 16.0 + 3.0 * 18.0 + 4.0);
    assert_eq!(tracks.total_height(), 28.0 + 74.0);
    let mut ids = item_ids(&last_frame(&host, "tracks"));
    ids.sort_unstable();
    assert_eq!(ids, [1, 2, 3]);

    // The innermost row (3s..4s) is reachable by the pointer.
    assert!(tracks.on_mouse_move(Point::new(280.0, 28.0 + 16.0 + 36.0 + 5.0)));
    run_frames(&source, &ctx, &mut now, 140.0);
    assert!(last_frame(&host, "tracks").iter().any(|c| matches!(
        c,
        RenderCommand::DrawText { text, .. } if text == "inner"
    )));

    // A shallower snapshot gives the rows back.
    ctx.publish_track_data("main", slices(vec![0]));
    run_frames(&source, &ctx, &mut now, 200.0);
    assert_eq!(tracks.total_height(), 28.0 + 38.0);
}
