//! Shared engine state, constructed once by the host and handed to every
//! component by reference.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use lanescope_protocol::{AreaSelectionRecord, SharedStr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::animation::Animation;
use crate::config::EngineConfig;
use crate::data::TrackData;
use crate::debounce::{Debouncer, RateLimiter};
use crate::error::EngineError;
use crate::perf::Clock;
use crate::scheduler::{FrameCallback, FrameScheduler, FrameSource};
use crate::selection::{AreaSelection, SelectionState};
use crate::time_scale::{TimeScale, TimeSpan};

/// Shortest visible window zooming may reach, in seconds.
const MIN_WINDOW_DURATION: f64 = 1e-9;

/// Messages the engine sends to the outside store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    SelectArea(AreaSelectionRecord),
    DeselectArea { last_update: u64 },
    SetVisibleWindow(TimeSpan),
    SetVisibleTracks(Vec<SharedStr>),
}

pub trait Dispatcher {
    fn dispatch(&self, action: Action);
}

impl<F: Fn(Action)> Dispatcher for F {
    fn dispatch(&self, action: Action) {
        self(action)
    }
}

/// Dispatcher that keeps every action for later inspection.
#[derive(Debug, Default)]
pub struct ActionLog {
    actions: RefCell<Vec<Action>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Action> {
        std::mem::take(&mut *self.actions.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.actions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.borrow().is_empty()
    }
}

impl Dispatcher for ActionLog {
    fn dispatch(&self, action: Action) {
        self.actions.borrow_mut().push(action);
    }
}

type TrackStore = Rc<RefCell<HashMap<SharedStr, Rc<TrackData>>>>;

/// What a panel sees while rendering or handling pointer input.
#[derive(Debug, Clone)]
pub struct TimelineView {
    pub window: TimeSpan,
    pub scale: TimeScale,
    pub hovered_ts: Option<f64>,
    pub selection: Option<AreaSelection>,
    pub min_rendered_width: f64,
    data: TrackStore,
}

impl TimelineView {
    /// A standalone view mapping `window` onto `[0, width_px]`.
    pub fn new(window: TimeSpan, width_px: f64) -> Self {
        Self {
            window,
            scale: TimeScale::new(window, 0.0, width_px),
            hovered_ts: None,
            selection: None,
            min_rendered_width: EngineConfig::default().min_rendered_width_px,
            data: TrackStore::default(),
        }
    }

    pub fn with_track_data(self, id: &str, data: TrackData) -> Self {
        self.data
            .borrow_mut()
            .insert(SharedStr::from(id), Rc::new(data));
        self
    }

    pub fn track_data(&self, id: &str) -> Option<Rc<TrackData>> {
        self.data.borrow().get(id).cloned()
    }

    /// Pixel range of the visible window.
    pub fn window_px(&self) -> (f64, f64) {
        (
            self.scale.time_to_px(self.window.start),
            self.scale.time_to_px(self.window.end),
        )
    }
}

struct LocalState {
    window: TimeSpan,
    scale: TimeScale,
    hovered_ts: Option<f64>,
    selection: SelectionState,
    visible_tracks: Vec<SharedStr>,
}

impl LocalState {
    fn new(shell_width: f64) -> Self {
        let window = TimeSpan::new(0.0, 1.0);
        Self {
            window,
            scale: TimeScale::new(window, shell_width, shell_width),
            hovered_ts: None,
            selection: SelectionState::default(),
            visible_tracks: Vec::new(),
        }
    }
}

struct Timers {
    selection: Debouncer<Action>,
    window: RateLimiter<TimeSpan>,
}

impl Timers {
    fn new(config: &EngineConfig) -> Self {
        Self {
            selection: Debouncer::new(config.selection_debounce_ms),
            window: RateLimiter::new(config.visible_window_rate_limit_ms),
        }
    }

    fn is_pending(&self) -> bool {
        self.selection.is_pending() || self.window.is_pending()
    }
}

pub struct ApplicationContext {
    this: Weak<ApplicationContext>,
    config: EngineConfig,
    scheduler: Rc<FrameScheduler>,
    dispatcher: Rc<dyn Dispatcher>,
    clock: Option<Rc<dyn Clock>>,
    state: RefCell<LocalState>,
    data: TrackStore,
    stamp: Cell<u64>,
    now_ms: Cell<f64>,
    timers: RefCell<Timers>,
    timer_action: FrameCallback,
    window_animation: RefCell<Option<Animation>>,
    window_tween: Cell<Option<(TimeSpan, TimeSpan, f64)>>,
}

#[cfg(not(target_arch = "wasm32"))]
fn default_clock(config: &EngineConfig) -> Option<Rc<dyn Clock>> {
    config
        .perf_debug
        .then(|| Rc::new(crate::perf::InstantClock::new()) as Rc<dyn Clock>)
}

#[cfg(target_arch = "wasm32")]
fn default_clock(_config: &EngineConfig) -> Option<Rc<dyn Clock>> {
    None
}

impl ApplicationContext {
    pub fn initialize(
        config: EngineConfig,
        frame_source: Rc<dyn FrameSource>,
        dispatcher: Rc<dyn Dispatcher>,
    ) -> Result<Rc<Self>, EngineError> {
        let clock = default_clock(&config);
        Self::initialize_with_clock(config, frame_source, dispatcher, clock)
    }

    /// Like [`ApplicationContext::initialize`] with an explicit phase-timing
    /// clock.
    pub fn initialize_with_clock(
        config: EngineConfig,
        frame_source: Rc<dyn FrameSource>,
        dispatcher: Rc<dyn Dispatcher>,
        clock: Option<Rc<dyn Clock>>,
    ) -> Result<Rc<Self>, EngineError> {
        config.validate()?;
        let mut scheduler = FrameScheduler::new(frame_source);
        if let Some(clock) = &clock {
            scheduler = scheduler.with_clock(Rc::clone(clock));
        }
        info!(
            overdraw = config.overdraw_factor,
            perf_debug = config.perf_debug,
            "application context initialized"
        );
        Ok(Rc::new_cyclic(|this: &Weak<Self>| {
            let weak = this.clone();
            let timer_action: FrameCallback = Rc::new(move |now_ms| match weak.upgrade() {
                Some(ctx) => ctx.flush_timers(now_ms),
                None => Ok(()),
            });
            Self {
                this: this.clone(),
                state: RefCell::new(LocalState::new(config.track_shell_width)),
                timers: RefCell::new(Timers::new(&config)),
                config,
                scheduler: Rc::new(scheduler),
                dispatcher,
                clock,
                data: TrackStore::default(),
                stamp: Cell::new(0),
                now_ms: Cell::new(0.0),
                timer_action,
                window_animation: RefCell::new(None),
                window_tween: Cell::new(None),
            }
        }))
    }

    /// Drop all transient state, data and registered callbacks, keeping the
    /// config, frame source and dispatcher.
    pub fn reset_for_testing(&self) {
        self.window_animation.borrow_mut().take();
        self.window_tween.set(None);
        *self.timers.borrow_mut() = Timers::new(&self.config);
        self.scheduler.clear();
        *self.state.borrow_mut() = LocalState::new(self.config.track_shell_width);
        self.data.borrow_mut().clear();
        self.stamp.set(0);
        self.now_ms.set(0.0);
    }

    /// Cancel pending broadcasts and stop answering frames.
    pub fn shutdown(&self) {
        self.window_animation.borrow_mut().take();
        self.cancel_timers();
        self.scheduler.shutdown();
        debug!("application context shut down");
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Rc<FrameScheduler> {
        &self.scheduler
    }

    pub fn clock(&self) -> Option<&Rc<dyn Clock>> {
        self.clock.as_ref()
    }

    /// Host entry point for a frame tick.
    pub fn on_frame(&self, now_ms: f64) -> Result<(), EngineError> {
        self.now_ms.set(now_ms);
        self.scheduler.on_frame(now_ms)
    }

    /// Timestamp of the most recent frame.
    pub fn now_ms(&self) -> f64 {
        self.now_ms.get()
    }

    /// Issue the next logical update stamp.
    pub fn next_stamp(&self) -> u64 {
        let next = self.stamp.get() + 1;
        self.stamp.set(next);
        next
    }

    fn dispatch(&self, action: Action) {
        debug!(?action, "dispatch");
        self.dispatcher.dispatch(action);
    }

    pub fn view(&self) -> TimelineView {
        let state = self.state.borrow();
        TimelineView {
            window: state.window,
            scale: state.scale,
            hovered_ts: state.hovered_ts,
            selection: state.selection.current().cloned(),
            min_rendered_width: self.config.min_rendered_width_px,
            data: Rc::clone(&self.data),
        }
    }

    // Visible window

    pub fn visible_window(&self) -> TimeSpan {
        self.state.borrow().window
    }

    pub fn time_scale(&self) -> TimeScale {
        self.state.borrow().scale
    }

    /// Map the visible window onto `[track_shell_width, width_px]`.
    pub fn set_timeline_width(&self, width_px: f64) {
        let shell = self.config.track_shell_width;
        let mut state = self.state.borrow_mut();
        state.scale.set_limits_px(shell, width_px.max(shell));
    }

    /// Replace the visible window. Degenerate windows are ignored.
    pub fn set_visible_window(&self, window: TimeSpan) -> bool {
        if window.start.is_nan() || window.end.is_nan() || window.duration() <= 0.0 {
            debug!(?window, "ignoring degenerate visible window");
            return false;
        }
        {
            let mut state = self.state.borrow_mut();
            if state.window == window {
                return false;
            }
            state.window = window;
            state.scale.set_span(window);
        }
        self.scheduler.schedule_redraw();

        let now = self.now_ms.get();
        let immediate = self.timers.borrow_mut().window.call(window, now);
        match immediate {
            Some(window) => self.dispatch(Action::SetVisibleWindow(window)),
            None => self.arm_timers(),
        }
        true
    }

    pub fn pan_by_px(&self, dx: f64) -> bool {
        let (window, dt) = {
            let state = self.state.borrow();
            (state.window, state.scale.delta_px_to_duration(dx))
        };
        if dt == 0.0 {
            return false;
        }
        self.set_visible_window(TimeSpan::new(window.start + dt, window.end + dt))
    }

    /// Zoom around the time under pixel `x`; `factor > 1` zooms in.
    pub fn zoom_at(&self, x: f64, factor: f64) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let (window, anchor) = {
            let state = self.state.borrow();
            (state.window, state.scale.px_to_time(x))
        };
        let duration = (window.duration() / factor).max(MIN_WINDOW_DURATION);
        let ratio = (anchor - window.start) / window.duration();
        let start = anchor - ratio * duration;
        self.set_visible_window(TimeSpan::new(start, start + duration))
    }

    /// Animate the visible window towards `target` over `duration_ms`.
    pub fn animate_to_window(&self, target: TimeSpan, duration_ms: f64) {
        if target.duration() <= 0.0 {
            return;
        }
        self.window_tween
            .set(Some((self.visible_window(), target, duration_ms.max(1.0))));
        let mut slot = self.window_animation.borrow_mut();
        let animation = slot.get_or_insert_with(|| {
            let weak = self.this.clone();
            Animation::new(&self.scheduler, move |elapsed| {
                if let Some(ctx) = weak.upgrade() {
                    ctx.step_window_tween(elapsed);
                }
                Ok(())
            })
        });
        animation.start(duration_ms, self.now_ms.get());
    }

    fn step_window_tween(&self, elapsed_ms: f64) {
        let Some((from, to, duration)) = self.window_tween.get() else {
            return;
        };
        let p = (elapsed_ms / duration).clamp(0.0, 1.0);
        let eased = 1.0 - (1.0 - p).powi(3);
        let lerp = |a: f64, b: f64| a + (b - a) * eased;
        self.set_visible_window(TimeSpan::new(lerp(from.start, to.start), lerp(from.end, to.end)));
        if p >= 1.0 {
            self.window_tween.set(None);
        }
    }

    pub fn is_animating(&self) -> bool {
        self.window_animation
            .borrow()
            .as_ref()
            .is_some_and(Animation::is_running)
    }

    // Hover

    pub fn hovered_ts(&self) -> Option<f64> {
        self.state.borrow().hovered_ts
    }

    pub fn set_hovered_ts(&self, ts: Option<f64>) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.hovered_ts != ts;
            state.hovered_ts = ts;
            changed
        };
        if changed {
            self.scheduler.schedule_redraw();
        }
    }

    // Area selection

    /// Select a time range over `track_ids`. Applied locally right away;
    /// the broadcast waits for the debounce period.
    pub fn select_area(
        &self,
        start: f64,
        end: f64,
        track_ids: Vec<SharedStr>,
    ) -> Result<AreaSelection, EngineError> {
        let selection = AreaSelection::new(start, end, track_ids, self.next_stamp())?;
        self.state.borrow_mut().selection.apply(selection.clone());
        self.debounce_selection(Action::SelectArea(selection.to_record()));
        self.scheduler.schedule_redraw();
        Ok(selection)
    }

    pub fn deselect_area(&self) {
        let stamp = self.next_stamp();
        if self.state.borrow_mut().selection.clear(stamp) {
            self.debounce_selection(Action::DeselectArea { last_update: stamp });
            self.scheduler.schedule_redraw();
        }
    }

    /// Merge a selection that arrived from outside. Returns whether it was
    /// newer than the applied one.
    pub fn merge_remote_selection(&self, record: AreaSelectionRecord) -> Result<bool, EngineError> {
        let selection = AreaSelection::from_record(record)?;
        self.stamp.set(self.stamp.get().max(selection.last_update));
        let applied = self.state.borrow_mut().selection.apply(selection);
        if applied {
            self.scheduler.schedule_redraw();
        }
        Ok(applied)
    }

    pub fn selected_area(&self) -> Option<AreaSelection> {
        self.state.borrow().selection.current().cloned()
    }

    fn debounce_selection(&self, action: Action) {
        let now = self.now_ms.get();
        self.timers.borrow_mut().selection.call(action, now);
        self.arm_timers();
    }

    // Track data

    /// Store a data snapshot for `track_id` and schedule a repaint.
    /// Snapshots with misaligned series are dropped.
    pub fn publish_track_data(&self, track_id: impl Into<SharedStr>, data: TrackData) {
        let track_id = track_id.into();
        if !data.is_aligned() {
            warn!(track = %track_id, "dropping snapshot with misaligned series");
            return;
        }
        self.data.borrow_mut().insert(track_id, Rc::new(data));
        self.scheduler.schedule_redraw();
    }

    pub fn clear_track_data(&self, track_id: &str) {
        if self.data.borrow_mut().remove(track_id).is_some() {
            self.scheduler.schedule_redraw();
        }
    }

    pub fn track_data(&self, track_id: &str) -> Option<Rc<TrackData>> {
        self.data.borrow().get(track_id).cloned()
    }

    // Visible tracks

    /// Record the tracks rendered this frame; broadcast when the set changed.
    pub fn set_visible_tracks(&self, ids: Vec<SharedStr>) {
        {
            let mut state = self.state.borrow_mut();
            if state.visible_tracks == ids {
                return;
            }
            state.visible_tracks = ids.clone();
        }
        self.dispatch(Action::SetVisibleTracks(ids));
    }

    pub fn visible_tracks(&self) -> Vec<SharedStr> {
        self.state.borrow().visible_tracks.clone()
    }

    // Timers

    fn arm_timers(&self) {
        if self.timers.borrow().is_pending() {
            self.scheduler.start(&self.timer_action);
        }
    }

    fn flush_timers(&self, now_ms: f64) -> Result<(), EngineError> {
        let (selection, window, pending) = {
            let mut timers = self.timers.borrow_mut();
            let selection = timers.selection.poll(now_ms);
            let window = timers.window.poll(now_ms);
            (selection, window, timers.is_pending())
        };
        if !pending {
            self.scheduler.stop(&self.timer_action);
        }
        if let Some(action) = selection {
            self.dispatch(action);
        }
        if let Some(window) = window {
            self.dispatch(Action::SetVisibleWindow(window));
        }
        Ok(())
    }

    pub fn has_pending_broadcast(&self) -> bool {
        self.timers.borrow().is_pending()
    }

    /// Drop pending broadcasts without sending them.
    pub fn cancel_timers(&self) {
        {
            let mut timers = self.timers.borrow_mut();
            timers.selection.cancel();
            timers.window.cancel();
        }
        self.scheduler.stop(&self.timer_action);
    }
}
