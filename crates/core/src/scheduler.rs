//! The single per-frame coordination point.
//!
//! The host owns the real frame source (`requestAnimationFrame`, a terminal
//! tick) and calls [`FrameScheduler::on_frame`] once per tick; everything
//! else subscribes here. A frame always runs in three phases:
//!
//! 1. **actions**: continuous per-frame work such as pan/zoom animation,
//! 2. **relayout**: only when a full redraw was requested,
//! 3. **redraw**: every canvas redraw callback, one per panel container.
//!
//! Actions therefore always observe pre-redraw state and redraws always
//! observe post-action state of the same frame.
//!
//! # Failure policy
//!
//! Propagate and abort the frame. The first callback error skips every
//! remaining callback and phase of that frame and is returned from
//! `on_frame` to the host. The redraw latch is always released and the next
//! frame is still requested if actions remain registered, so a single bad
//! frame does not stop running animations.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, error, trace, warn};

use crate::error::EngineError;
use crate::perf::{Clock, FrameStats};

/// Per-frame work, called with the host frame timestamp in milliseconds.
pub type FrameCallback = Rc<dyn Fn(f64) -> Result<(), EngineError>>;

/// Host side of the frame loop.
pub trait FrameSource {
    /// Ask the host to call `on_frame` on its next tick.
    fn request_frame(&self);
}

/// Frame source for hosts that poll: records the request and lets the host
/// loop pick it up with [`PollingFrameSource::take_request`].
#[derive(Debug, Default)]
pub struct PollingFrameSource {
    pending: Cell<bool>,
    requests: Cell<u64>,
}

impl PollingFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a frame was requested since the last call; clears the flag.
    pub fn take_request(&self) -> bool {
        self.pending.replace(false)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Total number of frame requests received.
    pub fn request_count(&self) -> u64 {
        self.requests.get()
    }
}

impl FrameSource for PollingFrameSource {
    fn request_frame(&self) {
        self.pending.set(true);
        self.requests.set(self.requests.get() + 1);
    }
}

fn same_callback(a: &FrameCallback, b: &FrameCallback) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Releases the redraw latch even when a redraw callback fails.
struct RedrawLatch<'a>(&'a Cell<bool>);

impl<'a> RedrawLatch<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for RedrawLatch<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct FrameScheduler {
    source: Rc<dyn FrameSource>,
    actions: RefCell<Vec<FrameCallback>>,
    redraws: RefCell<Vec<FrameCallback>>,
    relayout: RefCell<Option<FrameCallback>>,
    has_scheduled_next_frame: Cell<bool>,
    requested_full_redraw: Cell<bool>,
    is_redrawing: Cell<bool>,
    shutdown: Cell<bool>,
    clock: Option<Rc<dyn Clock>>,
    stats: RefCell<FrameStats>,
}

impl FrameScheduler {
    pub fn new(source: Rc<dyn FrameSource>) -> Self {
        Self {
            source,
            actions: RefCell::new(Vec::new()),
            redraws: RefCell::new(Vec::new()),
            relayout: RefCell::new(None),
            has_scheduled_next_frame: Cell::new(false),
            requested_full_redraw: Cell::new(false),
            is_redrawing: Cell::new(false),
            shutdown: Cell::new(false),
            clock: None,
            stats: RefCell::new(FrameStats::default()),
        }
    }

    /// Enable phase timing with the given clock.
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register a continuous action and make sure a frame is coming.
    /// Registering the same callback twice has no effect.
    pub fn start(&self, action: &FrameCallback) {
        {
            let mut actions = self.actions.borrow_mut();
            if !actions.iter().any(|a| same_callback(a, action)) {
                actions.push(Rc::clone(action));
                debug!(actions = actions.len(), "frame action started");
            }
        }
        self.maybe_schedule_frame(false);
    }

    /// Unregister an action. Unknown callbacks are ignored.
    pub fn stop(&self, action: &FrameCallback) {
        let mut actions = self.actions.borrow_mut();
        let before = actions.len();
        actions.retain(|a| !same_callback(a, action));
        if actions.len() != before {
            debug!(actions = actions.len(), "frame action stopped");
        }
    }

    pub fn add_redraw_callback(&self, redraw: &FrameCallback) {
        let mut redraws = self.redraws.borrow_mut();
        if !redraws.iter().any(|r| same_callback(r, redraw)) {
            redraws.push(Rc::clone(redraw));
        }
    }

    pub fn remove_redraw_callback(&self, redraw: &FrameCallback) {
        self.redraws.borrow_mut().retain(|r| !same_callback(r, redraw));
    }

    /// Install the structural relayout hook run before canvas redraws on
    /// full-redraw frames.
    pub fn set_relayout(&self, relayout: Option<FrameCallback>) {
        *self.relayout.borrow_mut() = relayout;
    }

    /// Request a frame that repaints canvases without relayout.
    pub fn schedule_redraw(&self) {
        self.maybe_schedule_frame(true);
    }

    /// Request a frame that runs the relayout hook before repainting.
    pub fn schedule_full_redraw(&self) {
        self.requested_full_redraw.set(true);
        self.maybe_schedule_frame(true);
    }

    /// Stop responding to frames for good (teardown).
    pub fn shutdown(&self) {
        self.shutdown.set(true);
    }

    pub fn is_redrawing(&self) -> bool {
        self.is_redrawing.get()
    }

    pub fn has_scheduled_frame(&self) -> bool {
        self.has_scheduled_next_frame.get()
    }

    pub fn action_count(&self) -> usize {
        self.actions.borrow().len()
    }

    pub fn redraw_callback_count(&self) -> usize {
        self.redraws.borrow().len()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats.borrow().clone()
    }

    /// Drop every callback and latch. Used when the application context is
    /// reset between tests.
    pub fn clear(&self) {
        self.actions.borrow_mut().clear();
        self.redraws.borrow_mut().clear();
        *self.relayout.borrow_mut() = None;
        self.has_scheduled_next_frame.set(false);
        self.requested_full_redraw.set(false);
        self.is_redrawing.set(false);
        self.shutdown.set(false);
        *self.stats.borrow_mut() = FrameStats::default();
    }

    fn maybe_schedule_frame(&self, force: bool) {
        if self.has_scheduled_next_frame.get() {
            return;
        }
        if force || !self.actions.borrow().is_empty() {
            self.has_scheduled_next_frame.set(true);
            self.source.request_frame();
        }
    }

    /// Entry point for the host's per-frame callback.
    pub fn on_frame(&self, now_ms: f64) -> Result<(), EngineError> {
        if self.shutdown.get() {
            return Ok(());
        }
        let frame_start = self.clock_now();
        self.has_scheduled_next_frame.set(false);
        let full_redraw = self.requested_full_redraw.replace(false);
        trace!(now_ms, full_redraw, "frame");

        let result = self.run_phases(now_ms, full_redraw);
        if let Err(err) = &result {
            error!(%err, "frame aborted");
        }

        if let (Some(start), Some(end)) = (frame_start, self.clock_now()) {
            self.stats.borrow_mut().total_ms.add_value(end - start);
        }
        self.maybe_schedule_frame(false);
        result
    }

    fn run_phases(&self, now_ms: f64, full_redraw: bool) -> Result<(), EngineError> {
        let t0 = self.clock_now();
        let actions = self.actions.borrow().clone();
        for action in &actions {
            action(now_ms)?;
        }

        let t1 = self.clock_now();
        if full_redraw {
            let relayout = self.relayout.borrow().clone();
            if let Some(relayout) = relayout {
                relayout(now_ms)?;
            }
        }

        let t2 = self.clock_now();
        self.sync_canvas_redraw(now_ms)?;
        let t3 = self.clock_now();

        if let (Some(t0), Some(t1), Some(t2), Some(t3)) = (t0, t1, t2, t3) {
            let mut stats = self.stats.borrow_mut();
            stats.actions_ms.add_value(t1 - t0);
            if full_redraw {
                stats.relayout_ms.add_value(t2 - t1);
            }
            stats.redraw_ms.add_value(t3 - t2);
        }
        Ok(())
    }

    fn sync_canvas_redraw(&self, now_ms: f64) -> Result<(), EngineError> {
        if self.is_redrawing.get() {
            warn!("redraw requested while redrawing; skipped");
            return Ok(());
        }
        let _latch = RedrawLatch::acquire(&self.is_redrawing);
        let redraws = self.redraws.borrow().clone();
        for redraw in &redraws {
            redraw(now_ms)?;
        }
        Ok(())
    }

    fn clock_now(&self) -> Option<f64> {
        self.clock.as_ref().map(|c| c.now_ms())
    }
}
