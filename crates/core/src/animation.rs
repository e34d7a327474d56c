use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::error::EngineError;
use crate::scheduler::{FrameCallback, FrameScheduler};

type StepFn = Box<dyn Fn(f64) -> Result<(), EngineError>>;

struct AnimationState {
    scheduler: Weak<FrameScheduler>,
    on_step: StepFn,
    start_ms: Cell<f64>,
    end_ms: Cell<f64>,
    running: Cell<bool>,
    action: FrameCallback,
}

impl AnimationState {
    fn on_animation_frame(&self, now_ms: f64) -> Result<(), EngineError> {
        if !self.running.get() {
            return Ok(());
        }
        let start = self.start_ms.get();
        let end = self.end_ms.get();
        if now_ms >= end {
            self.halt();
            // The last frame always lands on the full duration.
            return (self.on_step)((end - start).max(0.0));
        }
        (self.on_step)((now_ms - start).round().max(0.0))
    }

    fn halt(&self) {
        self.running.set(false);
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.stop(&self.action);
        }
    }
}

/// A time-bounded frame action. `on_step` receives the elapsed milliseconds
/// since `start` on every frame until the duration is over.
pub struct Animation {
    state: Rc<AnimationState>,
}

impl Animation {
    pub fn new(
        scheduler: &Rc<FrameScheduler>,
        on_step: impl Fn(f64) -> Result<(), EngineError> + 'static,
    ) -> Self {
        let state = Rc::new_cyclic(|weak: &Weak<AnimationState>| {
            let weak = weak.clone();
            let action: FrameCallback = Rc::new(move |now_ms| match weak.upgrade() {
                Some(state) => state.on_animation_frame(now_ms),
                None => Ok(()),
            });
            AnimationState {
                scheduler: Rc::downgrade(scheduler),
                on_step: Box::new(on_step),
                start_ms: Cell::new(0.0),
                end_ms: Cell::new(0.0),
                running: Cell::new(false),
                action,
            }
        });
        Self { state }
    }

    /// Start, or restart from `now_ms` when already running.
    pub fn start(&self, duration_ms: f64, now_ms: f64) {
        self.state.start_ms.set(now_ms);
        self.state.end_ms.set(now_ms + duration_ms.max(0.0));
        self.state.running.set(true);
        if let Some(scheduler) = self.state.scheduler.upgrade() {
            scheduler.start(&self.state.action);
        }
    }

    pub fn stop(&self) {
        self.state.halt();
    }

    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }

    pub fn start_time_ms(&self) -> f64 {
        self.state.start_ms.get()
    }
}

impl Drop for Animation {
    fn drop(&mut self) {
        self.state.halt();
    }
}
