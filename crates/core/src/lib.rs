pub mod animation;
pub mod canvas;
pub mod checkerboard;
pub mod colorizer;
pub mod config;
pub mod context;
pub mod data;
pub mod debounce;
pub mod document;
pub mod error;
pub mod panel;
pub mod panel_container;
pub mod perf;
pub mod scheduler;
pub mod search;
pub mod selection;
pub mod time_scale;
pub mod tracks;

pub use animation::Animation;
pub use canvas::Canvas;
pub use config::EngineConfig;
pub use context::{Action, ActionLog, ApplicationContext, Dispatcher, TimelineView};
pub use data::{CounterData, SliceData, ThreadStateData, TrackData};
pub use document::{TimelineDocument, TimelineModel};
pub use error::EngineError;
pub use panel::{
    LayoutSource, Panel, PanelEntry, PanelPosition, StackedLayout, Surface, SurfaceHost,
};
pub use panel_container::{ContainerAttrs, PanelContainer, ScrollEffect};
pub use scheduler::{FrameCallback, FrameScheduler, FrameSource, PollingFrameSource};
pub use selection::AreaSelection;
pub use time_scale::{TimeScale, TimeSpan};
