//! Serde description of a timeline: groups of tracks, the initial window and
//! whatever data snapshots are already available. Hosts load one of these and
//! turn it into panels.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use lanescope_protocol::SharedStr;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::context::ApplicationContext;
use crate::data::TrackData;
use crate::error::EngineError;
use crate::panel::{Panel, PanelEntry};
use crate::panel_container::PanelContainer;
use crate::scheduler::FrameCallback;
use crate::time_scale::TimeSpan;
use crate::tracks::{CounterTrack, GroupHeader, GroupState, SliceTrack, ThreadStateTrack, TimeAxis};

pub const TIME_AXIS_ID: &str = "time-axis";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineDocument {
    #[serde(default)]
    pub config: EngineConfig,
    /// Initial visible window. Defaults to the union of the data coverage.
    #[serde(default)]
    pub window: Option<TimeSpan>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: SharedStr,
    pub title: SharedStr,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub tracks: Vec<TrackSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Slices,
    Counter,
    ThreadState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSpec {
    pub id: SharedStr,
    pub title: SharedStr,
    pub kind: TrackKind,
    /// Slice rows to reserve before data arrives. The track grows with
    /// deeper data either way.
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub data: Option<TrackData>,
}

impl TrackSpec {
    fn matches(&self, data: &TrackData) -> bool {
        matches!(
            (self.kind, data),
            (TrackKind::Slices, TrackData::Slices(_))
                | (TrackKind::Counter, TrackData::Counter(_))
                | (TrackKind::ThreadState, TrackData::ThreadState(_))
        )
    }

    fn build_panel(&self) -> Box<dyn Panel> {
        match self.kind {
            TrackKind::Slices => Box::new(SliceTrack::new(
                self.id.clone(),
                self.title.clone(),
                self.max_depth.unwrap_or(0),
            )),
            TrackKind::Counter => Box::new(CounterTrack::new(self.id.clone(), self.title.clone())),
            TrackKind::ThreadState => {
                Box::new(ThreadStateTrack::new(self.id.clone(), self.title.clone()))
            }
        }
    }
}

/// A validated document plus the live collapse state of its groups.
#[derive(Debug)]
pub struct TimelineModel {
    document: TimelineDocument,
    states: Vec<Rc<GroupState>>,
}

impl TimelineModel {
    pub fn new(document: TimelineDocument) -> Result<Self, EngineError> {
        document.config.validate()?;
        let mut seen = HashSet::new();
        seen.insert(SharedStr::from(TIME_AXIS_ID));
        for group in &document.groups {
            if !seen.insert(group.id.clone()) {
                return Err(EngineError::InvalidDocument(format!("duplicate id {}", group.id)));
            }
            for track in &group.tracks {
                if !seen.insert(track.id.clone()) {
                    return Err(EngineError::InvalidDocument(format!("duplicate id {}", track.id)));
                }
                if let Some(data) = &track.data {
                    if !track.matches(data) {
                        return Err(EngineError::InvalidDocument(format!(
                            "track {} is declared {:?} but carries other data",
                            track.id, track.kind
                        )));
                    }
                    if !data.is_aligned() {
                        return Err(EngineError::InvalidDocument(format!(
                            "track {} has misaligned series",
                            track.id
                        )));
                    }
                }
            }
        }
        if let Some(window) = document.window
            && (window.duration().is_nan() || window.duration() <= 0.0)
        {
            return Err(EngineError::InvalidDocument(format!(
                "empty initial window {}..{}",
                window.start, window.end
            )));
        }

        let states = document
            .groups
            .iter()
            .map(|group| GroupState::new(group.collapsed))
            .collect();
        debug!(groups = document.groups.len(), "timeline document loaded");
        Ok(Self { document, states })
    }

    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn document(&self) -> &TimelineDocument {
        &self.document
    }

    pub fn config(&self) -> &EngineConfig {
        &self.document.config
    }

    pub fn track_count(&self) -> usize {
        self.document.groups.iter().map(|g| g.tracks.len()).sum()
    }

    /// The document's window, or the union of all data coverage.
    pub fn initial_window(&self) -> Option<TimeSpan> {
        if self.document.window.is_some() {
            return self.document.window;
        }
        self.document
            .groups
            .iter()
            .flat_map(|g| &g.tracks)
            .filter_map(|t| t.data.as_ref().map(TrackData::coverage))
            .reduce(|a, b| TimeSpan::new(a.start.min(b.start), a.end.max(b.end)))
            .filter(|span| span.duration() > 0.0)
    }

    /// Hand every embedded snapshot to the context. Returns how many were
    /// published.
    pub fn publish_data(&self, ctx: &ApplicationContext) -> usize {
        let mut published = 0;
        for track in self.document.groups.iter().flat_map(|g| &g.tracks) {
            if let Some(data) = &track.data {
                ctx.publish_track_data(track.id.clone(), data.clone());
                published += 1;
            }
        }
        published
    }

    pub fn group_state(&self, group_id: &str) -> Option<&Rc<GroupState>> {
        self.document
            .groups
            .iter()
            .position(|g| g.id == group_id)
            .and_then(|i| self.states.get(i))
    }

    /// Collapse or expand every group.
    pub fn set_all_collapsed(&self, collapsed: bool) {
        for state in &self.states {
            if state.is_collapsed() != collapsed {
                state.toggle();
            }
        }
    }

    /// Whether any group was toggled since the last call.
    pub fn take_changed(&self) -> bool {
        self.states
            .iter()
            .fold(false, |changed, state| state.take_changed() | changed)
    }

    /// Panels for the pinned strip above the track list.
    pub fn pinned_panels(&self) -> Vec<PanelEntry> {
        vec![PanelEntry::new(TIME_AXIS_ID, Box::new(TimeAxis::new())).not_selectable()]
    }

    /// Group headers followed by their tracks; collapsed groups hide theirs.
    pub fn scrolling_panels(&self) -> Vec<PanelEntry> {
        self.rebuild_scrolling_panels(Vec::new())
    }

    /// Like [`TimelineModel::scrolling_panels`], reusing the entries of
    /// `previous` by id so hover, clicked slices and caches survive a group
    /// toggle. Entries no longer shown are dropped.
    pub fn rebuild_scrolling_panels(&self, previous: Vec<PanelEntry>) -> Vec<PanelEntry> {
        let mut kept: HashMap<SharedStr, PanelEntry> = previous
            .into_iter()
            .map(|entry| (entry.id.clone(), entry))
            .collect();
        let mut entries = Vec::with_capacity(self.document.groups.len() + self.track_count());
        for (group, state) in self.document.groups.iter().zip(&self.states) {
            let header = kept.remove(&group.id).unwrap_or_else(|| {
                let children: Vec<SharedStr> = group.tracks.iter().map(|t| t.id.clone()).collect();
                PanelEntry::new(
                    group.id.clone(),
                    Box::new(GroupHeader::new(group.title.clone(), children, Rc::clone(state))),
                )
            });
            entries.push(header);
            if state.is_collapsed() {
                continue;
            }
            for track in &group.tracks {
                let entry = kept
                    .remove(&track.id)
                    .unwrap_or_else(|| PanelEntry::new(track.id.clone(), track.build_panel()));
                entries.push(entry);
            }
        }
        entries
    }

    /// Relayout hook that rebuilds `container`'s panels after a group was
    /// toggled. Holds both sides weakly.
    pub fn relayout_callback(model: &Rc<Self>, container: &Rc<PanelContainer>) -> FrameCallback {
        let model = Rc::downgrade(model);
        let container = Rc::downgrade(container);
        Rc::new(move |_now_ms| {
            let (Some(model), Some(container)) = (model.upgrade(), container.upgrade()) else {
                return Ok(());
            };
            if model.take_changed() {
                debug!(container = %container.id(), "group toggled; rebuilding panels");
                container.rebuild_panels(|previous| model.rebuild_scrolling_panels(previous))?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ActionLog;
    use crate::scheduler::PollingFrameSource;

    const DOC: &str = r#"{
        "config": { "overdraw_factor": 1.5 },
        "groups": [
            {
                "id": "proc-1",
                "title": "renderer",
                "tracks": [
                    {
                        "id": "main",
                        "title": "Main thread",
                        "kind": "slices",
                        "data": {
                            "kind": "slices",
                            "start": 0.0, "end": 10.0, "resolution": 0.01,
                            "ids": [1, 2], "starts": [0.0, 1.0], "ends": [5.0, 2.0],
                            "depths": [0, 1], "titles": ["run", "parse"]
                        }
                    },
                    { "id": "mem", "title": "Memory", "kind": "counter" }
                ]
            },
            {
                "id": "proc-2",
                "title": "gpu",
                "collapsed": true,
                "tracks": [
                    {
                        "id": "gpu-state",
                        "title": "GPU thread",
                        "kind": "thread_state",
                        "data": {
                            "kind": "thread_state",
                            "start": 2.0, "end": 20.0, "resolution": 0.01,
                            "starts": [2.0], "ends": [20.0], "states": ["Running"]
                        }
                    }
                ]
            }
        ]
    }"#;

    fn ids(entries: &[PanelEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    fn model() -> TimelineModel {
        TimelineModel::from_json_str(DOC).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn collapsed_groups_hide_their_tracks() {
        let model = model();
        assert_eq!(model.config().overdraw_factor, 1.5);
        assert_eq!(model.track_count(), 3);
        let panels = model.scrolling_panels();
        assert_eq!(ids(&panels), ["proc-1", "main", "mem", "proc-2"]);
        // Rows are reserved for depth 0 until a snapshot is synced.
        assert_eq!(panels[1].panel.height(), 16.0 + 18.0 + 4.0);

        let state = model.group_state("proc-2").map(Rc::clone);
        assert!(state.as_ref().is_some_and(|s| s.is_collapsed()));
        model.set_all_collapsed(false);
        assert!(model.take_changed());
        assert!(!model.take_changed());
        assert_eq!(
            ids(&model.scrolling_panels()),
            ["proc-1", "main", "mem", "proc-2", "gpu-state"]
        );
    }

    fn panel_addr(entry: &PanelEntry) -> *const () {
        &*entry.panel as *const dyn Panel as *const ()
    }

    #[test]
    fn rebuilding_keeps_existing_panels() {
        let model = model();
        let before = model.scrolling_panels();
        let main = panel_addr(&before[1]);
        let header = panel_addr(&before[0]);

        model.set_all_collapsed(false);
        let after = model.rebuild_scrolling_panels(before);
        assert_eq!(
            ids(&after),
            ["proc-1", "main", "mem", "proc-2", "gpu-state"]
        );
        assert_eq!(panel_addr(&after[0]), header);
        assert_eq!(panel_addr(&after[1]), main);

        model.set_all_collapsed(true);
        let collapsed = model.rebuild_scrolling_panels(after);
        assert_eq!(ids(&collapsed), ["proc-1", "proc-2"]);
        assert_eq!(panel_addr(&collapsed[0]), header);
    }

    #[test]
    fn time_axis_is_pinned_and_not_selectable() {
        let pinned = model().pinned_panels();
        assert_eq!(ids(&pinned), [TIME_AXIS_ID]);
        assert!(!pinned[0].selectable);
    }

    #[test]
    fn initial_window_covers_all_data() {
        let window = model().initial_window();
        assert_eq!(window, Some(TimeSpan::new(0.0, 20.0)));
    }

    #[test]
    fn publishes_embedded_snapshots() {
        let model = model();
        let ctx = ApplicationContext::initialize(
            model.config().clone(),
            Rc::new(PollingFrameSource::new()),
            Rc::new(ActionLog::new()),
        )
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(model.publish_data(&ctx), 2);
        assert!(ctx.track_data("main").is_some());
        assert!(ctx.track_data("mem").is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let json = r#"{"groups": [
            {"id": "g", "title": "a", "tracks": [{"id": "g", "title": "b", "kind": "counter"}]}
        ]}"#;
        assert!(matches!(
            TimelineModel::from_json_str(json),
            Err(EngineError::InvalidDocument(_))
        ));
    }

    #[test]
    fn rejects_data_of_the_wrong_kind() {
        let json = r#"{"groups": [
            {"id": "g", "title": "a", "tracks": [{
                "id": "t", "title": "b", "kind": "counter",
                "data": {"kind": "thread_state", "start": 0.0, "end": 1.0, "resolution": 0.1,
                         "starts": [], "ends": [], "states": []}
            }]}
        ]}"#;
        assert!(matches!(
            TimelineModel::from_json_str(json),
            Err(EngineError::InvalidDocument(_))
        ));
    }
}
