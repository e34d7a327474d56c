use lanescope_protocol::{AreaSelectionRecord, SharedStr};

use crate::error::EngineError;
use crate::time_scale::TimeSpan;

/// A dragged time range plus the tracks it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaSelection {
    pub start: f64,
    pub end: f64,
    pub track_ids: Vec<SharedStr>,
    /// Logical stamp issued by the application context.
    pub last_update: u64,
}

impl AreaSelection {
    pub fn new(
        start: f64,
        end: f64,
        track_ids: Vec<SharedStr>,
        last_update: u64,
    ) -> Result<Self, EngineError> {
        if start.is_nan() || end.is_nan() || start > end {
            return Err(EngineError::InvalidSelection { start, end });
        }
        Ok(Self {
            start,
            end,
            track_ids,
            last_update,
        })
    }

    pub fn from_record(record: AreaSelectionRecord) -> Result<Self, EngineError> {
        Self::new(record.start, record.end, record.track_ids, record.last_update)
    }

    pub fn to_record(&self) -> AreaSelectionRecord {
        AreaSelectionRecord {
            start: self.start,
            end: self.end,
            track_ids: self.track_ids.clone(),
            last_update: self.last_update,
        }
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start, self.end)
    }

    pub fn contains_track(&self, id: &str) -> bool {
        self.track_ids.iter().any(|t| t == id)
    }
}

/// The applied selection, merged last-write-wins on the logical stamp.
///
/// Deselection is stamped too, so a late update that predates a clear
/// cannot resurrect the old selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    current: Option<AreaSelection>,
    last_update: u64,
}

impl SelectionState {
    /// Apply `selection` if it is strictly newer than what is applied.
    pub fn apply(&mut self, selection: AreaSelection) -> bool {
        if selection.last_update <= self.last_update {
            return false;
        }
        self.last_update = selection.last_update;
        self.current = Some(selection);
        true
    }

    pub fn clear(&mut self, stamp: u64) -> bool {
        if stamp <= self.last_update {
            return false;
        }
        self.last_update = stamp;
        self.current = None;
        true
    }

    pub fn current(&self) -> Option<&AreaSelection> {
        self.current.as_ref()
    }
}
