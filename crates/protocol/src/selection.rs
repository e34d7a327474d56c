use serde::{Deserialize, Serialize};

use crate::shared_str::SharedStr;

/// Area selection as broadcast to the outside store.
///
/// `last_update` is a monotonic stamp; consumers merging records from
/// several sources keep the one with the larger stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSelectionRecord {
    pub start: f64,
    pub end: f64,
    pub track_ids: Vec<SharedStr>,
    pub last_update: u64,
}
