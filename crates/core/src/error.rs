use thiserror::Error;

/// Errors the engine reports to its host.
///
/// Only broken host integration surfaces here. Missing or stale track data
/// is never an error (it is drawn as a loading placeholder) and pointer
/// misses are reported as `None` / `false`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("host could not provide a drawing surface")]
    MissingContext,
    #[error("panel layout out of sync: {panels} panels but {positions} cached positions")]
    LayoutMismatch { panels: usize, positions: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid area selection: start {start} is after end {end}")]
    InvalidSelection { start: f64, end: f64 },
    #[error("invalid timeline document: {0}")]
    InvalidDocument(String),
    #[error("frame callback failed: {0}")]
    Callback(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn callback(msg: impl Into<String>) -> Self {
        Self::Callback(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let err = EngineError::LayoutMismatch {
            panels: 3,
            positions: 2,
        };
        assert!(err.to_string().contains("3 panels but 2"));
        assert!(
            EngineError::callback("boom")
                .to_string()
                .starts_with("frame callback failed:")
        );
    }
}
