use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the host renderer's active theme.
///
/// Track data colors are concrete [`Color`](crate::Color)s from the
/// colorizer; tokens cover chrome that should follow the host theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    Background,
    Border,

    LaneBackground,
    LaneBorder,
    LaneHeaderBackground,
    LaneHeaderText,

    TextPrimary,
    TextSecondary,
    TextMuted,

    // Selection / hover
    SelectionOutline,
    SelectionFill,
    HoverHighlight,
    HoverCursor,

    // Placeholder for ranges whose data has not arrived yet
    LoadingBackground,
    LoadingText,

    // Counter tracks
    CounterFill,
    CounterLine,
}
