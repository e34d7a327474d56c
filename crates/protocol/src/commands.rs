use serde::{Deserialize, Serialize};

use crate::color::Paint;
use crate::shared_str::SharedStr;
use crate::types::{Point, Rect};

/// A single drawing instruction in a frame's display list.
///
/// Panels record these into a `Canvas`; the panel container wraps each
/// panel's commands in a transform/clip pair and hands the finished list to
/// the host surface. Commands are replayed in order and are otherwise
/// stateless, so a list can be serialized across the WASM boundary as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Fill a rectangle, optionally stroking its border. `item_id` carries a
    /// logical element identifier (slice id, sample index) for host-side
    /// hit regions.
    DrawRect {
        rect: Rect,
        color: Paint,
        border_color: Option<Paint>,
        label: Option<SharedStr>,
        item_id: Option<u64>,
    },

    /// Stroke the outline of a rectangle without filling it.
    StrokeRect {
        rect: Rect,
        color: Paint,
        width: f64,
    },

    /// Reset a rectangular region to transparent.
    ClearRect { rect: Rect },

    /// Draw a text string anchored at a position.
    DrawText {
        position: Point,
        text: SharedStr,
        color: Paint,
        font_size: f64,
        align: TextAlign,
    },

    /// Draw a line segment.
    DrawLine {
        from: Point,
        to: Point,
        color: Paint,
        width: f64,
    },

    /// Restrict subsequent drawing to a rectangle (intersected with any
    /// active clip). Paired with `ClearClip`.
    SetClip { rect: Rect },

    /// Restore the clip region active before the matching `SetClip`.
    ClearClip,

    /// Push an affine transform applied to all subsequent commands until the
    /// matching `PopTransform`.
    PushTransform { translate: Point, scale: Point },

    /// Pop the most recent transform.
    PopTransform,

    /// Begin a logical group (one panel). Renderers may ignore it.
    BeginGroup {
        id: SharedStr,
        label: Option<SharedStr>,
    },

    /// End the current group.
    EndGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}
