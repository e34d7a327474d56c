//! The per-panel rendering contract and the host capabilities a panel
//! container depends on.

use lanescope_protocol::{Point, RenderCommand, SharedStr, Size, SurfaceSize};

use crate::canvas::Canvas;
use crate::context::TimelineView;

/// One horizontal lane of the timeline.
///
/// Coordinates passed to every method are panel-local CSS pixels: the
/// container has already removed scroll offset and panel position.
pub trait Panel {
    fn height(&self) -> f64;

    /// Pick up the view's current data snapshots before the container
    /// measures or paints. Returns whether `height` changed.
    fn sync(&mut self, _view: &TimelineView) -> bool {
        false
    }

    /// Record this panel's drawing for the current frame. `size` is the
    /// panel rectangle; drawing outside it is clipped.
    fn render_canvas(&mut self, canvas: &mut Canvas, size: Size, view: &TimelineView);

    fn on_mouse_move(&mut self, _pos: Point, _view: &TimelineView) {}

    fn on_mouse_out(&mut self) {}

    /// Returns whether the click was handled.
    fn on_mouse_click(&mut self, _pos: Point, _view: &TimelineView) -> bool {
        false
    }

    /// Track ids hidden under this panel. Only collapsed group headers
    /// return `Some`; area selection over them covers the children too.
    fn collapsed_children(&self) -> Option<&[SharedStr]> {
        None
    }
}

/// A panel plus the attributes the container needs about it.
pub struct PanelEntry {
    pub id: SharedStr,
    pub selectable: bool,
    pub panel: Box<dyn Panel>,
}

impl PanelEntry {
    pub fn new(id: impl Into<SharedStr>, panel: Box<dyn Panel>) -> Self {
        Self {
            id: id.into(),
            selectable: true,
            panel,
        }
    }

    pub fn not_selectable(mut self) -> Self {
        self.selectable = false;
        self
    }
}

impl std::fmt::Debug for PanelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelEntry")
            .field("id", &self.id)
            .field("selectable", &self.selectable)
            .field("height", &self.panel.height())
            .finish()
    }
}

/// Cached geometry of one panel in container content coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelPosition {
    pub id: SharedStr,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Measures panel geometry. Must return one position per entry, in order.
pub trait LayoutSource {
    fn measure(&self, panels: &[PanelEntry], width: f64) -> Vec<PanelPosition>;
}

/// Stacks panels top to bottom at their own heights, full width.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackedLayout;

impl LayoutSource for StackedLayout {
    fn measure(&self, panels: &[PanelEntry], width: f64) -> Vec<PanelPosition> {
        let mut y = 0.0;
        panels
            .iter()
            .map(|entry| {
                let height = entry.panel.height().max(0.0);
                let position = PanelPosition {
                    id: entry.id.clone(),
                    x: 0.0,
                    y,
                    width,
                    height,
                };
                y += height;
                position
            })
            .collect()
    }
}

/// A drawing surface owned by one panel container.
pub trait Surface {
    /// Resize the backing buffer to `size.width * dpr` by `size.height * dpr`.
    fn resize(&mut self, size: SurfaceSize);

    /// Vertical offset of the surface's top edge relative to the top of the
    /// visible region. Compositing only; no repaint.
    fn set_offset_y(&mut self, offset_y: f64);

    /// Replace the surface contents with a frame's display list.
    fn present(&mut self, commands: Vec<RenderCommand>);
}

pub trait SurfaceHost {
    /// `None` when the host cannot provide a drawing surface.
    fn create_surface(&self, container_id: &str) -> Option<Box<dyn Surface>>;

    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    impl Panel for Fixed {
        fn height(&self) -> f64 {
            self.0
        }

        fn render_canvas(&mut self, _canvas: &mut Canvas, _size: Size, _view: &TimelineView) {}
    }

    #[test]
    fn stacked_layout_accumulates_heights() {
        let panels = vec![
            PanelEntry::new("a", Box::new(Fixed(40.0))),
            PanelEntry::new("b", Box::new(Fixed(60.0))),
            PanelEntry::new("c", Box::new(Fixed(-5.0))),
        ];
        let positions = StackedLayout.measure(&panels, 300.0);
        let ys: Vec<f64> = positions.iter().map(|p| p.y).collect();
        assert_eq!(ys, [0.0, 40.0, 100.0]);
        assert_eq!(positions[2].height, 0.0);
        assert!(positions.iter().all(|p| p.width == 300.0));
    }

    #[test]
    fn entries_default_to_selectable() {
        let entry = PanelEntry::new("a", Box::new(Fixed(1.0)));
        assert!(entry.selectable);
        assert!(!entry.not_selectable().selectable);
    }
}
