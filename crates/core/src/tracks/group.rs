use std::cell::Cell;
use std::rc::Rc;

use lanescope_protocol::{Point, Rect, SharedStr, Size, TextAlign, ThemeToken};

use crate::canvas::Canvas;
use crate::context::TimelineView;
use crate::panel::Panel;

const HEADER_HEIGHT: f64 = 28.0;
const FONT_SIZE: f64 = 12.0;
const CHEVRON_X: f64 = 8.0;
const TITLE_X: f64 = 24.0;

/// Collapse state of a track group, shared between the header panel and
/// whatever rebuilds the panel list.
#[derive(Debug, Default)]
pub struct GroupState {
    collapsed: Cell<bool>,
    changed: Cell<bool>,
}

impl GroupState {
    pub fn new(collapsed: bool) -> Rc<Self> {
        Rc::new(Self {
            collapsed: Cell::new(collapsed),
            changed: Cell::new(false),
        })
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed.get()
    }

    pub fn toggle(&self) {
        self.collapsed.set(!self.collapsed.get());
        self.changed.set(true);
    }

    /// Whether the state flipped since the last call.
    pub fn take_changed(&self) -> bool {
        self.changed.replace(false)
    }
}

/// Header row of a track group. Clicking it collapses or expands the group.
pub struct GroupHeader {
    title: SharedStr,
    children: Vec<SharedStr>,
    state: Rc<GroupState>,
    hovered: bool,
}

impl GroupHeader {
    pub fn new(
        title: impl Into<SharedStr>,
        children: Vec<SharedStr>,
        state: Rc<GroupState>,
    ) -> Self {
        Self {
            title: title.into(),
            children,
            state,
            hovered: false,
        }
    }

    pub fn state(&self) -> &Rc<GroupState> {
        &self.state
    }
}

impl Panel for GroupHeader {
    fn height(&self) -> f64 {
        HEADER_HEIGHT
    }

    fn render_canvas(&mut self, canvas: &mut Canvas, size: Size, _view: &TimelineView) {
        let background = if self.hovered {
            ThemeToken::HoverHighlight
        } else {
            ThemeToken::LaneHeaderBackground
        };
        canvas.fill_bordered(
            Rect::new(0.0, 0.0, size.width, size.height),
            background,
            ThemeToken::LaneBorder,
        );
        let baseline = size.height / 2.0 + FONT_SIZE / 3.0;
        let chevron = if self.state.is_collapsed() { "▸" } else { "▾" };
        canvas.text(
            Point::new(CHEVRON_X, baseline),
            chevron,
            ThemeToken::LaneHeaderText,
            FONT_SIZE,
            TextAlign::Left,
        );
        canvas.text(
            Point::new(TITLE_X, baseline),
            self.title.clone(),
            ThemeToken::LaneHeaderText,
            FONT_SIZE,
            TextAlign::Left,
        );
        canvas.text(
            Point::new(size.width - 8.0, baseline),
            format!("{} tracks", self.children.len()),
            ThemeToken::TextMuted,
            FONT_SIZE - 2.0,
            TextAlign::Right,
        );
    }

    fn on_mouse_move(&mut self, _pos: Point, _view: &TimelineView) {
        self.hovered = true;
    }

    fn on_mouse_out(&mut self) {
        self.hovered = false;
    }

    fn on_mouse_click(&mut self, _pos: Point, _view: &TimelineView) -> bool {
        self.state.toggle();
        true
    }

    fn collapsed_children(&self) -> Option<&[SharedStr]> {
        self.state.is_collapsed().then_some(self.children.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use lanescope_protocol::RenderCommand;

    use super::*;
    use crate::time_scale::TimeSpan;

    fn header(collapsed: bool) -> GroupHeader {
        GroupHeader::new(
            "renderer",
            vec!["t1".into(), "t2".into()],
            GroupState::new(collapsed),
        )
    }

    #[test]
    fn click_toggles_and_flags_the_change() {
        let view = TimelineView::new(TimeSpan::new(0.0, 1.0), 100.0);
        let mut group = header(false);
        let state = Rc::clone(group.state());
        assert!(!state.take_changed());

        assert!(group.on_mouse_click(Point::new(5.0, 5.0), &view));
        assert!(state.is_collapsed());
        assert!(state.take_changed());
        assert!(!state.take_changed());
    }

    #[test]
    fn children_are_exposed_only_while_collapsed() {
        let view = TimelineView::new(TimeSpan::new(0.0, 1.0), 100.0);
        let mut group = header(false);
        assert!(group.collapsed_children().is_none());
        group.on_mouse_click(Point::new(5.0, 5.0), &view);
        let children = group.collapsed_children().map(<[SharedStr]>::to_vec);
        assert_eq!(children, Some(vec![SharedStr::from("t1"), SharedStr::from("t2")]));
    }

    #[test]
    fn header_shows_chevron_and_child_count() {
        let view = TimelineView::new(TimeSpan::new(0.0, 1.0), 100.0);
        let mut group = header(true);
        let mut canvas = Canvas::new();
        group.render_canvas(&mut canvas, Size::new(300.0, HEADER_HEIGHT), &view);
        let texts: Vec<String> = canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawText { text, .. } => Some(text.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, ["▸", "renderer", "2 tracks"]);
    }
}
