use lanescope_protocol::{Paint, Point, Rect, RenderCommand, SharedStr, TextAlign};

/// Records drawing calls into a display list.
///
/// Transforms and clips are tracked so a panel that forgets to restore its
/// state cannot leak it into its neighbours: [`Canvas::into_commands`]
/// closes anything still open.
#[derive(Debug, Default)]
pub struct Canvas {
    commands: Vec<RenderCommand>,
    transform_depth: usize,
    clip_depth: usize,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: impl Into<Paint>) {
        self.commands.push(RenderCommand::DrawRect {
            rect,
            color: color.into(),
            border_color: None,
            label: None,
            item_id: None,
        });
    }

    /// Filled rectangle tagged with a data element id and optional label.
    pub fn fill_item(
        &mut self,
        rect: Rect,
        color: impl Into<Paint>,
        label: Option<SharedStr>,
        item_id: u64,
    ) {
        self.commands.push(RenderCommand::DrawRect {
            rect,
            color: color.into(),
            border_color: None,
            label,
            item_id: Some(item_id),
        });
    }

    pub fn fill_bordered(&mut self, rect: Rect, color: impl Into<Paint>, border: impl Into<Paint>) {
        self.commands.push(RenderCommand::DrawRect {
            rect,
            color: color.into(),
            border_color: Some(border.into()),
            label: None,
            item_id: None,
        });
    }

    pub fn stroke_rect(&mut self, rect: Rect, color: impl Into<Paint>, width: f64) {
        self.commands.push(RenderCommand::StrokeRect {
            rect,
            color: color.into(),
            width,
        });
    }

    pub fn clear_rect(&mut self, rect: Rect) {
        self.commands.push(RenderCommand::ClearRect { rect });
    }

    pub fn text(
        &mut self,
        position: Point,
        text: impl Into<SharedStr>,
        color: impl Into<Paint>,
        font_size: f64,
        align: TextAlign,
    ) {
        self.commands.push(RenderCommand::DrawText {
            position,
            text: text.into(),
            color: color.into(),
            font_size,
            align,
        });
    }

    pub fn line(&mut self, from: Point, to: Point, color: impl Into<Paint>, width: f64) {
        self.commands.push(RenderCommand::DrawLine {
            from,
            to,
            color: color.into(),
            width,
        });
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.push_transform(Point::new(dx, dy), Point::new(1.0, 1.0));
    }

    pub fn scale(&mut self, factor: f64) {
        self.push_transform(Point::new(0.0, 0.0), Point::new(factor, factor));
    }

    fn push_transform(&mut self, translate: Point, scale: Point) {
        self.transform_depth += 1;
        self.commands
            .push(RenderCommand::PushTransform { translate, scale });
    }

    /// Undo the most recent `translate` or `scale`. Extra calls are ignored.
    pub fn restore(&mut self) {
        if self.transform_depth > 0 {
            self.transform_depth -= 1;
            self.commands.push(RenderCommand::PopTransform);
        }
    }

    pub fn clip(&mut self, rect: Rect) {
        self.clip_depth += 1;
        self.commands.push(RenderCommand::SetClip { rect });
    }

    /// Drop the most recent clip. Extra calls are ignored.
    pub fn unclip(&mut self) {
        if self.clip_depth > 0 {
            self.clip_depth -= 1;
            self.commands.push(RenderCommand::ClearClip);
        }
    }

    pub fn begin_group(&mut self, id: SharedStr, label: Option<SharedStr>) {
        self.commands.push(RenderCommand::BeginGroup { id, label });
    }

    pub fn end_group(&mut self) {
        self.commands.push(RenderCommand::EndGroup);
    }

    /// Append another recorder's output, closing its open state first.
    pub fn append(&mut self, other: Canvas) {
        self.commands.extend(other.into_commands());
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn into_commands(mut self) -> Vec<RenderCommand> {
        while self.clip_depth > 0 {
            self.unclip();
        }
        while self.transform_depth > 0 {
            self.restore();
        }
        self.commands
    }
}
