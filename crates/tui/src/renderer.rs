//! Terminal surfaces: display lists are kept per container and rasterized
//! into character cells on every terminal draw.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lanescope_core::{Surface, SurfaceHost};
use lanescope_protocol::{Paint, Point, RenderCommand, SurfaceSize, TextAlign, ThemeToken};
use ratatui::buffer::Buffer;
use ratatui::layout;
use ratatui::style::Color;
use tracing::trace;

/// CSS pixels covered by one terminal cell.
pub const CELL_W: f64 = 8.0;
pub const CELL_H: f64 = 12.0;

/// The last display list a container presented, plus its placement.
#[derive(Debug, Default)]
pub struct SurfaceFrame {
    pub offset_y: f64,
    pub commands: Vec<RenderCommand>,
}

pub type SharedFrame = Rc<RefCell<SurfaceFrame>>;

struct TermSurface(SharedFrame);

impl Surface for TermSurface {
    fn resize(&mut self, size: SurfaceSize) {
        // Cells are repainted from scratch each draw; only the offset matters.
        trace!(?size, "terminal surface resized");
    }

    fn set_offset_y(&mut self, offset_y: f64) {
        self.0.borrow_mut().offset_y = offset_y;
    }

    fn present(&mut self, commands: Vec<RenderCommand>) {
        self.0.borrow_mut().commands = commands;
    }
}

/// Hands out one frame slot per container id.
#[derive(Default)]
pub struct TermHost {
    frames: RefCell<HashMap<String, SharedFrame>>,
}

impl TermHost {
    pub fn frame(&self, container_id: &str) -> Option<SharedFrame> {
        self.frames.borrow().get(container_id).cloned()
    }
}

impl SurfaceHost for TermHost {
    fn create_surface(&self, container_id: &str) -> Option<Box<dyn Surface>> {
        let frame = SharedFrame::default();
        self.frames
            .borrow_mut()
            .insert(container_id.to_string(), Rc::clone(&frame));
        Some(Box::new(TermSurface(frame)))
    }
}

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::Background => Color::Black,
        ThemeToken::Border => Color::DarkGray,
        ThemeToken::LaneBackground => Color::Black,
        ThemeToken::LaneBorder => Color::DarkGray,
        ThemeToken::LaneHeaderBackground => Color::DarkGray,
        ThemeToken::LaneHeaderText => Color::White,
        ThemeToken::TextPrimary => Color::White,
        ThemeToken::TextSecondary => Color::Gray,
        ThemeToken::TextMuted => Color::DarkGray,
        ThemeToken::SelectionOutline => Color::LightCyan,
        ThemeToken::SelectionFill => Color::Rgb(30, 60, 90),
        ThemeToken::HoverHighlight => Color::Rgb(70, 70, 70),
        ThemeToken::HoverCursor => Color::LightYellow,
        ThemeToken::LoadingBackground => Color::Rgb(30, 30, 30),
        ThemeToken::LoadingText => Color::Gray,
        ThemeToken::CounterFill => Color::Rgb(60, 120, 200),
        ThemeToken::CounterLine => Color::Rgb(80, 160, 240),
    }
}

fn paint_to_color(paint: &Paint) -> Color {
    match paint {
        Paint::Token(token) => theme_to_color(*token),
        Paint::Color(color) => {
            let [r, g, b] = color.to_rgb();
            Color::Rgb(r, g, b)
        }
    }
}

/// Readable text color on top of `paint`.
fn label_color(paint: &Paint) -> Color {
    match paint {
        Paint::Color(color) if color.l > 60.0 => Color::Black,
        _ => Color::White,
    }
}

/// Local-to-surface mapping: `surface = translate + scale * local`.
#[derive(Debug, Clone, Copy)]
struct Transform {
    tx: f64,
    ty: f64,
    sx: f64,
    sy: f64,
}

impl Transform {
    const IDENTITY: Self = Self {
        tx: 0.0,
        ty: 0.0,
        sx: 1.0,
        sy: 1.0,
    };

    fn then(self, translate: Point, scale: Point) -> Self {
        Self {
            tx: self.tx + self.sx * translate.x,
            ty: self.ty + self.sy * translate.y,
            sx: self.sx * scale.x,
            sy: self.sy * scale.y,
        }
    }

    fn apply(&self, p: Point) -> Point {
        Point::new(self.tx + self.sx * p.x, self.ty + self.sy * p.y)
    }
}

/// Axis-aligned box in surface pixels.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Bounds {
    fn of(t: &Transform, rect: &lanescope_protocol::Rect) -> Self {
        let a = t.apply(Point::new(rect.x, rect.y));
        let b = t.apply(Point::new(rect.right(), rect.bottom()));
        Self {
            x0: a.x.min(b.x),
            y0: a.y.min(b.y),
            x1: a.x.max(b.x),
            y1: a.y.max(b.y),
        }
    }

    fn intersect(self, other: Self) -> Self {
        Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }
}

/// Replays one display list into `area`, shifted by the surface offset.
struct Rasterizer<'a> {
    buf: &'a mut Buffer,
    area: layout::Rect,
    offset_y: f64,
    transforms: Vec<Transform>,
    clips: Vec<Bounds>,
}

impl<'a> Rasterizer<'a> {
    fn new(buf: &'a mut Buffer, area: layout::Rect, offset_y: f64) -> Self {
        let all = Bounds {
            x0: f64::NEG_INFINITY,
            y0: f64::NEG_INFINITY,
            x1: f64::INFINITY,
            y1: f64::INFINITY,
        };
        Self {
            buf,
            area,
            offset_y,
            transforms: vec![Transform::IDENTITY],
            clips: vec![all],
        }
    }

    fn transform(&self) -> Transform {
        self.transforms.last().copied().unwrap_or(Transform::IDENTITY)
    }

    fn clip(&self) -> Bounds {
        self.clips.last().copied().unwrap_or(Bounds {
            x0: 0.0,
            y0: 0.0,
            x1: 0.0,
            y1: 0.0,
        })
    }

    fn col(&self, x: f64) -> i64 {
        (x / CELL_W).floor() as i64
    }

    fn row(&self, y: f64) -> i64 {
        ((y + self.offset_y) / CELL_H).floor() as i64
    }

    fn cell(&mut self, col: i64, row: i64) -> Option<&mut ratatui::buffer::Cell> {
        if col < 0
            || row < 0
            || col >= i64::from(self.area.width)
            || row >= i64::from(self.area.height)
        {
            return None;
        }
        let x = self.area.x + col as u16;
        let y = self.area.y + row as u16;
        self.buf.cell_mut((x, y))
    }

    /// Column and row spans covered by `b`. Anything non-empty covers at
    /// least one cell.
    fn cell_span(&self, b: Bounds) -> Option<(i64, i64, i64, i64)> {
        if b.x1 <= b.x0 || b.y1 <= b.y0 {
            return None;
        }
        let c0 = (b.x0 / CELL_W).round() as i64;
        let c1 = ((b.x1 / CELL_W).round() as i64).max(c0 + 1);
        let r0 = ((b.y0 + self.offset_y) / CELL_H).round() as i64;
        let r1 = (((b.y1 + self.offset_y) / CELL_H).round() as i64).max(r0 + 1);
        Some((c0, c1, r0, r1))
    }

    fn run(&mut self, commands: &[RenderCommand]) {
        for command in commands {
            match command {
                RenderCommand::DrawRect {
                    rect,
                    color,
                    border_color,
                    label,
                    ..
                } => self.fill(rect, color, border_color.as_ref(), label.as_deref()),
                RenderCommand::StrokeRect { rect, color, .. } => self.stroke(rect, color),
                RenderCommand::ClearRect { rect } => self.clear(rect),
                RenderCommand::DrawText {
                    position,
                    text,
                    color,
                    font_size,
                    align,
                } => self.text(*position, text, color, *font_size, *align),
                RenderCommand::DrawLine { from, to, color, .. } => self.line(*from, *to, color),
                RenderCommand::SetClip { rect } => {
                    let b = Bounds::of(&self.transform(), rect).intersect(self.clip());
                    self.clips.push(b);
                }
                RenderCommand::ClearClip => {
                    if self.clips.len() > 1 {
                        self.clips.pop();
                    }
                }
                RenderCommand::PushTransform { translate, scale } => {
                    let t = self.transform().then(*translate, *scale);
                    self.transforms.push(t);
                }
                RenderCommand::PopTransform => {
                    if self.transforms.len() > 1 {
                        self.transforms.pop();
                    }
                }
                RenderCommand::BeginGroup { .. } | RenderCommand::EndGroup => {}
            }
        }
    }

    fn fill(
        &mut self,
        rect: &lanescope_protocol::Rect,
        color: &Paint,
        border: Option<&Paint>,
        label: Option<&str>,
    ) {
        let b = Bounds::of(&self.transform(), rect).intersect(self.clip());
        let Some((c0, c1, r0, r1)) = self.cell_span(b) else {
            return;
        };
        let bg = paint_to_color(color);
        let border = border.map(paint_to_color);
        for row in r0..r1 {
            for col in c0..c1 {
                let edge = border.filter(|_| c1 - c0 >= 2 && (col == c0 || col == c1 - 1));
                if let Some(cell) = self.cell(col, row) {
                    cell.set_char(' ').set_bg(bg);
                    if let Some(border) = edge {
                        cell.set_char(if col == c0 { '▏' } else { '▕' }).set_fg(border);
                    }
                }
            }
        }

        // Label on the middle row, inset by one cell.
        let Some(label) = label else {
            return;
        };
        let room = (c1 - c0 - 2).max(0) as usize;
        if room < label.chars().count() {
            return;
        }
        let fg = label_color(color);
        let row = (r0 + r1 - 1) / 2;
        for (i, ch) in label.chars().enumerate() {
            if let Some(cell) = self.cell(c0 + 1 + i as i64, row) {
                cell.set_char(ch).set_fg(fg);
            }
        }
    }

    fn stroke(&mut self, rect: &lanescope_protocol::Rect, color: &Paint) {
        let b = Bounds::of(&self.transform(), rect);
        let clip = self.clip();
        let Some((c0, c1, r0, r1)) = self.cell_span(b) else {
            return;
        };
        let Some((k0, k1, q0, q1)) = self.cell_span(b.intersect(clip)) else {
            return;
        };
        let fg = paint_to_color(color);
        for row in q0..q1 {
            for col in k0..k1 {
                let ch = if row == r0 || row == r1 - 1 {
                    '─'
                } else if col == c0 || col == c1 - 1 {
                    '│'
                } else {
                    continue;
                };
                if let Some(cell) = self.cell(col, row) {
                    cell.set_char(ch).set_fg(fg);
                }
            }
        }
    }

    fn clear(&mut self, rect: &lanescope_protocol::Rect) {
        let b = Bounds::of(&self.transform(), rect).intersect(self.clip());
        let Some((c0, c1, r0, r1)) = self.cell_span(b) else {
            return;
        };
        for row in r0..r1 {
            for col in c0..c1 {
                if let Some(cell) = self.cell(col, row) {
                    cell.reset();
                }
            }
        }
    }

    fn text(
        &mut self,
        position: Point,
        text: &str,
        color: &Paint,
        font_size: f64,
        align: TextAlign,
    ) {
        // `position.y` is the baseline; the glyph middle sits half a font above.
        let p = self
            .transform()
            .apply(Point::new(position.x, position.y - font_size / 2.0));
        let clip = self.clip();
        if p.y < clip.y0 || p.y >= clip.y1 {
            return;
        }
        let len = text.chars().count() as i64;
        let anchor = self.col(p.x);
        let start = match align {
            TextAlign::Left => anchor,
            TextAlign::Center => anchor - len / 2,
            TextAlign::Right => anchor - len,
        };
        let row = self.row(p.y);
        let fg = paint_to_color(color);
        for (i, ch) in text.chars().enumerate() {
            let col = start + i as i64;
            let x = col as f64 * CELL_W;
            if x < clip.x0 || x >= clip.x1 {
                continue;
            }
            if let Some(cell) = self.cell(col, row) {
                cell.set_char(ch).set_fg(fg);
            }
        }
    }

    fn line(&mut self, from: Point, to: Point, color: &Paint) {
        let t = self.transform();
        let (a, b) = (t.apply(from), t.apply(to));
        let clip = self.clip();
        let fg = paint_to_color(color);
        if (b.x - a.x).abs() < (b.y - a.y).abs() {
            if a.x < clip.x0 || a.x >= clip.x1 {
                return;
            }
            let col = self.col(a.x);
            let (y0, y1) = (a.y.min(b.y).max(clip.y0), a.y.max(b.y).min(clip.y1));
            if y1 <= y0 {
                return;
            }
            for row in self.row(y0)..=self.row(y1 - f64::EPSILON) {
                if let Some(cell) = self.cell(col, row) {
                    cell.set_char('│').set_fg(fg);
                }
            }
        } else {
            if a.y < clip.y0 || a.y >= clip.y1 {
                return;
            }
            let row = self.row(a.y);
            let (x0, x1) = (a.x.min(b.x).max(clip.x0), a.x.max(b.x).min(clip.x1));
            if x1 <= x0 {
                return;
            }
            for col in self.col(x0)..=self.col(x1 - f64::EPSILON) {
                if let Some(cell) = self.cell(col, row) {
                    cell.set_char('─').set_fg(fg);
                }
            }
        }
    }
}

/// Paint a container's last presented frame into `area`.
pub fn rasterize(buf: &mut Buffer, area: layout::Rect, frame: &SurfaceFrame) {
    Rasterizer::new(buf, area, frame.offset_y).run(&frame.commands);
}
