use std::cell::RefCell;
use std::io::stdout;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use lanescope_core::{
    Action, ApplicationContext, ContainerAttrs, Dispatcher, EngineConfig, PanelContainer,
    PollingFrameSource, StackedLayout, TimelineModel,
};
use lanescope_protocol::Point;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Paragraph},
};
use tracing::{debug, info};

use crate::renderer::{CELL_H, CELL_W, SharedFrame, TermHost, rasterize};

const AXIS_ROWS: u16 = 2;
const IDLE_POLL: Duration = Duration::from_millis(250);
const FRAME_POLL: Duration = Duration::from_millis(16);
const PAN_FRACTION: f64 = 0.1;
const ZOOM_STEP: f64 = 1.25;
const SCROLL_ROWS: f64 = 3.0;
const RESET_ANIMATION_MS: f64 = 300.0;
const HELP: &str = "←→ pan | +/- zoom | ↑↓ scroll | c/e collapse | 0 reset | q quit";

/// What the status line shows about outgoing broadcasts.
#[derive(Debug, Default)]
struct Broadcasts {
    selection: Option<(f64, f64, usize)>,
    visible_tracks: usize,
}

impl Broadcasts {
    fn record(&mut self, action: &Action) {
        match action {
            Action::SelectArea(record) => {
                self.selection = Some((record.start, record.end, record.track_ids.len()));
            }
            Action::DeselectArea { .. } => self.selection = None,
            Action::SetVisibleWindow(_) => {}
            Action::SetVisibleTracks(ids) => self.visible_tracks = ids.len(),
        }
    }
}

/// Screen regions, in terminal cells.
#[derive(Debug, Clone, Copy, Default)]
struct Regions {
    axis: Rect,
    tracks: Rect,
    status: Rect,
}

impl Regions {
    fn split(area: Rect) -> Self {
        let axis_rows = AXIS_ROWS.min(area.height.saturating_sub(2));
        let tracks_rows = area.height.saturating_sub(axis_rows + 2);
        Self {
            axis: Rect::new(area.x, area.y + 1, area.width, axis_rows),
            tracks: Rect::new(area.x, area.y + 1 + axis_rows, area.width, tracks_rows),
            status: Rect::new(area.x, area.y + area.height.saturating_sub(1), area.width, 1),
        }
    }
}

fn px(cells: u16, cell: f64) -> f64 {
    f64::from(cells) * cell
}

pub struct App {
    model: Rc<TimelineModel>,
    ctx: Rc<ApplicationContext>,
    source: Rc<PollingFrameSource>,
    axis: Rc<PanelContainer>,
    tracks: Rc<PanelContainer>,
    axis_frame: SharedFrame,
    tracks_frame: SharedFrame,
    broadcasts: Rc<RefCell<Broadcasts>>,
    regions: Regions,
    scroll_top: f64,
    dragging: bool,
    started: Instant,
}

impl App {
    pub fn new(model: TimelineModel, config: EngineConfig) -> Result<Self> {
        let model = Rc::new(model);
        let source = Rc::new(PollingFrameSource::new());
        let broadcasts = Rc::new(RefCell::new(Broadcasts::default()));
        let sink = Rc::clone(&broadcasts);
        let dispatcher: Rc<dyn Dispatcher> = Rc::new(move |action: Action| {
            debug!(?action, "dispatch");
            sink.borrow_mut().record(&action);
        });
        let ctx = ApplicationContext::initialize(config, source.clone(), dispatcher)?;

        let host = TermHost::default();
        let axis = PanelContainer::mount(
            &ctx,
            ContainerAttrs::pinned("axis"),
            Box::new(StackedLayout),
            &host,
        )?;
        let tracks = PanelContainer::mount(
            &ctx,
            ContainerAttrs::scrolling("tracks"),
            Box::new(StackedLayout),
            &host,
        )?;
        let axis_frame = host.frame("axis").context("axis surface missing")?;
        let tracks_frame = host.frame("tracks").context("tracks surface missing")?;

        ctx.scheduler()
            .set_relayout(Some(TimelineModel::relayout_callback(&model, &tracks)));
        axis.set_panels(model.pinned_panels())?;
        tracks.set_panels(model.scrolling_panels())?;
        if let Some(window) = model.initial_window() {
            ctx.set_visible_window(window);
        }
        let published = model.publish_data(&ctx);
        info!(tracks = model.track_count(), published, "timeline loaded");

        Ok(Self {
            model,
            ctx,
            source,
            axis,
            tracks,
            axis_frame,
            tracks_frame,
            broadcasts,
            regions: Regions::default(),
            scroll_top: 0.0,
            dragging: false,
            started: Instant::now(),
        })
    }

    pub fn run(mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        self.ctx.shutdown();
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ) -> Result<()> {
        let size = terminal.size()?;
        self.resize(Rect::new(0, 0, size.width, size.height))?;
        let mut needs_draw = true;
        loop {
            if self.source.take_request() {
                let now = self.started.elapsed().as_secs_f64() * 1000.0;
                self.step_frame(now)?;
                needs_draw = true;
            }
            if needs_draw {
                terminal.draw(|frame| self.draw(frame))?;
                needs_draw = false;
            }

            let timeout = if self.source.is_pending() { FRAME_POLL } else { IDLE_POLL };
            if !event::poll(timeout)? {
                continue;
            }
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Left => self.pan(-PAN_FRACTION),
                    KeyCode::Right => self.pan(PAN_FRACTION),
                    KeyCode::Char('+') | KeyCode::Char('=') => self.zoom(ZOOM_STEP),
                    KeyCode::Char('-') => self.zoom(1.0 / ZOOM_STEP),
                    KeyCode::Up => self.scroll_by(-SCROLL_ROWS * CELL_H),
                    KeyCode::Down => self.scroll_by(SCROLL_ROWS * CELL_H),
                    KeyCode::PageUp => self.scroll_by(-px(self.regions.tracks.height, CELL_H)),
                    KeyCode::PageDown => self.scroll_by(px(self.regions.tracks.height, CELL_H)),
                    KeyCode::Char('c') => self.collapse_all(true),
                    KeyCode::Char('e') => self.collapse_all(false),
                    KeyCode::Char('x') => self.ctx.deselect_area(),
                    KeyCode::Char('0') | KeyCode::Home => {
                        if let Some(window) = self.model.initial_window() {
                            self.ctx.animate_to_window(window, RESET_ANIMATION_MS);
                        }
                    }
                    _ => {}
                },
                Event::Mouse(mouse) => self.mouse(mouse),
                Event::Resize(width, height) => {
                    self.resize(Rect::new(0, 0, width, height))?;
                    needs_draw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Run one engine frame. Relayout may have shrunk the track list, so
    /// the scroll position is clamped again afterwards.
    fn step_frame(&mut self, now_ms: f64) -> Result<()> {
        self.ctx.on_frame(now_ms).context("frame failed")?;
        self.scroll_to(self.scroll_top);
        Ok(())
    }

    fn resize(&mut self, area: Rect) -> Result<()> {
        self.regions = Regions::split(area);
        let width = px(area.width, CELL_W);
        self.axis.on_resize(width, px(self.regions.axis.height, CELL_H))?;
        self.tracks.on_resize(width, px(self.regions.tracks.height, CELL_H))?;
        self.scroll_to(self.scroll_top);
        Ok(())
    }

    fn pan(&self, fraction: f64) {
        let width = self.ctx.time_scale().width_px();
        self.ctx.pan_by_px(width * fraction);
    }

    fn zoom(&self, factor: f64) {
        let scale = self.ctx.time_scale();
        let span = scale.span();
        let center = (scale.time_to_px(span.start) + scale.time_to_px(span.end)) / 2.0;
        self.ctx.zoom_at(center, factor);
    }

    fn scroll_by(&mut self, dy: f64) {
        self.scroll_to(self.scroll_top + dy);
    }

    /// Scroll the track list, kept within its current content.
    fn scroll_to(&mut self, top: f64) {
        let max = (self.tracks.total_height() - px(self.regions.tracks.height, CELL_H)).max(0.0);
        let top = top.clamp(0.0, max);
        if top != self.scroll_top {
            self.scroll_top = top;
            self.tracks.on_scroll(top);
        }
    }

    fn collapse_all(&self, collapsed: bool) {
        self.model.set_all_collapsed(collapsed);
        self.ctx.scheduler().schedule_full_redraw();
    }

    /// Pixel position of a cell's center relative to `region`, if inside.
    fn to_px(region: Rect, column: u16, row: u16) -> Option<Point> {
        let inside = column >= region.x
            && column < region.x + region.width
            && row >= region.y
            && row < region.y + region.height;
        inside.then(|| {
            Point::new(
                px(column - region.x, CELL_W) + CELL_W / 2.0,
                px(row - region.y, CELL_H) + CELL_H / 2.0,
            )
        })
    }

    fn mouse(&mut self, mouse: MouseEvent) {
        let pos = Self::to_px(self.regions.tracks, mouse.column, mouse.row);
        match (mouse.kind, pos) {
            (MouseEventKind::ScrollDown, _) => self.scroll_by(SCROLL_ROWS * CELL_H),
            (MouseEventKind::ScrollUp, _) => self.scroll_by(-SCROLL_ROWS * CELL_H),
            (MouseEventKind::Moved, Some(pos)) => {
                self.tracks.on_mouse_move(pos);
            }
            (MouseEventKind::Moved, None) => self.tracks.on_mouse_out(),
            (MouseEventKind::Down(MouseButton::Left), Some(pos)) => {
                if !self.tracks.on_mouse_click(pos) {
                    self.tracks.on_drag_start(pos);
                    self.dragging = true;
                }
            }
            (MouseEventKind::Drag(MouseButton::Left), Some(pos)) if self.dragging => {
                self.tracks.on_drag(pos);
            }
            (MouseEventKind::Up(MouseButton::Left), Some(pos)) if self.dragging => {
                self.tracks.on_drag_end(pos);
                self.dragging = false;
            }
            (MouseEventKind::Up(MouseButton::Left), None) => self.dragging = false,
            _ => {}
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let header = Block::default()
            .title(format!(" lanescope | {} tracks | {HELP} ", self.model.track_count()))
            .style(Style::default().fg(Color::White).bg(Color::DarkGray));
        frame.render_widget(header, Rect::new(area.x, area.y, area.width, 1));

        let Regions {
            axis,
            tracks,
            status,
        } = self.regions;
        let buf = frame.buffer_mut();
        rasterize(buf, axis, &self.axis_frame.borrow());
        rasterize(buf, tracks, &self.tracks_frame.borrow());

        let window = self.ctx.visible_window();
        let broadcasts = self.broadcasts.borrow();
        let selection = match broadcasts.selection {
            Some((start, end, n)) => format!("sel {start:.3}s..{end:.3}s over {n} tracks"),
            None => "no selection".to_string(),
        };
        let hover = self
            .ctx
            .hovered_ts()
            .map_or(String::new(), |ts| format!(" | @ {ts:.4}s"));
        let line = format!(
            " {:.3}s..{:.3}s | {} visible tracks | {selection}{hover}",
            window.start, window.end, broadcasts.visible_tracks
        );
        frame.render_widget(
            Paragraph::new(line).style(Style::default().fg(Color::Gray).bg(Color::Black)),
            status,
        );
    }
}
