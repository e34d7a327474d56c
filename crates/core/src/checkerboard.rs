//! Placeholder pattern for time ranges whose data has not arrived yet.

use lanescope_protocol::{Point, Rect, TextAlign, ThemeToken};

use crate::canvas::Canvas;

const CELL_PX: f64 = 10.0;
const LABEL: &str = "Loading...";
const LABEL_MIN_WIDTH_PX: f64 = 60.0;
const FONT_SIZE: f64 = 11.0;

/// Checkerboard the horizontal band `[left_px, right_px)` of a track.
pub fn checkerboard(canvas: &mut Canvas, height_px: f64, left_px: f64, right_px: f64) {
    let width = right_px - left_px;
    if width <= 0.0 || height_px <= 0.0 {
        return;
    }
    canvas.fill_rect(
        Rect::new(left_px, 0.0, width, height_px),
        ThemeToken::LoadingBackground,
    );

    // Cells are aligned to absolute multiples of CELL_PX so adjacent bands
    // continue the same pattern.
    let first_col = (left_px / CELL_PX).floor() as i64;
    let last_col = (right_px / CELL_PX).ceil() as i64;
    let rows = (height_px / CELL_PX).ceil() as i64;
    for row in 0..rows {
        for col in first_col..last_col {
            if (row + col).rem_euclid(2) != 0 {
                continue;
            }
            let x0 = (col as f64 * CELL_PX).max(left_px);
            let x1 = ((col + 1) as f64 * CELL_PX).min(right_px);
            let y0 = row as f64 * CELL_PX;
            let y1 = (y0 + CELL_PX).min(height_px);
            if x1 > x0 {
                canvas.fill_rect(Rect::new(x0, y0, x1 - x0, y1 - y0), ThemeToken::LaneBackground);
            }
        }
    }

    if width >= LABEL_MIN_WIDTH_PX {
        canvas.text(
            Point::new(left_px + width / 2.0, height_px / 2.0),
            LABEL,
            ThemeToken::LoadingText,
            FONT_SIZE,
            TextAlign::Center,
        );
    }
}

/// Checkerboard `[start_px, end_px)` except for the loaded region
/// `[left_px, right_px)`.
pub fn checkerboard_except(
    canvas: &mut Canvas,
    height_px: f64,
    start_px: f64,
    end_px: f64,
    left_px: f64,
    right_px: f64,
) {
    if right_px <= start_px || left_px >= end_px {
        checkerboard(canvas, height_px, start_px, end_px);
        return;
    }
    if left_px > start_px {
        checkerboard(canvas, height_px, start_px, left_px);
    }
    if right_px < end_px {
        checkerboard(canvas, height_px, right_px, end_px);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanescope_protocol::{Paint, RenderCommand};

    fn backgrounds(canvas: &Canvas) -> Vec<Rect> {
        canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawRect {
                    rect,
                    color: Paint::Token(ThemeToken::LoadingBackground),
                    ..
                } => Some(*rect),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_band_draws_nothing() {
        let mut canvas = Canvas::new();
        checkerboard(&mut canvas, 20.0, 50.0, 50.0);
        checkerboard(&mut canvas, 0.0, 0.0, 50.0);
        assert!(canvas.is_empty());
    }

    #[test]
    fn cells_stay_inside_band() {
        let mut canvas = Canvas::new();
        checkerboard(&mut canvas, 20.0, 5.0, 95.0);
        for cmd in canvas.commands() {
            if let RenderCommand::DrawRect { rect, .. } = cmd {
                assert!(rect.x >= 5.0 && rect.right() <= 95.0, "{rect:?}");
                assert!(rect.bottom() <= 20.0);
            }
        }
        let labels = canvas
            .commands()
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawText { .. }))
            .count();
        assert_eq!(labels, 1);
    }

    #[test]
    fn except_leaves_loaded_region_untouched() {
        let mut canvas = Canvas::new();
        checkerboard_except(&mut canvas, 10.0, 0.0, 100.0, 20.0, 70.0);
        assert_eq!(
            backgrounds(&canvas),
            [Rect::new(0.0, 0.0, 20.0, 10.0), Rect::new(70.0, 0.0, 30.0, 10.0)]
        );
    }

    #[test]
    fn except_with_disjoint_region_covers_everything() {
        let mut canvas = Canvas::new();
        checkerboard_except(&mut canvas, 10.0, 0.0, 100.0, 150.0, 200.0);
        assert_eq!(backgrounds(&canvas), [Rect::new(0.0, 0.0, 100.0, 10.0)]);
    }

    #[test]
    fn except_with_full_coverage_draws_nothing() {
        let mut canvas = Canvas::new();
        checkerboard_except(&mut canvas, 10.0, 0.0, 100.0, -10.0, 120.0);
        assert!(canvas.is_empty());
    }
}
