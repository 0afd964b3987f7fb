//! Overlay description for the live preview and its RGBA rasterization.
//!
//! The overlay is recomputed every detection tick and fully replaces the
//! previous one. Text labels are carried as data; compositing glyphs is left
//! to the presentation layer.

use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::expression::ExpressionLabel;
use crate::types::{BoundingBox, DetectionFrame, Dimensions, Point};

/// Vertical gap between the top edge of a face box and its label baseline.
pub const LABEL_OFFSET_Y: f32 = 10.0;

/// Label fill colour (#00FF00).
pub const LABEL_COLOR: Rgba<u8> = Rgba([0x00, 0xFF, 0x00, 0xFF]);
const BOX_COLOR: Rgba<u8> = Rgba([0x00, 0x00, 0xFF, 0xFF]);
const LANDMARK_COLOR: Rgba<u8> = Rgba([0x00, 0xFF, 0xFF, 0xFF]);
const BOX_LINE_WIDTH: u32 = 2;
const LANDMARK_RADIUS: i32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct OverlayFace {
    pub bounding_box: BoundingBox,
    pub landmarks: Vec<Point>,
    pub label: ExpressionLabel,
    /// Where the label text starts (left edge, baseline).
    pub label_anchor: Point,
}

impl OverlayFace {
    pub fn label_text(&self) -> String {
        self.label.to_string()
    }
}

/// Everything drawn over the preview for one tick.
#[derive(Debug, Clone, Serialize)]
pub struct Overlay {
    pub size: Dimensions,
    pub faces: Vec<OverlayFace>,
}

impl Overlay {
    pub fn empty(size: Dimensions) -> Self {
        Self {
            size,
            faces: Vec::new(),
        }
    }

    /// Build the overlay for `frame`, rescaled to `display`.
    pub fn from_detections(frame: &DetectionFrame, display: Dimensions) -> Self {
        let resized = frame.resized(display);
        let faces = resized
            .faces
            .into_iter()
            .map(|face| {
                let b = face.bounding_box;
                OverlayFace {
                    label: face.expressions.dominant(),
                    label_anchor: Point::new(b.x, b.y - LABEL_OFFSET_Y),
                    bounding_box: b,
                    landmarks: face.landmarks,
                }
            })
            .collect();
        Self {
            size: resized.source,
            faces,
        }
    }

    /// Rasterize boxes and landmark points onto a transparent canvas.
    pub fn render(&self) -> RgbaImage {
        let mut canvas = RgbaImage::new(self.size.width, self.size.height);
        for face in &self.faces {
            draw_box(&mut canvas, &face.bounding_box, BOX_COLOR);
            for p in &face.landmarks {
                draw_dot(&mut canvas, p, LANDMARK_COLOR);
            }
        }
        canvas
    }
}

fn put(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    canvas.put_pixel(x as u32, y as u32, color);
}

fn draw_box(canvas: &mut RgbaImage, b: &BoundingBox, color: Rgba<u8>) {
    let x0 = b.x.round() as i64;
    let y0 = b.y.round() as i64;
    let x1 = (b.right().round() as i64).saturating_sub(1);
    let y1 = (b.bottom().round() as i64).saturating_sub(1);
    if x1 < x0 || y1 < y0 {
        return;
    }
    // Only the on-canvas part of each edge is walked.
    let (xs, xe) = (x0.max(0), x1.min(canvas.width() as i64 - 1));
    let (ys, ye) = (y0.max(0), y1.min(canvas.height() as i64 - 1));
    for t in 0..BOX_LINE_WIDTH as i64 {
        for x in xs..=xe {
            put(canvas, x, y0.saturating_add(t), color);
            put(canvas, x, y1.saturating_sub(t), color);
        }
        for y in ys..=ye {
            put(canvas, x0.saturating_add(t), y, color);
            put(canvas, x1.saturating_sub(t), y, color);
        }
    }
}

fn draw_dot(canvas: &mut RgbaImage, p: &Point, color: Rgba<u8>) {
    let cx = p.x.round() as i64;
    let cy = p.y.round() as i64;
    let r = LANDMARK_RADIUS as i64;
    for dy in -r..=r {
        for dx in -r..=r {
            put(canvas, cx.saturating_add(dx), cy.saturating_add(dy), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Expression, ExpressionScores};
    use crate::types::FaceObservation;

    fn frame_with_face() -> DetectionFrame {
        DetectionFrame::new(
            Dimensions::new(64, 48),
            vec![FaceObservation {
                bounding_box: BoundingBox::new(10.0, 20.0, 20.0, 16.0),
                score: 0.8,
                landmarks: vec![Point::new(15.0, 25.0)],
                expressions: ExpressionScores::default()
                    .with(Expression::Happy, 0.92)
                    .with(Expression::Neutral, 0.05)
                    .with(Expression::Sad, 0.03),
            }],
        )
    }

    #[test]
    fn test_label_and_anchor() {
        let overlay = Overlay::from_detections(&frame_with_face(), Dimensions::new(64, 48));
        assert_eq!(overlay.faces.len(), 1);
        let face = &overlay.faces[0];
        assert_eq!(face.label_text(), "happy: 92.0%");
        assert_eq!(face.label_anchor, Point::new(10.0, 10.0));
    }

    #[test]
    fn test_overlay_scales_to_display() {
        let overlay = Overlay::from_detections(&frame_with_face(), Dimensions::new(128, 96));
        assert_eq!(overlay.size, Dimensions::new(128, 96));
        assert_eq!(
            overlay.faces[0].bounding_box,
            BoundingBox::new(20.0, 40.0, 40.0, 32.0)
        );
        assert_eq!(overlay.faces[0].label_anchor, Point::new(20.0, 30.0));
    }

    #[test]
    fn test_render_draws_box_and_landmark() {
        let overlay = Overlay::from_detections(&frame_with_face(), Dimensions::new(64, 48));
        let img = overlay.render();
        assert_eq!(img.dimensions(), (64, 48));
        // box corner
        assert_eq!(*img.get_pixel(10, 20), BOX_COLOR);
        // landmark centre
        assert_eq!(*img.get_pixel(15, 25), LANDMARK_COLOR);
        // outside everything stays transparent
        assert_eq!(img.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_render_clips_out_of_bounds() {
        let frame = DetectionFrame::new(
            Dimensions::new(16, 16),
            vec![FaceObservation {
                bounding_box: BoundingBox::new(-5.0, -5.0, 40.0, 40.0),
                score: 0.5,
                landmarks: vec![Point::new(100.0, 100.0)],
                expressions: ExpressionScores::default(),
            }],
        );
        let img = Overlay::from_detections(&frame, Dimensions::new(16, 16)).render();
        assert_eq!(img.dimensions(), (16, 16));
    }

    fn render_box(size: u32, bounding_box: BoundingBox) -> RgbaImage {
        let frame = DetectionFrame::new(
            Dimensions::new(size, size),
            vec![FaceObservation {
                bounding_box,
                score: 0.5,
                landmarks: vec![],
                expressions: ExpressionScores::default(),
            }],
        );
        Overlay::from_detections(&frame, Dimensions::new(size, size)).render()
    }

    #[test]
    fn test_render_far_off_canvas_box_is_skipped() {
        let img = render_box(16, BoundingBox::new(1e9, 1e9, 1e9, 1e9));
        assert!(img.pixels().all(|p| p[3] == 0));

        let img = render_box(16, BoundingBox::new(-1e9, -1e9, 3e9, 3e9));
        assert!(img.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_render_huge_box_draws_visible_edge() {
        let img = render_box(16, BoundingBox::new(-1e9, 2.0, 2e9, 5.0));
        assert_eq!(*img.get_pixel(0, 2), BOX_COLOR);
        assert_eq!(*img.get_pixel(15, 2), BOX_COLOR);
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(15, 15)[3], 0);
    }

    #[test]
    fn test_empty_overlay() {
        let img = Overlay::empty(Dimensions::new(4, 4)).render();
        assert!(img.pixels().all(|p| p[3] == 0));
    }
}
