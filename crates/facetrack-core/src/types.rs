use serde::{Deserialize, Serialize};

use crate::expression::ExpressionScores;

/// A 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned face box, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Scale this box by independent horizontal and vertical factors.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

/// One detected face: location, 68 landmark points and expression scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bounding_box: BoundingBox,
    /// Detector confidence for the box itself.
    pub score: f32,
    pub landmarks: Vec<Point>,
    pub expressions: ExpressionScores,
}

impl FaceObservation {
    /// Map this observation from one coordinate space into another.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            bounding_box: self.bounding_box.scaled(sx, sy),
            score: self.score,
            landmarks: self
                .landmarks
                .iter()
                .map(|p| Point::new(p.x * sx, p.y * sy))
                .collect(),
            expressions: self.expressions.clone(),
        }
    }
}

/// Width × height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// All faces observed in a single poll of the live stream.
///
/// Coordinates are in the space of the frame that was analysed
/// (`source`); use [`DetectionFrame::resized`] to map them onto a display.
#[derive(Debug, Clone)]
pub struct DetectionFrame {
    pub source: Dimensions,
    pub faces: Vec<FaceObservation>,
}

impl DetectionFrame {
    pub fn new(source: Dimensions, faces: Vec<FaceObservation>) -> Self {
        Self { source, faces }
    }

    pub fn empty(source: Dimensions) -> Self {
        Self {
            source,
            faces: Vec::new(),
        }
    }

    /// Whether at least one face was found.
    pub fn face_present(&self) -> bool {
        !self.faces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Rescale every observation to `display` dimensions.
    ///
    /// A zero-sized source or display leaves coordinates untouched.
    pub fn resized(&self, display: Dimensions) -> Self {
        if self.source.is_empty() || display.is_empty() || self.source == display {
            return Self {
                source: display,
                faces: self.faces.clone(),
            };
        }
        let sx = display.width as f32 / self.source.width as f32;
        let sy = display.height as f32 / self.source.height as f32;
        Self {
            source: display,
            faces: self.faces.iter().map(|f| f.scaled(sx, sy)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, w: f32, h: f32) -> FaceObservation {
        FaceObservation {
            bounding_box: BoundingBox::new(x, y, w, h),
            score: 0.9,
            landmarks: vec![Point::new(x + 1.0, y + 2.0)],
            expressions: ExpressionScores::default(),
        }
    }

    #[test]
    fn test_face_present() {
        let dims = Dimensions::new(640, 480);
        assert!(!DetectionFrame::empty(dims).face_present());
        assert!(DetectionFrame::new(dims, vec![face(0.0, 0.0, 10.0, 10.0)]).face_present());
    }

    #[test]
    fn test_resized_doubles_coordinates() {
        let frame = DetectionFrame::new(
            Dimensions::new(640, 360),
            vec![face(10.0, 20.0, 100.0, 50.0)],
        );
        let resized = frame.resized(Dimensions::new(1280, 720));
        let b = resized.faces[0].bounding_box;
        assert_eq!(b, BoundingBox::new(20.0, 40.0, 200.0, 100.0));
        assert_eq!(resized.faces[0].landmarks[0], Point::new(22.0, 44.0));
        assert_eq!(resized.source, Dimensions::new(1280, 720));
    }

    #[test]
    fn test_resized_zero_display_is_identity() {
        let frame = DetectionFrame::new(
            Dimensions::new(640, 360),
            vec![face(10.0, 20.0, 100.0, 50.0)],
        );
        let resized = frame.resized(Dimensions::new(0, 0));
        assert_eq!(resized.faces[0].bounding_box, BoundingBox::new(10.0, 20.0, 100.0, 50.0));
    }

    #[test]
    fn test_box_edges() {
        let b = BoundingBox::new(5.0, 6.0, 10.0, 20.0);
        assert_eq!(b.right(), 15.0);
        assert_eq!(b.bottom(), 26.0);
    }
}
