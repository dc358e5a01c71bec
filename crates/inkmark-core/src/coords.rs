//! Coordinate transformation between pointer, canvas and PDF coordinate systems
//!
//! - Client: pointer/touch coordinates reported by the browser
//! - Canvas: pixels of the rendered page canvas (top-left origin, render scale applied)
//! - PDF user space: points at scale 1, bottom-left origin

use serde::{Deserialize, Serialize};

/// A position in canvas pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

impl CanvasPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A position in PDF user space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

/// Axis-aligned rectangle in canvas pixel space, top-left anchored
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from two drag corners in any order
    pub fn from_corners(a: CanvasPoint, b: CanvasPoint) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Grow the rectangle by `margin` on all four sides
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// Strict overlap test; rectangles that only share an edge do not intersect
    pub fn intersects(&self, other: &CanvasRect) -> bool {
        !(self.right() <= other.x
            || other.right() <= self.x
            || self.bottom() <= other.y
            || other.bottom() <= self.y)
    }
}

/// Bounding box of the canvas element as laid out on screen (CSS pixels)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Convert client coordinates to canvas pixels.
///
/// The displayed CSS size of a canvas may differ from its backing buffer, so
/// the offset inside the element is multiplied by `intrinsic / displayed`.
pub fn client_to_canvas(
    client_x: f64,
    client_y: f64,
    canvas_rect: ClientRect,
    intrinsic: CanvasSize,
) -> CanvasPoint {
    let scale_x = axis_scale(intrinsic.width, canvas_rect.width);
    let scale_y = axis_scale(intrinsic.height, canvas_rect.height);

    CanvasPoint {
        x: (client_x - canvas_rect.left) * scale_x,
        y: (client_y - canvas_rect.top) * scale_y,
    }
}

fn axis_scale(intrinsic: f64, displayed: f64) -> f64 {
    if displayed > 0.0 && intrinsic > 0.0 {
        intrinsic / displayed
    } else {
        1.0
    }
}

/// Convert a top-anchored canvas position (e.g. text) to PDF user space
pub fn canvas_to_pdf_user_space(x: f64, y: f64, page_height: f64, render_scale: f64) -> PdfPoint {
    PdfPoint {
        x: x / render_scale,
        y: page_height - y / render_scale,
    }
}

/// Convert a bottom-anchored placement (e.g. an image) to PDF user space.
///
/// On screen `y` is the top edge of the element, while PDF image placement
/// names the bottom edge, hence the element height is added before flipping.
pub fn canvas_to_pdf_bottom_anchored(
    x: f64,
    y: f64,
    element_height: f64,
    page_height: f64,
    render_scale: f64,
) -> PdfPoint {
    PdfPoint {
        x: x / render_scale,
        y: page_height - (y + element_height) / render_scale,
    }
}

/// Convert a length (font size, image width) from canvas pixels to points
pub fn canvas_length_to_pdf(length: f64, render_scale: f64) -> f64 {
    length / render_scale
}

/// Canvas placement of a text-layer item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextItemPlacement {
    /// Left edge of the run
    pub x: f64,
    /// Baseline, measured from the top of the canvas
    pub baseline: f64,
    pub font_size: f64,
}

/// Map a text-layer affine transform `[a, b, c, d, tx, ty]` to canvas space.
///
/// The transform must already be at render scale. Its translation is in PDF
/// orientation (origin bottom-left), and the magnitude of the first column is
/// the font size.
pub fn pdf_text_item_to_canvas(transform: &[f64; 6], viewport_height: f64) -> TextItemPlacement {
    TextItemPlacement {
        x: transform[4],
        baseline: viewport_height - transform[5],
        font_size: transform[0].hypot(transform[1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_client_to_canvas_unscaled() {
        let rect = ClientRect {
            left: 10.0,
            top: 20.0,
            width: 918.0,
            height: 1188.0,
        };
        let size = CanvasSize {
            width: 918.0,
            height: 1188.0,
        };
        let p = client_to_canvas(110.0, 220.0, rect, size);
        assert_eq!(p, CanvasPoint::new(100.0, 200.0));
    }

    #[test]
    fn test_client_to_canvas_css_shrunk() {
        // Canvas buffer is twice as wide as it is displayed
        let rect = ClientRect {
            left: 0.0,
            top: 0.0,
            width: 300.0,
            height: 150.0,
        };
        let size = CanvasSize {
            width: 600.0,
            height: 300.0,
        };
        let p = client_to_canvas(150.0, 75.0, rect, size);
        assert_eq!(p, CanvasPoint::new(300.0, 150.0));
    }

    #[test]
    fn test_client_to_canvas_zero_sized_rect() {
        let rect = ClientRect::default();
        let size = CanvasSize {
            width: 600.0,
            height: 300.0,
        };
        let p = client_to_canvas(5.0, 7.0, rect, size);
        assert_eq!(p, CanvasPoint::new(5.0, 7.0));
    }

    #[test]
    fn test_text_placement_reference_values() {
        let p = canvas_to_pdf_user_space(150.0, 200.0, 792.0, 1.5);
        assert!(approx(p.x, 100.0));
        assert!(approx(p.y, 658.67));
    }

    #[test]
    fn test_image_placement_reference_values() {
        let p = canvas_to_pdf_bottom_anchored(50.0, 600.0, 100.0, 792.0, 1.5);
        assert!(approx(p.x, 33.33));
        assert!(approx(p.y, 325.33));

        // Same position with the text formula lands elsewhere
        let text = canvas_to_pdf_user_space(50.0, 600.0, 792.0, 1.5);
        assert!(approx(text.y, 392.0));
        assert!(!approx(text.y, p.y));
    }

    #[test]
    fn test_text_item_to_canvas() {
        let transform = [18.0, 0.0, 0.0, 18.0, 108.0, 1050.0];
        let placement = pdf_text_item_to_canvas(&transform, 1188.0);
        assert_eq!(placement.x, 108.0);
        assert_eq!(placement.baseline, 138.0);
        assert_eq!(placement.font_size, 18.0);
    }

    #[test]
    fn test_text_item_negative_scale_uses_magnitude() {
        let transform = [-12.0, 0.0, 0.0, -12.0, 0.0, 0.0];
        let placement = pdf_text_item_to_canvas(&transform, 100.0);
        assert_eq!(placement.font_size, 12.0);
    }

    #[test]
    fn test_rect_from_corners_normalizes() {
        let r = CanvasRect::from_corners(CanvasPoint::new(50.0, 40.0), CanvasPoint::new(10.0, 20.0));
        assert_eq!(r, CanvasRect::new(10.0, 20.0, 40.0, 20.0));
    }

    #[test]
    fn test_rect_intersects() {
        let a = CanvasRect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&CanvasRect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&CanvasRect::new(10.0, 0.0, 5.0, 5.0)));
        assert!(!a.intersects(&CanvasRect::new(0.0, 20.0, 5.0, 5.0)));
        assert!(a.expand(5.0).intersects(&CanvasRect::new(12.0, 0.0, 5.0, 5.0)));
    }
}
