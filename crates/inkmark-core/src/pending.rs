//! Transient interaction state
//!
//! Drafts live outside the annotation store: they are discarded on cancel
//! and turned into annotations on save.

use serde::Serialize;

use crate::annotation::{FontFamily, TextAlign, TextStyle};
use crate::coords::CanvasPoint;
use crate::detect::DetectedStyle;

/// Text being composed in the text editor
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TextDraft {
    pub position: CanvasPoint,
    pub style: TextStyle,
}

impl TextDraft {
    pub fn new(position: CanvasPoint, style: TextStyle) -> Self {
        Self { position, style }
    }

    pub fn toggle_bold(&mut self) {
        self.style.bold = !self.style.bold;
    }

    pub fn toggle_italic(&mut self) {
        self.style.italic = !self.style.italic;
    }

    pub fn toggle_underline(&mut self) {
        self.style.underline = !self.style.underline;
    }

    pub fn set_align(&mut self, align: TextAlign) {
        self.style.align = align;
    }

    pub fn set_family(&mut self, family: FontFamily) {
        self.style.font_family = Some(family);
    }

    /// Apply a confirmed detection result to the draft
    pub fn apply_detected(&mut self, detected: &DetectedStyle) {
        self.style.font_family = Some(detected.font_family);
        if detected.font_size > 0.0 {
            self.style.font_size = detected.font_size;
        }
    }
}

/// A line segment the host should stroke on the signature pad
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrokeSegment {
    pub from: CanvasPoint,
    pub to: CanvasPoint,
}

/// Freehand signature being drawn, in signature-pad pixels. The pad's pixels
/// stay the source of truth for what was drawn; the draft only tracks the pen.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SignatureDraft {
    /// Where the committed signature will be placed on the page canvas
    pub position: CanvasPoint,
    /// Last point of the active stroke, `None` while the pen is up
    #[serde(skip)]
    pen: Option<CanvasPoint>,
}

impl SignatureDraft {
    pub fn new(position: CanvasPoint) -> Self {
        Self {
            position,
            pen: None,
        }
    }

    pub fn start_stroke(&mut self, at: CanvasPoint) {
        self.pen = Some(at);
    }

    /// Extend the active stroke; returns the new segment to draw
    pub fn extend_stroke(&mut self, to: CanvasPoint) -> Option<StrokeSegment> {
        let from = self.pen.replace(to)?;
        Some(StrokeSegment { from, to })
    }

    pub fn end_stroke(&mut self) {
        self.pen = None;
    }

    pub fn clear(&mut self) {
        self.pen = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_segments() {
        let mut draft = SignatureDraft::new(CanvasPoint::new(10.0, 10.0));
        assert!(draft.extend_stroke(CanvasPoint::new(1.0, 1.0)).is_none());

        draft.start_stroke(CanvasPoint::new(0.0, 0.0));
        let seg = draft.extend_stroke(CanvasPoint::new(5.0, 5.0)).unwrap();
        assert_eq!(seg.from, CanvasPoint::new(0.0, 0.0));
        assert_eq!(seg.to, CanvasPoint::new(5.0, 5.0));
        let seg = draft.extend_stroke(CanvasPoint::new(8.0, 6.0)).unwrap();
        assert_eq!(seg.from, CanvasPoint::new(5.0, 5.0));
        draft.end_stroke();

        assert!(draft.extend_stroke(CanvasPoint::new(9.0, 9.0)).is_none());

        draft.start_stroke(CanvasPoint::new(2.0, 2.0));
        draft.clear();
        assert!(draft.extend_stroke(CanvasPoint::new(3.0, 3.0)).is_none());
    }

    #[test]
    fn test_text_draft_formatting() {
        let mut draft = TextDraft::new(CanvasPoint::new(0.0, 0.0), TextStyle::default());
        draft.toggle_bold();
        draft.toggle_italic();
        draft.toggle_italic();
        draft.toggle_underline();
        draft.set_align(TextAlign::Center);
        assert!(draft.style.bold);
        assert!(!draft.style.italic);
        assert!(draft.style.underline);
        assert_eq!(draft.style.align, TextAlign::Center);
    }

    #[test]
    fn test_apply_detected() {
        let mut draft = TextDraft::new(CanvasPoint::new(0.0, 0.0), TextStyle::default());
        draft.apply_detected(&DetectedStyle {
            font_size: 18.0,
            font_family: FontFamily::Monospace,
            font_name: "Courier".to_string(),
            text: "x".to_string(),
            matched_items: 1,
        });
        assert_eq!(draft.style.font_size, 18.0);
        assert_eq!(draft.style.family(), FontFamily::Monospace);
    }
}
