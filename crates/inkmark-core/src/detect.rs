//! Region text detection ("smart detect")
//!
//! Maps a drag-selected canvas rectangle onto the page's text layer to
//! recover the font family and size of the text underneath it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::FontFamily;
use crate::config::EditorConfig;
use crate::coords::{pdf_text_item_to_canvas, CanvasRect};

/// One positioned run from a page's text layer, as reported by the decoder.
/// `transform` and `width` are in PDF user space (scale 1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextItem {
    #[serde(rename = "str")]
    pub text: String,
    pub transform: [f64; 6],
    pub width: f64,
    #[serde(default, rename = "fontName")]
    pub font_name: String,
}

impl TextItem {
    /// Bounding box of this run in canvas pixels
    pub fn canvas_box(&self, viewport_height: f64, scale: f64) -> CanvasRect {
        let mut scaled = self.transform;
        for v in scaled.iter_mut() {
            *v *= scale;
        }
        let placement = pdf_text_item_to_canvas(&scaled, viewport_height);
        CanvasRect {
            x: placement.x,
            y: placement.baseline - placement.font_size,
            width: self.width * scale,
            height: placement.font_size,
        }
    }
}

/// Style inferred from the text under a selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedStyle {
    /// Font size in canvas pixels, rounded to the nearest integer
    pub font_size: f64,
    pub font_family: FontFamily,
    /// Font name the family was inferred from
    pub font_name: String,
    /// Intersecting runs joined with spaces
    pub text: String,
    pub matched_items: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DetectOutcome {
    /// Selection below the minimum size; not a detection request
    Ignored,
    /// Nothing under the selection. Carries every item box so the user can retry.
    NoTextFound {
        item_count: usize,
        item_boxes: Vec<CanvasRect>,
    },
    Found(DetectedStyle),
}

/// Find the text runs under `selection` and infer their style
pub fn detect_region(
    selection: CanvasRect,
    items: &[TextItem],
    viewport_height: f64,
    config: &EditorConfig,
) -> DetectOutcome {
    if selection.width < config.min_selection.width
        || selection.height < config.min_selection.height
    {
        return DetectOutcome::Ignored;
    }

    let search = selection.expand(config.detect_margin);
    let boxes: Vec<CanvasRect> = items
        .iter()
        .map(|item| item.canvas_box(viewport_height, config.scale))
        .collect();

    let hits: Vec<&TextItem> = items
        .iter()
        .zip(&boxes)
        .filter(|(item, bbox)| !item.text.trim().is_empty() && bbox.intersects(&search))
        .map(|(item, _)| item)
        .collect();

    let Some(first) = hits.first() else {
        debug!(items = items.len(), "no text under selection");
        return DetectOutcome::NoTextFound {
            item_count: items.len(),
            item_boxes: boxes,
        };
    };

    let font_size = (first.transform[0].hypot(first.transform[1]) * config.scale).round();
    let text = hits
        .iter()
        .map(|item| item.text.trim())
        .collect::<Vec<_>>()
        .join(" ");

    debug!(matched = hits.len(), font_size, font = %first.font_name, "text detected");

    DetectOutcome::Found(DetectedStyle {
        font_size,
        font_family: FontFamily::from_font_name(&first.font_name),
        font_name: first.font_name.clone(),
        text,
        matched_items: hits.len(),
    })
}
