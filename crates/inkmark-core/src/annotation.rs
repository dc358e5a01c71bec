//! Annotation data model
//!
//! Annotations are user-placed overlay objects tied to one page. Positions
//! are top-left anchored canvas pixels at the session's render scale.

use serde::{Deserialize, Serialize};

use crate::coords::CanvasPoint;
use crate::error::EditorError;

pub type AnnotationId = u64;

/// Font family buckets offered by the editor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    #[default]
    SansSerif,
    Serif,
    Monospace,
}

impl FontFamily {
    /// Map a text-layer font name to a family bucket.
    /// Text layers report names like "g_d0_f1", "Times-Roman", "BCDEEE+ArialMT"
    /// or CSS generics; unknown names fall back to sans-serif.
    pub fn from_font_name(name: &str) -> Self {
        let lower = name.to_lowercase();

        match lower.as_str() {
            "serif" => return FontFamily::Serif,
            "sans-serif" => return FontFamily::SansSerif,
            "monospace" => return FontFamily::Monospace,
            _ => {}
        }

        if lower.contains("courier")
            || lower.contains("mono")
            || lower.contains("consolas")
            || lower.contains("monaco")
        {
            return FontFamily::Monospace;
        }

        // Checked before serif so "sans-serif" style names stay sans
        if lower.contains("arial")
            || lower.contains("helvetica")
            || lower.contains("sans")
            || lower.contains("gothic")
        {
            return FontFamily::SansSerif;
        }

        if lower.contains("times")
            || lower.contains("serif")
            || lower.contains("georgia")
            || lower.contains("garamond")
        {
            return FontFamily::Serif;
        }

        FontFamily::default()
    }

    /// CSS `font-family` value used by overlays
    pub fn css(&self) -> &'static str {
        match self {
            FontFamily::SansSerif => "Helvetica, Arial, sans-serif",
            FontFamily::Serif => "'Times New Roman', Times, serif",
            FontFamily::Monospace => "'Courier New', Courier, monospace",
        }
    }
}

/// The Latin standard-14 fonts used for exported text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    pub fn select(family: FontFamily, bold: bool, italic: bool) -> Self {
        match family {
            FontFamily::Serif => match (bold, italic) {
                (true, true) => StandardFont::TimesBoldItalic,
                (true, false) => StandardFont::TimesBold,
                (false, true) => StandardFont::TimesItalic,
                (false, false) => StandardFont::TimesRoman,
            },
            FontFamily::SansSerif => match (bold, italic) {
                (true, true) => StandardFont::HelveticaBoldOblique,
                (true, false) => StandardFont::HelveticaBold,
                (false, true) => StandardFont::HelveticaOblique,
                (false, false) => StandardFont::Helvetica,
            },
            FontFamily::Monospace => match (bold, italic) {
                (true, true) => StandardFont::CourierBoldOblique,
                (true, false) => StandardFont::CourierBold,
                (false, true) => StandardFont::CourierOblique,
                (false, false) => StandardFont::Courier,
            },
        }
    }

    /// PDF `BaseFont` name
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn css(&self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

/// Normalized RGB color, each channel in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Parse "#rrggbb" (leading '#' optional)
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .ok()
                .map(|v| v as f32 / 255.0)
        };
        Some(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    /// Font size in canvas pixels
    pub font_size: f64,
    pub color: String,
    #[serde(default)]
    pub font_family: Option<FontFamily>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub align: TextAlign,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            color: "#000000".to_string(),
            font_family: None,
            bold: false,
            italic: false,
            underline: false,
            align: TextAlign::Left,
        }
    }
}

impl TextStyle {
    pub fn family(&self) -> FontFamily {
        self.font_family.unwrap_or_default()
    }

    pub fn standard_font(&self) -> StandardFont {
        StandardFont::select(self.family(), self.bold, self.italic)
    }

    /// Color as normalized RGB; unparseable colors fall back to black
    pub fn rgb(&self) -> Rgb {
        Rgb::from_hex(&self.color).unwrap_or(Rgb::BLACK)
    }

    pub fn validate(&self) -> Result<(), EditorError> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(EditorError::Validation(format!(
                "Font size must be a positive number, got {}",
                self.font_size
            )));
        }
        if Rgb::from_hex(&self.color).is_none() {
            return Err(EditorError::Validation(format!(
                "Invalid color '{}', expected #rrggbb",
                self.color
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextAnnotation {
    pub id: AnnotationId,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub text: String,
    #[serde(flatten)]
    pub style: TextStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignatureAnnotation {
    pub id: AnnotationId,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    /// Base64 data URL of a PNG or JPEG raster
    pub data_url: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Annotation {
    Text(TextAnnotation),
    Signature(SignatureAnnotation),
}

impl Annotation {
    /// Build a text annotation. The id is assigned when the annotation is added to a store.
    pub fn text(
        page: u32,
        position: CanvasPoint,
        text: &str,
        style: TextStyle,
    ) -> Result<Self, EditorError> {
        if text.trim().is_empty() {
            return Err(EditorError::Validation("Please enter some text.".to_string()));
        }
        check_position(position)?;
        style.validate()?;

        Ok(Annotation::Text(TextAnnotation {
            id: 0,
            page,
            x: position.x,
            y: position.y,
            text: text.to_string(),
            style,
        }))
    }

    /// Build a signature/image annotation from a base64 data URL
    pub fn signature(
        page: u32,
        position: CanvasPoint,
        data_url: &str,
        width: f64,
        height: f64,
    ) -> Result<Self, EditorError> {
        check_position(position)?;
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            return Err(EditorError::Validation(format!(
                "Image size must be positive, got {}x{}",
                width, height
            )));
        }
        crate::raster::decode_data_url(data_url)?;

        Ok(Annotation::Signature(SignatureAnnotation {
            id: 0,
            page,
            x: position.x,
            y: position.y,
            data_url: data_url.to_string(),
            width,
            height,
        }))
    }

    pub fn id(&self) -> AnnotationId {
        match self {
            Annotation::Text(a) => a.id,
            Annotation::Signature(a) => a.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: AnnotationId) {
        match self {
            Annotation::Text(a) => a.id = id,
            Annotation::Signature(a) => a.id = id,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Annotation::Text(a) => a.page,
            Annotation::Signature(a) => a.page,
        }
    }

    pub fn position(&self) -> CanvasPoint {
        match self {
            Annotation::Text(a) => CanvasPoint::new(a.x, a.y),
            Annotation::Signature(a) => CanvasPoint::new(a.x, a.y),
        }
    }

    pub(crate) fn set_position(&mut self, x: f64, y: f64) {
        match self {
            Annotation::Text(a) => {
                a.x = x;
                a.y = y;
            }
            Annotation::Signature(a) => {
                a.x = x;
                a.y = y;
            }
        }
    }
}

fn check_position(position: CanvasPoint) -> Result<(), EditorError> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(EditorError::Validation(format!(
            "Position must be finite, got ({}, {})",
            position.x, position.y
        )))
    }
}
