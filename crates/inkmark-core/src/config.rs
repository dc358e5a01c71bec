//! Editor configuration
//!
//! All fields have defaults so a host can pass a partial JSON object.

use serde::{Deserialize, Serialize};

use crate::annotation::Rgb;
use crate::coords::CanvasSize;
use crate::error::EditorError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Render scale: canvas pixels per PDF user-space unit
    pub scale: f64,
    /// Maximum number of snapshots kept on each of the undo and redo stacks
    pub history_capacity: usize,
    /// Margin added on every side of a detection selection (canvas pixels)
    pub detect_margin: f64,
    /// Selections smaller than this are not treated as a detection request
    pub min_selection: CanvasSize,
    pub default_font_size: f64,
    pub default_color: String,
    /// Size of signature and pasted image annotations (canvas pixels)
    pub signature_size: CanvasSize,
    /// JPEG quality used when an image has to be re-encoded for embedding
    pub jpeg_quality: u8,
    pub output_file_name: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            scale: 1.5,
            history_capacity: 50,
            detect_margin: 30.0,
            min_selection: CanvasSize {
                width: 20.0,
                height: 10.0,
            },
            default_font_size: 16.0,
            default_color: "#000000".to_string(),
            signature_size: CanvasSize {
                width: 200.0,
                height: 100.0,
            },
            jpeg_quality: 95,
            output_file_name: "edited-document.pdf".to_string(),
        }
    }
}

fn positive(name: &str, value: f64) -> Result<(), EditorError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EditorError::Config(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), EditorError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EditorError::Config(format!(
            "{} must be zero or more, got {}",
            name, value
        )))
    }
}

impl EditorConfig {
    /// Reject values that would divide by zero or reach the PDF as NaN
    pub fn validate(&self) -> Result<(), EditorError> {
        positive("scale", self.scale)?;
        positive("default_font_size", self.default_font_size)?;
        positive("signature_size.width", self.signature_size.width)?;
        positive("signature_size.height", self.signature_size.height)?;
        non_negative("detect_margin", self.detect_margin)?;
        non_negative("min_selection.width", self.min_selection.width)?;
        non_negative("min_selection.height", self.min_selection.height)?;

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(EditorError::Config(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if Rgb::from_hex(&self.default_color).is_none() {
            return Err(EditorError::Config(format!(
                "default_color '{}' is not #rrggbb",
                self.default_color
            )));
        }
        if self.output_file_name.trim().is_empty() {
            return Err(EditorError::Config(
                "output_file_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.scale, 1.5);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.output_file_name, "edited-document.pdf");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{"scale": 2.0}"#).unwrap();
        assert_eq!(config.scale, 2.0);
        assert_eq!(config.detect_margin, 30.0);
        assert_eq!(config.signature_size.width, 200.0);
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(EditorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_unusable_scale() {
        for scale in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            let config = EditorConfig {
                scale,
                ..EditorConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(EditorError::Config(_))),
                "scale {} accepted",
                scale
            );
        }
    }

    #[test]
    fn test_rejects_bad_sizes_quality_and_color() {
        let bad = [
            EditorConfig {
                signature_size: CanvasSize {
                    width: 0.0,
                    height: 100.0,
                },
                ..EditorConfig::default()
            },
            EditorConfig {
                default_font_size: -4.0,
                ..EditorConfig::default()
            },
            EditorConfig {
                jpeg_quality: 0,
                ..EditorConfig::default()
            },
            EditorConfig {
                jpeg_quality: 101,
                ..EditorConfig::default()
            },
            EditorConfig {
                default_color: "red".to_string(),
                ..EditorConfig::default()
            },
            EditorConfig {
                detect_margin: f64::NAN,
                ..EditorConfig::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }
}
