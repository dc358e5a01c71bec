//! Flatten annotations into a new PDF
//!
//! Every annotation is drawn in store order. Canvas placements are converted
//! to PDF user space with the session's render scale: text is top anchored,
//! images bottom anchored.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::annotation::{Annotation, SignatureAnnotation, StandardFont, TextAnnotation};
use crate::config::EditorConfig;
use crate::coords::{canvas_length_to_pdf, canvas_to_pdf_bottom_anchored, canvas_to_pdf_user_space};
use crate::error::EditorError;
use crate::raster::{decode_data_url, reencode_as_jpeg};
use crate::store::AnnotationStore;
use crate::writer::{ImageDrawOptions, LopdfWriter, PageSize, PdfWriter, TextDrawOptions};

/// Export with the `lopdf` backend
pub fn export_pdf(
    source: &[u8],
    store: &AnnotationStore,
    config: &EditorConfig,
) -> Result<Vec<u8>, EditorError> {
    export::<LopdfWriter>(source, store, config)
}

/// Draw every annotation in `store` onto a copy of `source`.
///
/// Fails on the first annotation that cannot be drawn; no partial document is
/// produced and the store is never modified. The source is always opened, so
/// an unreadable document fails the same way with or without annotations;
/// with nothing to draw its bytes are returned unchanged.
pub fn export<W: PdfWriter>(
    source: &[u8],
    store: &AnnotationStore,
    config: &EditorConfig,
) -> Result<Vec<u8>, EditorError> {
    config.validate()?;

    let mut writer = W::load(source).map_err(|e| match e {
        EditorError::Load(reason) => {
            EditorError::Export(format!("cannot read source document: {}", reason))
        }
        other => other,
    })?;

    if store.is_empty() {
        info!("no annotations, returning source unchanged");
        return Ok(source.to_vec());
    }
    let pages = writer.page_sizes();
    let mut fonts = HashMap::new();

    for annotation in store.annotations() {
        let page = annotation.page();
        let size = page_size(&pages, page)?;
        match annotation {
            Annotation::Text(text) => {
                draw_text(&mut writer, &mut fonts, text, size, config.scale)?
            }
            Annotation::Signature(sig) => draw_signature(&mut writer, sig, size, config)?,
        }
    }

    let output = writer.save()?;
    info!(
        annotations = store.len(),
        bytes = output.len(),
        "export complete"
    );
    Ok(output)
}

fn page_size(pages: &[PageSize], page: u32) -> Result<PageSize, EditorError> {
    let total = pages.len() as u32;
    page.checked_sub(1)
        .and_then(|i| pages.get(i as usize))
        .copied()
        .ok_or(EditorError::PageOutOfRange { page, total })
}

fn draw_text<W: PdfWriter>(
    writer: &mut W,
    fonts: &mut HashMap<StandardFont, W::Font>,
    text: &TextAnnotation,
    page: PageSize,
    scale: f64,
) -> Result<(), EditorError> {
    let standard = text.style.standard_font();
    let font = match fonts.get(&standard) {
        Some(font) => *font,
        None => {
            let font = writer.embed_font(standard)?;
            fonts.insert(standard, font);
            font
        }
    };

    let origin = canvas_to_pdf_user_space(text.x, text.y, page.height, scale);
    let size = canvas_length_to_pdf(text.style.font_size, scale);
    writer.draw_text(
        text.page,
        &text.text,
        &TextDrawOptions {
            x: origin.x,
            y: origin.y,
            size,
            line_height: size,
            font,
            color: text.style.rgb(),
        },
    )
}

fn draw_signature<W: PdfWriter>(
    writer: &mut W,
    sig: &SignatureAnnotation,
    page: PageSize,
    config: &EditorConfig,
) -> Result<(), EditorError> {
    let payload = decode_data_url(&sig.data_url)?;

    let image = match writer.embed_png(&payload.bytes) {
        Ok(image) => image,
        Err(e) => {
            warn!(id = sig.id, mime = %payload.mime_type, error = %e, "PNG embed failed, converting to JPEG");
            let jpeg = reencode_as_jpeg(&payload.bytes, config.jpeg_quality)
                .map_err(|e| EditorError::Embed(format!("annotation {}: {}", sig.id, e)))?;
            writer.embed_jpg(&jpeg)?
        }
    };

    let origin =
        canvas_to_pdf_bottom_anchored(sig.x, sig.y, sig.height, page.height, config.scale);
    writer.draw_image(
        sig.page,
        image,
        &ImageDrawOptions {
            x: origin.x,
            y: origin.y,
            width: canvas_length_to_pdf(sig.width, config.scale),
            height: canvas_length_to_pdf(sig.height, config.scale),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{FontFamily, Rgb, TextStyle};
    use crate::coords::CanvasPoint;
    use crate::raster::encode_data_url;
    use crate::raster::fixtures::{gif, rgba_png};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        EmbedFont(StandardFont),
        Text {
            page: u32,
            text: String,
            options: TextDrawOptions<usize>,
        },
        EmbedPng,
        EmbedJpg,
        Image {
            page: u32,
            image: usize,
            options: ImageDrawOptions,
        },
    }

    /// Records every call; PNG embedding only accepts real PNG signatures
    struct RecordingWriter {
        calls: Vec<Call>,
        pages: Vec<PageSize>,
        next_handle: usize,
    }

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G'];

    thread_local! {
        static LAST_CALLS: std::cell::RefCell<Vec<Call>> = std::cell::RefCell::new(Vec::new());
    }

    impl RecordingWriter {
        fn handle(&mut self) -> usize {
            self.next_handle += 1;
            self.next_handle
        }
    }

    impl PdfWriter for RecordingWriter {
        type Font = usize;
        type Image = usize;

        fn load(bytes: &[u8]) -> Result<Self, EditorError> {
            if !bytes.starts_with(b"%PDF") {
                return Err(EditorError::Load("bad header".to_string()));
            }
            Ok(Self {
                calls: Vec::new(),
                pages: vec![
                    PageSize {
                        width: 612.0,
                        height: 792.0,
                    };
                    2
                ],
                next_handle: 0,
            })
        }

        fn page_sizes(&self) -> Vec<PageSize> {
            self.pages.clone()
        }

        fn embed_font(&mut self, font: StandardFont) -> Result<usize, EditorError> {
            self.calls.push(Call::EmbedFont(font));
            Ok(self.handle())
        }

        fn draw_text(
            &mut self,
            page: u32,
            text: &str,
            options: &TextDrawOptions<usize>,
        ) -> Result<(), EditorError> {
            self.calls.push(Call::Text {
                page,
                text: text.to_string(),
                options: *options,
            });
            Ok(())
        }

        fn embed_png(&mut self, bytes: &[u8]) -> Result<usize, EditorError> {
            if !bytes.starts_with(PNG_SIGNATURE) {
                return Err(EditorError::ImageDecode("not a PNG".to_string()));
            }
            self.calls.push(Call::EmbedPng);
            Ok(self.handle())
        }

        fn embed_jpg(&mut self, bytes: &[u8]) -> Result<usize, EditorError> {
            if !bytes.starts_with(&[0xFF, 0xD8]) {
                return Err(EditorError::ImageDecode("not a JPEG".to_string()));
            }
            self.calls.push(Call::EmbedJpg);
            Ok(self.handle())
        }

        fn draw_image(
            &mut self,
            page: u32,
            image: usize,
            options: &ImageDrawOptions,
        ) -> Result<(), EditorError> {
            self.calls.push(Call::Image {
                page,
                image,
                options: *options,
            });
            Ok(())
        }

        fn save(self) -> Result<Vec<u8>, EditorError> {
            LAST_CALLS.with(|c| *c.borrow_mut() = self.calls);
            Ok(b"%PDF-exported".to_vec())
        }
    }

    fn recorded() -> Vec<Call> {
        LAST_CALLS.with(|c| c.borrow().clone())
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    const SOURCE: &[u8] = b"%PDF-1.7 source";

    fn text_at(store: &mut AnnotationStore, page: u32, x: f64, y: f64, style: TextStyle) {
        store.add(Annotation::text(page, CanvasPoint::new(x, y), "Hello", style).unwrap());
    }

    #[test]
    fn test_empty_store_returns_source() {
        let store = AnnotationStore::new();
        let out = export::<RecordingWriter>(SOURCE, &store, &EditorConfig::default()).unwrap();
        assert_eq!(out, SOURCE);
    }

    #[test]
    fn test_empty_store_still_opens_source() {
        let store = AnnotationStore::new();
        let err = export::<RecordingWriter>(b"garbage", &store, &EditorConfig::default())
            .unwrap_err();
        assert!(matches!(err, EditorError::Export(_)));
    }

    #[test]
    fn test_invalid_config_fails_before_drawing() {
        let mut store = AnnotationStore::new();
        text_at(&mut store, 1, 150.0, 200.0, TextStyle::default());
        let config = EditorConfig {
            scale: 0.0,
            ..EditorConfig::default()
        };
        LAST_CALLS.with(|c| c.borrow_mut().clear());
        let err = export::<RecordingWriter>(SOURCE, &store, &config).unwrap_err();
        assert!(matches!(err, EditorError::Config(_)));
        assert!(recorded().is_empty());
    }

    #[test]
    fn test_text_placement_and_size() {
        let mut store = AnnotationStore::new();
        let style = TextStyle {
            font_size: 24.0,
            color: "#ff0000".to_string(),
            ..TextStyle::default()
        };
        text_at(&mut store, 1, 150.0, 200.0, style);

        export::<RecordingWriter>(SOURCE, &store, &EditorConfig::default()).unwrap();
        let calls = recorded();
        assert_eq!(calls[0], Call::EmbedFont(StandardFont::Helvetica));
        match &calls[1] {
            Call::Text {
                page,
                text,
                options,
            } => {
                assert_eq!(*page, 1);
                assert_eq!(text, "Hello");
                assert!(approx(options.x, 100.0));
                assert!(approx(options.y, 658.67));
                assert_eq!(options.size, 16.0);
                assert_eq!(options.line_height, 16.0);
                assert_eq!(
                    options.color,
                    Rgb {
                        r: 1.0,
                        g: 0.0,
                        b: 0.0
                    }
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fonts_embedded_once_per_variant() {
        let mut store = AnnotationStore::new();
        text_at(&mut store, 1, 0.0, 0.0, TextStyle::default());
        text_at(&mut store, 2, 0.0, 0.0, TextStyle::default());
        let serif_bold = TextStyle {
            font_family: Some(FontFamily::Serif),
            bold: true,
            ..TextStyle::default()
        };
        text_at(&mut store, 1, 0.0, 0.0, serif_bold);

        export::<RecordingWriter>(SOURCE, &store, &EditorConfig::default()).unwrap();
        let embedded: Vec<_> = recorded()
            .into_iter()
            .filter_map(|c| match c {
                Call::EmbedFont(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(
            embedded,
            vec![StandardFont::Helvetica, StandardFont::TimesBold]
        );
    }

    #[test]
    fn test_png_signature_placement() {
        let mut store = AnnotationStore::new();
        let url = encode_data_url("image/png", &rgba_png(4, 2));
        store.add(
            Annotation::signature(1, CanvasPoint::new(50.0, 600.0), &url, 200.0, 100.0).unwrap(),
        );

        export::<RecordingWriter>(SOURCE, &store, &EditorConfig::default()).unwrap();
        let calls = recorded();
        assert_eq!(calls[0], Call::EmbedPng);
        match &calls[1] {
            Call::Image { page, options, .. } => {
                assert_eq!(*page, 1);
                assert!(approx(options.x, 33.33));
                assert!(approx(options.y, 325.33));
                assert!(approx(options.width, 133.33));
                assert!(approx(options.height, 66.67));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_png_falls_back_to_jpeg() {
        let mut store = AnnotationStore::new();
        let url = encode_data_url("image/gif", &gif(4, 4));
        store.add(
            Annotation::signature(2, CanvasPoint::new(0.0, 0.0), &url, 200.0, 100.0).unwrap(),
        );

        export::<RecordingWriter>(SOURCE, &store, &EditorConfig::default()).unwrap();
        let calls = recorded();
        assert_eq!(calls[0], Call::EmbedJpg);
        assert!(matches!(calls[1], Call::Image { page: 2, .. }));
    }

    #[test]
    fn test_undecodable_image_fails_export() {
        let mut store = AnnotationStore::new();
        let url = encode_data_url("image/png", b"definitely not an image");
        store.add(
            Annotation::signature(1, CanvasPoint::new(0.0, 0.0), &url, 200.0, 100.0).unwrap(),
        );
        let before = store.annotations().to_vec();

        let err = export::<RecordingWriter>(SOURCE, &store, &EditorConfig::default()).unwrap_err();
        assert!(matches!(err, EditorError::Embed(_)));
        assert_eq!(store.annotations(), before.as_slice());
    }

    #[test]
    fn test_missing_page_fails_export() {
        let mut store = AnnotationStore::new();
        text_at(&mut store, 5, 0.0, 0.0, TextStyle::default());
        let err = export::<RecordingWriter>(SOURCE, &store, &EditorConfig::default()).unwrap_err();
        assert_eq!(err, EditorError::PageOutOfRange { page: 5, total: 2 });
    }

    #[test]
    fn test_load_failure_is_reported() {
        let mut store = AnnotationStore::new();
        text_at(&mut store, 1, 0.0, 0.0, TextStyle::default());
        let err = export::<RecordingWriter>(b"garbage", &store, &EditorConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            EditorError::Export("cannot read source document: bad header".to_string())
        );
    }

    #[test]
    fn test_scale_comes_from_config() {
        let mut store = AnnotationStore::new();
        text_at(&mut store, 1, 200.0, 200.0, TextStyle::default());
        let config = EditorConfig {
            scale: 2.0,
            ..EditorConfig::default()
        };
        export::<RecordingWriter>(SOURCE, &store, &config).unwrap();
        match &recorded()[1] {
            Call::Text { options, .. } => {
                assert_eq!(options.x, 100.0);
                assert_eq!(options.y, 692.0);
                assert_eq!(options.size, 8.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
