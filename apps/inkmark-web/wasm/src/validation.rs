//! Upload pre-checks
//!
//! Optional checks the page can run on a chosen file before handing it to
//! the renderer. The renderer remains the authority on whether a file loads.

use inkmark_core::EditorError;
use lopdf::Document;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct PdfInfo {
    pub page_count: u32,
    /// Header version, e.g. "1.7"
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
}

fn check_header(bytes: &[u8]) -> Result<(), EditorError> {
    if bytes.len() < 8 {
        return Err(EditorError::Load("File too small to be a valid PDF".to_string()));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(EditorError::Load(
            "Not a valid PDF file (missing %PDF- header)".to_string(),
        ));
    }
    Ok(())
}

/// Header check followed by a full parse
pub fn quick_validate(bytes: &[u8]) -> Result<(), EditorError> {
    pdf_info(bytes).map(|_| ())
}

pub fn pdf_info(bytes: &[u8]) -> Result<PdfInfo, EditorError> {
    check_header(bytes)?;

    let document = Document::load_mem(bytes).map_err(|e| EditorError::Load(e.to_string()))?;
    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return Err(EditorError::Load("PDF has no pages".to_string()));
    }

    Ok(PdfInfo {
        page_count,
        version: header_version(bytes),
        encrypted: document.is_encrypted(),
        size_bytes: bytes.len(),
    })
}

fn header_version(bytes: &[u8]) -> String {
    bytes
        .get(5..8)
        .and_then(|v| std::str::from_utf8(v).ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "1.4".to_string())
}

#[cfg(test)]
pub(crate) mod test_pdf {
    use lopdf::{dictionary, Document, Object};

    pub fn create_test_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..num_pages)
            .map(|_| {
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                });
                Object::Reference(page_id)
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => num_pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::test_pdf::create_test_pdf;
    use super::*;

    #[test]
    fn test_rejects_small_file() {
        assert!(quick_validate(b"tiny").is_err());
    }

    #[test]
    fn test_rejects_missing_header() {
        let err = quick_validate(b"not a pdf file").unwrap_err();
        assert!(err.to_string().contains("%PDF-"));
    }

    #[test]
    fn test_rejects_unparseable_body() {
        assert!(quick_validate(b"%PDF-1.7\ngarbage without xref").is_err());
    }

    #[test]
    fn test_accepts_valid_pdf() {
        assert!(quick_validate(&create_test_pdf(1)).is_ok());
    }

    #[test]
    fn test_pdf_info() {
        let pdf = create_test_pdf(3);
        let info = pdf_info(&pdf).unwrap();
        assert_eq!(info.page_count, 3);
        assert_eq!(info.version, "1.7");
        assert!(!info.encrypted);
        assert_eq!(info.size_bytes, pdf.len());
    }

    #[test]
    fn test_header_version() {
        assert_eq!(header_version(b"%PDF-2.0\n"), "2.0");
        assert_eq!(header_version(b"%PDF-"), "1.4");
    }
}
