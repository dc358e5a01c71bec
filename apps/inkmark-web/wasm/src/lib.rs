//! WASM bindings for the Inkmark PDF annotation editor
//!
//! All editor state lives in Rust inside an `Editor`. JavaScript renders pages
//! with PDF.js, reads files, forwards clipboard and keyboard events and
//! downloads the exported bytes.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { Editor } from './pkg/inkmark_wasm.js';
//!
//! await init();
//!
//! const editor = new Editor({ scale: 1.5 });
//! editor.attachOverlays(overlayLayer, pageCanvas);
//!
//! const ticket = editor.beginLoad(bytes);
//! const pdf = await pdfjsLib.getDocument({ data: bytes }).promise;
//! const render = editor.completeLoad(ticket, pdf.numPages);
//! await renderPage(pdf, render.page, render.scale);
//! editor.completeRender(render.ticket, pageCanvas.width, pageCanvas.height);
//!
//! editor.openTextDraft(x, y);
//! editor.toggleBold();
//! editor.commitText("Approved");
//!
//! downloadBlob(editor.export(), editor.outputFileName);
//! ```

pub mod dom;
pub mod editor;
pub mod validation;

use wasm_bindgen::prelude::*;

pub use editor::Editor;
pub use validation::PdfInfo;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&format!("inkmark-wasm {} loaded", get_version()).into());
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Quick validation check for a PDF file
/// Returns Ok(()) if valid, Err with message if not
#[wasm_bindgen]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    validation::quick_validate(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Get PDF info before loading it into an editor
#[wasm_bindgen]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = validation::pdf_info(bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;

    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        assert!(!get_version().is_empty());
    }
}
