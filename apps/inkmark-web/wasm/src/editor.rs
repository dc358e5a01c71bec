//! JavaScript-facing editor
//!
//! Wraps an `EditorSession` for the page script. The script owns rendering
//! (PDF.js), file input and downloads; it reports load and render
//! completions back with the ticket it was given, and everything else goes
//! through this object.

use std::cell::RefCell;
use std::rc::Rc;

use inkmark_core::pending::TextDraft;
use inkmark_core::session::ClipboardPayload;
use inkmark_core::{
    CanvasPoint, CanvasRect, CanvasSize, EditorConfig, EditorError, EditorSession, FontFamily,
    TextAlign, TextItem, TextStyle, Ticket,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlCanvasElement};

use crate::dom::{OverlayDom, SharedSession, SignaturePad};

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn js_err(e: EditorError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

pub fn parse_align(value: &str) -> Result<TextAlign, String> {
    match value {
        "left" => Ok(TextAlign::Left),
        "center" => Ok(TextAlign::Center),
        "right" => Ok(TextAlign::Right),
        other => Err(format!("Unknown alignment: {}", other)),
    }
}

pub fn parse_family(value: &str) -> Result<FontFamily, String> {
    if value.trim().is_empty() {
        return Err("Font family must not be empty".to_string());
    }
    Ok(FontFamily::from_font_name(value))
}

/// Keep only entries that are text items. PDF.js mixes marked-content
/// markers (no `str`) into `getTextContent().items`.
pub fn text_items(values: Vec<serde_json::Value>) -> Vec<TextItem> {
    values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect()
}

#[wasm_bindgen]
pub struct Editor {
    session: SharedSession,
    overlays: Option<OverlayDom>,
    pad: Option<SignaturePad>,
}

impl Editor {
    fn refresh(&self) -> Result<(), JsValue> {
        match &self.overlays {
            Some(overlays) => overlays.render(&self.session.borrow().overlays()),
            None => Ok(()),
        }
    }

    fn update_default_style(&self, f: impl FnOnce(&mut TextStyle)) -> Result<(), JsValue> {
        let mut session = self.session.borrow_mut();
        let mut style = session.default_style().clone();
        f(&mut style);
        session.set_default_style(style).map_err(js_err)
    }

    fn with_text_draft(&self, f: impl FnOnce(&mut TextDraft)) -> Result<(), JsValue> {
        let mut session = self.session.borrow_mut();
        let draft = session
            .text_draft_mut()
            .ok_or_else(|| js_err(EditorError::InvalidState("no text draft open".to_string())))?;
        f(draft);
        Ok(())
    }
}

#[wasm_bindgen]
impl Editor {
    /// `config` may be `undefined`, `null` or a partial config object
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Editor, JsValue> {
        let config: EditorConfig = if config.is_undefined() || config.is_null() {
            EditorConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };

        let session = EditorSession::try_new(config).map_err(js_err)?;

        Ok(Editor {
            session: Rc::new(RefCell::new(session)),
            overlays: None,
            pad: None,
        })
    }

    /// Bind the overlay layer. `container` must sit exactly over `canvas`.
    #[wasm_bindgen(js_name = attachOverlays)]
    pub fn attach_overlays(
        &mut self,
        container: Element,
        canvas: HtmlCanvasElement,
    ) -> Result<(), JsValue> {
        self.overlays = None;
        self.overlays = Some(OverlayDom::attach(
            self.session.clone(),
            container,
            canvas,
        )?);
        self.refresh()
    }

    #[wasm_bindgen(js_name = attachSignaturePad)]
    pub fn attach_signature_pad(&mut self, canvas: HtmlCanvasElement) -> Result<(), JsValue> {
        self.pad = None;
        self.pad = Some(SignaturePad::attach(self.session.clone(), canvas)?);
        Ok(())
    }

    #[wasm_bindgen(getter)]
    pub fn config(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.borrow().config())
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        format!("{:?}", self.session.borrow().state()).to_lowercase()
    }

    // ============================================================
    // Document lifecycle
    // ============================================================

    /// Start loading a file. Render it with PDF.js, then call `completeLoad`
    /// or `failLoad` with the returned ticket.
    #[wasm_bindgen(js_name = beginLoad)]
    pub fn begin_load(&mut self, bytes: &[u8]) -> Result<f64, JsValue> {
        let ticket = self.session.borrow_mut().begin_load(bytes.to_vec());
        self.refresh()?;
        Ok(ticket.0 as f64)
    }

    /// Returns the render request for page 1, or `undefined` for a stale ticket
    #[wasm_bindgen(js_name = completeLoad)]
    pub fn complete_load(&mut self, ticket: f64, page_count: u32) -> Result<JsValue, JsValue> {
        let request = self
            .session
            .borrow_mut()
            .complete_load(Ticket(ticket as u64), page_count)
            .map_err(js_err)?;
        to_js(&request)
    }

    /// Returns the message to show, or `undefined` for a stale ticket
    #[wasm_bindgen(js_name = failLoad)]
    pub fn fail_load(&mut self, ticket: f64, reason: &str) -> Option<String> {
        self.session
            .borrow_mut()
            .fail_load(Ticket(ticket as u64), reason)
            .map(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = requestRender)]
    pub fn request_render(&mut self) -> Result<JsValue, JsValue> {
        let request = self.session.borrow_mut().request_render();
        to_js(&request)
    }

    /// Returns the render request for the new page, or `undefined` at the ends
    #[wasm_bindgen(js_name = changePage)]
    pub fn change_page(&mut self, delta: i32) -> Result<JsValue, JsValue> {
        let request = self.session.borrow_mut().change_page(delta);
        self.refresh()?;
        to_js(&request)
    }

    /// Report a finished render with the canvas pixel size. Returns false
    /// when the render was superseded.
    #[wasm_bindgen(js_name = completeRender)]
    pub fn complete_render(&mut self, ticket: f64, width: f64, height: f64) -> Result<bool, JsValue> {
        let current = self
            .session
            .borrow_mut()
            .complete_render(Ticket(ticket as u64), CanvasSize { width, height });
        if current {
            self.refresh()?;
        }
        Ok(current)
    }

    #[wasm_bindgen(js_name = pageControls)]
    pub fn page_controls(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.borrow().page_controls())
    }

    // ============================================================
    // Text
    // ============================================================

    /// Style new drafts and pasted text start from
    #[wasm_bindgen(js_name = defaultStyle)]
    pub fn default_style(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.borrow().default_style())
    }

    /// Replace the default style with a `TextStyle` object
    #[wasm_bindgen(js_name = setDefaultStyle)]
    pub fn set_default_style(&mut self, style: JsValue) -> Result<(), JsValue> {
        let style: TextStyle = serde_wasm_bindgen::from_value(style)
            .map_err(|e| JsValue::from_str(&format!("Invalid text style: {}", e)))?;
        self.session
            .borrow_mut()
            .set_default_style(style)
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = setDefaultFontSize)]
    pub fn set_default_font_size(&mut self, size: f64) -> Result<(), JsValue> {
        self.update_default_style(|style| style.font_size = size)
    }

    #[wasm_bindgen(js_name = setDefaultColor)]
    pub fn set_default_color(&mut self, color: &str) -> Result<(), JsValue> {
        self.update_default_style(|style| style.color = color.to_string())
    }

    #[wasm_bindgen(js_name = openTextDraft)]
    pub fn open_text_draft(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        self.session
            .borrow_mut()
            .open_text_draft(CanvasPoint::new(x, y))
            .map_err(js_err)
    }

    /// Current draft style, or `undefined` without an open draft
    #[wasm_bindgen(js_name = textDraftStyle)]
    pub fn text_draft_style(&self) -> Result<JsValue, JsValue> {
        let session = self.session.borrow();
        to_js(&session.text_draft().map(|draft| &draft.style))
    }

    #[wasm_bindgen(js_name = toggleBold)]
    pub fn toggle_bold(&mut self) -> Result<(), JsValue> {
        self.with_text_draft(TextDraft::toggle_bold)
    }

    #[wasm_bindgen(js_name = toggleItalic)]
    pub fn toggle_italic(&mut self) -> Result<(), JsValue> {
        self.with_text_draft(TextDraft::toggle_italic)
    }

    #[wasm_bindgen(js_name = toggleUnderline)]
    pub fn toggle_underline(&mut self) -> Result<(), JsValue> {
        self.with_text_draft(TextDraft::toggle_underline)
    }

    #[wasm_bindgen(js_name = setAlign)]
    pub fn set_align(&mut self, align: &str) -> Result<(), JsValue> {
        let align = parse_align(align).map_err(|e| JsValue::from_str(&e))?;
        self.with_text_draft(|draft| draft.set_align(align))
    }

    #[wasm_bindgen(js_name = setFontFamily)]
    pub fn set_font_family(&mut self, family: &str) -> Result<(), JsValue> {
        let family = parse_family(family).map_err(|e| JsValue::from_str(&e))?;
        self.with_text_draft(|draft| draft.set_family(family))
    }

    #[wasm_bindgen(js_name = setFontSize)]
    pub fn set_font_size(&mut self, size: f64) -> Result<(), JsValue> {
        self.with_text_draft(|draft| draft.style.font_size = size)
    }

    #[wasm_bindgen(js_name = setColor)]
    pub fn set_color(&mut self, color: &str) -> Result<(), JsValue> {
        self.with_text_draft(|draft| draft.style.color = color.to_string())
    }

    /// Save the draft as an annotation. Validation errors leave the draft open.
    #[wasm_bindgen(js_name = commitText)]
    pub fn commit_text(&mut self, text: &str) -> Result<f64, JsValue> {
        let id = self.session.borrow_mut().commit_text(text).map_err(js_err)?;
        self.refresh()?;
        Ok(id as f64)
    }

    #[wasm_bindgen(js_name = cancelTextDraft)]
    pub fn cancel_text_draft(&mut self) {
        self.session.borrow_mut().cancel_text_draft();
    }

    // ============================================================
    // Signature
    // ============================================================

    #[wasm_bindgen(js_name = openSignatureDraft)]
    pub fn open_signature_draft(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        if let Some(pad) = &self.pad {
            pad.clear();
        }
        self.session
            .borrow_mut()
            .open_signature_draft(CanvasPoint::new(x, y))
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = clearSignature)]
    pub fn clear_signature(&mut self) {
        if let Some(pad) = &self.pad {
            pad.clear();
        }
        if let Some(draft) = self.session.borrow_mut().signature_draft_mut() {
            draft.clear();
        }
    }

    /// Save the attached pad's drawing as a signature annotation
    #[wasm_bindgen(js_name = saveSignature)]
    pub fn save_signature(&mut self) -> Result<f64, JsValue> {
        let pad = self
            .pad
            .as_ref()
            .ok_or_else(|| JsValue::from_str("No signature pad attached"))?;
        let pixels = pad.pixels()?;
        let data_url = pad.data_url()?;
        self.commit_signature(&data_url, &pixels)
    }

    /// Save a signature from a data URL and the pad's RGBA pixels
    #[wasm_bindgen(js_name = commitSignature)]
    pub fn commit_signature(&mut self, data_url: &str, pad_rgba: &[u8]) -> Result<f64, JsValue> {
        let id = self
            .session
            .borrow_mut()
            .commit_signature(data_url, pad_rgba)
            .map_err(js_err)?;
        self.refresh()?;
        Ok(id as f64)
    }

    #[wasm_bindgen(js_name = cancelSignatureDraft)]
    pub fn cancel_signature_draft(&mut self) {
        self.session.borrow_mut().cancel_signature_draft();
    }

    // ============================================================
    // Clipboard and detection
    // ============================================================

    /// `payload` is `{ image?: dataUrl, text?: string }`. Returns the new
    /// annotation id, or `undefined` when nothing was pasted.
    pub fn paste(&mut self, payload: JsValue, input_focused: bool) -> Result<Option<f64>, JsValue> {
        let payload: ClipboardPayload = serde_wasm_bindgen::from_value(payload)
            .map_err(|e| JsValue::from_str(&format!("Invalid clipboard payload: {}", e)))?;
        let id = self
            .session
            .borrow_mut()
            .paste(&payload, input_focused)
            .map_err(js_err)?;
        if id.is_some() {
            self.refresh()?;
        }
        Ok(id.map(|id| id as f64))
    }

    /// Detect the text style under a dragged selection. `items` is the
    /// current page's `getTextContent().items`.
    #[wasm_bindgen(js_name = detectRegion)]
    pub fn detect_region(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        items: JsValue,
    ) -> Result<JsValue, JsValue> {
        let values: Vec<serde_json::Value> = serde_wasm_bindgen::from_value(items)
            .map_err(|e| JsValue::from_str(&format!("Invalid text items: {}", e)))?;
        let selection = CanvasRect::from_corners(CanvasPoint::new(x1, y1), CanvasPoint::new(x2, y2));
        let outcome = self
            .session
            .borrow_mut()
            .detect_region(selection, &text_items(values));
        to_js(&outcome)
    }

    #[wasm_bindgen(js_name = confirmDetection)]
    pub fn confirm_detection(&mut self) -> Result<JsValue, JsValue> {
        let detected = self.session.borrow_mut().confirm_detection();
        to_js(&detected)
    }

    #[wasm_bindgen(js_name = dismissDetection)]
    pub fn dismiss_detection(&mut self) {
        self.session.borrow_mut().dismiss_detection();
    }

    // ============================================================
    // Overlays and history
    // ============================================================

    /// Overlay descriptions for the current page, for hosts that draw their own
    pub fn overlays(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.borrow().overlays())
    }

    #[wasm_bindgen(js_name = deleteAnnotation)]
    pub fn delete_annotation(&mut self, id: f64) -> Result<bool, JsValue> {
        let deleted = self.session.borrow_mut().delete(id as u64);
        self.refresh()?;
        Ok(deleted)
    }

    pub fn undo(&mut self) -> Result<bool, JsValue> {
        let changed = self.session.borrow_mut().undo();
        self.refresh()?;
        Ok(changed)
    }

    pub fn redo(&mut self) -> Result<bool, JsValue> {
        let changed = self.session.borrow_mut().redo();
        self.refresh()?;
        Ok(changed)
    }

    #[wasm_bindgen(getter, js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.session.borrow().can_undo()
    }

    #[wasm_bindgen(getter, js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.session.borrow().can_redo()
    }

    #[wasm_bindgen(js_name = annotationsJson)]
    pub fn annotations_json(&self) -> Result<String, JsValue> {
        self.session.borrow().store().to_json().map_err(js_err)
    }

    // ============================================================
    // Export
    // ============================================================

    /// Flattened PDF bytes for download
    pub fn export(&self) -> Result<js_sys::Uint8Array, JsValue> {
        let bytes = self.session.borrow().export().map_err(js_err)?;
        let array = js_sys::Uint8Array::new_with_length(bytes.len() as u32);
        array.copy_from(&bytes);
        Ok(array)
    }

    #[wasm_bindgen(getter, js_name = outputFileName)]
    pub fn output_file_name(&self) -> String {
        self.session.borrow().output_file_name().to_string()
    }
}
