//! Editing session: document lifecycle, page navigation and user interactions
//!
//! The session never talks to the renderer directly. Loading and rendering
//! hand out tickets; the host performs the work and reports back with the
//! ticket. Completions carrying anything but the latest ticket are stale and
//! ignored, so the last request always wins.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::annotation::{Annotation, AnnotationId, TextStyle};
use crate::config::EditorConfig;
use crate::coords::{CanvasPoint, CanvasRect, CanvasSize};
use crate::detect::{detect_region, DetectOutcome, DetectedStyle, TextItem};
use crate::error::EditorError;
use crate::export::export_pdf;
use crate::overlay::{project, DragController, DragUpdate, OverlayView, Selection};
use crate::pending::{SignatureDraft, TextDraft};
use crate::raster::has_ink;
use crate::store::AnnotationStore;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loading,
    Ready,
    /// Last load failed; a new load may be started
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

/// Ask the host to render `page` at `scale`
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct RenderRequest {
    pub ticket: Ticket,
    pub page: u32,
    pub scale: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageControls {
    pub label: String,
    pub page: u32,
    pub total: u32,
    pub can_prev: bool,
    pub can_next: bool,
}

/// Clipboard content offered to `paste`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClipboardPayload {
    /// Base64 data URL of the first image item, if any
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

pub struct EditorSession {
    config: EditorConfig,
    state: SessionState,
    source: Option<Vec<u8>>,
    total_pages: u32,
    current_page: u32,
    canvas_size: Option<CanvasSize>,
    next_ticket: u64,
    pending_load: Option<Ticket>,
    pending_render: Option<Ticket>,
    store: AnnotationStore,
    selection: Selection,
    drag: DragController,
    text_draft: Option<TextDraft>,
    signature_draft: Option<SignatureDraft>,
    pending_detection: Option<DetectedStyle>,
    /// Toolbar style applied to new drafts and pasted text
    default_style: TextStyle,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    /// Build a session, rejecting a config that could not produce a valid export
    pub fn try_new(config: EditorConfig) -> Result<Self, EditorError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn new(config: EditorConfig) -> Self {
        let store = AnnotationStore::with_capacity(config.history_capacity);
        let default_style = TextStyle {
            font_size: config.default_font_size,
            color: config.default_color.clone(),
            ..TextStyle::default()
        };
        Self {
            config,
            state: SessionState::Empty,
            source: None,
            total_pages: 0,
            current_page: 1,
            canvas_size: None,
            next_ticket: 0,
            pending_load: None,
            pending_render: None,
            store,
            selection: Selection::default(),
            drag: DragController::default(),
            text_draft: None,
            signature_draft: None,
            pending_detection: None,
            default_style,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Size of the most recently completed render
    pub fn canvas_size(&self) -> Option<CanvasSize> {
        self.canvas_size
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn selection(&self) -> Option<AnnotationId> {
        self.selection.selected()
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    fn require_ready(&self) -> Result<(), EditorError> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(EditorError::InvalidState(format!(
                "no document ready (state {:?})",
                self.state
            )))
        }
    }

    // ============================================================
    // Document lifecycle
    // ============================================================

    /// Start loading a new document. Any previous document, its annotations
    /// and history are discarded.
    pub fn begin_load(&mut self, bytes: Vec<u8>) -> Ticket {
        let ticket = self.issue_ticket();
        info!(bytes = bytes.len(), ticket = ticket.0, "loading document");

        self.state = SessionState::Loading;
        self.source = Some(bytes);
        self.total_pages = 0;
        self.current_page = 1;
        self.canvas_size = None;
        self.pending_load = Some(ticket);
        self.pending_render = None;
        self.store.clear();
        self.selection.clear();
        self.drag.cancel();
        self.text_draft = None;
        self.signature_draft = None;
        self.pending_detection = None;
        ticket
    }

    /// The host decoded the document. Returns the render request for page 1,
    /// or `None` when the ticket is stale.
    pub fn complete_load(
        &mut self,
        ticket: Ticket,
        page_count: u32,
    ) -> Result<Option<RenderRequest>, EditorError> {
        if self.pending_load != Some(ticket) {
            warn!(ticket = ticket.0, "ignoring stale load completion");
            return Ok(None);
        }
        self.pending_load = None;

        if page_count == 0 {
            self.state = SessionState::Failed;
            self.source = None;
            return Err(EditorError::Load("Document has no pages".to_string()));
        }

        self.state = SessionState::Ready;
        self.total_pages = page_count;
        self.current_page = 1;
        info!(pages = page_count, "document ready");
        Ok(Some(self.issue_render()))
    }

    /// The host failed to decode the document. Returns the error to surface,
    /// or `None` when the ticket is stale.
    pub fn fail_load(&mut self, ticket: Ticket, reason: &str) -> Option<EditorError> {
        if self.pending_load != Some(ticket) {
            warn!(ticket = ticket.0, "ignoring stale load failure");
            return None;
        }
        self.pending_load = None;
        self.state = SessionState::Failed;
        self.source = None;
        warn!(reason, "document load failed");
        Some(EditorError::Load(reason.to_string()))
    }

    fn issue_render(&mut self) -> RenderRequest {
        let ticket = self.issue_ticket();
        self.pending_render = Some(ticket);
        debug!(ticket = ticket.0, page = self.current_page, "render requested");
        RenderRequest {
            ticket,
            page: self.current_page,
            scale: self.config.scale,
        }
    }

    /// Re-render the current page
    pub fn request_render(&mut self) -> Option<RenderRequest> {
        match self.state {
            SessionState::Ready => Some(self.issue_render()),
            _ => None,
        }
    }

    /// Move `delta` pages. Out-of-range targets are a no-op.
    pub fn change_page(&mut self, delta: i32) -> Option<RenderRequest> {
        if self.state != SessionState::Ready {
            return None;
        }
        let target = i64::from(self.current_page) + i64::from(delta);
        if target < 1 || target > i64::from(self.total_pages) || delta == 0 {
            return None;
        }

        self.current_page = target as u32;
        self.selection.clear();
        self.drag.cancel();
        Some(self.issue_render())
    }

    /// The host finished rendering. Returns false for stale tickets.
    pub fn complete_render(&mut self, ticket: Ticket, size: CanvasSize) -> bool {
        if self.pending_render != Some(ticket) {
            warn!(ticket = ticket.0, "ignoring stale render completion");
            return false;
        }
        self.pending_render = None;
        self.canvas_size = Some(size);
        debug!(ticket = ticket.0, width = size.width, height = size.height, "render complete");
        true
    }

    pub fn page_controls(&self) -> PageControls {
        let total = self.total_pages;
        let page = if total == 0 { 0 } else { self.current_page };
        PageControls {
            label: format!("Page {} of {}", page, total),
            page,
            total,
            can_prev: self.state == SessionState::Ready && page > 1,
            can_next: self.state == SessionState::Ready && page < total,
        }
    }

    // ============================================================
    // Drafts
    // ============================================================

    pub fn default_style(&self) -> &TextStyle {
        &self.default_style
    }

    /// Replace the style new drafts and pasted text start from. Open drafts
    /// keep their own style.
    pub fn set_default_style(&mut self, style: TextStyle) -> Result<(), EditorError> {
        style.validate()?;
        self.default_style = style;
        Ok(())
    }

    pub fn open_text_draft(&mut self, position: CanvasPoint) -> Result<(), EditorError> {
        self.require_ready()?;
        self.text_draft = Some(TextDraft::new(position, self.default_style.clone()));
        Ok(())
    }

    pub fn text_draft(&self) -> Option<&TextDraft> {
        self.text_draft.as_ref()
    }

    pub fn text_draft_mut(&mut self) -> Option<&mut TextDraft> {
        self.text_draft.as_mut()
    }

    /// Turn the open text draft into an annotation. On a validation error the
    /// draft stays open and nothing is recorded.
    pub fn commit_text(&mut self, text: &str) -> Result<AnnotationId, EditorError> {
        self.require_ready()?;
        let draft = self
            .text_draft
            .as_ref()
            .ok_or_else(|| EditorError::InvalidState("no text draft open".to_string()))?;

        let annotation =
            Annotation::text(self.current_page, draft.position, text, draft.style.clone())?;
        self.text_draft = None;
        self.pending_detection = None;
        Ok(self.store.add(annotation))
    }

    pub fn cancel_text_draft(&mut self) {
        self.text_draft = None;
        self.pending_detection = None;
    }

    pub fn open_signature_draft(&mut self, position: CanvasPoint) -> Result<(), EditorError> {
        self.require_ready()?;
        self.signature_draft = Some(SignatureDraft::new(position));
        Ok(())
    }

    pub fn signature_draft(&self) -> Option<&SignatureDraft> {
        self.signature_draft.as_ref()
    }

    pub fn signature_draft_mut(&mut self) -> Option<&mut SignatureDraft> {
        self.signature_draft.as_mut()
    }

    /// Save the drawn signature. `pad_rgba` is the pad's pixel buffer, used
    /// to reject a blank pad.
    pub fn commit_signature(
        &mut self,
        data_url: &str,
        pad_rgba: &[u8],
    ) -> Result<AnnotationId, EditorError> {
        self.require_ready()?;
        let draft = self
            .signature_draft
            .as_ref()
            .ok_or_else(|| EditorError::InvalidState("no signature draft open".to_string()))?;

        if !has_ink(pad_rgba) {
            return Err(EditorError::Validation(
                "Please draw your signature first.".to_string(),
            ));
        }

        let size = self.config.signature_size;
        let annotation = Annotation::signature(
            self.current_page,
            draft.position,
            data_url,
            size.width,
            size.height,
        )?;
        self.signature_draft = None;
        Ok(self.store.add(annotation))
    }

    pub fn cancel_signature_draft(&mut self) {
        self.signature_draft = None;
    }

    // ============================================================
    // Clipboard
    // ============================================================

    /// Paste clipboard content onto the current page, centered on the canvas.
    /// Ignored while a text input has focus or no page is rendered. An image
    /// takes precedence over text.
    pub fn paste(
        &mut self,
        payload: &ClipboardPayload,
        input_focused: bool,
    ) -> Result<Option<AnnotationId>, EditorError> {
        if input_focused || self.state != SessionState::Ready {
            return Ok(None);
        }
        let Some(canvas) = self.canvas_size else {
            return Ok(None);
        };

        if let Some(image) = payload.image.as_deref() {
            let size = self.config.signature_size;
            let position = CanvasPoint::new(
                canvas.width / 2.0 - size.width / 2.0,
                canvas.height / 2.0 - size.height / 2.0,
            );
            let annotation =
                Annotation::signature(self.current_page, position, image, size.width, size.height)?;
            debug!("pasted image");
            return Ok(Some(self.store.add(annotation)));
        }

        match payload.text.as_deref() {
            Some(text) if !text.trim().is_empty() => {
                let position = CanvasPoint::new(canvas.width / 2.0, canvas.height / 2.0);
                let annotation =
                    Annotation::text(self.current_page, position, text, self.default_style.clone())?;
                debug!("pasted text");
                Ok(Some(self.store.add(annotation)))
            }
            _ => Ok(None),
        }
    }

    // ============================================================
    // Detection
    // ============================================================

    /// Run region detection against the current page's text layer. A match
    /// is held until confirmed or dismissed.
    pub fn detect_region(&mut self, selection: CanvasRect, items: &[TextItem]) -> DetectOutcome {
        let Some(canvas) = self.canvas_size.filter(|_| self.state == SessionState::Ready) else {
            return DetectOutcome::Ignored;
        };
        let outcome = detect_region(selection, items, canvas.height, &self.config);
        if let DetectOutcome::Found(style) = &outcome {
            self.pending_detection = Some(style.clone());
        }
        outcome
    }

    pub fn pending_detection(&self) -> Option<&DetectedStyle> {
        self.pending_detection.as_ref()
    }

    /// Accept the pending detection, applying it to the open text draft
    pub fn confirm_detection(&mut self) -> Option<DetectedStyle> {
        let detected = self.pending_detection.take()?;
        if let Some(draft) = self.text_draft.as_mut() {
            draft.apply_detected(&detected);
        }
        Some(detected)
    }

    pub fn dismiss_detection(&mut self) {
        self.pending_detection = None;
    }

    // ============================================================
    // Overlays
    // ============================================================

    pub fn overlays(&self) -> Vec<OverlayView> {
        if self.state != SessionState::Ready {
            return Vec::new();
        }
        project(&self.store, self.current_page, &self.selection)
    }

    pub fn toggle_selection(&mut self, id: AnnotationId) {
        if self.store.get(id).is_some() {
            self.selection.toggle(id);
        }
    }

    pub fn pointer_down(&mut self, id: AnnotationId, pointer: CanvasPoint) -> bool {
        self.drag.pointer_down(&mut self.store, id, pointer)
    }

    pub fn pointer_move(&mut self, pointer: CanvasPoint) -> Option<DragUpdate> {
        self.drag.pointer_move(&mut self.store, pointer)
    }

    /// Returns the dragged id and whether it moved
    pub fn pointer_up(&mut self) -> Option<(AnnotationId, bool)> {
        self.drag.pointer_up(&mut self.store)
    }

    pub fn delete(&mut self, id: AnnotationId) -> bool {
        self.drag.cancel();
        let deleted = self.store.delete(id);
        self.selection.retain_existing(&self.store);
        deleted
    }

    pub fn undo(&mut self) -> bool {
        self.drag.cancel();
        let changed = self.store.undo();
        self.selection.retain_existing(&self.store);
        changed
    }

    pub fn redo(&mut self) -> bool {
        self.drag.cancel();
        let changed = self.store.redo();
        self.selection.retain_existing(&self.store);
        changed
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    // ============================================================
    // Export
    // ============================================================

    /// Flatten all annotations into a new PDF
    pub fn export(&self) -> Result<Vec<u8>, EditorError> {
        self.require_ready()?;
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| EditorError::InvalidState("no source document".to_string()))?;
        export_pdf(source, &self.store, &self.config)
    }

    pub fn output_file_name(&self) -> &str {
        &self.config.output_file_name
    }
}
