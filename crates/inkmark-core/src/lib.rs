//! PDF annotation editor core
//!
//! Annotations are placed in canvas pixels on a rendered page and flattened
//! into PDF user space on export. This crate holds everything that does not
//! need a browser: the annotation model and its undo/redo store, the editing
//! session state machine, region text detection, overlay projection and the
//! exporter with its `lopdf` backend.

pub mod annotation;
pub mod config;
pub mod coords;
pub mod detect;
pub mod error;
pub mod export;
pub mod overlay;
pub mod pending;
pub mod raster;
pub mod session;
pub mod store;
pub mod writer;

pub use annotation::{
    Annotation, AnnotationId, FontFamily, SignatureAnnotation, StandardFont, TextAlign,
    TextAnnotation, TextStyle,
};
pub use config::EditorConfig;
pub use coords::{CanvasPoint, CanvasRect, CanvasSize, ClientRect, PdfPoint};
pub use detect::{DetectOutcome, DetectedStyle, TextItem};
pub use error::EditorError;
pub use export::{export, export_pdf};
pub use overlay::{OverlayContent, OverlayView};
pub use session::{ClipboardPayload, EditorSession, PageControls, RenderRequest, SessionState, Ticket};
pub use store::AnnotationStore;
pub use writer::{LopdfWriter, PdfWriter};
