//! Overlay projection and pointer interaction for annotations
//!
//! `project` turns the current page's annotations into positioned view
//! descriptions; the host rebuilds its overlay elements from these on every
//! render. `Selection` and `DragController` hold the interaction state the
//! overlays need and write changes back into the store.

use serde::Serialize;

use crate::annotation::{Annotation, AnnotationId};
use crate::coords::CanvasPoint;
use crate::store::AnnotationStore;

/// CSS properties of a text overlay
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TextCss {
    pub font_family: &'static str,
    pub font_size: String,
    pub color: String,
    pub font_weight: &'static str,
    pub font_style: &'static str,
    pub text_decoration: &'static str,
    pub text_align: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayContent {
    Text { text: String, css: TextCss },
    Image { src: String },
}

/// One absolutely positioned overlay element
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverlayView {
    pub id: AnnotationId,
    pub left: f64,
    pub top: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub selected: bool,
    pub content: OverlayContent,
}

impl OverlayView {
    fn from_annotation(annotation: &Annotation, selected: bool) -> Self {
        match annotation {
            Annotation::Text(t) => OverlayView {
                id: t.id,
                left: t.x,
                top: t.y,
                width: None,
                height: None,
                selected,
                content: OverlayContent::Text {
                    text: t.text.clone(),
                    css: TextCss {
                        font_family: t.style.family().css(),
                        font_size: format!("{}px", t.style.font_size),
                        color: t.style.color.clone(),
                        font_weight: if t.style.bold { "bold" } else { "normal" },
                        font_style: if t.style.italic { "italic" } else { "normal" },
                        text_decoration: if t.style.underline {
                            "underline"
                        } else {
                            "none"
                        },
                        text_align: t.style.align.css(),
                    },
                },
            },
            Annotation::Signature(s) => OverlayView {
                id: s.id,
                left: s.x,
                top: s.y,
                width: Some(s.width),
                height: Some(s.height),
                selected,
                content: OverlayContent::Image {
                    src: s.data_url.clone(),
                },
            },
        }
    }
}

/// Build the overlay views for `page`, in store order
pub fn project(store: &AnnotationStore, page: u32, selection: &Selection) -> Vec<OverlayView> {
    store
        .for_page(page)
        .map(|a| OverlayView::from_annotation(a, selection.is_selected(a.id())))
        .collect()
}

/// Zero or one selected overlay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection(Option<AnnotationId>);

impl Selection {
    /// Clicking a selected overlay deselects it; clicking another selects only that one
    pub fn toggle(&mut self, id: AnnotationId) {
        self.0 = if self.0 == Some(id) { None } else { Some(id) };
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.0
    }

    pub fn is_selected(&self, id: AnnotationId) -> bool {
        self.0 == Some(id)
    }

    /// Drop the selection if its annotation no longer exists
    pub fn retain_existing(&mut self, store: &AnnotationStore) {
        if let Some(id) = self.0 {
            if store.get(id).is_none() {
                self.0 = None;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveDrag {
    id: AnnotationId,
    grab_offset: CanvasPoint,
}

/// Result of a pointer-move while dragging
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DragUpdate {
    pub id: AnnotationId,
    pub x: f64,
    pub y: f64,
}

/// Drag-to-reposition state machine: pointer-down, pointer-move*, pointer-up
#[derive(Debug, Clone, Default)]
pub struct DragController {
    active: Option<ActiveDrag>,
}

impl DragController {
    /// Start dragging `id`, grabbed at `pointer` (canvas pixels)
    pub fn pointer_down(
        &mut self,
        store: &mut AnnotationStore,
        id: AnnotationId,
        pointer: CanvasPoint,
    ) -> bool {
        let Some(position) = store.get(id).map(Annotation::position) else {
            return false;
        };
        if !store.begin_move(id) {
            return false;
        }
        self.active = Some(ActiveDrag {
            id,
            grab_offset: CanvasPoint::new(pointer.x - position.x, pointer.y - position.y),
        });
        true
    }

    /// Move the dragged annotation so it stays under the pointer
    pub fn pointer_move(
        &mut self,
        store: &mut AnnotationStore,
        pointer: CanvasPoint,
    ) -> Option<DragUpdate> {
        let drag = self.active?;
        let x = pointer.x - drag.grab_offset.x;
        let y = pointer.y - drag.grab_offset.y;
        if store.update_move(drag.id, x, y) {
            Some(DragUpdate { id: drag.id, x, y })
        } else {
            None
        }
    }

    /// Finish the drag. Returns the id and whether the annotation moved.
    pub fn pointer_up(&mut self, store: &mut AnnotationStore) -> Option<(AnnotationId, bool)> {
        let drag = self.active.take()?;
        Some((drag.id, store.end_move(drag.id)))
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::TextStyle;
    use crate::raster::encode_data_url;
    use pretty_assertions::assert_eq;

    fn store_with_two_pages() -> (AnnotationStore, AnnotationId, AnnotationId, AnnotationId) {
        let mut store = AnnotationStore::new();
        let style = TextStyle {
            bold: true,
            underline: true,
            ..TextStyle::default()
        };
        let t = store.add(
            Annotation::text(1, CanvasPoint::new(10.0, 20.0), "Hello <b>", style).unwrap(),
        );
        let s = store.add(
            Annotation::signature(
                1,
                CanvasPoint::new(50.0, 60.0),
                &encode_data_url("image/png", b"png"),
                200.0,
                100.0,
            )
            .unwrap(),
        );
        let other = store.add(
            Annotation::text(2, CanvasPoint::new(0.0, 0.0), "Other", TextStyle::default())
                .unwrap(),
        );
        (store, t, s, other)
    }

    #[test]
    fn test_project_filters_page() {
        let (store, t, s, _) = store_with_two_pages();
        let views = project(&store, 1, &Selection::default());
        let ids: Vec<_> = views.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![t, s]);

        let text = &views[0];
        assert_eq!((text.left, text.top), (10.0, 20.0));
        match &text.content {
            OverlayContent::Text { text, css } => {
                assert_eq!(text, "Hello <b>");
                assert_eq!(css.font_weight, "bold");
                assert_eq!(css.text_decoration, "underline");
                assert_eq!(css.font_size, "16px");
            }
            other => panic!("unexpected {:?}", other),
        }

        let image = &views[1];
        assert_eq!(image.width, Some(200.0));
        assert_eq!(image.height, Some(100.0));
    }

    #[test]
    fn test_selection_toggle() {
        let mut selection = Selection::default();
        selection.toggle(1);
        assert_eq!(selection.selected(), Some(1));
        selection.toggle(2);
        assert_eq!(selection.selected(), Some(2));
        selection.toggle(2);
        assert_eq!(selection.selected(), None);
    }

    #[test]
    fn test_projection_marks_selected() {
        let (store, t, s, _) = store_with_two_pages();
        let mut selection = Selection::default();
        selection.toggle(s);
        let views = project(&store, 1, &selection);
        assert!(!views.iter().find(|v| v.id == t).unwrap().selected);
        assert!(views.iter().find(|v| v.id == s).unwrap().selected);
    }

    #[test]
    fn test_selection_dropped_after_delete() {
        let (mut store, t, _, _) = store_with_two_pages();
        let mut selection = Selection::default();
        selection.toggle(t);
        store.delete(t);
        selection.retain_existing(&store);
        assert_eq!(selection.selected(), None);
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let (mut store, t, _, _) = store_with_two_pages();
        let depth = store.undo_depth();
        let mut drag = DragController::default();

        // Grab 5px right and 3px below the top-left corner
        assert!(drag.pointer_down(&mut store, t, CanvasPoint::new(15.0, 23.0)));
        let update = drag
            .pointer_move(&mut store, CanvasPoint::new(115.0, 223.0))
            .unwrap();
        assert_eq!((update.x, update.y), (110.0, 220.0));
        drag.pointer_move(&mut store, CanvasPoint::new(120.0, 230.0));

        assert_eq!(drag.pointer_up(&mut store), Some((t, true)));
        assert!(!drag.is_dragging());
        assert_eq!(store.get(t).unwrap().position(), CanvasPoint::new(115.0, 227.0));
        assert_eq!(store.undo_depth(), depth + 1);
    }

    #[test]
    fn test_move_without_drag_is_ignored() {
        let (mut store, _, _, _) = store_with_two_pages();
        let mut drag = DragController::default();
        assert!(drag
            .pointer_move(&mut store, CanvasPoint::new(1.0, 1.0))
            .is_none());
        assert!(drag.pointer_up(&mut store).is_none());
    }
}
