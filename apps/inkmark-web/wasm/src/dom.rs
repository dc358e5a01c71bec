//! DOM adapter for overlays and the signature pad
//!
//! Overlay elements are rebuilt from `OverlayView`s on every render. Mouse
//! handling is delegated: one `mousedown` listener on the overlay container
//! finds the annotation through `closest(".annotation")` and its `data-id`,
//! while `mousemove`/`mouseup` are listened for on the window so a drag keeps
//! tracking outside the container. The signature pad takes mouse and touch
//! input. Listeners are removed on drop.

use std::cell::RefCell;
use std::rc::Rc;

use inkmark_core::coords::{client_to_canvas, ClientRect};
use inkmark_core::overlay::{OverlayContent, OverlayView};
use inkmark_core::{AnnotationId, CanvasPoint, CanvasSize, EditorSession};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, Element, Event, EventTarget, HtmlCanvasElement, HtmlElement,
    HtmlImageElement, MouseEvent, TouchEvent, Window,
};

pub type SharedSession = Rc<RefCell<EditorSession>>;

pub fn px(value: f64) -> String {
    format!("{}px", value)
}

/// Inline style of an overlay element
pub fn style_properties(view: &OverlayView) -> Vec<(&'static str, String)> {
    let mut props = vec![
        ("position", "absolute".to_string()),
        ("left", px(view.left)),
        ("top", px(view.top)),
    ];
    if let Some(width) = view.width {
        props.push(("width", px(width)));
    }
    if let Some(height) = view.height {
        props.push(("height", px(height)));
    }
    if let OverlayContent::Text { css, .. } = &view.content {
        props.extend([
            ("font-family", css.font_family.to_string()),
            ("font-size", css.font_size.clone()),
            ("color", css.color.clone()),
            ("font-weight", css.font_weight.to_string()),
            ("font-style", css.font_style.to_string()),
            ("text-decoration", css.text_decoration.to_string()),
            ("text-align", css.text_align.to_string()),
            ("white-space", "pre".to_string()),
        ]);
    }
    props
}

pub fn class_name(view: &OverlayView) -> &'static str {
    match (&view.content, view.selected) {
        (OverlayContent::Text { .. }, false) => "annotation text-annotation",
        (OverlayContent::Text { .. }, true) => "annotation text-annotation selected",
        (OverlayContent::Image { .. }, false) => "annotation signature-annotation",
        (OverlayContent::Image { .. }, true) => "annotation signature-annotation selected",
    }
}

fn id_selector(id: AnnotationId) -> String {
    format!("[data-id=\"{}\"]", id)
}

fn parse_id(element: &Element) -> Option<AnnotationId> {
    element.get_attribute("data-id")?.parse().ok()
}

fn event_target(event: &MouseEvent) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn log_error(error: &JsValue) {
    web_sys::console::error_1(error);
}

fn client_point(canvas: &HtmlCanvasElement, client_x: i32, client_y: i32) -> CanvasPoint {
    let rect = canvas.get_bounding_client_rect();
    client_to_canvas(
        client_x as f64,
        client_y as f64,
        ClientRect {
            left: rect.left(),
            top: rect.top(),
            width: rect.width(),
            height: rect.height(),
        },
        CanvasSize {
            width: canvas.width() as f64,
            height: canvas.height() as f64,
        },
    )
}

/// Pointer position in the intrinsic pixel space of `canvas`
pub fn canvas_point(canvas: &HtmlCanvasElement, event: &MouseEvent) -> CanvasPoint {
    client_point(canvas, event.client_x(), event.client_y())
}

/// Replace the container's children with one element per view
pub fn render_overlays(container: &Element, views: &[OverlayView]) -> Result<(), JsValue> {
    let document = container
        .owner_document()
        .ok_or_else(|| JsValue::from_str("overlay container is not attached to a document"))?;

    container.set_inner_html("");

    for view in views {
        let element: HtmlElement = document.create_element("div")?.dyn_into()?;
        element.set_class_name(class_name(view));
        element.set_attribute("data-id", &view.id.to_string())?;
        let style = element.style();
        for (name, value) in style_properties(view) {
            style.set_property(name, &value)?;
        }

        match &view.content {
            // Text content only, never markup
            OverlayContent::Text { text, .. } => element.set_text_content(Some(text)),
            OverlayContent::Image { src } => {
                let image: HtmlImageElement = document.create_element("img")?.dyn_into()?;
                image.set_src(src);
                image.set_draggable(false);
                let image_style = image.style();
                image_style.set_property("width", "100%")?;
                image_style.set_property("height", "100%")?;
                image_style.set_property("pointer-events", "none")?;
                element.append_child(&image)?;
            }
        }

        if view.selected {
            let delete = document.create_element("button")?;
            delete.set_class_name("delete-btn");
            delete.set_attribute("title", "Delete")?;
            delete.set_text_content(Some("\u{00d7}"));
            element.append_child(&delete)?;
        }

        container.append_child(&element)?;
    }
    Ok(())
}

fn rerender(session: &SharedSession, container: &Element) -> Result<(), JsValue> {
    let views = session.borrow().overlays();
    render_overlays(container, &views)
}

fn handle_mouse_down(
    session: &SharedSession,
    container: &Element,
    canvas: &HtmlCanvasElement,
    event: &MouseEvent,
) -> Result<(), JsValue> {
    let Some(target) = event_target(event) else {
        return Ok(());
    };

    if let Some(button) = target.closest(".delete-btn")? {
        if let Some(id) = button.closest(".annotation")?.as_ref().and_then(parse_id) {
            event.stop_propagation();
            session.borrow_mut().delete(id);
            rerender(session, container)?;
        }
        return Ok(());
    }

    let Some(id) = target.closest(".annotation")?.as_ref().and_then(parse_id) else {
        return Ok(());
    };
    event.prevent_default();
    session
        .borrow_mut()
        .pointer_down(id, canvas_point(canvas, event));
    Ok(())
}

fn handle_mouse_move(
    session: &SharedSession,
    container: &Element,
    canvas: &HtmlCanvasElement,
    event: &MouseEvent,
) -> Result<(), JsValue> {
    let update = session
        .borrow_mut()
        .pointer_move(canvas_point(canvas, event));
    let Some(update) = update else {
        return Ok(());
    };

    if let Some(element) = container.query_selector(&id_selector(update.id))? {
        let element: HtmlElement = element.dyn_into()?;
        let style = element.style();
        style.set_property("left", &px(update.x))?;
        style.set_property("top", &px(update.y))?;
    }
    Ok(())
}

fn handle_mouse_up(session: &SharedSession, container: &Element) -> Result<(), JsValue> {
    let released = session.borrow_mut().pointer_up();
    let Some((id, moved)) = released else {
        return Ok(());
    };
    // A press without movement is a click
    if !moved {
        session.borrow_mut().toggle_selection(id);
    }
    rerender(session, container)
}

/// An event listener that is removed from its target on drop
struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn add<E, F>(target: &EventTarget, kind: &'static str, mut f: F) -> Result<Self, JsValue>
    where
        E: JsCast + 'static,
        F: FnMut(&E) -> Result<(), JsValue> + 'static,
    {
        let callback = Closure::wrap(Box::new(move |event: Event| {
            let Ok(event) = event.dyn_into::<E>() else {
                return;
            };
            if let Err(e) = f(&event) {
                log_error(&e);
            }
        }) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            kind,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.callback.as_ref().unchecked_ref());
    }
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

/// Overlay layer bound to a container element positioned over the page canvas
pub struct OverlayDom {
    container: Element,
    _listeners: Vec<Listener>,
}

impl OverlayDom {
    pub fn attach(
        session: SharedSession,
        container: Element,
        canvas: HtmlCanvasElement,
    ) -> Result<Self, JsValue> {
        let window = window()?;

        let on_mouse_down = {
            let (session, target, canvas) = (session.clone(), container.clone(), canvas.clone());
            Listener::add::<MouseEvent, _>(&container, "mousedown", move |event| {
                handle_mouse_down(&session, &target, &canvas, event)
            })?
        };
        let on_mouse_move = {
            let (session, container) = (session.clone(), container.clone());
            Listener::add::<MouseEvent, _>(&window, "mousemove", move |event| {
                handle_mouse_move(&session, &container, &canvas, event)
            })?
        };
        let on_mouse_up = {
            let container = container.clone();
            Listener::add::<MouseEvent, _>(&window, "mouseup", move |_| {
                handle_mouse_up(&session, &container)
            })?
        };

        Ok(Self {
            container,
            _listeners: vec![on_mouse_down, on_mouse_move, on_mouse_up],
        })
    }

    pub fn render(&self, views: &[OverlayView]) -> Result<(), JsValue> {
        render_overlays(&self.container, views)
    }
}

/// First touch point of a touch event, in canvas pixels
fn touch_point(canvas: &HtmlCanvasElement, event: &TouchEvent) -> Option<CanvasPoint> {
    let touch = event.touches().get(0)?;
    Some(client_point(canvas, touch.client_x(), touch.client_y()))
}

fn pen_down(session: &SharedSession, point: CanvasPoint) {
    if let Some(draft) = session.borrow_mut().signature_draft_mut() {
        draft.start_stroke(point);
    }
}

fn pen_move(session: &SharedSession, context: &CanvasRenderingContext2d, point: CanvasPoint) {
    let segment = session
        .borrow_mut()
        .signature_draft_mut()
        .and_then(|draft| draft.extend_stroke(point));
    if let Some(segment) = segment {
        context.begin_path();
        context.move_to(segment.from.x, segment.from.y);
        context.line_to(segment.to.x, segment.to.y);
        context.stroke();
    }
}

fn pen_up(session: &SharedSession) {
    if let Some(draft) = session.borrow_mut().signature_draft_mut() {
        draft.end_stroke();
    }
}

/// Freehand drawing surface feeding the session's signature draft. Accepts
/// mouse and single-finger touch input.
pub struct SignaturePad {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    _listeners: Vec<Listener>,
}

impl SignaturePad {
    pub fn attach(session: SharedSession, canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let window = window()?;
        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("signature pad has no 2d context"))?
            .dyn_into()?;
        context.set_line_width(2.0);
        context.set_line_cap("round");
        context.set_line_join("round");

        let mut listeners = Vec::with_capacity(6);
        {
            let (session, pad) = (session.clone(), canvas.clone());
            listeners.push(Listener::add::<MouseEvent, _>(
                &canvas,
                "mousedown",
                move |event| {
                    pen_down(&session, canvas_point(&pad, event));
                    Ok(())
                },
            )?);
        }
        {
            let (session, pad, context) = (session.clone(), canvas.clone(), context.clone());
            listeners.push(Listener::add::<MouseEvent, _>(
                &canvas,
                "mousemove",
                move |event| {
                    pen_move(&session, &context, canvas_point(&pad, event));
                    Ok(())
                },
            )?);
        }
        {
            let session = session.clone();
            listeners.push(Listener::add::<MouseEvent, _>(&window, "mouseup", move |_| {
                pen_up(&session);
                Ok(())
            })?);
        }
        {
            let (session, pad) = (session.clone(), canvas.clone());
            listeners.push(Listener::add::<TouchEvent, _>(
                &canvas,
                "touchstart",
                move |event| {
                    event.prevent_default();
                    if let Some(point) = touch_point(&pad, event) {
                        pen_down(&session, point);
                    }
                    Ok(())
                },
            )?);
        }
        {
            let (session, pad, context) = (session.clone(), canvas.clone(), context.clone());
            listeners.push(Listener::add::<TouchEvent, _>(
                &canvas,
                "touchmove",
                move |event| {
                    event.prevent_default();
                    if let Some(point) = touch_point(&pad, event) {
                        pen_move(&session, &context, point);
                    }
                    Ok(())
                },
            )?);
        }
        listeners.push(Listener::add::<TouchEvent, _>(
            &canvas,
            "touchend",
            move |event| {
                event.prevent_default();
                pen_up(&session);
                Ok(())
            },
        )?);

        Ok(Self {
            canvas,
            context,
            _listeners: listeners,
        })
    }

    pub fn clear(&self) {
        self.context.clear_rect(
            0.0,
            0.0,
            self.canvas.width() as f64,
            self.canvas.height() as f64,
        );
    }

    /// RGBA pixels of the whole pad
    pub fn pixels(&self) -> Result<Vec<u8>, JsValue> {
        let data = self.context.get_image_data(
            0.0,
            0.0,
            self.canvas.width() as f64,
            self.canvas.height() as f64,
        )?;
        Ok(data.data().0)
    }

    pub fn data_url(&self) -> Result<String, JsValue> {
        self.canvas.to_data_url()
    }
}


#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use inkmark_core::overlay::TextCss;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn container() -> Element {
        let document = web_sys::window().unwrap().document().unwrap();
        let container = document.create_element("div").unwrap();
        document.body().unwrap().append_child(&container).unwrap();
        container
    }

    fn view(id: AnnotationId, text: &str, selected: bool) -> OverlayView {
        OverlayView {
            id,
            left: 10.0,
            top: 20.0,
            width: None,
            height: None,
            selected,
            content: OverlayContent::Text {
                text: text.to_string(),
                css: TextCss {
                    font_family: "Helvetica, Arial, sans-serif",
                    font_size: "16px".to_string(),
                    color: "#000000".to_string(),
                    font_weight: "normal",
                    font_style: "normal",
                    text_decoration: "none",
                    text_align: "left",
                },
            },
        }
    }

    #[wasm_bindgen_test]
    fn test_render_overlays_rebuilds_children() {
        let container = container();
        render_overlays(&container, &[view(1, "a", false), view(2, "b", false)]).unwrap();
        assert_eq!(container.child_element_count(), 2);

        render_overlays(&container, &[view(3, "c", false)]).unwrap();
        assert_eq!(container.child_element_count(), 1);
        assert!(container.query_selector(&id_selector(3)).unwrap().is_some());
    }

    #[wasm_bindgen_test]
    fn test_text_is_not_parsed_as_markup() {
        let container = container();
        render_overlays(&container, &[view(1, "<b>bold</b>", false)]).unwrap();
        let element = container.query_selector(&id_selector(1)).unwrap().unwrap();
        assert_eq!(element.child_element_count(), 0);
        assert_eq!(element.text_content().unwrap(), "<b>bold</b>");
    }

    #[wasm_bindgen_test]
    fn test_selected_overlay_has_delete_button() {
        let container = container();
        render_overlays(&container, &[view(5, "x", true)]).unwrap();
        assert!(container.query_selector(".delete-btn").unwrap().is_some());
    }

    #[wasm_bindgen_test]
    fn test_unselected_overlay_has_no_delete_button() {
        let container = container();
        render_overlays(&container, &[view(6, "y", false)]).unwrap();
        assert!(container.query_selector(".delete-btn").unwrap().is_none());
    }

    fn ready_session() -> SharedSession {
        let mut session = EditorSession::new(Default::default());
        let ticket = session.begin_load(b"%PDF-1.4".to_vec());
        session.complete_load(ticket, 1).unwrap();
        session
            .open_signature_draft(CanvasPoint::new(0.0, 0.0))
            .unwrap();
        Rc::new(RefCell::new(session))
    }

    fn touch_event(
        kind: &str,
        canvas: &HtmlCanvasElement,
        x: f64,
        y: f64,
    ) -> Option<TouchEvent> {
        let rect = canvas.get_bounding_client_rect();
        let init = web_sys::TouchInit::new(0, canvas);
        init.set_client_x(rect.left() + x);
        init.set_client_y(rect.top() + y);
        // Desktop browsers without touch support have no Touch constructor
        let touch = web_sys::Touch::new(&init).ok()?;

        let touches = js_sys::Array::of1(&touch);
        let event_init = web_sys::TouchEventInit::new();
        event_init.set_bubbles(true);
        event_init.set_cancelable(true);
        event_init.set_touches(&touches);
        TouchEvent::new_with_event_init_dict(kind, &event_init).ok()
    }

    #[wasm_bindgen_test]
    fn test_touch_draws_on_signature_pad() {
        let document = web_sys::window().unwrap().document().unwrap();
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .unwrap()
            .dyn_into()
            .unwrap();
        canvas.set_width(200);
        canvas.set_height(100);
        document.body().unwrap().append_child(&canvas).unwrap();

        let session = ready_session();
        let pad = SignaturePad::attach(session.clone(), canvas.clone()).unwrap();

        let Some(start) = touch_event("touchstart", &canvas, 20.0, 20.0) else {
            return;
        };
        let Some(drag) = touch_event("touchmove", &canvas, 120.0, 60.0) else {
            return;
        };
        canvas.dispatch_event(&start).unwrap();
        canvas.dispatch_event(&drag).unwrap();

        assert!(start.default_prevented());
        assert!(pad.pixels().unwrap().chunks(4).any(|px| px[3] > 0));
    }
}
