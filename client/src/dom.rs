use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, HtmlButtonElement, HtmlCanvasElement,
    HtmlElement, PointerEvent, Window,
};

use studyboard_shared::{Point, StageSize};

pub fn get_element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    let element = document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing element: {id}")))?;
    element
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Invalid element type: {id}")))
}

pub fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, JsValue> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("Missing 2d context"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| JsValue::from_str("Invalid 2d context"))
}

pub fn set_tool_button(button: &HtmlButtonElement, active: bool) {
    let pressed = if active { "true" } else { "false" };
    let _ = button.set_attribute("aria-pressed", pressed);
}

pub fn set_cursor(canvas: &HtmlCanvasElement, cursor: &str) {
    if let Ok(element) = canvas.clone().dyn_into::<HtmlElement>() {
        let _ = element.style().set_property("cursor", cursor);
    }
}

pub fn set_status(status_el: &Element, state: &str, text: &str) {
    let _ = status_el.set_attribute("data-state", state);
    status_el.set_text_content(Some(text));
}

/// Matches the backing store of `canvas` to its CSS box at the device pixel
/// ratio and returns the box in logical pixels.
pub fn fit_canvas(
    window: &Window,
    canvas: &HtmlCanvasElement,
    ctx: &CanvasRenderingContext2d,
) -> StageSize {
    let rect = canvas.get_bounding_client_rect();
    let dpr = window.device_pixel_ratio();
    canvas.set_width((rect.width() * dpr) as u32);
    canvas.set_height((rect.height() * dpr) as u32);
    let _ = ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
    StageSize::new(rect.width(), rect.height())
}

pub fn event_to_point(canvas: &HtmlCanvasElement, event: &PointerEvent) -> Option<Point> {
    let rect = canvas.get_bounding_client_rect();
    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        return None;
    }
    Point {
        x: (event.client_x() as f64 - rect.left()) as f32,
        y: (event.client_y() as f64 - rect.top()) as f32,
    }
    .normalize()
}

/// Sizes a detached canvas to match an on-screen stage.
pub fn size_offscreen(
    window: &Window,
    canvas: &HtmlCanvasElement,
    ctx: &CanvasRenderingContext2d,
    stage: StageSize,
) {
    let dpr = window.device_pixel_ratio();
    canvas.set_width((stage.width * dpr) as u32);
    canvas.set_height((stage.height * dpr) as u32);
    let _ = ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
}

pub fn create<T: JsCast>(document: &Document, tag: &str) -> Result<T, JsValue> {
    document
        .create_element(tag)?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Invalid element type: {tag}")))
}

pub fn set_hidden(element: &Element, hidden: bool) {
    let _ = element.class_list().toggle_with_force("hidden", hidden);
}

pub fn set_active(element: &Element, active: bool) {
    let _ = element.class_list().toggle_with_force("active", active);
}

/// Shows `text` in a message line, styled as an error when `error` is set.
pub fn set_message(element: &Element, text: &str, error: bool) {
    element.set_text_content(Some(text));
    let _ = element.class_list().toggle_with_force("error", error);
}

pub fn navigate(window: &Window, url: &str) {
    let _ = window.location().set_href(url);
}
