use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, Event, HtmlButtonElement, HtmlCanvasElement, HtmlImageElement,
    HtmlInputElement, PointerEvent, Window,
};

use studyboard_shared::api::{BodyMapOverlayResponse, LatestBodyMapResponse, SaveBodyMapResponse};
use studyboard_shared::{Brush, OverlayLayers, StageView, StrokeRecorder, Tool, DEFAULT_WIDTH};

use crate::dom::{
    context_2d, event_to_point, fit_canvas, get_element, navigate, set_cursor, set_status,
    set_tool_button, size_offscreen,
};
use crate::admin::start_admin;
use crate::forms::start_participant;
use crate::home::start_home;
use crate::net::{get_json, post_json};
use crate::render::{draw_background, redraw_editor, redraw_overlay};
use crate::state::{
    EditorState, OverlayState, Surface, LATEST_URL, LOGOUT_URL, OVERLAY_URL, SAVE_URL,
};

const MIN_BRUSH_WIDTH: f32 = 1.0;
const MAX_BRUSH_WIDTH: f32 = 60.0;

#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;

    if document.get_element_by_id("login-form").is_some() {
        return start_home(window, document);
    }
    if document.get_element_by_id("forms-sidebar").is_some() {
        return start_participant(window, document);
    }
    if document.get_element_by_id("admin-sidebar").is_some() {
        return start_admin(window, document);
    }
    if document.get_element_by_id("body-map-canvas").is_some() {
        return start_editor(window, document);
    }
    if document.get_element_by_id("overlay-canvas").is_some() {
        return start_overlay(window, document);
    }
    Ok(())
}

fn open_surface(
    window: &Window,
    document: &Document,
    canvas_id: &str,
    background_id: &str,
    image_id: &str,
) -> Result<Surface, JsValue> {
    let canvas: HtmlCanvasElement = get_element(document, canvas_id)?;
    let ctx = context_2d(&canvas)?;
    let background: HtmlCanvasElement = get_element(document, background_id)?;
    let background_ctx = context_2d(&background)?;
    let image = get_element::<HtmlImageElement>(document, image_id).ok();
    let stage = fit_canvas(window, &canvas, &ctx);
    fit_canvas(window, &background, &background_ctx);
    Ok(Surface {
        canvas,
        ctx,
        background,
        background_ctx,
        image,
        stage,
    })
}

/// Redraws the background once the image has decoded.
fn watch_image<S: 'static>(
    surface: impl Fn(&S) -> &Surface + 'static,
    state: &Rc<RefCell<S>>,
) -> Result<(), JsValue> {
    let image = match surface(&*state.borrow()).image.clone() {
        Some(image) => image,
        None => return Ok(()),
    };
    if image.complete() {
        draw_background(surface(&*state.borrow()));
    }
    let state = state.clone();
    let onload = Closure::<dyn FnMut(Event)>::new(move |_| {
        draw_background(surface(&*state.borrow()));
    });
    image.add_event_listener_with_callback("load", onload.as_ref().unchecked_ref())?;
    onload.forget();
    Ok(())
}

pub(crate) fn log_error(context: &str, err: &JsValue) {
    let message = err.as_string().unwrap_or_else(|| format!("{err:?}"));
    web_sys::console::error_1(&format!("{context}: {message}").into());
}

pub(crate) fn wire_logout(window: &Window, document: &Document) -> Result<(), JsValue> {
    let button: HtmlButtonElement = get_element(document, "logout-btn")?;
    let window = window.clone();
    let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
        let window = window.clone();
        spawn_local(async move {
            if let Err(err) = post_json::<_, serde_json::Value>(LOGOUT_URL, &serde_json::json!({})).await {
                log_error("Logout failed", &err);
            }
            navigate(&window, "/");
        });
    });
    button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
    onclick.forget();
    Ok(())
}

fn start_editor(window: Window, document: Document) -> Result<(), JsValue> {
    let surface = open_surface(
        &window,
        &document,
        "body-map-canvas",
        "body-map-background",
        "body-map-image",
    )?;
    let status: Element = get_element(&document, "body-map-status")?;
    let draw_button: HtmlButtonElement = get_element(&document, "tool-draw")?;
    let erase_button: HtmlButtonElement = get_element(&document, "tool-erase")?;
    let color_input: HtmlInputElement = get_element(&document, "brush-color")?;
    let width_input: HtmlInputElement = get_element(&document, "brush-width")?;
    let save_button: HtmlButtonElement = get_element(&document, "save-body-map")?;
    let clear_button: HtmlButtonElement = get_element(&document, "clear-body-map")?;

    let brush = Brush::default();
    color_input.set_value(&brush.color);
    width_input.set_value(&DEFAULT_WIDTH.to_string());
    set_tool_button(&draw_button, true);
    set_tool_button(&erase_button, false);
    set_cursor(&surface.canvas, "crosshair");

    let view = StageView::new(surface.stage);
    let state = Rc::new(RefCell::new(EditorState {
        surface,
        view,
        recorder: StrokeRecorder::new(),
        brush,
        dirty: false,
    }));
    let canvas = state.borrow().surface.canvas.clone();
    watch_image(|state: &EditorState| &state.surface, &state)?;

    {
        let state = state.clone();
        let canvas_cb = canvas.clone();
        let onpointerdown = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if event.button() != 0 {
                return;
            }
            let Some(point) = event_to_point(&canvas_cb, &event) else {
                return;
            };
            event.prevent_default();
            let _ = canvas_cb.set_pointer_capture(event.pointer_id());
            let mut state = state.borrow_mut();
            let mut brush = state.brush.clone();
            brush.width = state.view.to_authored_width(brush.width);
            let point = state.view.to_authored(point);
            if state.recorder.begin(&brush, point) {
                redraw_editor(&state);
            }
        });
        canvas.add_event_listener_with_callback(
            "pointerdown",
            onpointerdown.as_ref().unchecked_ref(),
        )?;
        onpointerdown.forget();
    }

    {
        let state = state.clone();
        let canvas_cb = canvas.clone();
        let onpointermove = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            let mut state = state.borrow_mut();
            if !state.recorder.is_drawing() {
                return;
            }
            let Some(point) = event_to_point(&canvas_cb, &event) else {
                return;
            };
            let point = state.view.to_authored(point);
            if state.recorder.extend(point) {
                redraw_editor(&state);
            }
        });
        canvas.add_event_listener_with_callback(
            "pointermove",
            onpointermove.as_ref().unchecked_ref(),
        )?;
        onpointermove.forget();
    }

    {
        let state = state.clone();
        let onpointerup = Closure::<dyn FnMut(PointerEvent)>::new(move |_event: PointerEvent| {
            let mut state = state.borrow_mut();
            if state.recorder.end().is_some() {
                state.dirty = true;
                redraw_editor(&state);
            }
        });
        for name in ["pointerup", "pointercancel", "pointerleave"] {
            canvas.add_event_listener_with_callback(name, onpointerup.as_ref().unchecked_ref())?;
        }
        onpointerup.forget();
    }

    {
        let state = state.clone();
        let window_cb = window.clone();
        let onresize = Closure::<dyn FnMut(Event)>::new(move |_| {
            let mut state = state.borrow_mut();
            let surface = &mut state.surface;
            let stage = fit_canvas(&window_cb, &surface.canvas, &surface.ctx);
            fit_canvas(&window_cb, &surface.background, &surface.background_ctx);
            surface.stage = stage;
            state.view.resize(stage);
            draw_background(&state.surface);
            redraw_editor(&state);
        });
        window.add_event_listener_with_callback("resize", onresize.as_ref().unchecked_ref())?;
        onresize.forget();
    }

    for (button, tool) in [(draw_button.clone(), Tool::Draw), (erase_button.clone(), Tool::Erase)] {
        let state = state.clone();
        let draw_button = draw_button.clone();
        let erase_button = erase_button.clone();
        let canvas_cb = canvas.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            state.borrow_mut().brush.tool = tool;
            set_tool_button(&draw_button, tool == Tool::Draw);
            set_tool_button(&erase_button, tool == Tool::Erase);
            set_cursor(&canvas_cb, if tool == Tool::Erase { "cell" } else { "crosshair" });
        });
        button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    {
        let state = state.clone();
        let input = color_input.clone();
        let oninput = Closure::<dyn FnMut(Event)>::new(move |_| {
            let value = input.value();
            if !value.is_empty() {
                state.borrow_mut().brush.color = value;
            }
        });
        color_input.add_event_listener_with_callback("input", oninput.as_ref().unchecked_ref())?;
        oninput.forget();
    }

    {
        let state = state.clone();
        let input = width_input.clone();
        let oninput = Closure::<dyn FnMut(Event)>::new(move |_| {
            if let Ok(width) = input.value().parse::<f32>() {
                if width.is_finite() {
                    state.borrow_mut().brush.width = width.clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH);
                }
            }
        });
        width_input.add_event_listener_with_callback("input", oninput.as_ref().unchecked_ref())?;
        oninput.forget();
    }

    {
        let state = state.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            let mut state = state.borrow_mut();
            state.recorder.clear();
            state.dirty = true;
            redraw_editor(&state);
            set_status(&status, "dirty", "Cleared (not saved yet)");
        });
        clear_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    {
        let state = state.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            let payload = {
                let mut state = state.borrow_mut();
                state.recorder.end();
                let authored = state.view.authored();
                state.recorder.snapshot(authored)
            };
            set_status(&status, "saving", "Saving…");
            let state = state.clone();
            let status = status.clone();
            spawn_local(async move {
                match post_json::<_, SaveBodyMapResponse>(SAVE_URL, &payload).await {
                    Ok(saved) => {
                        state.borrow_mut().dirty = false;
                        set_status(&status, "saved", &format!("Saved ({})", saved.created_at));
                    }
                    Err(err) => {
                        log_error("Body map save failed", &err);
                        let message = err.as_string().unwrap_or_else(|| "Save failed".into());
                        set_status(&status, "error", &message);
                    }
                }
            });
        });
        save_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    set_status(&status, "loading", "Loading…");
    spawn_local(async move {
        match get_json::<LatestBodyMapResponse>(LATEST_URL).await {
            Ok(LatestBodyMapResponse { version }) => {
                let mut state = state.borrow_mut();
                if let Some(version) = version {
                    state.view = StageView::for_payload(&version.payload, state.surface.stage);
                    state.recorder.load(version.payload.shapes);
                    set_status(&status, "saved", &format!("Last saved {}", version.created_at));
                } else {
                    set_status(&status, "empty", "No drawing saved yet");
                }
                state.dirty = false;
                redraw_editor(&state);
            }
            Err(err) => {
                log_error("Body map load failed", &err);
                set_status(&status, "error", "Could not load your drawing");
            }
        }
    });

    Ok(())
}

fn rebuild_layers(state: &mut OverlayState) {
    let hidden: Vec<i64> = state
        .layers
        .layers()
        .iter()
        .filter(|layer| !layer.visible)
        .map(|layer| layer.participant_id)
        .collect();
    state.layers = OverlayLayers::build(state.sources.iter().cloned(), state.surface.stage);
    for participant_id in hidden {
        state.layers.set_visible(participant_id, false);
    }
}

fn render_layer_list(
    document: &Document,
    list: &Element,
    state: &Rc<RefCell<OverlayState>>,
) -> Result<(), JsValue> {
    list.set_inner_html("");
    let entries: Vec<(i64, String, bool)> = state
        .borrow()
        .layers
        .layers()
        .iter()
        .map(|layer| (layer.participant_id, layer.label.clone(), layer.visible))
        .collect();
    for (participant_id, label, visible) in entries {
        let row = document.create_element("label")?;
        let input: HtmlInputElement = document.create_element("input")?.dyn_into()?;
        input.set_type("checkbox");
        input.set_checked(visible);
        row.append_child(&input)?;
        row.append_child(&document.create_text_node(&format!(" {label}")))?;
        list.append_child(&row)?;

        let state = state.clone();
        let input_cb = input.clone();
        let onchange = Closure::<dyn FnMut(Event)>::new(move |_| {
            let mut state = state.borrow_mut();
            if let Some(visible) = state.layers.toggle(participant_id) {
                input_cb.set_checked(visible);
            }
            redraw_overlay(&state);
        });
        input.add_event_listener_with_callback("change", onchange.as_ref().unchecked_ref())?;
        onchange.forget();
    }
    Ok(())
}

pub(crate) fn start_overlay(window: Window, document: Document) -> Result<(), JsValue> {
    let surface = open_surface(
        &window,
        &document,
        "overlay-canvas",
        "overlay-background",
        "overlay-image",
    )?;
    let status: Element = get_element(&document, "overlay-status")?;
    let list: Element = get_element(&document, "overlay-layers")?;
    let scratch: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
    let scratch_ctx = context_2d(&scratch)?;
    size_offscreen(&window, &scratch, &scratch_ctx, surface.stage);

    let state = Rc::new(RefCell::new(OverlayState {
        surface,
        sources: Vec::new(),
        layers: OverlayLayers::default(),
        scratch,
        scratch_ctx,
    }));
    watch_image(|state: &OverlayState| &state.surface, &state)?;

    {
        let state = state.clone();
        let window_cb = window.clone();
        let onresize = Closure::<dyn FnMut(Event)>::new(move |_| {
            let mut state = state.borrow_mut();
            let surface = &mut state.surface;
            let stage = fit_canvas(&window_cb, &surface.canvas, &surface.ctx);
            fit_canvas(&window_cb, &surface.background, &surface.background_ctx);
            surface.stage = stage;
            size_offscreen(&window_cb, &state.scratch, &state.scratch_ctx, stage);
            rebuild_layers(&mut state);
            draw_background(&state.surface);
            redraw_overlay(&state);
        });
        window.add_event_listener_with_callback("resize", onresize.as_ref().unchecked_ref())?;
        onresize.forget();
    }

    set_status(&status, "loading", "Loading drawings…");
    spawn_local(async move {
        match get_json::<BodyMapOverlayResponse>(OVERLAY_URL).await {
            Ok(BodyMapOverlayResponse { layers }) => {
                let count = layers.len();
                {
                    let mut state = state.borrow_mut();
                    state.sources = layers
                        .into_iter()
                        .map(|layer| {
                            (layer.participant_id, layer.participant_code, layer.version.payload)
                        })
                        .collect();
                    rebuild_layers(&mut state);
                    redraw_overlay(&state);
                }
                if let Err(err) = render_layer_list(&document, &list, &state) {
                    log_error("Layer list failed", &err);
                }
                set_status(&status, "ready", &format!("{count} participant drawings"));
            }
            Err(err) => {
                log_error("Overlay load failed", &err);
                set_status(&status, "error", "Could not load drawings");
            }
        }
    });

    Ok(())
}
