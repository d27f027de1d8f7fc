use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, HtmlButtonElement, MessageEvent, WebSocket, Window};

use studyboard_shared::{ClientMessage, ServerMessage};

use crate::net::websocket_url;

/// Connects the heartbeat socket and wires the ping button to it.
pub fn connect_heartbeat(
    window: &Window,
    status: Element,
    pong: Element,
    ping_button: &HtmlButtonElement,
) -> Result<(), JsValue> {
    let socket = Rc::new(WebSocket::new(&websocket_url(window)?)?);

    {
        let status = status.clone();
        let onopen = Closure::<dyn FnMut(Event)>::new(move |_| {
            status.set_text_content(Some("Connected."));
        });
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();
    }

    {
        let onclose = Closure::<dyn FnMut(Event)>::new(move |_| {
            status.set_text_content(Some("Disconnected from server."));
        });
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();
    }

    {
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let Some(text) = event.data().as_string() else {
                return;
            };
            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(ServerMessage::Pong { time }) => {
                    pong.set_text_content(Some(&format!("Pong from server at {time}")));
                }
                Err(error) => {
                    web_sys::console::error_1(&format!("WS message parse error: {error}").into());
                }
            }
        });
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
        if socket.ready_state() != WebSocket::OPEN {
            return;
        }
        if let Ok(payload) = serde_json::to_string(&ClientMessage::Ping) {
            let _ = socket.send_with_str(&payload);
        }
    });
    ping_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
    onclick.forget();
    Ok(())
}
