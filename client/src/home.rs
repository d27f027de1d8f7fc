use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, Event, HtmlButtonElement, HtmlElement, HtmlInputElement,
    HtmlSelectElement, Window,
};

use studyboard_shared::api::{Credentials, LoginReply, RegisterReply, Registration};

use crate::app::log_error;
use crate::dom::{create, get_element, navigate, set_active, set_hidden, set_message};
use crate::net::post_json;
use crate::state::{LOGIN_URL, REGISTER_URL};
use crate::util::{generate_password, GENERATED_PASSWORD_LEN};

fn optional(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn wire_tabs(document: &Document) -> Result<(), JsValue> {
    let tab_login: Element = get_element(document, "tab-login")?;
    let tab_register: Element = get_element(document, "tab-register")?;
    let login_section: Element = get_element(document, "login-section")?;
    let register_section: Element = get_element(document, "register-section")?;

    for (tab, show_register) in [(tab_login.clone(), false), (tab_register.clone(), true)] {
        let tab_login = tab_login.clone();
        let tab_register = tab_register.clone();
        let login_section = login_section.clone();
        let register_section = register_section.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            set_active(&tab_login, !show_register);
            set_active(&tab_register, show_register);
            set_hidden(&login_section, show_register);
            set_hidden(&register_section, !show_register);
        });
        tab.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    Ok(())
}

fn wire_login(window: &Window, document: &Document) -> Result<(), JsValue> {
    let form: HtmlElement = get_element(document, "login-form")?;
    let username: HtmlInputElement = get_element(document, "login-username")?;
    let password: HtmlInputElement = get_element(document, "login-password")?;
    let message: Element = get_element(document, "login-message")?;

    let window = window.clone();
    let onsubmit = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        event.prevent_default();
        let credentials = Credentials {
            username: username.value().trim().to_string(),
            password: password.value(),
        };
        let window = window.clone();
        let message = message.clone();
        spawn_local(async move {
            match post_json::<_, LoginReply>(LOGIN_URL, &credentials).await {
                Ok(reply) => {
                    set_message(&message, "Login successful! Redirecting...", false);
                    navigate(&window, reply.landing_page());
                }
                Err(err) => {
                    let text = err.as_string().unwrap_or_else(|| "Login failed".into());
                    set_message(&message, &text, true);
                }
            }
        });
    });
    form.add_event_listener_with_callback("submit", onsubmit.as_ref().unchecked_ref())?;
    onsubmit.forget();
    Ok(())
}

/// Confirmation with the code and password the participant must keep.
fn show_registered(
    document: &Document,
    result: &Element,
    reply: &RegisterReply,
    password: &str,
) -> Result<(), JsValue> {
    result.set_inner_html("");
    let _ = result.class_list().remove_1("error");
    let lines = [
        ("Your login code: ", Some(reply.code.as_str())),
        ("Your password: ", Some(password)),
        ("This will also be emailed to you. Please save it.", None),
    ];
    let heading: Element = create(document, "div")?;
    heading.set_text_content(Some(&format!("Registered as {}.", reply.email)));
    result.append_child(&heading)?;
    for (label, value) in lines {
        let line: Element = create(document, "div")?;
        line.append_child(&document.create_text_node(label))?;
        if let Some(value) = value {
            let strong: Element = create(document, "strong")?;
            strong.set_text_content(Some(value));
            line.append_child(&strong)?;
        }
        result.append_child(&line)?;
    }
    Ok(())
}

fn wire_register(document: &Document) -> Result<(), JsValue> {
    let form: HtmlElement = get_element(document, "register-form")?;
    let email: HtmlInputElement = get_element(document, "register-email")?;
    let password: HtmlInputElement = get_element(document, "password-input")?;
    let age: HtmlInputElement = get_element(document, "register-age")?;
    let sex: HtmlSelectElement = get_element(document, "sex-select")?;
    let gender: HtmlSelectElement = get_element(document, "gender-select")?;
    let gender_other: HtmlInputElement = get_element(document, "gender-other")?;
    let gender_other_wrapper: Element = get_element(document, "gender-other-wrapper")?;
    let generate: HtmlButtonElement = get_element(document, "generate-password")?;
    let submit: HtmlButtonElement = get_element(document, "register-submit")?;
    let spinner: Element = get_element(document, "register-spinner")?;
    let result: Element = get_element(document, "register-result")?;

    {
        let gender_cb = gender.clone();
        let onchange = Closure::<dyn FnMut(Event)>::new(move |_| {
            set_hidden(&gender_other_wrapper, gender_cb.value() != "other");
        });
        gender.add_event_listener_with_callback("change", onchange.as_ref().unchecked_ref())?;
        onchange.forget();
    }

    {
        let password = password.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            password.set_value(&generate_password(GENERATED_PASSWORD_LEN));
        });
        generate.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    let document = document.clone();
    let onsubmit = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        event.prevent_default();
        let gender_value = gender.value();
        let body = Registration {
            email: email.value().trim().to_string(),
            password: password.value(),
            age: optional(age.value()),
            sex: optional(sex.value()),
            gender_other: if gender_value == "other" {
                optional(gender_other.value())
            } else {
                None
            },
            gender: optional(gender_value),
        };
        set_message(&result, "", false);
        set_hidden(&spinner, false);
        submit.set_disabled(true);

        let document = document.clone();
        let result = result.clone();
        let spinner = spinner.clone();
        let submit = submit.clone();
        spawn_local(async move {
            match post_json::<_, RegisterReply>(REGISTER_URL, &body).await {
                Ok(reply) => {
                    if let Err(err) = show_registered(&document, &result, &reply, &body.password) {
                        log_error("Registration result failed", &err);
                    }
                }
                Err(err) => {
                    let text = err.as_string().unwrap_or_else(|| "Registration failed".into());
                    set_message(&result, &text, true);
                }
            }
            set_hidden(&spinner, true);
            submit.set_disabled(false);
        });
    });
    form.add_event_listener_with_callback("submit", onsubmit.as_ref().unchecked_ref())?;
    onsubmit.forget();
    Ok(())
}

pub fn start_home(window: Window, document: Document) -> Result<(), JsValue> {
    wire_tabs(&document)?;
    wire_login(&window, &document)?;
    wire_register(&document)?;
    Ok(())
}
