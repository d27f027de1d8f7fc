use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, Event, HtmlButtonElement, HtmlElement, HtmlInputElement,
    HtmlOptionElement, HtmlSelectElement, HtmlTextAreaElement, Window,
};

use studyboard_shared::api::{MeResponse, SessionView};
use studyboard_shared::forms::{
    AnswerSubmission, FormList, FormView, QuestionKind, QuestionView, ResponseEnvelope,
    SavedAnswers,
};

use crate::app::{log_error, wire_logout};
use crate::dom::{create, get_element, navigate, set_active, set_message};
use crate::net::{get_json, post_json};
use crate::state::{form_response_url, form_submit_url, AVAILABLE_FORMS_URL, ME_URL};
use crate::util::format_local_time;
use crate::ws::connect_heartbeat;

/// What this page has loaded for the logged-in participant.
#[derive(Default)]
struct FormsSession {
    forms: Vec<FormView>,
    selected: Option<i64>,
    responses: HashMap<i64, Option<SavedAnswers>>,
}

type Session = Rc<RefCell<FormsSession>>;

#[derive(Clone)]
struct FormsUi {
    document: Document,
    sidebar: Element,
    message: Element,
    stage: Element,
}

/// Input elements of one rendered question.
enum AnswerInput {
    Text(HtmlInputElement),
    LongText(HtmlTextAreaElement),
    Select(HtmlSelectElement),
    Choices(Vec<HtmlInputElement>),
}

impl AnswerInput {
    fn chosen(&self) -> Vec<String> {
        match self {
            AnswerInput::Text(input) => vec![input.value()],
            AnswerInput::LongText(input) => vec![input.value()],
            AnswerInput::Select(select) => vec![select.value()],
            AnswerInput::Choices(inputs) => inputs
                .iter()
                .filter(|input| input.checked())
                .map(HtmlInputElement::value)
                .collect(),
        }
    }
}

async fn fetch_response(form_id: i64) -> Option<SavedAnswers> {
    match get_json::<ResponseEnvelope>(&form_response_url(form_id)).await {
        Ok(envelope) => envelope.response,
        Err(err) => {
            log_error("Response load failed", &err);
            None
        }
    }
}

fn choice_inputs(
    ui: &FormsUi,
    wrapper: &Element,
    question: &QuestionView,
    existing: &[String],
) -> Result<Vec<HtmlInputElement>, JsValue> {
    let input_type = if question.kind == QuestionKind::SelectMultiple {
        "checkbox"
    } else {
        "radio"
    };
    let mut inputs = Vec::with_capacity(question.options.len());
    for (index, option) in question.options.iter().enumerate() {
        let id = format!("q-{}-{index}", question.id);
        let row: Element = create(&ui.document, "div")?;
        row.set_class_name("option-row");
        let input: HtmlInputElement = create(&ui.document, "input")?;
        input.set_type(input_type);
        input.set_name(&format!("q-{}", question.id));
        input.set_id(&id);
        input.set_value(option);
        input.set_checked(existing.iter().any(|value| value == option));
        let label: Element = create(&ui.document, "label")?;
        label.set_attribute("for", &id)?;
        label.set_text_content(Some(option));
        row.append_child(&input)?;
        row.append_child(&label)?;
        wrapper.append_child(&row)?;
        inputs.push(input);
    }
    Ok(inputs)
}

fn question_input(
    ui: &FormsUi,
    wrapper: &Element,
    question: &QuestionView,
    existing: &[String],
) -> Result<AnswerInput, JsValue> {
    let name = format!("q-{}", question.id);
    let first = existing.first().map(String::as_str).unwrap_or("");
    let input = match question.kind {
        QuestionKind::ShortText => {
            let input: HtmlInputElement = create(&ui.document, "input")?;
            input.set_type("text");
            input.set_name(&name);
            input.set_value(first);
            wrapper.append_child(&input)?;
            AnswerInput::Text(input)
        }
        QuestionKind::LongText => {
            let textarea: HtmlTextAreaElement = create(&ui.document, "textarea")?;
            textarea.set_name(&name);
            textarea.set_rows(3);
            textarea.set_value(first);
            wrapper.append_child(&textarea)?;
            AnswerInput::LongText(textarea)
        }
        QuestionKind::Dropdown => {
            let select: HtmlSelectElement = create(&ui.document, "select")?;
            select.set_name(&name);
            let placeholder: HtmlOptionElement = create(&ui.document, "option")?;
            placeholder.set_value("");
            placeholder.set_text("Select...");
            select.append_child(&placeholder)?;
            for option in &question.options {
                let item: HtmlOptionElement = create(&ui.document, "option")?;
                item.set_value(option);
                item.set_text(option);
                item.set_selected(option == first);
                select.append_child(&item)?;
            }
            wrapper.append_child(&select)?;
            AnswerInput::Select(select)
        }
        QuestionKind::SelectOne | QuestionKind::SelectMultiple => {
            AnswerInput::Choices(choice_inputs(ui, wrapper, question, existing)?)
        }
    };
    Ok(input)
}

fn render_sidebar(ui: &FormsUi, session: &Session) -> Result<(), JsValue> {
    ui.sidebar.set_inner_html("");
    let (entries, selected) = {
        let session = session.borrow();
        let entries: Vec<(i64, String)> = session
            .forms
            .iter()
            .map(|form| (form.id, form.title.clone()))
            .collect();
        (entries, session.selected)
    };
    for (form_id, title) in entries {
        let item: Element = create(&ui.document, "li")?;
        item.set_class_name("sidebar-item");
        set_active(&item, selected == Some(form_id));
        item.set_text_content(Some(&title));
        let ui_cb = ui.clone();
        let session_cb = session.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            let ui = ui_cb.clone();
            let session = session_cb.clone();
            spawn_local(async move {
                select_form(&ui, &session, form_id).await;
            });
        });
        item.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
        ui.sidebar.append_child(&item)?;
    }
    Ok(())
}

fn render_form(ui: &FormsUi, session: &Session) -> Result<(), JsValue> {
    ui.stage.set_inner_html("");
    let (form, saved) = {
        let session = session.borrow();
        let form = session
            .selected
            .and_then(|id| session.forms.iter().find(|form| form.id == id))
            .cloned();
        let saved = form
            .as_ref()
            .and_then(|form| session.responses.get(&form.id).cloned().flatten());
        (form, saved)
    };
    let Some(form) = form else {
        let empty: Element = create(&ui.document, "p")?;
        empty.set_text_content(Some("No forms to show."));
        ui.stage.append_child(&empty)?;
        return Ok(());
    };

    let card: Element = create(&ui.document, "div")?;
    card.set_class_name("form-card");
    let title: Element = create(&ui.document, "h3")?;
    title.set_text_content(Some(&form.title));
    let description: Element = create(&ui.document, "p")?;
    description.set_text_content(form.description.as_deref());
    let release: Element = create(&ui.document, "div")?;
    release.set_text_content(Some(&format!(
        "Release: {}",
        format_local_time(&form.release_at)
    )));
    let message: Element = create(&ui.document, "div")?;
    message.set_class_name("message");
    let html_form: HtmlElement = create(&ui.document, "form")?;

    let mut inputs = Vec::with_capacity(form.questions.len());
    for question in &form.questions {
        let wrapper: Element = create(&ui.document, "div")?;
        wrapper.set_class_name("form-question");
        let label: Element = create(&ui.document, "label")?;
        let marker = if question.required { " *" } else { "" };
        label.set_text_content(Some(&format!("{}{marker}", question.label)));
        wrapper.append_child(&label)?;
        let existing = saved
            .as_ref()
            .map(|saved| saved.values_for(question.id))
            .unwrap_or_default();
        let input = question_input(ui, &wrapper, question, &existing)?;
        inputs.push((question.id, question.kind, input));
        html_form.append_child(&wrapper)?;
    }

    let submit: HtmlButtonElement = create(&ui.document, "button")?;
    submit.set_type("submit");
    submit.set_text_content(Some(if saved.is_some() {
        "Update response"
    } else {
        "Submit response"
    }));
    html_form.append_child(&submit)?;

    card.append_child(&title)?;
    card.append_child(&description)?;
    card.append_child(&release)?;
    card.append_child(&html_form)?;
    card.append_child(&message)?;
    ui.stage.append_child(&card)?;

    let form_id = form.id;
    let session = session.clone();
    let onsubmit = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        event.prevent_default();
        let mut submission = AnswerSubmission::default();
        for (question_id, kind, input) in &inputs {
            submission.insert(*question_id, *kind, input.chosen());
        }
        submit.set_disabled(true);
        set_message(&message, "Saving...", false);

        let session = session.clone();
        let message = message.clone();
        let submit = submit.clone();
        spawn_local(async move {
            match post_json::<_, serde_json::Value>(&form_submit_url(form_id), &submission).await
            {
                Ok(_) => {
                    let saved = fetch_response(form_id).await;
                    session.borrow_mut().responses.insert(form_id, saved);
                    set_message(&message, "Saved", false);
                    submit.set_text_content(Some("Update response"));
                }
                Err(err) => {
                    let text = err.as_string().unwrap_or_else(|| "Failed to save".into());
                    set_message(&message, &text, true);
                }
            }
            submit.set_disabled(false);
        });
    });
    html_form.add_event_listener_with_callback("submit", onsubmit.as_ref().unchecked_ref())?;
    onsubmit.forget();
    Ok(())
}

async fn select_form(ui: &FormsUi, session: &Session, form_id: i64) {
    let cached = session.borrow().responses.contains_key(&form_id);
    if !cached {
        let saved = fetch_response(form_id).await;
        session.borrow_mut().responses.insert(form_id, saved);
    }
    session.borrow_mut().selected = Some(form_id);
    if let Err(err) = render_sidebar(ui, session).and_then(|_| render_form(ui, session)) {
        log_error("Form render failed", &err);
    }
}

async fn load_forms(ui: FormsUi, session: Session) {
    set_message(&ui.message, "Loading...", false);
    ui.sidebar.set_inner_html("");
    match get_json::<FormList>(AVAILABLE_FORMS_URL).await {
        Ok(FormList { forms }) => {
            let first = forms.first().map(|form| form.id);
            *session.borrow_mut() = FormsSession {
                forms,
                ..FormsSession::default()
            };
            match first {
                Some(form_id) => {
                    set_message(&ui.message, "", false);
                    select_form(&ui, &session, form_id).await;
                }
                None => set_message(&ui.message, "No forms available right now.", false),
            }
        }
        Err(err) => {
            log_error("Forms load failed", &err);
            set_message(&ui.message, "Could not load forms.", true);
        }
    }
}

pub fn start_participant(window: Window, document: Document) -> Result<(), JsValue> {
    let ui = FormsUi {
        sidebar: get_element(&document, "forms-sidebar")?,
        message: get_element(&document, "forms-message")?,
        stage: get_element(&document, "form-stage")?,
        document: document.clone(),
    };
    wire_logout(&window, &document)?;
    connect_heartbeat(
        &window,
        get_element(&document, "socket-status")?,
        get_element(&document, "pong-result")?,
        &get_element(&document, "ping-btn")?,
    )?;

    let session: Session = Rc::new(RefCell::new(FormsSession::default()));
    spawn_local(async move {
        match get_json::<MeResponse>(ME_URL).await {
            Ok(MeResponse {
                user: Some(SessionView::Participant { .. }),
            }) => load_forms(ui, session).await,
            _ => navigate(&window, "/"),
        }
    });
    Ok(())
}
