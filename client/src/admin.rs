use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Date;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, Event, HtmlButtonElement, HtmlElement, HtmlInputElement,
    HtmlOptionElement, HtmlSelectElement, HtmlTextAreaElement, Window,
};

use studyboard_shared::api::{TableList, TablePage};
use studyboard_shared::forms::{
    starter_questions, FormDraft, FormEnvelope, FormList, QuestionDraft, QuestionKind,
};

use crate::app::{log_error, start_overlay, wire_logout};
use crate::dom::{create, get_element, set_active, set_hidden, set_message};
use crate::net::{get_json, post_json, put_json};
use crate::state::{admin_form_url, table_url, ADMIN_FORMS_URL, TABLES_URL};
use crate::util::{
    datetime_input_from_iso, datetime_input_to_iso, datetime_input_value, format_local_time,
};

const VIEWS: [(&str, &str); 3] = [
    ("database", "database-view"),
    ("forms", "forms-view"),
    ("body-maps", "body-maps-view"),
];

#[derive(Clone)]
struct TablesUi {
    document: Document,
    list: Element,
    title: Element,
    message: Element,
    container: Element,
}

fn render_table(ui: &TablesUi, page: &TablePage) -> Result<(), JsValue> {
    ui.container.set_inner_html("");
    if page.columns.is_empty() {
        let empty: Element = create(&ui.document, "p")?;
        empty.set_text_content(Some("No columns."));
        ui.container.append_child(&empty)?;
        return Ok(());
    }
    let table: Element = create(&ui.document, "table")?;
    table.set_class_name("data-table");
    let head: Element = create(&ui.document, "thead")?;
    let head_row: Element = create(&ui.document, "tr")?;
    for column in &page.columns {
        let cell: Element = create(&ui.document, "th")?;
        cell.set_text_content(Some(column));
        head_row.append_child(&cell)?;
    }
    head.append_child(&head_row)?;
    table.append_child(&head)?;

    let body: Element = create(&ui.document, "tbody")?;
    for row in 0..page.rows.len() {
        let tr: Element = create(&ui.document, "tr")?;
        for column in &page.columns {
            let cell: Element = create(&ui.document, "td")?;
            cell.set_text_content(Some(&page.cell(row, column)));
            tr.append_child(&cell)?;
        }
        body.append_child(&tr)?;
    }
    table.append_child(&body)?;
    ui.container.append_child(&table)?;
    Ok(())
}

async fn load_table(ui: TablesUi, name: String) {
    set_message(&ui.message, "Loading...", false);
    ui.container.set_inner_html("");
    ui.title.set_text_content(Some(&name));
    match get_json::<TablePage>(&table_url(&name)).await {
        Ok(page) => match render_table(&ui, &page) {
            Ok(()) => set_message(&ui.message, "", false),
            Err(err) => log_error("Table render failed", &err),
        },
        Err(err) => {
            let text = err.as_string().unwrap_or_else(|| "Failed to load table".into());
            set_message(&ui.message, &text, true);
        }
    }
}

fn render_table_list(ui: &TablesUi, tables: &[String]) -> Result<Vec<Element>, JsValue> {
    ui.list.set_inner_html("");
    let mut items = Vec::with_capacity(tables.len());
    for name in tables {
        let item: Element = create(&ui.document, "li")?;
        item.set_class_name("sidebar-item");
        item.set_text_content(Some(name));
        ui.list.append_child(&item)?;
        items.push(item);
    }
    for (index, item) in items.iter().enumerate() {
        let ui = ui.clone();
        let name = tables[index].clone();
        let all = items.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            for (other, element) in all.iter().enumerate() {
                set_active(element, other == index);
            }
            spawn_local(load_table(ui.clone(), name.clone()));
        });
        item.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    Ok(items)
}

async fn load_tables(ui: TablesUi) {
    ui.list.set_inner_html("<li>Loading...</li>");
    ui.container.set_inner_html("");
    set_message(&ui.message, "", false);
    ui.title.set_text_content(Some("Select a table"));
    let tables = match get_json::<TableList>(TABLES_URL).await {
        Ok(TableList { tables }) => tables,
        Err(err) => {
            log_error("Tables load failed", &err);
            ui.list.set_inner_html("<li>Error loading tables</li>");
            return;
        }
    };
    let Some(first) = tables.first().cloned() else {
        ui.list.set_inner_html("<li>No tables</li>");
        return;
    };
    match render_table_list(&ui, &tables) {
        Ok(items) => {
            if let Some(item) = items.first() {
                set_active(item, true);
            }
            load_table(ui, first).await;
        }
        Err(err) => log_error("Table list failed", &err),
    }
}

/// Inputs of one question row in the builder.
struct QuestionRow {
    key: u32,
    root: Element,
    label: HtmlInputElement,
    kind: HtmlSelectElement,
    required: HtmlInputElement,
    options: HtmlTextAreaElement,
}

impl QuestionRow {
    fn draft(&self, index: usize) -> QuestionDraft {
        let kind = QuestionKind::parse(&self.kind.value()).unwrap_or(QuestionKind::ShortText);
        QuestionDraft::from_inputs(
            &self.label.value(),
            kind,
            self.required.checked(),
            &self.options.value(),
            index,
        )
    }
}

#[derive(Default)]
struct Builder {
    editing: Option<i64>,
    rows: Vec<QuestionRow>,
    next_key: u32,
}

type SharedBuilder = Rc<RefCell<Builder>>;

#[derive(Clone)]
struct BuilderUi {
    document: Document,
    forms_list: Element,
    heading: Element,
    title: HtmlInputElement,
    description: HtmlTextAreaElement,
    release: HtmlInputElement,
    active: HtmlInputElement,
    questions: Element,
    message: Element,
}

fn labelled(document: &Document, text: &str, control: &Element) -> Result<Element, JsValue> {
    let label: Element = create(document, "label")?;
    label.append_child(&document.create_text_node(text))?;
    label.append_child(control)?;
    Ok(label)
}

fn add_question_row(
    ui: &BuilderUi,
    builder: &SharedBuilder,
    initial: &QuestionDraft,
) -> Result<(), JsValue> {
    let document = &ui.document;
    let root: Element = create(document, "div")?;
    root.set_class_name("question-row");

    let label: HtmlInputElement = create(document, "input")?;
    label.set_type("text");
    label.set_class_name("q-label");
    label.set_value(&initial.label);

    let kind: HtmlSelectElement = create(document, "select")?;
    kind.set_class_name("q-type");
    for option in QuestionKind::ALL {
        let item: HtmlOptionElement = create(document, "option")?;
        item.set_value(option.as_str());
        item.set_text(option.label());
        kind.append_child(&item)?;
    }
    kind.set_value(initial.kind.as_str());

    let required: HtmlInputElement = create(document, "input")?;
    required.set_type("checkbox");
    required.set_checked(initial.required);

    let options: HtmlTextAreaElement = create(document, "textarea")?;
    options.set_rows(3);
    options.set_value(&initial.options_text());

    let remove: HtmlButtonElement = create(document, "button")?;
    remove.set_type("button");
    remove.set_text_content(Some("Remove"));

    let options_label = labelled(document, "Options (one per line)", &options)?;
    let text_label: Element = labelled(document, "Question text", &label)?;
    root.append_child(&text_label)?;
    let kind_label: Element = labelled(document, "Type", &kind)?;
    root.append_child(&kind_label)?;
    let required_label: Element = labelled(document, "Required ", &required)?;
    root.append_child(&required_label)?;
    root.append_child(&options_label)?;
    root.append_child(&remove)?;
    set_hidden(&options_label, !initial.kind.has_options());

    {
        let kind_cb = kind.clone();
        let onchange = Closure::<dyn FnMut(Event)>::new(move |_| {
            let has_options = QuestionKind::parse(&kind_cb.value()).is_some_and(QuestionKind::has_options);
            set_hidden(&options_label, !has_options);
        });
        kind.add_event_listener_with_callback("change", onchange.as_ref().unchecked_ref())?;
        onchange.forget();
    }

    let key = {
        let mut builder = builder.borrow_mut();
        builder.next_key += 1;
        builder.next_key
    };
    {
        let builder = builder.clone();
        let root = root.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            root.remove();
            builder.borrow_mut().rows.retain(|row| row.key != key);
        });
        remove.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    ui.questions.append_child(&root)?;
    builder.borrow_mut().rows.push(QuestionRow {
        key,
        root,
        label,
        kind,
        required,
        options,
    });
    Ok(())
}

fn clear_builder(ui: &BuilderUi, builder: &SharedBuilder, with_starters: bool) -> Result<(), JsValue> {
    {
        let mut builder = builder.borrow_mut();
        builder.editing = None;
        for row in builder.rows.drain(..) {
            row.root.remove();
        }
    }
    ui.heading.set_text_content(Some("Form Builder"));
    ui.title.set_value("");
    ui.description.set_value("");
    ui.release.set_value(&datetime_input_value(&Date::new_0()));
    ui.active.set_checked(true);
    ui.questions.set_inner_html("");
    set_message(&ui.message, "", false);
    if with_starters {
        for question in starter_questions() {
            add_question_row(ui, builder, &question)?;
        }
    }
    Ok(())
}

async fn edit_form(ui: BuilderUi, builder: SharedBuilder, form_id: i64) {
    let form = match get_json::<FormEnvelope>(&admin_form_url(form_id)).await {
        Ok(FormEnvelope { form }) => form,
        Err(err) => {
            log_error("Form load failed", &err);
            set_message(&ui.message, "Could not load form", true);
            return;
        }
    };
    let filled = clear_builder(&ui, &builder, false).and_then(|_| {
        for question in &form.questions {
            add_question_row(&ui, &builder, &QuestionDraft::from(question))?;
        }
        Ok(())
    });
    if let Err(err) = filled {
        log_error("Form builder failed", &err);
        return;
    }
    builder.borrow_mut().editing = Some(form.id);
    ui.heading.set_text_content(Some(&format!("Editing Form #{}", form.id)));
    ui.title.set_value(&form.title);
    ui.description.set_value(form.description.as_deref().unwrap_or(""));
    ui.release.set_value(&datetime_input_from_iso(&form.release_at));
    ui.active.set_checked(form.is_active);
    set_message(&ui.message, &format!("Editing form #{}", form.id), false);
}

async fn load_forms(ui: BuilderUi, builder: SharedBuilder) {
    ui.forms_list.set_inner_html("<li>Loading...</li>");
    let forms = match get_json::<FormList>(ADMIN_FORMS_URL).await {
        Ok(FormList { forms }) => forms,
        Err(err) => {
            log_error("Forms load failed", &err);
            ui.forms_list.set_inner_html("<li>Error loading forms</li>");
            return;
        }
    };
    if forms.is_empty() {
        ui.forms_list.set_inner_html("<li>No forms yet</li>");
        return;
    }
    ui.forms_list.set_inner_html("");
    let rendered: Result<(), JsValue> = forms.iter().try_for_each(|form| {
        let item: Element = create(&ui.document, "li")?;
        let title: Element = create(&ui.document, "strong")?;
        title.set_text_content(Some(&form.title));
        let details: Element = create(&ui.document, "div")?;
        details.set_text_content(Some(&format!(
            "Release: {} · Active: {}",
            format_local_time(&form.release_at),
            if form.is_active { "Yes" } else { "No" }
        )));
        let edit: HtmlButtonElement = create(&ui.document, "button")?;
        edit.set_type("button");
        edit.set_text_content(Some("Edit"));
        item.append_child(&title)?;
        item.append_child(&details)?;
        item.append_child(&edit)?;
        ui.forms_list.append_child(&item)?;

        let ui = ui.clone();
        let builder = builder.clone();
        let form_id = form.id;
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            spawn_local(edit_form(ui.clone(), builder.clone(), form_id));
        });
        edit.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
        Ok(())
    });
    if let Err(err) = rendered {
        log_error("Forms list failed", &err);
    }
}

async fn save_form(ui: BuilderUi, builder: SharedBuilder) {
    let title = ui.title.value().trim().to_string();
    if title.is_empty() {
        set_message(&ui.message, "Title is required", true);
        return;
    }
    let (editing, questions) = {
        let builder = builder.borrow();
        let questions = builder
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| row.draft(index))
            .collect();
        (builder.editing, questions)
    };
    let draft = FormDraft {
        title,
        description: ui.description.value(),
        release_at: datetime_input_to_iso(&ui.release.value()),
        is_active: ui.active.checked(),
        questions,
    };
    let saved = match editing {
        Some(form_id) => put_json::<_, serde_json::Value>(&admin_form_url(form_id), &draft).await,
        None => post_json::<_, serde_json::Value>(ADMIN_FORMS_URL, &draft).await,
    };
    match saved {
        Ok(_) => {
            let text = if editing.is_some() { "Form updated" } else { "Form created" };
            load_forms(ui.clone(), builder.clone()).await;
            if editing.is_none() {
                if let Err(err) = clear_builder(&ui, &builder, false) {
                    log_error("Form builder failed", &err);
                }
            }
            set_message(&ui.message, text, false);
        }
        Err(err) => {
            let text = err.as_string().unwrap_or_else(|| "Failed to save form".into());
            set_message(&ui.message, &text, true);
        }
    }
}

fn wire_builder(document: &Document) -> Result<(BuilderUi, SharedBuilder), JsValue> {
    let ui = BuilderUi {
        document: document.clone(),
        forms_list: get_element(document, "forms-list")?,
        heading: get_element(document, "form-builder-title")?,
        title: get_element(document, "form-title")?,
        description: get_element(document, "form-description")?,
        release: get_element(document, "form-release")?,
        active: get_element(document, "form-active")?,
        questions: get_element(document, "questions-container")?,
        message: get_element(document, "form-builder-message")?,
    };
    let builder: SharedBuilder = Rc::new(RefCell::new(Builder::default()));
    let add: HtmlButtonElement = get_element(document, "add-question-btn")?;
    let save: HtmlButtonElement = get_element(document, "save-form-btn")?;
    let new_form: HtmlButtonElement = get_element(document, "new-form-btn")?;

    {
        let ui = ui.clone();
        let builder = builder.clone();
        let blank = QuestionDraft::from_inputs("", QuestionKind::ShortText, false, "", 0);
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            if let Err(err) = add_question_row(&ui, &builder, &blank) {
                log_error("Add question failed", &err);
            }
        });
        add.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let ui = ui.clone();
        let builder = builder.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            spawn_local(save_form(ui.clone(), builder.clone()));
        });
        save.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let ui = ui.clone();
        let builder = builder.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            if let Err(err) = clear_builder(&ui, &builder, true) {
                log_error("Form builder failed", &err);
            }
        });
        new_form.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    clear_builder(&ui, &builder, true)?;
    Ok((ui, builder))
}

fn show_view(
    window: &Window,
    document: &Document,
    view: &str,
    tables: &TablesUi,
    builder: &(BuilderUi, SharedBuilder),
) -> Result<(), JsValue> {
    for (name, panel_id) in VIEWS {
        let tab: Element = get_element(document, &format!("view-{name}"))?;
        let panel: Element = get_element(document, panel_id)?;
        set_active(&tab, name == view);
        set_hidden(&panel, name != view);
    }
    match view {
        "database" => spawn_local(load_tables(tables.clone())),
        "forms" => spawn_local(load_forms(builder.0.clone(), builder.1.clone())),
        // The overlay canvases were laid out while hidden.
        _ => {
            window.dispatch_event(&Event::new("resize")?)?;
        }
    }
    Ok(())
}

pub fn start_admin(window: Window, document: Document) -> Result<(), JsValue> {
    wire_logout(&window, &document)?;
    let tables = TablesUi {
        document: document.clone(),
        list: get_element(&document, "tables-list")?,
        title: get_element(&document, "table-title")?,
        message: get_element(&document, "table-message")?,
        container: get_element(&document, "table-container")?,
    };
    let builder = wire_builder(&document)?;
    start_overlay(window.clone(), document.clone())?;

    for (name, _) in VIEWS {
        let tab: HtmlElement = get_element(&document, &format!("view-{name}"))?;
        let window_cb = window.clone();
        let document_cb = document.clone();
        let tables = tables.clone();
        let builder = (builder.0.clone(), builder.1.clone());
        let onclick = Closure::<dyn FnMut(Event)>::new(move |_| {
            if let Err(err) = show_view(&window_cb, &document_cb, name, &tables, &builder) {
                log_error("View switch failed", &err);
            }
        });
        tab.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    show_view(&window, &document, "database", &tables, &builder)
}
