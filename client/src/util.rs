use js_sys::{Date, Math};
use wasm_bindgen::JsValue;

const PASSWORD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";
pub const GENERATED_PASSWORD_LEN: usize = 12;

pub fn generate_password(len: usize) -> String {
    (0..len)
        .map(|_| {
            let index = (Math::random() * PASSWORD_CHARS.len() as f64) as usize;
            PASSWORD_CHARS[index.min(PASSWORD_CHARS.len() - 1)] as char
        })
        .collect()
}

/// Server timestamp in the browser's locale.
pub fn format_local_time(iso: &str) -> String {
    let date = Date::new(&JsValue::from_str(iso));
    if date.get_time().is_nan() {
        return iso.to_string();
    }
    date.to_locale_string("default", &JsValue::UNDEFINED).into()
}

/// `datetime-local` input value for `date` in local time.
pub fn datetime_input_value(date: &Date) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}",
        date.get_full_year(),
        date.get_month() + 1,
        date.get_date(),
        date.get_hours(),
        date.get_minutes()
    )
}

pub fn datetime_input_from_iso(iso: &str) -> String {
    let date = Date::new(&JsValue::from_str(iso));
    if date.get_time().is_nan() {
        return String::new();
    }
    datetime_input_value(&date)
}

/// A `datetime-local` value read as local time, as an RFC 3339 string.
pub fn datetime_input_to_iso(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        return None;
    }
    let date = Date::new(&JsValue::from_str(value));
    if date.get_time().is_nan() {
        return None;
    }
    Some(date.to_iso_string().into())
}
