//! Form definitions and answer validation.
//!
//! Question sets are always written whole: a form edit replaces every
//! question, so a question id is only stable until the next edit.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::storage::{NewForm, Question};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ShortText,
    LongText,
    Dropdown,
    SelectOne,
    SelectMultiple,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::ShortText => "short_text",
            QuestionType::LongText => "long_text",
            QuestionType::Dropdown => "dropdown",
            QuestionType::SelectOne => "select_one",
            QuestionType::SelectMultiple => "select_multiple",
        }
    }

    pub fn has_options(&self) -> bool {
        matches!(
            self,
            QuestionType::Dropdown | QuestionType::SelectOne | QuestionType::SelectMultiple
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = FormError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "short_text" => Ok(QuestionType::ShortText),
            "long_text" => Ok(QuestionType::LongText),
            "dropdown" => Ok(QuestionType::Dropdown),
            "select_one" => Ok(QuestionType::SelectOne),
            "select_multiple" => Ok(QuestionType::SelectMultiple),
            other => Err(FormError::UnsupportedType(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormError {
    #[error("Title is required")]
    MissingTitle,
    #[error("Questions must be an array")]
    QuestionsNotArray,
    #[error("Each question needs a label and type")]
    IncompleteQuestion { index: usize },
    #[error("Invalid question type: {0}")]
    UnsupportedType(String),
    #[error("Invalid release time: {0}")]
    InvalidReleaseAt(String),
    #[error("Answers must be an object")]
    AnswersNotObject,
    #[error("Question \"{label}\" is required")]
    MissingRequired { question_id: i64, label: String },
    #[error("Question \"{label}\" expects an array")]
    ExpectedArray { question_id: i64, label: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedQuestion {
    pub label: String,
    pub question_type: QuestionType,
    pub required: bool,
    pub options: Vec<String>,
    pub sort_order: i64,
}

/// Admin payload for creating or replacing a form.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FormInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub release_at: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub questions: Value,
}

fn default_active() -> bool {
    true
}

impl FormInput {
    pub fn into_new_form(self, now: DateTime<Utc>) -> Result<NewForm, FormError> {
        let title = self
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .ok_or(FormError::MissingTitle)?;
        let questions = normalize_questions(&self.questions)?;
        let release_at = match self.release_at.as_deref().map(str::trim) {
            None | Some("") => now,
            Some(value) => parse_release_at(value)?,
        };
        Ok(NewForm {
            title,
            description: self.description.filter(|text| !text.trim().is_empty()),
            release_at,
            is_active: self.is_active,
            questions,
        })
    }
}

/// Accepts RFC 3339 or the zone-less `datetime-local` shape (taken as UTC).
pub fn parse_release_at(value: &str) -> Result<DateTime<Utc>, FormError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    Err(FormError::InvalidReleaseAt(value.to_string()))
}

pub fn normalize_questions(raw: &Value) -> Result<Vec<NormalizedQuestion>, FormError> {
    let items = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => return Err(FormError::QuestionsNotArray),
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_question(index, item))
        .collect()
}

fn normalize_question(index: usize, item: &Value) -> Result<NormalizedQuestion, FormError> {
    let label = match item.get("label") {
        Some(Value::String(label)) if !label.is_empty() => label.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => return Err(FormError::IncompleteQuestion { index }),
    };
    let question_type = match item.get("type").and_then(Value::as_str) {
        Some(kind) if !kind.is_empty() => kind.parse::<QuestionType>()?,
        _ => return Err(FormError::IncompleteQuestion { index }),
    };
    let options = if question_type.has_options() {
        normalize_options(item.get("options"))
    } else {
        Vec::new()
    };
    let sort_order = item
        .get("sortOrder")
        .or_else(|| item.get("sort_order"))
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .map(|value| value as i64)
        .unwrap_or(index as i64);
    Ok(NormalizedQuestion {
        label,
        question_type,
        required: item.get("required").is_some_and(truthy),
        options,
        sort_order,
    })
}

fn normalize_options(raw: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(options)) = raw else {
        return Vec::new();
    };
    options
        .iter()
        .filter_map(|option| match option {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        })
        .filter(|option| !option.is_empty())
        .collect()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Storage shape of one answer: exactly one side is set, or neither when
/// an optional question was left blank.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreparedAnswer {
    pub text: Option<String>,
    pub json: Option<Value>,
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Checks every question of a form against the submitted answers and
/// returns one prepared answer per question. Fails on the first violation.
pub fn validate_answers(
    questions: &[Question],
    answers: &Map<String, Value>,
) -> Result<BTreeMap<i64, PreparedAnswer>, FormError> {
    let mut prepared = BTreeMap::new();
    for question in questions {
        let raw = answers.get(&question.id.to_string());
        if is_blank(raw) {
            if question.required {
                return Err(FormError::MissingRequired {
                    question_id: question.id,
                    label: question.label.clone(),
                });
            }
            prepared.insert(question.id, PreparedAnswer::default());
            continue;
        }
        let Some(raw) = raw else {
            continue;
        };
        let answer = match question.question_type {
            QuestionType::SelectMultiple => match raw {
                Value::Array(_) => PreparedAnswer {
                    text: None,
                    json: Some(raw.clone()),
                },
                _ => {
                    return Err(FormError::ExpectedArray {
                        question_id: question.id,
                        label: question.label.clone(),
                    })
                }
            },
            _ => PreparedAnswer {
                text: Some(coerce_text(raw)),
                json: None,
            },
        };
        prepared.insert(question.id, answer);
    }
    Ok(prepared)
}

fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn question(id: i64, kind: QuestionType, required: bool) -> Question {
        Question {
            id,
            form_id: 1,
            label: format!("Q{id}"),
            question_type: kind,
            required,
            options: Vec::new(),
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    fn answers(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn normalizes_options_and_sort_order() {
        let raw = json!([
            {"label": "Mood", "type": "select_one", "required": true,
             "options": [" Good ", "", "  ", 3, null, "Bad"], "sortOrder": 7},
            {"label": "Notes", "type": "long_text", "options": ["ignored"], "sortOrder": "x"}
        ]);
        let questions = normalize_questions(&raw).unwrap();
        assert_eq!(questions[0].options, vec!["Good", "3", "Bad"]);
        assert_eq!(questions[0].sort_order, 7);
        assert!(questions[0].required);
        assert!(questions[1].options.is_empty());
        assert_eq!(questions[1].sort_order, 1);
        assert!(!questions[1].required);
    }

    #[test]
    fn unsupported_type_rejects_whole_set() {
        let raw = json!([
            {"label": "Ok", "type": "short_text"},
            {"label": "Bad", "type": "slider"}
        ]);
        assert_eq!(
            normalize_questions(&raw),
            Err(FormError::UnsupportedType("slider".into()))
        );
    }

    #[test]
    fn question_needs_label_and_type() {
        assert_eq!(
            normalize_questions(&json!([{"type": "short_text"}])),
            Err(FormError::IncompleteQuestion { index: 0 })
        );
        assert_eq!(
            normalize_questions(&json!([{"label": "x", "type": ""}])),
            Err(FormError::IncompleteQuestion { index: 0 })
        );
        assert_eq!(
            normalize_questions(&json!({"label": "x"})),
            Err(FormError::QuestionsNotArray)
        );
        assert_eq!(normalize_questions(&Value::Null), Ok(Vec::new()));
    }

    #[test]
    fn form_input_requires_title_and_parses_release() {
        let now = Utc::now();
        let input: FormInput = serde_json::from_value(json!({"title": "  "})).unwrap();
        assert_eq!(input.into_new_form(now).unwrap_err(), FormError::MissingTitle);

        let input: FormInput = serde_json::from_value(json!({
            "title": "Intake", "description": "", "releaseAt": "2030-01-02T03:04"
        }))
        .unwrap();
        let form = input.into_new_form(now).unwrap();
        assert!(form.is_active);
        assert!(form.description.is_none());
        assert_eq!(form.release_at.to_rfc3339(), "2030-01-02T03:04:00+00:00");

        let input: FormInput =
            serde_json::from_value(json!({"title": "Intake", "releaseAt": "soon"})).unwrap();
        assert!(matches!(
            input.into_new_form(now),
            Err(FormError::InvalidReleaseAt(_))
        ));
    }

    #[test]
    fn required_blank_values_fail() {
        let questions = vec![question(5, QuestionType::SelectMultiple, true)];
        for blank in [json!({}), json!({"5": null}), json!({"5": ""}), json!({"5": []})] {
            let err = validate_answers(&questions, &answers(blank)).unwrap_err();
            assert_eq!(err.to_string(), "Question \"Q5\" is required");
        }
    }

    #[test]
    fn optional_blank_values_store_nothing() {
        let questions = vec![
            question(1, QuestionType::ShortText, false),
            question(2, QuestionType::SelectMultiple, false),
        ];
        let prepared = validate_answers(&questions, &answers(json!({"2": []}))).unwrap();
        assert_eq!(prepared[&1], PreparedAnswer::default());
        assert_eq!(prepared[&2], PreparedAnswer::default());
    }

    #[test]
    fn answers_are_shaped_by_question_type() {
        let questions = vec![
            question(1, QuestionType::ShortText, false),
            question(2, QuestionType::SelectMultiple, false),
            question(3, QuestionType::Dropdown, false),
        ];
        let prepared = validate_answers(
            &questions,
            &answers(json!({"1": 42, "2": ["a", "b"], "3": "Yes"})),
        )
        .unwrap();
        assert_eq!(prepared[&1].text.as_deref(), Some("42"));
        assert_eq!(prepared[&2].json, Some(json!(["a", "b"])));
        assert!(prepared[&2].text.is_none());
        assert_eq!(prepared[&3].text.as_deref(), Some("Yes"));
    }

    #[test]
    fn select_multiple_rejects_scalars() {
        let questions = vec![question(9, QuestionType::SelectMultiple, false)];
        assert_eq!(
            validate_answers(&questions, &answers(json!({"9": "a"}))),
            Err(FormError::ExpectedArray {
                question_id: 9,
                label: "Q9".into()
            })
        );
    }
}
