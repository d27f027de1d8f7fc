//! Forms and responses as the browser client reads and writes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    ShortText,
    LongText,
    Dropdown,
    SelectOne,
    SelectMultiple,
}

impl QuestionKind {
    pub const ALL: [QuestionKind; 5] = [
        QuestionKind::ShortText,
        QuestionKind::LongText,
        QuestionKind::Dropdown,
        QuestionKind::SelectOne,
        QuestionKind::SelectMultiple,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::ShortText => "short_text",
            QuestionKind::LongText => "long_text",
            QuestionKind::Dropdown => "dropdown",
            QuestionKind::SelectOne => "select_one",
            QuestionKind::SelectMultiple => "select_multiple",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QuestionKind::ShortText => "Short text",
            QuestionKind::LongText => "Long text",
            QuestionKind::Dropdown => "Dropdown",
            QuestionKind::SelectOne => "Single choice",
            QuestionKind::SelectMultiple => "Multiple choice",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn has_options(self) -> bool {
        matches!(
            self,
            QuestionKind::Dropdown | QuestionKind::SelectOne | QuestionKind::SelectMultiple
        )
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct QuestionView {
    pub id: i64,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct FormView {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub release_at: String,
    pub is_active: bool,
    #[serde(default)]
    pub questions: Vec<QuestionView>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FormList {
    pub forms: Vec<FormView>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FormEnvelope {
    pub form: FormView,
}

/// A participant's stored answers keyed by question id.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SavedAnswers {
    pub id: i64,
    pub answers: BTreeMap<i64, Value>,
}

impl SavedAnswers {
    /// Stored answer as the list of option or text values to pre-fill.
    pub fn values_for(&self, question_id: i64) -> Vec<String> {
        match self.answers.get(&question_id) {
            Some(Value::String(text)) if !text.is_empty() => vec![text.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::Number(number)) => vec![number.to_string()],
            Some(Value::Bool(flag)) => vec![flag.to_string()],
            _ => Vec::new(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ResponseEnvelope {
    pub response: Option<SavedAnswers>,
}

/// Body of a response submission.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct AnswerSubmission {
    pub answers: Map<String, Value>,
}

impl AnswerSubmission {
    /// Multiple-choice questions post every chosen value as an array;
    /// everything else posts its single value, empty when nothing is chosen.
    pub fn insert(&mut self, question_id: i64, kind: QuestionKind, chosen: Vec<String>) {
        let value = match kind {
            QuestionKind::SelectMultiple => {
                Value::Array(chosen.into_iter().map(Value::String).collect())
            }
            _ => Value::String(chosen.into_iter().next().unwrap_or_default()),
        };
        self.answers.insert(question_id.to_string(), value);
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub required: bool,
    pub options: Vec<String>,
    pub sort_order: i64,
}

impl QuestionDraft {
    /// Builds a question from the builder's inputs; options are entered one
    /// per line.
    pub fn from_inputs(
        label: &str,
        kind: QuestionKind,
        required: bool,
        options_text: &str,
        index: usize,
    ) -> Self {
        Self {
            label: label.trim().to_string(),
            kind,
            required,
            options: options_text
                .lines()
                .map(str::trim)
                .filter(|option| !option.is_empty())
                .map(str::to_string)
                .collect(),
            sort_order: index as i64,
        }
    }

    pub fn options_text(&self) -> String {
        self.options.join("\n")
    }
}

impl From<&QuestionView> for QuestionDraft {
    fn from(question: &QuestionView) -> Self {
        Self {
            label: question.label.clone(),
            kind: question.kind,
            required: question.required,
            options: question.options.clone(),
            sort_order: 0,
        }
    }
}

/// Rows a new form starts with, one per question type.
pub fn starter_questions() -> Vec<QuestionDraft> {
    let row = |label: &str, kind, required, options: &[&str]| QuestionDraft {
        label: label.to_string(),
        kind,
        required,
        options: options.iter().map(|option| option.to_string()).collect(),
        sort_order: 0,
    };
    vec![
        row("Short text example", QuestionKind::ShortText, true, &[]),
        row("Dropdown example", QuestionKind::Dropdown, false, &["Option A", "Option B"]),
        row("Single choice example", QuestionKind::SelectOne, false, &["Yes", "No"]),
        row(
            "Multiple choice example",
            QuestionKind::SelectMultiple,
            false,
            &["Red", "Green", "Blue"],
        ),
        row("Long text example", QuestionKind::LongText, false, &[]),
    ]
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormDraft {
    pub title: String,
    pub description: String,
    pub release_at: Option<String>,
    pub is_active: bool,
    pub questions: Vec<QuestionDraft>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn question_kinds_round_trip_through_their_names() {
        for kind in QuestionKind::ALL {
            assert_eq!(QuestionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(QuestionKind::parse("rating"), None);
        assert!(!QuestionKind::LongText.has_options());
    }

    #[test]
    fn saved_answers_prefill_each_shape() {
        let saved: ResponseEnvelope = serde_json::from_value(json!({
            "response": {"id": 4, "answers": {"1": "Yes", "2": ["Arm", "Leg"], "3": null, "4": 7}}
        }))
        .unwrap();
        let saved = saved.response.unwrap();
        assert_eq!(saved.values_for(1), vec!["Yes"]);
        assert_eq!(saved.values_for(2), vec!["Arm", "Leg"]);
        assert!(saved.values_for(3).is_empty());
        assert_eq!(saved.values_for(4), vec!["7"]);
        assert!(saved.values_for(99).is_empty());
    }

    #[test]
    fn submission_shapes_follow_question_kind() {
        let mut submission = AnswerSubmission::default();
        submission.insert(1, QuestionKind::SelectOne, Vec::new());
        submission.insert(2, QuestionKind::SelectMultiple, vec!["Red".into(), "Blue".into()]);
        submission.insert(3, QuestionKind::ShortText, vec!["hello".into()]);
        assert_eq!(
            serde_json::to_value(&submission).unwrap(),
            json!({"answers": {"1": "", "2": ["Red", "Blue"], "3": "hello"}})
        );
    }

    #[test]
    fn builder_rows_become_question_drafts() {
        let draft = QuestionDraft::from_inputs(
            "  Where?  ",
            QuestionKind::Dropdown,
            true,
            "Arm\n\n  Leg \r\n",
            2,
        );
        assert_eq!(draft.label, "Where?");
        assert_eq!(draft.options, vec!["Arm", "Leg"]);
        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            json!({"label": "Where?", "type": "dropdown", "required": true,
                   "options": ["Arm", "Leg"], "sortOrder": 2})
        );
        assert_eq!(draft.options_text(), "Arm\nLeg");
    }

    #[test]
    fn starter_rows_cover_every_kind() {
        let kinds: Vec<_> = starter_questions().iter().map(|q| q.kind).collect();
        for kind in QuestionKind::ALL {
            assert!(kinds.contains(&kind));
        }
    }
}
