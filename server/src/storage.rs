use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use studyboard_shared::DrawingPayload;
use thiserror::Error;

use crate::forms::{FormError, NormalizedQuestion, QuestionType};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Form not available")]
    FormNotAvailable,
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("could not allocate a unique participant code")]
    CodeExhausted,
    #[error("storage db error: {0}")]
    Db(String),
    #[error("storage corruption: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        StoreError::Db(error.to_string())
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Form {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub release_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Question {
    pub id: i64,
    pub form_id: i64,
    pub label: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub required: bool,
    pub options: Vec<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FormWithQuestions {
    #[serde(flatten)]
    pub form: Form,
    pub questions: Vec<Question>,
}

/// A validated form ready to be written; see [`crate::forms::FormInput`].
#[derive(Clone, Debug)]
pub struct NewForm {
    pub title: String,
    pub description: Option<String>,
    pub release_at: DateTime<Utc>,
    pub is_active: bool,
    pub questions: Vec<NormalizedQuestion>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct StoredResponse {
    pub id: i64,
    pub answers: BTreeMap<i64, Value>,
}

/// The submitting participant as known to the session layer.
#[derive(Clone, Debug)]
pub struct ParticipantRef {
    pub id: i64,
    pub code: String,
}

#[derive(Clone, Debug)]
pub struct NewParticipant {
    pub email: String,
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub gender: Option<String>,
    pub gender_other: Option<String>,
    pub password_hash: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Participant {
    pub id: i64,
    pub code: String,
    pub email: String,
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub gender: Option<String>,
    pub gender_other: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ParticipantCredentials {
    pub id: i64,
    pub code: String,
    pub password_hash: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BodyMapRecord {
    pub id: i64,
    pub participant_id: i64,
    pub payload: DrawingPayload,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BodyMapSummary {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LatestBodyMap {
    pub participant_code: String,
    pub record: BodyMapRecord,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct TableRows {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

/// Relational store behind the HTTP layer. Every multi-row write is one
/// transaction: on error nothing is committed.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_form(&self, form: NewForm, now: DateTime<Utc>)
        -> Result<FormWithQuestions, StoreError>;
    /// Replaces metadata and the entire question set.
    async fn replace_form(
        &self,
        form_id: i64,
        form: NewForm,
        now: DateTime<Utc>,
    ) -> Result<FormWithQuestions, StoreError>;
    async fn list_forms(&self) -> Result<Vec<FormWithQuestions>, StoreError>;
    async fn get_form(&self, form_id: i64) -> Result<FormWithQuestions, StoreError>;
    /// Active forms whose release time is at or before `now`.
    async fn list_available_forms(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<FormWithQuestions>, StoreError>;

    async fn get_response(
        &self,
        form_id: i64,
        participant_id: i64,
    ) -> Result<Option<StoredResponse>, StoreError>;
    /// Validates `answers` against the form and upserts the participant's
    /// single response, replacing all of its previous answers.
    async fn submit_response(
        &self,
        form_id: i64,
        participant: ParticipantRef,
        answers: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    async fn create_participant(
        &self,
        participant: NewParticipant,
        now: DateTime<Utc>,
    ) -> Result<Participant, StoreError>;
    async fn find_participant_by_code(
        &self,
        code: &str,
    ) -> Result<Option<ParticipantCredentials>, StoreError>;
    async fn list_participants(&self) -> Result<Vec<Participant>, StoreError>;

    async fn save_body_map(
        &self,
        participant_id: i64,
        payload: DrawingPayload,
        now: DateTime<Utc>,
    ) -> Result<BodyMapSummary, StoreError>;
    async fn latest_body_map(&self, participant_id: i64)
        -> Result<Option<BodyMapRecord>, StoreError>;
    async fn body_map_version(
        &self,
        participant_id: i64,
        version_id: i64,
    ) -> Result<Option<BodyMapRecord>, StoreError>;
    async fn list_body_map_versions(
        &self,
        participant_id: i64,
    ) -> Result<Vec<BodyMapSummary>, StoreError>;
    /// The most recent version of every participant that has one.
    async fn latest_body_maps(&self) -> Result<Vec<LatestBodyMap>, StoreError>;

    async fn list_tables(&self) -> Result<Vec<String>, StoreError>;
    async fn table_rows(&self, table: &str) -> Result<TableRows, StoreError>;
}

/// Table names reachable through the admin browser: ASCII letters, digits
/// and underscores only, so they can be quoted into SQL.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}
