use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::{Map, Value};
use studyboard_shared::{decode_drawing_payload, encode_drawing_payload, DrawingPayload};
use tracing::{debug, info};

use crate::credentials::generate_participant_code;
use crate::forms::{validate_answers, NormalizedQuestion, QuestionType};
use crate::storage::{
    is_valid_table_name, BodyMapRecord, BodyMapSummary, Form, FormWithQuestions, LatestBodyMap,
    NewForm, NewParticipant, Participant, ParticipantCredentials, ParticipantRef, Question,
    Storage, StoreError, StoredResponse, TableRows,
};

const SCHEMA_VERSION: i64 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const TABLE_ROW_LIMIT: usize = 200;
const MAX_CODE_ATTEMPTS: usize = 16;
const REDACTED_COLUMNS: [&str; 1] = ["password_hash"];

const FORM_COLUMNS: &str = "id, title, description, release_at, is_active, created_at, updated_at";
const QUESTION_COLUMNS: &str =
    "id, form_id, label, type, required, options, sort_order, created_at";
const PARTICIPANT_COLUMNS: &str =
    "id, code, email, age, sex, gender, gender_other, created_at";

pub struct SqliteStorage {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| StoreError::Db(format!("cannot create {}: {err}", parent.display())))?;
        }
        let mut connection = Connection::open(path)?;
        connection.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::prepare(&mut connection)?;
        info!(path = %path.display(), "sqlite storage opened");
        Ok(Self::from_connection(connection))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut connection = Connection::open_in_memory()?;
        Self::prepare(&mut connection)?;
        Ok(Self::from_connection(connection))
    }

    fn from_connection(connection: Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    fn prepare(connection: &mut Connection) -> Result<(), StoreError> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection.busy_timeout(BUSY_TIMEOUT)?;
        initialize_schema(connection)
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let connection = self.connection.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|_| StoreError::Db("connection mutex poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|err| StoreError::Db(format!("storage task failed: {err}")))?
    }
}

fn initialize_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute(
                "INSERT INTO store_meta (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS participants (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    code TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL,
                    age INTEGER,
                    sex TEXT,
                    gender TEXT,
                    gender_other TEXT,
                    password_hash TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS forms (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    release_at INTEGER NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS form_questions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    form_id INTEGER NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
                    label TEXT NOT NULL,
                    type TEXT NOT NULL,
                    required INTEGER NOT NULL DEFAULT 0,
                    options TEXT NOT NULL DEFAULT '[]',
                    sort_order INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_form_questions_form
                    ON form_questions (form_id, sort_order, id);
                CREATE TABLE IF NOT EXISTS form_responses (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    form_id INTEGER NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
                    participant_id INTEGER NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
                    participant_code TEXT,
                    submitted_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    UNIQUE (form_id, participant_id)
                );
                CREATE TABLE IF NOT EXISTS form_answers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    response_id INTEGER NOT NULL REFERENCES form_responses(id) ON DELETE CASCADE,
                    question_id INTEGER NOT NULL REFERENCES form_questions(id) ON DELETE CASCADE,
                    participant_id INTEGER REFERENCES participants(id) ON DELETE CASCADE,
                    participant_code TEXT,
                    answer_text TEXT,
                    answer_json TEXT,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_form_answers_response
                    ON form_answers (response_id);
                CREATE TABLE IF NOT EXISTS body_map_versions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    participant_id INTEGER NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
                    payload BLOB NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_body_map_versions_participant
                    ON body_map_versions (participant_id, created_at);",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(StoreError::Corrupt(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}

impl ToSql for QuestionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for QuestionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn form_from_row(row: &Row<'_>) -> rusqlite::Result<Form> {
    Ok(Form {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        release_at: from_millis(row.get(3)?),
        is_active: row.get(4)?,
        created_at: from_millis(row.get(5)?),
        updated_at: from_millis(row.get(6)?),
    })
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    let options: String = row.get(5)?;
    Ok(Question {
        id: row.get(0)?,
        form_id: row.get(1)?,
        label: row.get(2)?,
        question_type: row.get(3)?,
        required: row.get(4)?,
        options: serde_json::from_str(&options).unwrap_or_default(),
        sort_order: row.get(6)?,
        created_at: from_millis(row.get(7)?),
    })
}

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        code: row.get(1)?,
        email: row.get(2)?,
        age: row.get(3)?,
        sex: row.get(4)?,
        gender: row.get(5)?,
        gender_other: row.get(6)?,
        created_at: from_millis(row.get(7)?),
    })
}

fn load_questions(conn: &Connection, form_id: i64) -> Result<Vec<Question>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {QUESTION_COLUMNS} FROM form_questions WHERE form_id = ?1 ORDER BY sort_order, id"
    ))?;
    let questions = stmt
        .query_map(params![form_id], question_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(questions)
}

fn with_questions(conn: &Connection, forms: Vec<Form>) -> Result<Vec<FormWithQuestions>, StoreError> {
    forms
        .into_iter()
        .map(|form| {
            let questions = load_questions(conn, form.id)?;
            Ok(FormWithQuestions { form, questions })
        })
        .collect()
}

fn load_form(conn: &Connection, form_id: i64) -> Result<Option<FormWithQuestions>, StoreError> {
    let form = conn
        .query_row(
            &format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = ?1"),
            params![form_id],
            form_from_row,
        )
        .optional()?;
    match form {
        Some(form) => Ok(with_questions(conn, vec![form])?.pop()),
        None => Ok(None),
    }
}

fn insert_questions(
    conn: &Connection,
    form_id: i64,
    questions: &[NormalizedQuestion],
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO form_questions (form_id, label, type, required, options, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for question in questions {
        let options =
            serde_json::to_string(&question.options).unwrap_or_else(|_| "[]".to_string());
        stmt.execute(params![
            form_id,
            question.label,
            question.question_type,
            question.required,
            options,
            question.sort_order,
            to_millis(now),
        ])?;
    }
    Ok(())
}

fn decode_record(
    id: i64,
    participant_id: i64,
    payload: &[u8],
    created_at: i64,
) -> Result<BodyMapRecord, StoreError> {
    let payload = decode_drawing_payload(payload)
        .map_err(|err| StoreError::Corrupt(format!("body map version {id}: {err}")))?;
    Ok(BodyMapRecord {
        id,
        participant_id,
        payload,
        created_at: from_millis(created_at),
    })
}

fn cell_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_form(
        &self,
        form: NewForm,
        now: DateTime<Utc>,
    ) -> Result<FormWithQuestions, StoreError> {
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO forms (title, description, release_at, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    form.title,
                    form.description,
                    to_millis(form.release_at),
                    form.is_active,
                    to_millis(now),
                ],
            )?;
            let form_id = tx.last_insert_rowid();
            insert_questions(&tx, form_id, &form.questions, now)?;
            let created = load_form(&tx, form_id)?.ok_or(StoreError::NotFound("Form"))?;
            tx.commit()?;
            debug!(form_id, questions = created.questions.len(), "form created");
            Ok(created)
        })
        .await
    }

    async fn replace_form(
        &self,
        form_id: i64,
        form: NewForm,
        now: DateTime<Utc>,
    ) -> Result<FormWithQuestions, StoreError> {
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE forms
                 SET title = ?1, description = ?2, release_at = ?3, is_active = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    form.title,
                    form.description,
                    to_millis(form.release_at),
                    form.is_active,
                    to_millis(now),
                    form_id,
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound("Form"));
            }
            // Cascades to every answer that referenced the old questions.
            tx.execute("DELETE FROM form_questions WHERE form_id = ?1", params![form_id])?;
            insert_questions(&tx, form_id, &form.questions, now)?;
            let replaced = load_form(&tx, form_id)?.ok_or(StoreError::NotFound("Form"))?;
            tx.commit()?;
            debug!(form_id, questions = replaced.questions.len(), "form replaced");
            Ok(replaced)
        })
        .await
    }

    async fn list_forms(&self) -> Result<Vec<FormWithQuestions>, StoreError> {
        self.run(|conn| {
            let forms = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {FORM_COLUMNS} FROM forms ORDER BY release_at DESC, id DESC"
                ))?;
                let rows = stmt.query_map([], form_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            with_questions(conn, forms)
        })
        .await
    }

    async fn get_form(&self, form_id: i64) -> Result<FormWithQuestions, StoreError> {
        self.run(move |conn| load_form(conn, form_id)?.ok_or(StoreError::NotFound("Form")))
            .await
    }

    async fn list_available_forms(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<FormWithQuestions>, StoreError> {
        self.run(move |conn| {
            let forms = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {FORM_COLUMNS} FROM forms
                     WHERE is_active = 1 AND release_at <= ?1
                     ORDER BY release_at DESC, id DESC"
                ))?;
                let rows = stmt.query_map(params![to_millis(now)], form_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            with_questions(conn, forms)
        })
        .await
    }

    async fn get_response(
        &self,
        form_id: i64,
        participant_id: i64,
    ) -> Result<Option<StoredResponse>, StoreError> {
        self.run(move |conn| {
            let response_id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM form_responses WHERE form_id = ?1 AND participant_id = ?2",
                    params![form_id, participant_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(response_id) = response_id else {
                return Ok(None);
            };
            let mut stmt = conn.prepare(
                "SELECT question_id, answer_text, answer_json FROM form_answers WHERE response_id = ?1",
            )?;
            let rows = stmt
                .query_map(params![response_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            let mut answers = std::collections::BTreeMap::new();
            for (question_id, text, json) in rows {
                let value = match (json, text) {
                    (Some(json), _) => serde_json::from_str(&json).map_err(|err| {
                        StoreError::Corrupt(format!("answer for question {question_id}: {err}"))
                    })?,
                    (None, Some(text)) => Value::String(text),
                    (None, None) => Value::Null,
                };
                answers.insert(question_id, value);
            }
            Ok(Some(StoredResponse {
                id: response_id,
                answers,
            }))
        })
        .await
    }

    async fn submit_response(
        &self,
        form_id: i64,
        participant: ParticipantRef,
        answers: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let available: Option<i64> = tx
                .query_row(
                    "SELECT id FROM forms WHERE id = ?1 AND is_active = 1 AND release_at <= ?2",
                    params![form_id, to_millis(now)],
                    |row| row.get(0),
                )
                .optional()?;
            if available.is_none() {
                return Err(StoreError::FormNotAvailable);
            }
            let questions = load_questions(&tx, form_id)?;
            let prepared = validate_answers(&questions, &answers)?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM form_responses WHERE form_id = ?1 AND participant_id = ?2",
                    params![form_id, participant.id],
                    |row| row.get(0),
                )
                .optional()?;
            let response_id = match existing {
                Some(response_id) => {
                    tx.execute(
                        "UPDATE form_responses SET updated_at = ?2, participant_code = ?3 WHERE id = ?1",
                        params![response_id, to_millis(now), participant.code],
                    )?;
                    tx.execute(
                        "DELETE FROM form_answers WHERE response_id = ?1",
                        params![response_id],
                    )?;
                    response_id
                }
                None => {
                    tx.execute(
                        "INSERT INTO form_responses (form_id, participant_id, participant_code, submitted_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?4)",
                        params![form_id, participant.id, participant.code, to_millis(now)],
                    )?;
                    tx.last_insert_rowid()
                }
            };

            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO form_answers
                     (response_id, question_id, participant_id, participant_code, answer_text, answer_json, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for question in &questions {
                    let answer = prepared.get(&question.id).cloned().unwrap_or_default();
                    let json = answer.json.as_ref().map(Value::to_string);
                    stmt.execute(params![
                        response_id,
                        question.id,
                        participant.id,
                        participant.code,
                        answer.text,
                        json,
                        to_millis(now),
                    ])?;
                }
            }
            tx.commit()?;
            debug!(form_id, response_id, participant_id = participant.id, "response stored");
            Ok(response_id)
        })
        .await
    }

    async fn create_participant(
        &self,
        participant: NewParticipant,
        now: DateTime<Utc>,
    ) -> Result<Participant, StoreError> {
        self.run(move |conn| {
            for _ in 0..MAX_CODE_ATTEMPTS {
                let code = generate_participant_code();
                let inserted = conn.execute(
                    "INSERT INTO participants (code, email, age, sex, gender, gender_other, password_hash, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        code,
                        participant.email,
                        participant.age,
                        participant.sex,
                        participant.gender,
                        participant.gender_other,
                        participant.password_hash,
                        to_millis(now),
                    ],
                );
                match inserted {
                    Ok(_) => {
                        return Ok(Participant {
                            id: conn.last_insert_rowid(),
                            code,
                            email: participant.email,
                            age: participant.age,
                            sex: participant.sex,
                            gender: participant.gender,
                            gender_other: participant.gender_other,
                            created_at: from_millis(to_millis(now)),
                        });
                    }
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        debug!(code = %code, "participant code collision, retrying");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Err(StoreError::CodeExhausted)
        })
        .await
    }

    async fn find_participant_by_code(
        &self,
        code: &str,
    ) -> Result<Option<ParticipantCredentials>, StoreError> {
        let code = code.to_string();
        self.run(move |conn| {
            let found = conn
                .query_row(
                    "SELECT id, code, password_hash FROM participants WHERE code = ?1",
                    params![code],
                    |row| {
                        Ok(ParticipantCredentials {
                            id: row.get(0)?,
                            code: row.get(1)?,
                            password_hash: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(found)
        })
        .await
    }

    async fn list_participants(&self) -> Result<Vec<Participant>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PARTICIPANT_COLUMNS} FROM participants ORDER BY created_at DESC, id DESC"
            ))?;
            let participants = stmt
                .query_map([], participant_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(participants)
        })
        .await
    }

    async fn save_body_map(
        &self,
        participant_id: i64,
        payload: DrawingPayload,
        now: DateTime<Utc>,
    ) -> Result<BodyMapSummary, StoreError> {
        self.run(move |conn| {
            let bytes = encode_drawing_payload(&payload)
                .map_err(|err| StoreError::Corrupt(err.to_string()))?;
            conn.execute(
                "INSERT INTO body_map_versions (participant_id, payload, created_at) VALUES (?1, ?2, ?3)",
                params![participant_id, bytes, to_millis(now)],
            )?;
            Ok(BodyMapSummary {
                id: conn.last_insert_rowid(),
                created_at: from_millis(to_millis(now)),
            })
        })
        .await
    }

    async fn latest_body_map(
        &self,
        participant_id: i64,
    ) -> Result<Option<BodyMapRecord>, StoreError> {
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, payload, created_at FROM body_map_versions
                     WHERE participant_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    params![participant_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, Vec<u8>>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;
            row.map(|(id, payload, created_at)| {
                decode_record(id, participant_id, &payload, created_at)
            })
            .transpose()
        })
        .await
    }

    async fn body_map_version(
        &self,
        participant_id: i64,
        version_id: i64,
    ) -> Result<Option<BodyMapRecord>, StoreError> {
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT payload, created_at FROM body_map_versions
                     WHERE id = ?1 AND participant_id = ?2",
                    params![version_id, participant_id],
                    |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            row.map(|(payload, created_at)| {
                decode_record(version_id, participant_id, &payload, created_at)
            })
            .transpose()
        })
        .await
    }

    async fn list_body_map_versions(
        &self,
        participant_id: i64,
    ) -> Result<Vec<BodyMapSummary>, StoreError> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, created_at FROM body_map_versions
                 WHERE participant_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let versions = stmt
                .query_map(params![participant_id], |row| {
                    Ok(BodyMapSummary {
                        id: row.get(0)?,
                        created_at: from_millis(row.get(1)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(versions)
        })
        .await
    }

    async fn latest_body_maps(&self) -> Result<Vec<LatestBodyMap>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT v.id, v.participant_id, p.code, v.payload, v.created_at
                 FROM body_map_versions v
                 JOIN participants p ON p.id = v.participant_id
                 WHERE v.id = (
                     SELECT latest.id FROM body_map_versions latest
                     WHERE latest.participant_id = v.participant_id
                     ORDER BY latest.created_at DESC, latest.id DESC
                     LIMIT 1
                 )
                 ORDER BY p.code",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(id, participant_id, participant_code, payload, created_at)| {
                    Ok(LatestBodyMap {
                        participant_code,
                        record: decode_record(id, participant_id, &payload, created_at)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )?;
            let tables = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tables)
        })
        .await
    }

    async fn table_rows(&self, table: &str) -> Result<TableRows, StoreError> {
        if !is_valid_table_name(table) {
            return Err(StoreError::NotFound("Table"));
        }
        let table = table.to_string();
        self.run(move |conn| {
            let exists: Option<String> = conn
                .query_row(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name = ?1",
                    params![table],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::NotFound("Table"));
            }
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM \"{table}\" ORDER BY 1 DESC LIMIT {TABLE_ROW_LIMIT}"
            ))?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Map::new();
                for (index, column) in columns.iter().enumerate() {
                    let value = if REDACTED_COLUMNS.contains(&column.as_str()) {
                        Value::String("<redacted>".into())
                    } else {
                        cell_to_json(row.get_ref(index)?)
                    };
                    record.insert(column.clone(), value);
                }
                records.push(record);
            }
            Ok(TableRows {
                columns,
                rows: records,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use studyboard_shared::{Point, StageSize, Stroke};

    use super::*;
    use crate::forms::FormInput;

    fn storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn count(storage: &SqliteStorage, sql: &str) -> i64 {
        let guard = storage.connection.lock().unwrap();
        guard.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    fn new_form(value: Value) -> NewForm {
        serde_json::from_value::<FormInput>(value)
            .unwrap()
            .into_new_form(Utc::now() - ChronoDuration::minutes(1))
            .unwrap()
    }

    async fn participant(storage: &SqliteStorage, email: &str) -> ParticipantRef {
        let created = storage
            .create_participant(
                NewParticipant {
                    email: email.into(),
                    age: None,
                    sex: None,
                    gender: None,
                    gender_other: None,
                    password_hash: "hash".into(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        ParticipantRef {
            id: created.id,
            code: created.code,
        }
    }

    fn answers(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn required_select_one_scenario() {
        let storage = storage();
        let form = storage
            .create_form(
                new_form(json!({"title": "Consent", "questions": [
                    {"label": "Agree?", "type": "select_one", "required": true, "options": ["Yes", "No"]}
                ]})),
                Utc::now(),
            )
            .await
            .unwrap();
        let qid = form.questions[0].id;
        let alice = participant(&storage, "a@example.org").await;

        let err = storage
            .submit_response(form.form.id, alice.clone(), Map::new(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Question \"Agree?\" is required");
        assert_eq!(count(&storage, "SELECT COUNT(*) FROM form_answers"), 0);
        assert_eq!(count(&storage, "SELECT COUNT(*) FROM form_responses"), 0);

        let first = storage
            .submit_response(form.form.id, alice.clone(), answers(json!({qid.to_string(): "Yes"})), Utc::now())
            .await
            .unwrap();
        let second = storage
            .submit_response(form.form.id, alice.clone(), answers(json!({qid.to_string(): "No"})), Utc::now())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(count(&storage, "SELECT COUNT(*) FROM form_responses"), 1);
        assert_eq!(count(&storage, "SELECT COUNT(*) FROM form_answers"), 1);

        let stored = storage
            .get_response(form.form.id, alice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, first);
        assert_eq!(stored.answers[&qid], json!("No"));
    }

    #[tokio::test]
    async fn every_question_gets_one_answer_row_per_submission() {
        let storage = storage();
        let form = storage
            .create_form(
                new_form(json!({"title": "Daily", "questions": [
                    {"label": "Pain", "type": "short_text"},
                    {"label": "Where", "type": "select_multiple", "options": ["Head", "Back"]},
                    {"label": "Notes", "type": "long_text"}
                ]})),
                Utc::now(),
            )
            .await
            .unwrap();
        let where_id = form.questions[1].id;
        let bob = participant(&storage, "b@example.org").await;
        let input = answers(json!({where_id.to_string(): ["Back"]}));
        for _ in 0..3 {
            storage
                .submit_response(form.form.id, bob.clone(), input.clone(), Utc::now())
                .await
                .unwrap();
        }
        assert_eq!(count(&storage, "SELECT COUNT(*) FROM form_responses"), 1);
        assert_eq!(count(&storage, "SELECT COUNT(*) FROM form_answers"), 3);
        assert_eq!(
            count(
                &storage,
                "SELECT COUNT(*) FROM form_answers WHERE answer_text IS NOT NULL AND answer_json IS NOT NULL"
            ),
            0
        );

        let stored = storage.get_response(form.form.id, bob.id).await.unwrap().unwrap();
        assert_eq!(stored.answers[&where_id], json!(["Back"]));
        assert_eq!(stored.answers[&form.questions[0].id], Value::Null);
    }

    #[tokio::test]
    async fn select_multiple_scalar_is_rejected_before_writes() {
        let storage = storage();
        let form = storage
            .create_form(
                new_form(json!({"title": "T", "questions": [
                    {"label": "Pick", "type": "select_multiple", "options": ["a"]}
                ]})),
                Utc::now(),
            )
            .await
            .unwrap();
        let qid = form.questions[0].id;
        let carol = participant(&storage, "c@example.org").await;
        let err = storage
            .submit_response(form.form.id, carol, answers(json!({qid.to_string(): "a"})), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Form(crate::forms::FormError::ExpectedArray { question_id, .. }) if question_id == qid
        ));
        assert_eq!(count(&storage, "SELECT COUNT(*) FROM form_responses"), 0);
    }

    #[tokio::test]
    async fn inactive_or_unreleased_forms_are_not_available() {
        let storage = storage();
        let now = Utc::now();
        let mut future = new_form(json!({"title": "Later"}));
        future.release_at = now + ChronoDuration::days(1);
        let future = storage.create_form(future, now).await.unwrap();
        let inactive = storage
            .create_form(new_form(json!({"title": "Off", "isActive": false})), now)
            .await
            .unwrap();
        let open = storage
            .create_form(new_form(json!({"title": "Open"})), now)
            .await
            .unwrap();

        let available = storage.list_available_forms(now).await.unwrap();
        assert_eq!(
            available.iter().map(|f| f.form.id).collect::<Vec<_>>(),
            vec![open.form.id]
        );

        let dave = participant(&storage, "d@example.org").await;
        for form_id in [future.form.id, inactive.form.id, 999] {
            let err = storage
                .submit_response(form_id, dave.clone(), Map::new(), now)
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::FormNotAvailable));
        }
    }

    #[tokio::test]
    async fn replacing_questions_drops_old_answers() {
        let storage = storage();
        let form = storage
            .create_form(
                new_form(json!({"title": "v1", "questions": [{"label": "A", "type": "short_text"}]})),
                Utc::now(),
            )
            .await
            .unwrap();
        let erin = participant(&storage, "e@example.org").await;
        let old_qid = form.questions[0].id;
        storage
            .submit_response(form.form.id, erin.clone(), answers(json!({old_qid.to_string(): "x"})), Utc::now())
            .await
            .unwrap();

        let replaced = storage
            .replace_form(
                form.form.id,
                new_form(json!({"title": "v2", "questions": [
                    {"label": "A", "type": "short_text"},
                    {"label": "B", "type": "dropdown", "options": ["1"]}
                ]})),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(replaced.form.title, "v2");
        assert!(replaced.questions.iter().all(|q| q.id != old_qid));
        assert_eq!(count(&storage, "SELECT COUNT(*) FROM form_answers"), 0);
        assert_eq!(count(&storage, "SELECT COUNT(*) FROM form_responses"), 1);

        let err = storage
            .replace_form(4242, new_form(json!({"title": "x"})), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Form")));
    }

    #[tokio::test]
    async fn concurrent_participants_get_independent_responses() {
        let storage = Arc::new(storage());
        let form = storage
            .create_form(
                new_form(json!({"title": "T", "questions": [{"label": "Q", "type": "short_text"}]})),
                Utc::now(),
            )
            .await
            .unwrap();
        let qid = form.questions[0].id.to_string();
        let a = participant(&storage, "a@example.org").await;
        let b = participant(&storage, "b@example.org").await;

        let (ra, rb) = tokio::join!(
            storage.submit_response(form.form.id, a.clone(), answers(json!({qid.clone(): "from a"})), Utc::now()),
            storage.submit_response(form.form.id, b.clone(), answers(json!({qid.clone(): "from b"})), Utc::now()),
        );
        assert_ne!(ra.unwrap(), rb.unwrap());
        let qid: i64 = qid.parse().unwrap();
        let stored_a = storage.get_response(form.form.id, a.id).await.unwrap().unwrap();
        let stored_b = storage.get_response(form.form.id, b.id).await.unwrap().unwrap();
        assert_eq!(stored_a.answers[&qid], json!("from a"));
        assert_eq!(stored_b.answers[&qid], json!("from b"));
    }

    #[tokio::test]
    async fn body_map_history_is_append_only() {
        let storage = storage();
        let frank = participant(&storage, "f@example.org").await;
        let now = Utc::now();
        assert!(storage.latest_body_map(frank.id).await.unwrap().is_none());

        let payload = |x: f32| DrawingPayload {
            shapes: vec![Stroke::Draw {
                color: "#000".into(),
                width: 3.0,
                points: vec![Point { x, y: 1.0 }],
            }],
            stage: Some(StageSize::new(300.0, 600.0)),
        };
        let first = storage.save_body_map(frank.id, payload(1.0), now).await.unwrap();
        let second = storage
            .save_body_map(frank.id, payload(2.0), now + ChronoDuration::seconds(5))
            .await
            .unwrap();

        let latest = storage.latest_body_map(frank.id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.payload, payload(2.0));
        let older = storage.body_map_version(frank.id, first.id).await.unwrap().unwrap();
        assert_eq!(older.payload, payload(1.0));
        let history = storage.list_body_map_versions(frank.id).await.unwrap();
        assert_eq!(history.iter().map(|v| v.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let grace = participant(&storage, "g@example.org").await;
        assert!(storage.body_map_version(grace.id, first.id).await.unwrap().is_none());
        storage.save_body_map(grace.id, payload(3.0), now).await.unwrap();
        let all = storage.latest_body_maps().await.unwrap();
        assert_eq!(all.len(), 2);
        let franks = all.iter().find(|m| m.record.participant_id == frank.id).unwrap();
        assert_eq!(franks.record.id, second.id);
        assert_eq!(franks.participant_code, frank.code);
    }

    #[tokio::test]
    async fn table_browser_lists_and_redacts() {
        let storage = storage();
        participant(&storage, "h@example.org").await;
        let tables = storage.list_tables().await.unwrap();
        assert!(tables.contains(&"participants".to_string()));
        assert!(tables.contains(&"form_answers".to_string()));

        let rows = storage.table_rows("participants").await.unwrap();
        assert!(rows.columns.contains(&"email".to_string()));
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.rows[0]["password_hash"], json!("<redacted>"));
        assert_eq!(rows.rows[0]["email"], json!("h@example.org"));

        assert!(matches!(
            storage.table_rows("nope").await,
            Err(StoreError::NotFound("Table"))
        ));
        assert!(matches!(
            storage.table_rows("x; DROP TABLE forms").await,
            Err(StoreError::NotFound("Table"))
        ));
    }

    #[test]
    fn reopening_a_database_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("study.db");
        SqliteStorage::open(&path).unwrap();
        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(count(&reopened, "SELECT version FROM store_meta"), SCHEMA_VERSION);
    }
}
