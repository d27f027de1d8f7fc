//! JSON bodies shared by server and browser client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::DrawingPayload;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BodyMapVersion {
    pub id: i64,
    pub created_at: String,
    pub payload: DrawingPayload,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BodyMapVersionSummary {
    pub id: i64,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantBodyMap {
    pub participant_id: i64,
    pub participant_code: String,
    pub version: BodyMapVersion,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LatestBodyMapResponse {
    pub version: Option<BodyMapVersion>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BodyMapHistoryResponse {
    pub versions: Vec<BodyMapVersionSummary>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BodyMapOverlayResponse {
    pub layers: Vec<ParticipantBodyMap>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveBodyMapResponse {
    pub ok: bool,
    pub id: i64,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum SessionView {
    Admin { username: String },
    Participant { id: i64, code: String },
}

#[derive(Deserialize, Clone, Debug)]
pub struct MeResponse {
    pub user: Option<SessionView>,
}

#[derive(Serialize, Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LoginReply {
    pub role: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl LoginReply {
    pub fn landing_page(&self) -> &'static str {
        if self.role == "admin" {
            "/admin.html"
        } else {
            "/participant.html"
        }
    }
}

/// Registration form fields. Blank optional fields are left out.
#[derive(Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender_other: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReply {
    pub code: String,
    pub email: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TableList {
    pub tables: Vec<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct TablePage {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl TablePage {
    /// Display text of one cell; nulls and missing cells are blank.
    pub fn cell(&self, row: usize, column: &str) -> String {
        match self.rows.get(row).and_then(|fields| fields.get(column)) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn session_view_reads_both_roles() {
        let me: MeResponse =
            serde_json::from_value(json!({"user": {"role": "participant", "id": 3, "code": "P-123456"}}))
                .unwrap();
        assert_eq!(
            me.user,
            Some(SessionView::Participant {
                id: 3,
                code: "P-123456".into()
            })
        );
        let me: MeResponse = serde_json::from_value(json!({"user": null})).unwrap();
        assert!(me.user.is_none());
    }

    #[test]
    fn login_lands_on_role_page() {
        let admin: LoginReply = serde_json::from_value(json!({"ok": true, "role": "admin"})).unwrap();
        assert_eq!(admin.landing_page(), "/admin.html");
        let participant: LoginReply =
            serde_json::from_value(json!({"ok": true, "role": "participant", "code": "P-1"})).unwrap();
        assert_eq!(participant.landing_page(), "/participant.html");
    }

    #[test]
    fn registration_omits_blank_demographics() {
        let body = Registration {
            email: "a@example.org".into(),
            password: "pw".into(),
            gender: Some("other".into()),
            gender_other: Some("agender".into()),
            ..Registration::default()
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"email": "a@example.org", "password": "pw",
                   "gender": "other", "genderOther": "agender"})
        );
    }

    #[test]
    fn table_cells_render_as_text() {
        let page: TablePage = serde_json::from_value(json!({
            "columns": ["id", "email", "age", "meta"],
            "rows": [{"id": 1, "email": "a@example.org", "age": null, "meta": {"k": true}}]
        }))
        .unwrap();
        assert_eq!(page.cell(0, "id"), "1");
        assert_eq!(page.cell(0, "email"), "a@example.org");
        assert_eq!(page.cell(0, "age"), "");
        assert_eq!(page.cell(0, "meta"), r#"{"k":true}"#);
        assert_eq!(page.cell(5, "id"), "");
    }
}
