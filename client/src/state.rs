use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use studyboard_shared::{
    Brush, DrawingPayload, OverlayLayers, StageSize, StageView, StrokeRecorder,
};

pub const LOGIN_URL: &str = "/api/login";
pub const REGISTER_URL: &str = "/api/register";
pub const LOGOUT_URL: &str = "/api/logout";
pub const ME_URL: &str = "/api/me";
pub const AVAILABLE_FORMS_URL: &str = "/api/forms/available";
pub const ADMIN_FORMS_URL: &str = "/api/admin/forms";
pub const TABLES_URL: &str = "/api/admin/db/tables";
pub const SAVE_URL: &str = "/api/body-map";
pub const LATEST_URL: &str = "/api/body-map/latest";
pub const OVERLAY_URL: &str = "/api/admin/body-maps/latest";

pub fn form_response_url(form_id: i64) -> String {
    format!("/api/forms/{form_id}/response")
}

pub fn form_submit_url(form_id: i64) -> String {
    format!("/api/forms/{form_id}/responses")
}

pub fn admin_form_url(form_id: i64) -> String {
    format!("{ADMIN_FORMS_URL}/{form_id}")
}

pub fn table_url(name: &str) -> String {
    format!("/api/admin/db/table/{name}")
}

/// Background canvas under a drawing canvas of the same size.
pub struct Surface {
    pub canvas: HtmlCanvasElement,
    pub ctx: CanvasRenderingContext2d,
    pub background: HtmlCanvasElement,
    pub background_ctx: CanvasRenderingContext2d,
    pub image: Option<HtmlImageElement>,
    pub stage: StageSize,
}

pub struct EditorState {
    pub surface: Surface,
    /// Strokes in `recorder` are kept in `view.authored()` coordinates.
    pub view: StageView,
    pub recorder: StrokeRecorder,
    pub brush: Brush,
    pub dirty: bool,
}

pub struct OverlayState {
    pub surface: Surface,
    /// Saved drawings as fetched, kept to rebuild layers after a resize.
    pub sources: Vec<(i64, String, DrawingPayload)>,
    pub layers: OverlayLayers,
    /// Offscreen canvas each layer is composed on before it is stacked,
    /// so an eraser only clears its own participant's ink.
    pub scratch: HtmlCanvasElement,
    pub scratch_ctx: CanvasRenderingContext2d,
}
