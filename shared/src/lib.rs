use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

pub mod api;
pub mod fit;
pub mod forms;
pub mod overlay;
pub mod payload_format;
pub mod recorder;

pub use fit::{fit_image, rehydrate, FitTransform, Rect, StageView};
pub use overlay::{OverlayLayer, OverlayLayers};
pub use payload_format::{decode_drawing_payload, encode_drawing_payload, PayloadFormatError};
pub use recorder::StrokeRecorder;

pub const DEFAULT_COLOR: &str = "#d7263d";
pub const DEFAULT_WIDTH: f32 = 6.0;

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn normalize(self) -> Option<Self> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return None;
        }
        Some(self)
    }
}

/// Canvas dimensions a drawing was authored against, in logical pixels.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct StageSize {
    pub width: f64,
    pub height: f64,
}

impl StageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Draw,
    Erase,
}

/// One sealed or in-progress polyline on the drawing layer.
///
/// Erase strokes carry no colour: they always punch through whatever was
/// drawn beneath them on the same layer.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Stroke {
    Draw {
        color: String,
        width: f32,
        points: Vec<Point>,
    },
    Erase {
        width: f32,
        points: Vec<Point>,
    },
}

impl Stroke {
    pub fn tool(&self) -> Tool {
        match self {
            Stroke::Draw { .. } => Tool::Draw,
            Stroke::Erase { .. } => Tool::Erase,
        }
    }

    pub fn points(&self) -> &[Point] {
        match self {
            Stroke::Draw { points, .. } | Stroke::Erase { points, .. } => points,
        }
    }

    pub fn points_mut(&mut self) -> &mut Vec<Point> {
        match self {
            Stroke::Draw { points, .. } | Stroke::Erase { points, .. } => points,
        }
    }

    pub fn width(&self) -> f32 {
        match self {
            Stroke::Draw { width, .. } | Stroke::Erase { width, .. } => *width,
        }
    }

    pub fn set_width(&mut self, value: f32) {
        match self {
            Stroke::Draw { width, .. } | Stroke::Erase { width, .. } => *width = value,
        }
    }

    pub fn color(&self) -> Option<&str> {
        match self {
            Stroke::Draw { color, .. } => Some(color),
            Stroke::Erase { .. } => None,
        }
    }

    /// Canvas `globalCompositeOperation` used to render this stroke.
    pub fn composite_operation(&self) -> &'static str {
        match self {
            Stroke::Draw { .. } => "source-over",
            Stroke::Erase { .. } => "destination-out",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Brush {
    pub tool: Tool,
    pub color: String,
    pub width: f32,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            tool: Tool::Draw,
            color: DEFAULT_COLOR.to_string(),
            width: DEFAULT_WIDTH,
        }
    }
}

impl Brush {
    pub fn start(&self, point: Point) -> Stroke {
        match self.tool {
            Tool::Draw => Stroke::Draw {
                color: self.color.clone(),
                width: self.width,
                points: vec![point],
            },
            Tool::Erase => Stroke::Erase {
                width: self.width,
                points: vec![point],
            },
        }
    }
}

/// The unit of body-map persistence: a shape tree plus the stage it was
/// drawn on. Payloads saved before stage tracking carry no `stage`.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, Default, PartialEq)]
pub struct DrawingPayload {
    pub shapes: Vec<Stroke>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageSize>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "pong")]
    Pong { time: String },
}
