use studyboard_shared::{DrawingPayload, Point, StageSize, Stroke, DEFAULT_COLOR, DEFAULT_WIDTH};
use thiserror::Error;

pub const MAX_STROKES: usize = 2000;
pub const MAX_POINTS_PER_STROKE: usize = 5000;
const MAX_COLOR_LEN: usize = 32;
const MIN_WIDTH: f32 = 1.0;
const MAX_WIDTH: f32 = 60.0;

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("Drawing stage size is required")]
    MissingStage,
    #[error("Drawing stage size must be positive")]
    InvalidStage,
    #[error("Drawing has too many strokes ({0})")]
    TooManyStrokes(usize),
}

/// Cleans a client drawing before it becomes an immutable version.
pub fn sanitize_payload(payload: DrawingPayload) -> Result<DrawingPayload, PayloadError> {
    let stage = payload.stage.ok_or(PayloadError::MissingStage)?;
    if !stage.is_valid() {
        return Err(PayloadError::InvalidStage);
    }
    let shapes = sanitize_strokes(payload.shapes);
    if shapes.len() > MAX_STROKES {
        return Err(PayloadError::TooManyStrokes(shapes.len()));
    }
    Ok(DrawingPayload {
        shapes,
        stage: Some(stage),
    })
}

pub fn sanitize_strokes(strokes: Vec<Stroke>) -> Vec<Stroke> {
    strokes.into_iter().filter_map(sanitize_stroke).collect()
}

fn sanitize_color(mut color: String) -> String {
    if color.trim().is_empty() {
        return DEFAULT_COLOR.to_string();
    }
    if color.len() > MAX_COLOR_LEN {
        let mut end = MAX_COLOR_LEN;
        while !color.is_char_boundary(end) {
            end -= 1;
        }
        color.truncate(end);
    }
    color
}

fn sanitize_width(width: f32) -> f32 {
    let width = if width.is_finite() { width } else { DEFAULT_WIDTH };
    width.clamp(MIN_WIDTH, MAX_WIDTH)
}

fn sanitize_stroke(mut stroke: Stroke) -> Option<Stroke> {
    stroke.set_width(sanitize_width(stroke.width()));
    if let Stroke::Draw { color, .. } = &mut stroke {
        *color = sanitize_color(std::mem::take(color));
    }
    let points = stroke.points_mut();
    let cleaned: Vec<Point> = points
        .drain(..)
        .filter_map(Point::normalize)
        .take(MAX_POINTS_PER_STROKE)
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    *points = cleaned;
    Some(stroke)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f32, y: f32) -> Point {
        Point { x, y }
    }

    fn payload(shapes: Vec<Stroke>) -> DrawingPayload {
        DrawingPayload {
            shapes,
            stage: Some(StageSize::new(400.0, 800.0)),
        }
    }

    #[test]
    fn drops_bad_points_and_empty_strokes() {
        let cleaned = sanitize_payload(payload(vec![
            Stroke::Draw {
                color: String::new(),
                width: f32::NAN,
                points: vec![point(f32::NAN, 1.0), point(2.0, 3.0)],
            },
            Stroke::Erase {
                width: 500.0,
                points: vec![point(f32::INFINITY, 0.0)],
            },
        ]))
        .unwrap();
        assert_eq!(
            cleaned.shapes,
            vec![Stroke::Draw {
                color: DEFAULT_COLOR.to_string(),
                width: DEFAULT_WIDTH,
                points: vec![point(2.0, 3.0)],
            }]
        );
    }

    #[test]
    fn clamps_width_and_truncates_color() {
        let cleaned = sanitize_strokes(vec![
            Stroke::Draw {
                color: "x".repeat(100),
                width: 0.1,
                points: vec![point(0.0, 0.0)],
            },
            Stroke::Erase {
                width: 90.0,
                points: vec![point(1.0, 1.0)],
            },
        ]);
        assert_eq!(cleaned[0].color().map(str::len), Some(MAX_COLOR_LEN));
        assert_eq!(cleaned[0].width(), MIN_WIDTH);
        assert_eq!(cleaned[1].width(), MAX_WIDTH);
        assert_eq!(cleaned[1].composite_operation(), "destination-out");
    }

    #[test]
    fn caps_points_per_stroke() {
        let points = (0..MAX_POINTS_PER_STROKE + 10)
            .map(|i| point(i as f32, 0.0))
            .collect();
        let cleaned = sanitize_strokes(vec![Stroke::Erase { width: 4.0, points }]);
        assert_eq!(cleaned[0].points().len(), MAX_POINTS_PER_STROKE);
    }

    #[test]
    fn rejects_missing_or_degenerate_stage() {
        let mut missing = payload(Vec::new());
        missing.stage = None;
        assert_eq!(sanitize_payload(missing), Err(PayloadError::MissingStage));

        let mut flat = payload(Vec::new());
        flat.stage = Some(StageSize::new(0.0, 10.0));
        assert_eq!(sanitize_payload(flat), Err(PayloadError::InvalidStage));
    }

    #[test]
    fn rejects_too_many_strokes() {
        let strokes = (0..=MAX_STROKES)
            .map(|_| Stroke::Erase {
                width: 4.0,
                points: vec![point(1.0, 1.0)],
            })
            .collect();
        assert_eq!(
            sanitize_payload(payload(strokes)),
            Err(PayloadError::TooManyStrokes(MAX_STROKES + 1))
        );
    }
}
