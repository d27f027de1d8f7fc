use crate::{Brush, DrawingPayload, Point, StageSize, Stroke};

/// Live drawing layer: sealed strokes plus at most one stroke being drawn.
///
/// Pointer-down maps to [`begin`](Self::begin), pointer-move to
/// [`extend`](Self::extend) and pointer-up to [`end`](Self::end).
#[derive(Clone, Debug, Default)]
pub struct StrokeRecorder {
    sealed: Vec<Stroke>,
    open: Option<Stroke>,
}

impl StrokeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, brush: &Brush, point: Point) -> bool {
        let Some(point) = point.normalize() else {
            return false;
        };
        self.end();
        self.open = Some(brush.start(point));
        true
    }

    pub fn extend(&mut self, point: Point) -> bool {
        let (Some(stroke), Some(point)) = (self.open.as_mut(), point.normalize()) else {
            return false;
        };
        stroke.points_mut().push(point);
        true
    }

    pub fn end(&mut self) -> Option<&Stroke> {
        let stroke = self.open.take()?;
        self.sealed.push(stroke);
        self.sealed.last()
    }

    pub fn is_drawing(&self) -> bool {
        self.open.is_some()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.sealed
    }

    pub fn open_stroke(&self) -> Option<&Stroke> {
        self.open.as_ref()
    }

    /// Replaces the live layer, e.g. with a rehydrated saved drawing.
    pub fn load(&mut self, strokes: Vec<Stroke>) {
        self.open = None;
        self.sealed = strokes;
    }

    pub fn clear(&mut self) {
        self.open = None;
        self.sealed.clear();
    }

    /// Sealed strokes paired with the stage they were drawn on. An open
    /// stroke is not part of the snapshot.
    pub fn snapshot(&self, stage: StageSize) -> DrawingPayload {
        DrawingPayload {
            shapes: self.sealed.clone(),
            stage: Some(stage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tool;

    fn p(x: f32, y: f32) -> Point {
        Point { x, y }
    }

    #[test]
    fn stroke_accumulates_until_sealed() {
        let mut recorder = StrokeRecorder::new();
        assert!(recorder.begin(&Brush::default(), p(1.0, 1.0)));
        assert!(recorder.extend(p(2.0, 2.0)));
        assert!(recorder.extend(p(3.0, 3.0)));
        let sealed = recorder.end().cloned().unwrap();
        assert_eq!(sealed.points().len(), 3);

        assert!(!recorder.extend(p(4.0, 4.0)));
        assert_eq!(recorder.strokes()[0].points().len(), 3);
        assert!(recorder.end().is_none());
    }

    #[test]
    fn begin_seals_a_dangling_stroke() {
        let mut recorder = StrokeRecorder::new();
        recorder.begin(&Brush::default(), p(0.0, 0.0));
        let eraser = Brush {
            tool: Tool::Erase,
            ..Brush::default()
        };
        recorder.begin(&eraser, p(5.0, 5.0));
        assert_eq!(recorder.strokes().len(), 1);
        assert_eq!(recorder.open_stroke().map(Stroke::tool), Some(Tool::Erase));
    }

    #[test]
    fn snapshot_excludes_open_stroke_and_carries_stage() {
        let mut recorder = StrokeRecorder::new();
        recorder.begin(&Brush::default(), p(0.0, 0.0));
        recorder.end();
        recorder.begin(&Brush::default(), p(9.0, 9.0));

        let stage = StageSize::new(300.0, 500.0);
        let payload = recorder.snapshot(stage);
        assert_eq!(payload.shapes.len(), 1);
        assert_eq!(payload.stage, Some(stage));
    }

    #[test]
    fn non_finite_points_are_skipped() {
        let mut recorder = StrokeRecorder::new();
        assert!(!recorder.begin(&Brush::default(), p(f32::NAN, 0.0)));
        assert!(!recorder.is_drawing());
        recorder.begin(&Brush::default(), p(0.0, 0.0));
        assert!(!recorder.extend(p(0.0, f32::INFINITY)));
        assert_eq!(recorder.open_stroke().unwrap().points().len(), 1);
    }
}
