use crate::{DrawingPayload, Point, StageSize, Stroke};

/// Uniform scale followed by a translation, mapping one stage onto another.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl FitTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Largest uniform scale at which `content` still fits inside `target`,
    /// with the scaled content box centred in the target.
    pub fn centered(content: StageSize, target: StageSize) -> Self {
        if !content.is_valid() || !target.is_valid() {
            return Self::IDENTITY;
        }
        if content == target {
            return Self::IDENTITY;
        }
        let scale = (target.width / content.width).min(target.height / content.height);
        Self {
            scale,
            offset_x: (target.width - content.width * scale) / 2.0,
            offset_y: (target.height - content.height * scale) / 2.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn apply(&self, point: Point) -> Point {
        Point {
            x: (point.x as f64 * self.scale + self.offset_x) as f32,
            y: (point.y as f64 * self.scale + self.offset_y) as f32,
        }
    }

    /// Maps a point on the target back onto the content box.
    pub fn invert(&self, point: Point) -> Point {
        Point {
            x: ((point.x as f64 - self.offset_x) / self.scale) as f32,
            y: ((point.y as f64 - self.offset_y) / self.scale) as f32,
        }
    }

    pub fn apply_stroke(&self, stroke: &Stroke) -> Stroke {
        if self.is_identity() {
            return stroke.clone();
        }
        let mut scaled = stroke.clone();
        scaled.set_width((stroke.width() as f64 * self.scale) as f32);
        for point in scaled.points_mut().iter_mut() {
            *point = self.apply(*point);
        }
        scaled
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Destination rectangle for the background image. Uses the same rule as
/// [`rehydrate`] so the image and drawings line up at every canvas size.
pub fn fit_image(image: StageSize, canvas: StageSize) -> Rect {
    let transform = FitTransform::centered(image, canvas);
    Rect {
        x: transform.offset_x,
        y: transform.offset_y,
        width: image.width * transform.scale,
        height: image.height * transform.scale,
    }
}

/// Rebuilds a saved shape tree for a canvas of size `target`.
///
/// Payloads without authoring dimensions are returned at 1:1.
pub fn rehydrate(payload: &DrawingPayload, target: StageSize) -> Vec<Stroke> {
    let transform = match payload.stage {
        Some(stage) => FitTransform::centered(stage, target),
        None => FitTransform::IDENTITY,
    };
    payload
        .shapes
        .iter()
        .map(|stroke| transform.apply_stroke(stroke))
        .collect()
}

/// The editor's live canvas against the stage its strokes are kept in.
///
/// Strokes never leave authored coordinates: pointer input is mapped in
/// with [`to_authored`](Self::to_authored) and every redraw maps them out
/// again, so a run of resizes cannot accumulate error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageView {
    authored: StageSize,
    current: StageSize,
}

impl StageView {
    pub fn new(stage: StageSize) -> Self {
        Self {
            authored: stage,
            current: stage,
        }
    }

    /// View onto a saved drawing. Payloads without a stage are taken to be
    /// authored on the current canvas.
    pub fn for_payload(payload: &DrawingPayload, current: StageSize) -> Self {
        Self {
            authored: payload.stage.filter(StageSize::is_valid).unwrap_or(current),
            current,
        }
    }

    pub fn authored(&self) -> StageSize {
        self.authored
    }

    pub fn current(&self) -> StageSize {
        self.current
    }

    pub fn resize(&mut self, current: StageSize) {
        self.current = current;
    }

    pub fn transform(&self) -> FitTransform {
        FitTransform::centered(self.authored, self.current)
    }

    pub fn to_authored(&self, point: Point) -> Point {
        self.transform().invert(point)
    }

    /// Brush width on screen expressed in authored units.
    pub fn to_authored_width(&self, width: f32) -> f32 {
        (width as f64 / self.transform().scale) as f32
    }

    pub fn display(&self, stroke: &Stroke) -> Stroke {
        self.transform().apply_stroke(stroke)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn line(points: &[(f32, f32)]) -> Stroke {
        Stroke::Draw {
            color: "#000".into(),
            width: 4.0,
            points: points.iter().map(|&(x, y)| Point { x, y }).collect(),
        }
    }

    #[test]
    fn same_size_is_identity() {
        let stage = StageSize::new(400.0, 600.0);
        let payload = DrawingPayload {
            shapes: vec![line(&[(10.0, 20.0), (30.5, 40.25)])],
            stage: Some(stage),
        };
        assert_eq!(rehydrate(&payload, stage), payload.shapes);
    }

    #[test]
    fn wider_target_is_letterboxed_horizontally() {
        let transform =
            FitTransform::centered(StageSize::new(400.0, 600.0), StageSize::new(800.0, 600.0));
        assert_eq!(transform.scale, 1.0);
        assert_eq!(transform.offset_x, 200.0);
        assert_eq!(transform.offset_y, 0.0);
    }

    #[test]
    fn smaller_target_scales_points_and_width() {
        let payload = DrawingPayload {
            shapes: vec![line(&[(0.0, 0.0), (400.0, 600.0)])],
            stage: Some(StageSize::new(400.0, 600.0)),
        };
        let strokes = rehydrate(&payload, StageSize::new(200.0, 400.0));
        // scale = min(0.5, 0.666..) = 0.5, scaled box is 200x300 centred in 200x400
        assert_eq!(strokes[0].points()[0], Point { x: 0.0, y: 50.0 });
        assert_eq!(strokes[0].points()[1], Point { x: 200.0, y: 350.0 });
        assert_eq!(strokes[0].width(), 2.0);
    }

    #[test]
    fn legacy_payload_renders_one_to_one() {
        let payload = DrawingPayload {
            shapes: vec![line(&[(5.0, 5.0)])],
            stage: None,
        };
        assert_eq!(rehydrate(&payload, StageSize::new(50.0, 50.0)), payload.shapes);
    }

    #[test]
    fn background_uses_centered_fit() {
        let rect = fit_image(StageSize::new(1000.0, 2000.0), StageSize::new(500.0, 500.0));
        assert_eq!(
            rect,
            Rect {
                x: 125.0,
                y: 0.0,
                width: 250.0,
                height: 500.0,
            }
        );
    }

    #[test]
    fn invalid_sizes_fall_back_to_identity() {
        let transform =
            FitTransform::centered(StageSize::new(0.0, 10.0), StageSize::new(100.0, 100.0));
        assert!(transform.is_identity());
    }

    #[test]
    fn resizing_through_another_aspect_ratio_does_not_drift() {
        let tall = StageSize::new(400.0, 800.0);
        let stroke = line(&[(0.0, 0.0), (200.0, 400.0)]);
        let mut view = StageView::new(tall);

        view.resize(StageSize::new(400.0, 400.0));
        assert_eq!(view.display(&stroke).points()[0], Point { x: 100.0, y: 0.0 });

        view.resize(tall);
        assert_eq!(view.display(&stroke), stroke);
    }

    #[test]
    fn pointer_input_maps_back_to_authored_space() {
        let mut view = StageView::new(StageSize::new(400.0, 800.0));
        view.resize(StageSize::new(200.0, 200.0));
        // scale 0.25, authored box 100x200 centred at x = 50
        assert_eq!(
            view.to_authored(Point { x: 50.0, y: 0.0 }),
            Point { x: 0.0, y: 0.0 }
        );
        assert_eq!(
            view.to_authored(Point { x: 100.0, y: 100.0 }),
            Point { x: 200.0, y: 400.0 }
        );
        assert_eq!(view.to_authored_width(2.0), 8.0);
    }

    #[test]
    fn saved_stage_becomes_the_authored_box() {
        let current = StageSize::new(300.0, 600.0);
        let saved = DrawingPayload {
            shapes: Vec::new(),
            stage: Some(StageSize::new(600.0, 1200.0)),
        };
        assert_eq!(
            StageView::for_payload(&saved, current).authored(),
            StageSize::new(600.0, 1200.0)
        );
        let legacy = DrawingPayload::default();
        assert!(StageView::for_payload(&legacy, current)
            .transform()
            .is_identity());
    }

    proptest! {
        #[test]
        fn rescale_fits_and_centres(
            aw in 10.0f64..2000.0,
            ah in 10.0f64..2000.0,
            tw in 10.0f64..2000.0,
            th in 10.0f64..2000.0,
            px in 0.0f32..1.0,
            py in 0.0f32..1.0,
        ) {
            let authored = StageSize::new(aw, ah);
            let target = StageSize::new(tw, th);
            let transform = FitTransform::centered(authored, target);
            let expected_scale = (tw / aw).min(th / ah);
            prop_assert!((transform.scale - expected_scale).abs() < 1e-9);

            let scaled_w = aw * transform.scale;
            let scaled_h = ah * transform.scale;
            prop_assert!(scaled_w <= tw + 1e-6 && scaled_h <= th + 1e-6);
            prop_assert!((transform.offset_x * 2.0 + scaled_w - tw).abs() < 1e-6);
            prop_assert!((transform.offset_y * 2.0 + scaled_h - th).abs() < 1e-6);

            let point = Point { x: px * aw as f32, y: py * ah as f32 };
            let mapped = transform.apply(point);
            let expected_x = point.x as f64 * expected_scale + transform.offset_x;
            let expected_y = point.y as f64 * expected_scale + transform.offset_y;
            prop_assert!((mapped.x as f64 - expected_x).abs() < 1e-2);
            prop_assert!((mapped.y as f64 - expected_y).abs() < 1e-2);
        }
    }
}
