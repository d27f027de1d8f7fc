use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use studyboard_shared::{fit_image, Point, StageSize, Stroke};

use crate::state::{EditorState, OverlayState, Surface};

fn draw_dot(ctx: &CanvasRenderingContext2d, point: Point, width: f32) {
    ctx.begin_path();
    let _ = ctx.arc(
        point.x as f64,
        point.y as f64,
        width as f64 / 2.0,
        0.0,
        std::f64::consts::PI * 2.0,
    );
    ctx.fill();
}

pub fn draw_stroke(ctx: &CanvasRenderingContext2d, stroke: &Stroke) {
    let points = stroke.points();
    if points.is_empty() {
        return;
    }
    // Erasers only need an opaque source for destination-out.
    let color = stroke.color().unwrap_or("#000");
    ctx.save();
    let _ = ctx.set_global_composite_operation(stroke.composite_operation());
    ctx.set_fill_style_str(color);
    ctx.set_stroke_style_str(color);
    ctx.set_line_width(stroke.width() as f64);
    ctx.set_line_cap("round");
    ctx.set_line_join("round");
    if points.len() == 1 {
        draw_dot(ctx, points[0], stroke.width());
    } else {
        ctx.begin_path();
        ctx.move_to(points[0].x as f64, points[0].y as f64);
        for point in &points[1..] {
            ctx.line_to(point.x as f64, point.y as f64);
        }
        ctx.stroke();
    }
    ctx.restore();
}

pub fn draw_background(surface: &Surface) {
    let ctx = &surface.background_ctx;
    ctx.clear_rect(0.0, 0.0, surface.stage.width, surface.stage.height);
    let Some(image) = &surface.image else {
        return;
    };
    let natural = StageSize::new(image.natural_width() as f64, image.natural_height() as f64);
    if !natural.is_valid() {
        return;
    }
    let rect = fit_image(natural, surface.stage);
    let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
        image,
        rect.x,
        rect.y,
        rect.width,
        rect.height,
    );
}

pub fn redraw_editor(state: &EditorState) {
    let surface = &state.surface;
    surface
        .ctx
        .clear_rect(0.0, 0.0, surface.stage.width, surface.stage.height);
    let strokes = state.recorder.strokes().iter().chain(state.recorder.open_stroke());
    for stroke in strokes {
        draw_stroke(&surface.ctx, &state.view.display(stroke));
    }
}

fn draw_layer_canvas(ctx: &CanvasRenderingContext2d, layer: &HtmlCanvasElement, stage: StageSize) {
    let _ = ctx.draw_image_with_html_canvas_element_and_dw_and_dh(
        layer,
        0.0,
        0.0,
        stage.width,
        stage.height,
    );
}

pub fn redraw_overlay(state: &OverlayState) {
    let surface = &state.surface;
    let stage = surface.stage;
    surface.ctx.clear_rect(0.0, 0.0, stage.width, stage.height);
    for layer in state.layers.visible() {
        state.scratch_ctx.clear_rect(0.0, 0.0, stage.width, stage.height);
        for stroke in &layer.strokes {
            draw_stroke(&state.scratch_ctx, stroke);
        }
        draw_layer_canvas(&surface.ctx, &state.scratch, stage);
    }
}
