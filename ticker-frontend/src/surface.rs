//! Rendering seam: the chart computes pixel geometry and hands it to a
//! `DrawSurface`; only the canvas implementation touches the DOM.

/// `(x1, y1, x2, y2)` in pixels.
pub type Segment = (f64, f64, f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAlign {
    Left,
    Center,
    Right,
}

pub trait DrawSurface {
    fn begin_frame(&mut self, width: f64, height: f64, clear_color: &str);
    fn draw_segments(&mut self, segments: &[Segment], color: &str, width: f64);
    fn draw_polyline(&mut self, points: &[(f64, f64)], color: &str, width: f64);
    fn draw_circle(&mut self, x: f64, y: f64, radius: f64, color: &str);
    fn draw_label(&mut self, text: &str, x: f64, y: f64, color: &str, align: LabelAlign);
}

#[cfg(target_arch = "wasm32")]
pub use canvas::CanvasSurface;

#[cfg(target_arch = "wasm32")]
mod canvas {
    use super::{DrawSurface, LabelAlign, Segment};
    use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

    pub struct CanvasSurface {
        canvas: HtmlCanvasElement,
        ctx: CanvasRenderingContext2d,
    }

    impl CanvasSurface {
        pub fn new(canvas: HtmlCanvasElement, ctx: CanvasRenderingContext2d) -> Self {
            Self { canvas, ctx }
        }

        pub fn canvas(&self) -> &HtmlCanvasElement {
            &self.canvas
        }
    }

    impl DrawSurface for CanvasSurface {
        fn begin_frame(&mut self, width: f64, height: f64, clear_color: &str) {
            self.canvas.set_width(width as u32);
            self.canvas.set_height(height as u32);
            self.ctx.set_fill_style_str(clear_color);
            self.ctx.fill_rect(0.0, 0.0, width, height);
        }

        fn draw_segments(&mut self, segments: &[Segment], color: &str, width: f64) {
            let ctx = &self.ctx;
            ctx.set_stroke_style_str(color);
            ctx.set_line_width(width);
            ctx.begin_path();
            for (x1, y1, x2, y2) in segments {
                ctx.move_to(*x1, *y1);
                ctx.line_to(*x2, *y2);
            }
            ctx.stroke();
        }

        fn draw_polyline(&mut self, points: &[(f64, f64)], color: &str, width: f64) {
            if points.len() < 2 {
                return;
            }
            let ctx = &self.ctx;
            ctx.set_stroke_style_str(color);
            ctx.set_line_width(width);
            ctx.begin_path();
            ctx.move_to(points[0].0, points[0].1);
            for (x, y) in &points[1..] {
                ctx.line_to(*x, *y);
            }
            ctx.stroke();
        }

        fn draw_circle(&mut self, x: f64, y: f64, radius: f64, color: &str) {
            let ctx = &self.ctx;
            ctx.set_fill_style_str(color);
            ctx.begin_path();
            ctx.arc(x, y, radius, 0.0, std::f64::consts::PI * 2.0).ok();
            ctx.fill();
        }

        fn draw_label(&mut self, text: &str, x: f64, y: f64, color: &str, align: LabelAlign) {
            let ctx = &self.ctx;
            ctx.set_fill_style_str(color);
            ctx.set_font("12px 'Inter', sans-serif");
            ctx.set_text_align(match align {
                LabelAlign::Left => "left",
                LabelAlign::Center => "center",
                LabelAlign::Right => "right",
            });
            ctx.fill_text(text, x, y).ok();
        }
    }
}
