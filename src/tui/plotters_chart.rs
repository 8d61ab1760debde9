//! Plotters-powered session chart widget for Ratatui.
//!
//! Plotters output is drawn into the Ratatui buffer through
//! `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Component curves cycle through this palette.
const COMPONENT_COLORS: [RGBColor; 4] = [
    RGBColor(255, 200, 0),
    RGBColor(0, 255, 0),
    RGBColor(255, 0, 255),
    RGBColor(80, 160, 255),
];

/// A render-only chart description; all series and bounds are computed
/// outside the render call.
pub struct CurveChart<'a> {
    /// Observed data.
    pub points: &'a [(f64, f64)],
    /// Total model on the dense grid (empty without a model).
    pub model: &'a [(f64, f64)],
    /// One line per component, drawn under the total.
    pub components: &'a [Vec<(f64, f64)>],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    /// Cyan once the curve comes from a fit, gray while it is a preview.
    pub fitted: bool,
}

impl<'a> Widget for CurveChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to build a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            // Mesh lines are clutter at terminal resolution.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc("x")
                .y_desc("y")
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| format!("{v:.2}"))
                .y_label_formatter(&|v| format!("{v:.2}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            for (i, curve) in self.components.iter().enumerate() {
                let color = COMPONENT_COLORS[i % COMPONENT_COLORS.len()];
                chart.draw_series(LineSeries::new(curve.iter().copied(), &color))?;
            }

            let model_color = if self.fitted {
                RGBColor(0, 255, 255)
            } else {
                RGBColor(160, 160, 160)
            };
            chart.draw_series(LineSeries::new(self.model.iter().copied(), &model_color))?;

            // `Circle` radii come out huge through this backend; a pixel reads as a dot.
            chart.draw_series(self.points.iter().map(|&(x, y)| Pixel::new((x, y), WHITE)))?;

            Ok(())
        });

        widget.render(area, buf);
    }
}
