//! Plot frames and the renderer seam.
//!
//! The session builds a [`PlotFrame`] (observed points, model curve on a dense
//! grid, per-component curves) and hands it to a [`Renderer`] after every
//! structural change, value edit and completed fit.

pub mod ascii;

pub use ascii::render_ascii;

/// One component's contribution on the dense grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentCurve {
    pub prefix: String,
    pub y: Vec<f64>,
}

/// Everything needed to redraw the plot once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotFrame {
    pub x: Vec<f64>,
    pub data: Vec<f64>,
    /// Dense abscissae for `model` and `components`.
    pub grid: Vec<f64>,
    /// Total model curve; `None` when there is no model or evaluation failed.
    pub model: Option<Vec<f64>>,
    pub components: Vec<ComponentCurve>,
    /// `true` when the curves come from a completed fit.
    pub fitted: bool,
}

impl PlotFrame {
    pub fn observed(x: &[f64], data: &[f64]) -> Self {
        Self {
            x: x.to_vec(),
            data: data.to_vec(),
            ..Self::default()
        }
    }

    /// `(min, max)` over observed and grid abscissae.
    pub fn x_bounds(&self) -> Option<(f64, f64)> {
        finite_bounds(self.x.iter().chain(&self.grid).copied())
    }

    /// `(min, max)` over every plotted ordinate.
    pub fn y_bounds(&self) -> Option<(f64, f64)> {
        let model = self.model.iter().flatten();
        let parts = self.components.iter().flat_map(|c| c.y.iter());
        finite_bounds(self.data.iter().chain(model).chain(parts).copied())
    }
}

fn finite_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

/// `n` evenly spaced points covering `[lo, hi]`.
pub fn dense_grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let n = n.max(2);
    (0..n)
        .map(|i| lo + (hi - lo) * i as f64 / (n as f64 - 1.0))
        .collect()
}

/// A redraw target. Each call replaces the previous picture.
pub trait Renderer {
    fn render(&mut self, frame: &PlotFrame);
}

/// Discards frames (headless sessions).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _frame: &PlotFrame) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_spans_both_ends() {
        let g = dense_grid(-1.0, 1.0, 5);
        assert_eq!(g, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(dense_grid(0.0, 1.0, 0).len(), 2);
    }

    #[test]
    fn bounds_cover_all_series() {
        let mut frame = PlotFrame::observed(&[0.0, 2.0], &[1.0, 3.0]);
        frame.grid = vec![-1.0, 2.5];
        frame.model = Some(vec![0.5, f64::NAN]);
        frame.components.push(ComponentCurve {
            prefix: "c0_".into(),
            y: vec![4.0, 4.0],
        });
        assert_eq!(frame.x_bounds(), Some((-1.0, 2.5)));
        assert_eq!(frame.y_bounds(), Some((0.5, 4.0)));
        assert_eq!(PlotFrame::default().y_bounds(), None);
    }
}
