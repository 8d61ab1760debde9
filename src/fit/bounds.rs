//! Bound handling via internal/external variable transforms.
//!
//! The optimizer works on unconstrained internal variables. Each bounded
//! parameter maps between the two spaces as follows (MINUIT convention):
//!
//! - both bounds: `ext = min + (sin(int) + 1) (max - min) / 2`
//! - lower only:  `ext = min - 1 + sqrt(int² + 1)`
//! - upper only:  `ext = max + 1 - sqrt(int² + 1)`
//!
//! so every internal value lands inside the bounds.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundTransform {
    Free,
    Lower(f64),
    Upper(f64),
    Both(f64, f64),
}

impl BoundTransform {
    /// `None` when both bounds are set and `min >= max`.
    pub fn from_bounds(min: Option<f64>, max: Option<f64>) -> Option<Self> {
        match (min, max) {
            (None, None) => Some(BoundTransform::Free),
            (Some(lo), None) => Some(BoundTransform::Lower(lo)),
            (None, Some(hi)) => Some(BoundTransform::Upper(hi)),
            (Some(lo), Some(hi)) if lo < hi => Some(BoundTransform::Both(lo, hi)),
            _ => None,
        }
    }

    /// Clamp an external value into the bounds.
    pub fn clip(self, ext: f64) -> f64 {
        match self {
            BoundTransform::Free => ext,
            BoundTransform::Lower(lo) => ext.max(lo),
            BoundTransform::Upper(hi) => ext.min(hi),
            BoundTransform::Both(lo, hi) => ext.clamp(lo, hi),
        }
    }

    pub fn to_internal(self, ext: f64) -> f64 {
        let ext = self.clip(ext);
        match self {
            BoundTransform::Free => ext,
            BoundTransform::Lower(lo) => ((ext - lo + 1.0).powi(2) - 1.0).max(0.0).sqrt(),
            BoundTransform::Upper(hi) => ((hi - ext + 1.0).powi(2) - 1.0).max(0.0).sqrt(),
            BoundTransform::Both(lo, hi) => (2.0 * (ext - lo) / (hi - lo) - 1.0).clamp(-1.0, 1.0).asin(),
        }
    }

    pub fn to_external(self, int: f64) -> f64 {
        match self {
            BoundTransform::Free => int,
            BoundTransform::Lower(lo) => lo - 1.0 + (int * int + 1.0).sqrt(),
            BoundTransform::Upper(hi) => hi + 1.0 - (int * int + 1.0).sqrt(),
            BoundTransform::Both(lo, hi) => lo + (int.sin() + 1.0) * (hi - lo) / 2.0,
        }
    }

    /// `d ext / d int` at `int`.
    pub fn derivative(self, int: f64) -> f64 {
        match self {
            BoundTransform::Free => 1.0,
            BoundTransform::Lower(_) => int / (int * int + 1.0).sqrt(),
            BoundTransform::Upper(_) => -int / (int * int + 1.0).sqrt(),
            BoundTransform::Both(lo, hi) => int.cos() * (hi - lo) / 2.0,
        }
    }
}
