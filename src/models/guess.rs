//! Initial-value heuristics per component kind.
//!
//! Peak kinds use the half-maximum heuristic: the centre and width come from
//! the span of samples above half height. Polynomial kinds use an ordinary
//! least-squares polynomial fit; exponential and power-law kinds fit a line in
//! log space.

use crate::math::lineshape::TINY;
use crate::math::polyfit;
use crate::models::kind::ModelKind;

/// Proposed `(unprefixed name, value)` pairs, or `None` when the data is too thin.
pub fn guess_values(kind: ModelKind, data: &[f64], x: &[f64]) -> Option<Vec<(&'static str, f64)>> {
    let n = data.len().min(x.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &data[..n]);

    match kind {
        ModelKind::Constant => Some(vec![("c", y.iter().sum::<f64>() / n as f64)]),
        ModelKind::Linear => {
            let c = polyfit(x, y, 1)?;
            Some(vec![("slope", c[1]), ("intercept", c[0])])
        }
        ModelKind::Quadratic => {
            let c = polyfit(x, y, 2)?;
            Some(vec![("a", c[2]), ("b", c[1]), ("c", c[0])])
        }
        ModelKind::Polynomial => {
            const NAMES: [&str; 8] = ["c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7"];
            let c = polyfit(x, y, NAMES.len() - 1)?;
            Some(NAMES.iter().copied().zip(c).collect())
        }
        ModelKind::Exponential => {
            let logy: Vec<f64> = y.iter().map(|v| (v.abs() + TINY).ln()).collect();
            let c = polyfit(x, &logy, 1)?;
            if c[1].abs() < TINY {
                return None;
            }
            Some(vec![("amplitude", c[0].exp()), ("decay", -1.0 / c[1])])
        }
        ModelKind::PowerLaw => {
            let logx: Vec<f64> = x.iter().map(|v| (v.abs() + TINY).ln()).collect();
            let logy: Vec<f64> = y.iter().map(|v| (v.abs() + TINY).ln()).collect();
            let c = polyfit(&logx, &logy, 1)?;
            Some(vec![("amplitude", c[0].exp()), ("exponent", c[1])])
        }
        ModelKind::Gaussian => {
            let (amp, cen, sig) = peak_guess(x, y, 1.0)?;
            Some(vec![("amplitude", amp), ("center", cen), ("sigma", sig)])
        }
        ModelKind::Lorentzian => {
            let (amp, cen, sig) = peak_guess(x, y, 1.25)?;
            Some(vec![("amplitude", amp), ("center", cen), ("sigma", sig)])
        }
        ModelKind::SplitLorentzian => {
            let (amp, cen, sig) = peak_guess(x, y, 1.25)?;
            Some(vec![
                ("amplitude", amp),
                ("center", cen),
                ("sigma", sig),
                ("sigma_r", sig),
            ])
        }
        ModelKind::PseudoVoigt => {
            let (amp, cen, sig) = peak_guess(x, y, 1.25)?;
            Some(vec![
                ("amplitude", amp),
                ("center", cen),
                ("sigma", sig),
                ("fraction", 0.5),
            ])
        }
        ModelKind::Step => {
            let (xmin, xmax) = min_max(x)?;
            let (ymin, ymax) = min_max(y)?;
            Some(vec![
                ("amplitude", ymax - ymin),
                ("center", (xmax + xmin) / 2.0),
                ("sigma", (xmax - xmin) / 7.0),
            ])
        }
        ModelKind::Rectangle => {
            let (xmin, xmax) = min_max(x)?;
            let (ymin, ymax) = min_max(y)?;
            let span = xmax - xmin;
            Some(vec![
                ("amplitude", ymax - ymin),
                ("center1", xmin + span / 4.0),
                ("sigma1", span / 7.0),
                ("center2", xmax - span / 4.0),
                ("sigma2", span / 7.0),
            ])
        }
    }
}

fn min_max(v: &[f64]) -> Option<(f64, f64)> {
    let lo = v.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (lo.is_finite() && hi.is_finite()).then_some((lo, hi))
}

/// `(amplitude, center, sigma)` for a positive peak.
fn peak_guess(x: &[f64], y: &[f64], ampscale: f64) -> Option<(f64, f64, f64)> {
    let (xmin, xmax) = min_max(x)?;
    let (ymin, ymax) = min_max(y)?;
    let imax = y
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)?;

    let height = (ymax - ymin) * 3.0;
    let mut center = x[imax];
    let mut sigma = (xmax - xmin) / 6.0;

    let half = (ymax + ymin) / 2.0;
    let above: Vec<f64> = x
        .iter()
        .zip(y)
        .filter(|(_, yi)| **yi > half)
        .map(|(xi, _)| *xi)
        .collect();
    if above.len() > 2 {
        let (lo, hi) = min_max(&above)?;
        sigma = (hi - lo) / 2.0;
        center = above.iter().sum::<f64>() / above.len() as f64;
    }

    Some((height * sigma * ampscale, center, sigma))
}
