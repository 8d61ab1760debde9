//! Lineshape formulas for the component library.
//!
//! All functions take a single abscissa value and return the model value at
//! that point. Widths are floored at [`TINY`] so a collapsing `sigma` during a
//! fit produces large but finite values instead of NaN.

use std::f64::consts::PI;

/// Floor applied to widths and denominators.
pub const TINY: f64 = 1e-15;

const SQRT_2PI: f64 = 2.506_628_274_631_000_5;

pub fn gaussian(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    let s = sigma.max(TINY);
    let z = (x - center) / s;
    amplitude / (SQRT_2PI * s) * (-0.5 * z * z).exp()
}

pub fn lorentzian(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    let s = sigma.max(TINY);
    let z = (x - center) / s;
    amplitude / (1.0 + z * z) / (PI * s)
}

/// Lorentzian with different half-widths on each side of `center`.
pub fn split_lorentzian(x: f64, amplitude: f64, center: f64, sigma: f64, sigma_r: f64) -> f64 {
    let s = if x < center { sigma } else { sigma_r };
    let ss = s * s;
    let d = x - center;
    let width = (sigma + sigma_r).max(TINY);
    2.0 * amplitude / (PI * width) * ss / (d * d + ss).max(TINY)
}

/// Pseudo-Voigt: weighted sum of a Gaussian and a Lorentzian of equal FWHM.
pub fn pseudo_voigt(x: f64, amplitude: f64, center: f64, sigma: f64, fraction: f64) -> f64 {
    let sigma_g = sigma / (2.0 * std::f64::consts::LN_2).sqrt();
    (1.0 - fraction) * gaussian(x, amplitude, center, sigma_g)
        + fraction * lorentzian(x, amplitude, center, sigma)
}

/// Linear ramp from 0 at `center` to `amplitude` at `center + sigma`.
pub fn step(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    let arg = (x - center) / sigma.max(TINY);
    amplitude * arg.clamp(0.0, 1.0)
}

/// Rising ramp at `center1`, falling ramp at `center2`.
pub fn rectangle(
    x: f64,
    amplitude: f64,
    center1: f64,
    sigma1: f64,
    center2: f64,
    sigma2: f64,
) -> f64 {
    let up = ((x - center1) / sigma1.max(TINY)).clamp(0.0, 1.0);
    let down = ((center2 - x) / sigma2.max(TINY)).clamp(0.0, 1.0);
    amplitude * (up + down - 1.0)
}

pub fn exponential(x: f64, amplitude: f64, decay: f64) -> f64 {
    let decay = if decay.abs() < TINY { TINY } else { decay };
    amplitude * (-x / decay).exp()
}

pub fn powerlaw(x: f64, amplitude: f64, exponent: f64) -> f64 {
    amplitude * x.powf(exponent)
}

/// Evaluate `c[0] + c[1] x + c[2] x^2 + ...` (Horner).
pub fn polynomial(x: f64, coefs: &[f64]) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Trapezoid integral over a wide, fine grid.
    fn area(f: impl Fn(f64) -> f64, lo: f64, hi: f64) -> f64 {
        let n = 200_000;
        let h = (hi - lo) / n as f64;
        let mut sum = 0.5 * (f(lo) + f(hi));
        for i in 1..n {
            sum += f(lo + i as f64 * h);
        }
        sum * h
    }

    #[test]
    fn peaks_are_normalised_to_amplitude() {
        let g = area(|x| gaussian(x, 3.0, 1.0, 0.5), -20.0, 20.0);
        assert!((g - 3.0).abs() < 1e-6, "gaussian area {g}");

        let pv = area(|x| pseudo_voigt(x, 2.0, 0.0, 0.3, 0.0), -20.0, 20.0);
        assert!((pv - 2.0).abs() < 1e-6, "pvoigt area {pv}");
    }

    #[test]
    fn gaussian_peak_height() {
        let h = gaussian(0.0, 1.0, 0.0, 1.0);
        assert!((h - 0.398_942_3).abs() < 1e-7);
    }

    #[test]
    fn collapsed_width_stays_finite() {
        assert!(gaussian(0.0, 1.0, 0.0, 0.0).is_finite());
        assert!(lorentzian(0.0, 1.0, 0.0, 0.0).is_finite());
        assert!(step(1.0, 1.0, 0.0, 0.0).is_finite());
    }

    #[test]
    fn ramps_and_polynomials() {
        assert_eq!(step(-1.0, 2.0, 0.0, 1.0), 0.0);
        assert_eq!(step(0.5, 2.0, 0.0, 1.0), 1.0);
        assert_eq!(step(3.0, 2.0, 0.0, 1.0), 2.0);
        assert_eq!(rectangle(0.5, 1.0, 0.0, 0.1, 1.0, 0.1), 1.0);
        assert_eq!(rectangle(2.0, 1.0, 0.0, 0.1, 1.0, 0.1), 0.0);
        assert_eq!(polynomial(2.0, &[1.0, 2.0, 3.0]), 17.0);
    }
}
