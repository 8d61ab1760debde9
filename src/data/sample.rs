//! Synthetic demo data: Gaussian peaks on a linear background plus noise.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::DataSeries;
use crate::error::AppError;
use crate::math::lineshape::gaussian;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSpec {
    pub amplitude: f64,
    pub center: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleSpec {
    pub count: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub slope: f64,
    pub intercept: f64,
    pub peaks: Vec<PeakSpec>,
    /// Standard deviation of the additive noise.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            count: 401,
            x_min: 0.0,
            x_max: 20.0,
            slope: 0.05,
            intercept: 1.0,
            peaks: vec![
                PeakSpec {
                    amplitude: 12.0,
                    center: 7.0,
                    sigma: 0.8,
                },
                PeakSpec {
                    amplitude: 8.0,
                    center: 12.5,
                    sigma: 1.2,
                },
            ],
            noise: 0.1,
            seed: 7,
        }
    }
}

/// Noise-free value of the sample's generating function at `x`.
pub fn baseline(spec: &SampleSpec, x: f64) -> f64 {
    spec.intercept
        + spec.slope * x
        + spec
            .peaks
            .iter()
            .map(|p| gaussian(x, p.amplitude, p.center, p.sigma))
            .sum::<f64>()
}

/// Evenly spaced `x` with noisy `y`; the same spec always yields the same series.
pub fn generate_sample(spec: &SampleSpec) -> Result<DataSeries, AppError> {
    if spec.count < 2 {
        return Err(AppError::new(2, "Sample count must be at least 2."));
    }
    if !(spec.x_min.is_finite() && spec.x_max.is_finite() && spec.x_max > spec.x_min) {
        return Err(AppError::new(2, "Invalid x range for sample generation."));
    }
    if spec.peaks.iter().any(|p| !(p.sigma > 0.0)) {
        return Err(AppError::new(2, "Peak widths must be positive."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise.max(0.0))
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let step = (spec.x_max - spec.x_min) / (spec.count as f64 - 1.0);
    let x: Vec<f64> = (0..spec.count).map(|i| spec.x_min + step * i as f64).collect();
    let y = x
        .iter()
        .map(|&xi| baseline(spec, xi) + normal.sample(&mut rng))
        .collect();

    Ok(DataSeries { x, y })
}
