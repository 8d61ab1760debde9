//! Linear least squares by SVD.
//!
//! Solves each damped Levenberg-Marquardt step `[J; sqrt(lambda)*D] delta = [-r; 0]`
//! and the polynomial fits behind some initial guesses. The systems are tall
//! and small, and may be close to rank-deficient.

use nalgebra::{DMatrix, DVector};

/// Minimise `|x * beta - y|`; `None` when no tolerance yields a finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y ≈ c0 + c1 x + ... + c_deg x^deg`, returning coefficients lowest order first.
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Option<Vec<f64>> {
    let n = x.len().min(y.len());
    let p = degree + 1;
    if n < p {
        return None;
    }

    let mut design = DMatrix::<f64>::zeros(n, p);
    for i in 0..n {
        let mut xp = 1.0;
        for j in 0..p {
            design[(i, j)] = xp;
            xp *= x[i];
        }
    }
    let rhs = DVector::from_row_slice(&y[..n]);

    solve_least_squares(&design, &rhs).map(|c| c.iter().copied().collect())
}
