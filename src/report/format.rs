//! Formatted terminal output for fits.
//!
//! Kept apart from the fitting code so output changes stay local.

use crate::fit::FitResult;

/// Format a number with about seven significant digits, trimming trailing
/// zeros, switching to exponent notation outside `[1e-4, 1e7)`.
pub fn fmt_g(v: f64) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    if v == 0.0 {
        return "0".to_string();
    }
    let a = v.abs();
    if (1e-4..1e7).contains(&a) {
        let digits = (6 - a.log10().floor() as i32).max(0) as usize;
        trim_zeros(format!("{v:.digits$}"))
    } else {
        let s = format!("{v:.6e}");
        match s.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{exp}", trim_zeros(mantissa.to_string())),
            None => s,
        }
    }
}

fn trim_zeros(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Multi-section text report in the usual lmfit layout.
pub fn fit_report(fit: &FitResult) -> String {
    let stats = fit.stats();
    let mut out = String::new();

    out.push_str("[[Model]]\n");
    out.push_str(&format!("    {}\n", fit.model().name()));

    out.push_str("[[Fit Statistics]]\n");
    out.push_str(&format!("    # fitting method   = {}\n", stats.method));
    out.push_str(&format!("    # function evals   = {}\n", stats.nfev));
    out.push_str(&format!("    # data points      = {}\n", stats.ndata));
    out.push_str(&format!("    # variables        = {}\n", stats.nvarys));
    out.push_str(&format!("    chi-square         = {}\n", fmt_g(stats.chisqr)));
    out.push_str(&format!("    reduced chi-square = {}\n", fmt_g(stats.redchi)));
    out.push_str(&format!("    Akaike info crit   = {}\n", fmt_g(stats.aic)));
    out.push_str(&format!("    Bayesian info crit = {}\n", fmt_g(stats.bic)));
    if !stats.success {
        out.push_str(&format!("    ## Warning: {}\n", stats.message));
    }

    let params = fit.params();
    let no_errors = params.iter().filter(|p| p.is_free()).all(|p| p.stderr.is_none());
    if no_errors {
        out.push_str("    ## Warning: uncertainties could not be estimated\n");
    }

    out.push_str("[[Variables]]\n");
    let width = params.names().map(|n| n.len() + 1).max().unwrap_or(0);
    for p in params.iter() {
        let label = format!("{}:", p.name);
        let mut line = format!("    {label:<width$}  {}", fmt_g(p.value));
        if let Some(se) = p.stderr {
            line.push_str(&format!(" +/- {}", fmt_g(se)));
            if p.value != 0.0 {
                line.push_str(&format!(" ({:.2}%)", 100.0 * se / p.value.abs()));
            }
        }
        if let Some(expr) = &p.expr {
            line.push_str(&format!(" == '{expr}'"));
        } else if !p.vary {
            line.push_str(" (fixed)");
        } else if let Some(init) = fit.init_params().value(&p.name) {
            line.push_str(&format!(" (init = {})", fmt_g(init)));
        }
        out.push_str(&line);
        out.push('\n');
    }

    if !stats.correlations.is_empty() {
        out.push_str("[[Correlations]] (unreported correlations are < 0.100)\n");
        for (a, b, c) in &stats.correlations {
            out.push_str(&format!("    C({a}, {b}) = {c:+.4}\n"));
        }
    }

    out
}
