//! Reporting: the parameter table and the lmfit-style fit report.
//!
//! Columns of the table depend on the parameter set:
//! - always: `name, value, min, max, vary`
//! - `±, error, rel. error` only when some parameter has an uncertainty
//! - `expr` only when some parameter is constrained

use crate::domain::{Parameter, Parameters};

pub mod format;

pub use format::{fit_report, fmt_g};

/// One parameter, as shown in the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRow {
    pub name: String,
    pub value: f64,
    pub stderr: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub vary: bool,
    pub expr: Option<String>,
}

impl From<&Parameter> for ParameterRow {
    fn from(p: &Parameter) -> Self {
        Self {
            name: p.name.clone(),
            value: p.value,
            stderr: p.stderr,
            min: p.min,
            max: p.max,
            vary: p.vary,
            expr: p.expr.clone(),
        }
    }
}

impl ParameterRow {
    /// `stderr / |value|` in percent; `None` without stderr or at zero value.
    pub fn relative_error(&self) -> Option<f64> {
        let se = self.stderr?;
        (self.value != 0.0).then(|| 100.0 * se / self.value.abs())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable {
    rows: Vec<ParameterRow>,
    with_uncertainty: bool,
    with_expr: bool,
}

impl ParameterTable {
    pub fn from_parameters(params: &Parameters) -> Self {
        let rows: Vec<ParameterRow> = params.iter().map(ParameterRow::from).collect();
        let with_uncertainty = rows.iter().any(|r| r.stderr.is_some());
        let with_expr = rows.iter().any(|r| r.expr.is_some());
        Self {
            rows,
            with_uncertainty,
            with_expr,
        }
    }

    pub fn rows(&self) -> &[ParameterRow] {
        &self.rows
    }

    pub fn has_uncertainty(&self) -> bool {
        self.with_uncertainty
    }

    pub fn has_expr(&self) -> bool {
        self.with_expr
    }

    pub fn headers(&self) -> Vec<&'static str> {
        let mut h = vec!["name", "value"];
        if self.with_uncertainty {
            h.extend(["±", "error", "rel. error"]);
        }
        h.extend(["min", "max", "vary"]);
        if self.with_expr {
            h.push("expr");
        }
        h
    }

    /// Formatted cells, one row per parameter, matching [`ParameterTable::headers`].
    pub fn cells(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| {
                let mut c = vec![r.name.clone(), fmt_g(r.value)];
                if self.with_uncertainty {
                    match r.stderr {
                        Some(se) => {
                            c.push("±".to_string());
                            c.push(fmt_g(se));
                            c.push(match r.relative_error() {
                                Some(rel) => format!("{rel:.2}%"),
                                None => "n/a".to_string(),
                            });
                        }
                        None => c.extend([String::new(), String::new(), String::new()]),
                    }
                }
                c.push(r.min.map_or_else(|| "-inf".to_string(), fmt_g));
                c.push(r.max.map_or_else(|| "inf".to_string(), fmt_g));
                c.push(if r.vary { "True" } else { "False" }.to_string());
                if self.with_expr {
                    c.push(r.expr.clone().unwrap_or_default());
                }
                c
            })
            .collect()
    }

    /// Left-aligned, space-padded columns.
    pub fn to_text(&self) -> String {
        let headers = self.headers();
        let cells = self.cells();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in &cells {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        let line = |out: &mut String, row: Vec<&str>| {
            let padded: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{cell:<w$}"))
                .collect();
            out.push_str(padded.join("  ").trim_end());
            out.push('\n');
        };
        line(&mut out, headers.clone());
        for row in &cells {
            line(&mut out, row.iter().map(String::as_str).collect());
        }
        out
    }

    pub fn to_html(&self) -> String {
        let mut out = String::from("<table>\n<tr>");
        for h in self.headers() {
            out.push_str(&format!("<th>{}</th>", escape_html(h)));
        }
        out.push_str("</tr>\n");
        for row in self.cells() {
            out.push_str("<tr>");
            for cell in row {
                out.push_str(&format!("<td>{}</td>", escape_html(&cell)));
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</table>\n");
        out
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
