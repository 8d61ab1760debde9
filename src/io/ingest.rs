//! CSV ingest of an `(x, y)` data series.
//!
//! - a header row is optional; when present, columns named `x` and `y` are
//!   used, otherwise the first two columns
//! - bad rows are skipped and reported, never fatal on their own
//! - at least two usable rows are required

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::DataSeries;
use crate::error::AppError;

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestedSeries {
    pub series: DataSeries,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load a series from a CSV file.
pub fn load_series(path: &Path) -> Result<IngestedSeries, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_series(file)
}

/// Parse a series from any CSV reader.
pub fn read_series<R: Read>(input: R) -> Result<IngestedSeries, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(input);

    let mut records = reader.records().enumerate().peekable();

    // Decide whether the first record is a header.
    let mut columns = (0, 1);
    if let Some((_, Ok(first))) = records.peek() {
        if !is_numeric_pair(first) {
            columns = resolve_columns(first);
            records.next();
        }
    }

    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in records {
        let line = idx + 1;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, columns) {
            Ok((xv, yv)) => {
                x.push(xv);
                y.push(yv);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    let rows_used = x.len();
    if rows_used < 2 {
        return Err(AppError::new(
            2,
            format!("Need at least 2 valid (x, y) rows, found {rows_used}."),
        ));
    }

    Ok(IngestedSeries {
        series: DataSeries { x, y },
        row_errors,
        rows_read,
        rows_used,
    })
}

fn is_numeric_pair(record: &StringRecord) -> bool {
    record.len() >= 2
        && record.iter().take(2).all(|f| f.parse::<f64>().is_ok())
}

fn resolve_columns(headers: &StringRecord) -> (usize, usize) {
    let map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect();
    match (map.get("x"), map.get("y")) {
        (Some(&xi), Some(&yi)) => (xi, yi),
        _ => (0, 1),
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes carry a BOM on the first header.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, (xi, yi): (usize, usize)) -> Result<(f64, f64), String> {
    let field = |idx: usize, label: &str| -> Result<f64, String> {
        let raw = record
            .get(idx)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("missing {label} value"))?;
        let v: f64 = raw
            .parse()
            .map_err(|_| format!("invalid {label} value '{raw}'"))?;
        if !v.is_finite() {
            return Err(format!("non-finite {label} value '{raw}'"));
        }
        Ok(v)
    };
    Ok((field(xi, "x")?, field(yi, "y")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_headerless_pairs() {
        let got = read_series("0,1\n1,2.5\n2,4\n".as_bytes()).unwrap();
        assert_eq!(got.series.x, vec![0.0, 1.0, 2.0]);
        assert_eq!(got.series.y, vec![1.0, 2.5, 4.0]);
        assert!(got.row_errors.is_empty());
        assert_eq!(got.rows_read, 3);
    }

    #[test]
    fn named_columns_win_over_position() {
        let csv = "\u{feff}id, Y ,X\na,10,1\nb,20,2\n";
        let got = read_series(csv.as_bytes()).unwrap();
        assert_eq!(got.series.x, vec![1.0, 2.0]);
        assert_eq!(got.series.y, vec![10.0, 20.0]);
    }

    #[test]
    fn bad_rows_are_reported_and_skipped() {
        let csv = "x,y\n0,1\n1,abc\n2\n3,inf\n4,5\n";
        let got = read_series(csv.as_bytes()).unwrap();
        assert_eq!(got.rows_used, 2);
        assert_eq!(got.rows_read, 5);
        let lines: Vec<usize> = got.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert!(got.row_errors[2].message.contains("non-finite"));
    }

    #[test]
    fn too_few_rows_is_an_input_error() {
        let err = read_series("x,y\n1,2\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
