//! Export the parameter table to CSV.
//!
//! Columns match `ParameterTable::headers`, so the optional uncertainty and
//! expression columns appear only when they carry data.

use std::fs::File;
use std::path::Path;

use crate::error::AppError;
use crate::report::ParameterTable;

/// Write `table` to a CSV file.
pub fn write_parameters_csv(path: &Path, table: &ParameterTable) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(table.headers())
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;
    for row in table.cells() {
        writer
            .write_record(&row)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Parameter, Parameters};

    #[test]
    fn expressions_with_commas_are_quoted() {
        let mut params = Parameters::new();
        params.insert(Parameter::new("g0_sigma", 0.5));
        params.insert(Parameter::new("g0_height", 1.0).with_expr("a/max(1e-15, g0_sigma)"));
        let table = ParameterTable::from_parameters(&params);

        let dir = std::env::temp_dir().join(format!("cfit-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("params.csv");
        write_parameters_csv(&path, &table).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name,value,min,max,vary,expr");
        assert_eq!(lines[1], "g0_height,1,-inf,inf,False,\"a/max(1e-15, g0_sigma)\"");
        assert_eq!(lines[2], "g0_sigma,0.5,-inf,inf,True,");
        std::fs::remove_dir_all(&dir).ok();
    }
}
