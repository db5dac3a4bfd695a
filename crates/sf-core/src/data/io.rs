//! Panel ingestion from delimited text
//!
//! The reader is header driven. Every required column must be present;
//! additional numeric columns are kept as-is. When `cxp` is absent it is
//! derived as `cape · precip`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::info;

use super::*;

/// Columns every panel must provide (`cxp` may be derived)
pub const REQUIRED_COLUMNS: [&str; 11] = [
    LONGITUDE, LATITUDE, YEAR, STRIKES, "cape", "precip", "tair", "wind", "swr", "sp", "rh",
];

/// Read a panel from a CSV file
pub fn read_panel_csv<P: AsRef<Path>>(path: P) -> Result<Panel> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let panel = read_panel(file)?;

    info!(
        path = %path.display(),
        rows = panel.nrows(),
        columns = panel.ncols(),
        "Loaded panel"
    );

    Ok(panel)
}

/// Read a panel from any CSV source
pub fn read_panel<R: Read>(source: R) -> Result<Panel> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(DataError::ColumnNotFound(required.to_string()));
        }
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        // Ragged records are rejected by the csv reader itself
        for (j, field) in record.iter().enumerate() {
            columns[j].push(parse_cell(field, row, &headers[j])?);
        }
    }

    let mut builder = PanelBuilder::new();
    for (name, values) in headers.iter().zip(columns) {
        builder = builder.with_column(name.as_str(), values)?;
    }
    let panel = builder.build()?;

    with_derived_cxp(panel)
}

fn parse_cell(field: &str, row: usize, column: &str) -> Result<f64> {
    if field.is_empty() || field.eq_ignore_ascii_case("na") || field.eq_ignore_ascii_case("nan") {
        return Err(DataError::MissingData {
            column: column.to_string(),
            row,
        });
    }

    field.parse::<f64>().map_err(|_| DataError::Parse {
        row,
        column: column.to_string(),
        value: field.to_string(),
    })
}

fn with_derived_cxp(panel: Panel) -> Result<Panel> {
    let cxp = Covariate::CapeXPrecip.column();
    if panel.has_column(cxp) {
        return Ok(panel);
    }

    let derived = panel.covariate(Covariate::Cape)? * panel.covariate(Covariate::Precip)?;
    panel.with_column(cxp, derived)
}
