//! CSV export of the family tables
//!
//! Every family gets `<stem>_predictions.csv`, `<stem>_performance.csv`
//! and `<stem>_parameters.csv` in the output directory. Missing values
//! (undefined correlation, unused parameter slots) are empty cells.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::base::Result;
use crate::evaluator::{EvaluationReport, FamilyReport};
use crate::report::{ParameterRow, PerformanceRecord, PredictionTable};

/// Files written for one family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub predictions: PathBuf,
    pub performance: PathBuf,
    pub parameters: PathBuf,
}

/// Writes evaluation tables into a directory
#[derive(Debug, Clone)]
pub struct ResultExporter {
    out_dir: PathBuf,
}

impl ResultExporter {
    /// Exporter into `out_dir`, created on first write
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Output directory
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write the tables of every family
    pub fn export(&self, report: &EvaluationReport) -> Result<Vec<ExportedFiles>> {
        report
            .families
            .iter()
            .map(|family| self.export_family(family))
            .collect()
    }

    /// Write the three tables of one family
    pub fn export_family(&self, report: &FamilyReport) -> Result<ExportedFiles> {
        fs::create_dir_all(&self.out_dir)?;

        let stem = report.file_stem();
        let files = ExportedFiles {
            predictions: self.out_dir.join(format!("{}_predictions.csv", stem)),
            performance: self.out_dir.join(format!("{}_performance.csv", stem)),
            parameters: self.out_dir.join(format!("{}_parameters.csv", stem)),
        };

        write_predictions(&report.predictions, fs::File::create(&files.predictions)?)?;
        write_performance(&report.performance, fs::File::create(&files.performance)?)?;
        write_parameters(&report.parameters, fs::File::create(&files.parameters)?)?;

        info!(
            family = %report.family,
            dir = %self.out_dir.display(),
            models = report.predictions.n_models(),
            "Exported tables"
        );
        Ok(files)
    }
}

/// Prediction table: `observed`, then one column per model
pub fn write_predictions<W: Write>(table: &PredictionTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["observed"];
    header.extend(table.ids());
    csv.write_record(&header)?;

    let columns: Vec<_> = table.columns().values().collect();
    for (i, observed) in table.observed().iter().enumerate() {
        let mut record = Vec::with_capacity(columns.len() + 1);
        record.push(observed.to_string());
        record.extend(columns.iter().map(|c| c[i].to_string()));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Performance table, one row per reported model
pub fn write_performance<W: Write>(records: &[PerformanceRecord], writer: W) -> Result<()> {
    write_rows(records, &PerformanceRecord::HEADER, writer)
}

/// Parameter table, `estimate ± half-width` per slot
pub fn write_parameters<W: Write>(rows: &[ParameterRow], writer: W) -> Result<()> {
    write_rows(rows, &ParameterRow::HEADER, writer)
}

/// `serialize` emits the header with the first row, so an empty table
/// gets it written by hand
fn write_rows<T: Serialize, W: Write>(rows: &[T], header: &[&str], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv.write_record(header)?;
    }
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FamilyKind;
    use crate::evaluator::FitFailure;
    use ndarray::array;
    use sf_core::DatasetSplitter;

    fn performance() -> Vec<PerformanceRecord> {
        vec![
            PerformanceRecord {
                model_name: "N1".to_string(),
                fitting_function: "ols".to_string(),
                distribution: "Normal".to_string(),
                predictors: "CAPE".to_string(),
                group_name: "Linear".to_string(),
                rmse: 0.5,
                cor: Some(0.9),
                sscore: 0.8,
            },
            PerformanceRecord {
                model_name: "N2".to_string(),
                fitting_function: "ols".to_string(),
                distribution: "Normal".to_string(),
                predictors: "CAPE×P".to_string(),
                group_name: "Linear".to_string(),
                rmse: 0.25,
                cor: None,
                sscore: 1.0,
            },
        ]
    }

    fn as_string(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_prediction_csv_layout() {
        let mut table = PredictionTable::new(array![1.0, 2.5]);
        table.insert("N1", array![1.5, 2.0]).unwrap();
        table.insert("N2", array![0.5, 3.0]).unwrap();

        let mut out = Vec::new();
        write_predictions(&table, &mut out).unwrap();
        assert_eq!(as_string(out), "observed,N1,N2\n1,1.5,0.5\n2.5,2,3\n");
    }

    #[test]
    fn test_performance_csv_leaves_missing_correlation_empty() {
        let mut out = Vec::new();
        write_performance(&performance(), &mut out).unwrap();
        let text = as_string(out);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "model_name,fitting_function,distribution,predictors,group_name,rmse,cor,sscore"
        );
        assert_eq!(lines[1], "N1,ols,Normal,CAPE,Linear,0.5,0.9,0.8");
        assert_eq!(lines[2], "N2,ols,Normal,CAPE×P,Linear,0.25,,1.0");
    }

    #[test]
    fn test_export_family_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("results");

        let mut predictions = PredictionTable::new(array![1.0]);
        predictions.insert("N1", array![1.25]).unwrap();
        let report = EvaluationReport {
            partition: DatasetSplitter::default().partition(5).unwrap(),
            families: vec![FamilyReport {
                family: FamilyKind::Linear,
                predictions,
                performance: performance(),
                parameters: Vec::new(),
                models: Vec::new(),
                failures: vec![FitFailure {
                    model: "N3".to_string(),
                    predictors: "RH".to_string(),
                    message: "degenerate".to_string(),
                }],
            }],
        };

        let files = ResultExporter::new(&out_dir).export(&report).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].predictions, out_dir.join("linear_predictions.csv"));

        let predictions = fs::read_to_string(&files[0].predictions).unwrap();
        assert_eq!(predictions, "observed,N1\n1,1.25\n");
        let performance = fs::read_to_string(&files[0].performance).unwrap();
        assert_eq!(performance.lines().count(), 3);
        let parameters = fs::read_to_string(&files[0].parameters).unwrap();
        assert_eq!(
            parameters,
            "model_label,predictors,functional_form,a,b,c,d,e,f,g\n"
        );
    }

    #[test]
    fn test_empty_tables_keep_their_header() {
        let mut out = Vec::new();
        write_performance(&[], &mut out).unwrap();
        assert_eq!(
            as_string(out),
            "model_name,fitting_function,distribution,predictors,group_name,rmse,cor,sscore\n"
        );
    }

    #[test]
    fn test_header_matches_serialized_fields() {
        let mut out = Vec::new();
        write_performance(&performance(), &mut out).unwrap();
        let text = as_string(out);
        assert_eq!(text.lines().next(), Some(PerformanceRecord::HEADER.join(",").as_str()));
    }

    #[test]
    fn test_all_failed_family_exports_header_only_tables() {
        let dir = tempfile::tempdir().unwrap();
        let family = FamilyReport {
            family: FamilyKind::GammaGlm,
            predictions: PredictionTable::new(array![0.0, 1.0]),
            performance: Vec::new(),
            parameters: Vec::new(),
            models: Vec::new(),
            failures: vec![FitFailure {
                model: "G1".to_string(),
                predictors: "CAPE".to_string(),
                message: "invalid response".to_string(),
            }],
        };

        let files = ResultExporter::new(dir.path()).export_family(&family).unwrap();

        let performance = fs::read_to_string(&files.performance).unwrap();
        assert_eq!(performance.lines().collect::<Vec<_>>(), vec![PerformanceRecord::HEADER.join(",")]);
        let parameters = fs::read_to_string(&files.parameters).unwrap();
        assert_eq!(parameters.lines().collect::<Vec<_>>(), vec![ParameterRow::HEADER.join(",")]);
        let predictions = fs::read_to_string(&files.predictions).unwrap();
        assert_eq!(predictions, "observed\n0\n1\n");
    }
}
