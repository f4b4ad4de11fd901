/// Tabular exporter: one column per lead, one row per sample

use crate::data::leads::PatientInfo;
use crate::error::{DigitizeError, Result};
use crate::pipeline::calibration::CalibratedLead;

/// Transpose equal-length columns into CSV text. Every line, including the
/// header, ends with `\n`.
pub fn export_csv(headers: &[String], columns: &[Vec<f64>]) -> Result<String> {
    if headers.len() != columns.len() {
        return Err(DigitizeError::HeaderMismatch {
            headers: headers.len(),
            columns: columns.len(),
        });
    }
    let rows = columns.first().map(|c| c.len()).unwrap_or(0);
    for (name, column) in headers.iter().zip(columns) {
        if column.len() != rows {
            return Err(DigitizeError::LengthMismatch {
                name: name.clone(),
                expected: rows,
                got: column.len(),
            });
        }
    }

    let mut out = String::new();
    out.push_str(&headers.join(","));
    out.push('\n');
    for i in 0..rows {
        let row: Vec<String> = columns.iter().map(|c| c[i].to_string()).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    Ok(out)
}

/// CSV for calibrated leads, headed by lead names
pub fn export_leads(leads: &[CalibratedLead]) -> Result<String> {
    let headers: Vec<String> = leads.iter().map(|l| l.name.clone()).collect();
    let columns: Vec<Vec<f64>> = leads.iter().map(|l| l.samples_mv.clone()).collect();
    export_csv(&headers, &columns)
}

/// `{source}_{sex}_{qt}_{square_side}.csv`
pub fn export_filename(patient: &PatientInfo, square_side: f64) -> String {
    let source = if patient.source_id.trim().is_empty() {
        "ecg"
    } else {
        patient.source_id.trim()
    };
    format!(
        "{}_{}_{}_{}.csv",
        sanitize(source),
        patient.sex,
        patient.qt_ms,
        square_side.round() as i64
    )
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}
