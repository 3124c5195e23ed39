//! Tab-separated medication lists, as pasted from a spreadsheet.
//!
//! Columns: name, note, color, delay (hours). Trailing columns may be
//! omitted and empty cells mean "absent".

use crate::{Error, Medication, Result};
use csv::{ReaderBuilder, StringRecord, Trim};

/// Parse a pasted list into medications without identifiers
///
/// Blank lines are skipped. A row without a name fails the whole list so a
/// paste is either applied entirely or not at all.
pub fn parse_list(raw: &str) -> Result<Vec<Medication>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(raw.as_bytes());

    let mut medications = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        medications.push(medication_from_row(&record, line)?);
    }

    tracing::debug!("Parsed {} medications from list", medications.len());
    Ok(medications)
}

fn medication_from_row(record: &StringRecord, line: u64) -> Result<Medication> {
    let cell = |i: usize| record.get(i).filter(|s| !s.is_empty());

    let primary = cell(0)
        .ok_or_else(|| Error::Validation(format!("line {}: missing medication name", line)))?;

    let delay = match cell(3) {
        Some(raw) => Some(raw.parse::<f64>().map_err(|_| {
            Error::Validation(format!("line {}: delay {:?} is not a number", line, raw))
        })?),
        None => None,
    };

    let medication = Medication {
        uuid: None,
        primary: primary.to_string(),
        secondary: cell(1).map(str::to_string),
        color: cell(2).map(str::to_string),
        delay,
    };
    medication
        .validate()
        .map_err(|e| Error::Validation(format!("line {}: {}", line, e)))?;
    Ok(medication)
}
