//! CSV input reading

use crate::config::InputConfig;
use crate::error::{LabelerError, Result};
use crate::models::Record;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Read every data row of a CSV file as a [`Record`]
pub fn read_records(path: &Path, columns: &InputConfig) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path).map_err(|e| {
        LabelerError::Input(format!("cannot open {}: {}", path.display(), e))
    })?;
    let records = read_records_from(file, columns)?;
    info!(path = %path.display(), records = records.len(), "Loaded input");
    Ok(records)
}

/// Read records from any CSV source with a header row
///
/// The text column is required. The date column is optional; missing cells
/// become blank text or no date.
pub fn read_records_from<R: Read>(source: R, columns: &InputConfig) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h.trim() == name.trim());

    let text_idx = find(&columns.text_column).ok_or_else(|| {
        LabelerError::Config(format!(
            "text column '{}' not found (columns: {})",
            columns.text_column,
            headers.iter().collect::<Vec<_>>().join(", ")
        ))
    })?;
    let date_idx = find(&columns.date_column);
    if date_idx.is_none() {
        debug!(column = %columns.date_column, "No date column, records carry no date");
    }

    let mut records = Vec::new();
    for (index, row) in reader.byte_records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                warn!(index, error = %e, "Malformed input row, treating as blank");
                records.push(Record::new(index, None, ""));
                continue;
            }
        };

        let text = match row.get(text_idx).map(std::str::from_utf8) {
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                warn!(index, error = %e, "Input text is not valid UTF-8, treating as blank");
                ""
            }
            None => "",
        };
        let date = date_idx
            .and_then(|i| row.get(i))
            .and_then(|d| std::str::from_utf8(d).ok())
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        records.push(Record::new(index, date, text));
    }
    Ok(records)
}
