//! Final CSV export

use crate::error::{LabelerError, Result};
use crate::models::{Category, LabelResult};
use label_checkpoint::write_atomic;
use std::path::Path;
use tracing::info;

/// File-name-safe form of a category name
///
/// Every non-alphanumeric character becomes `_`.
pub fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Render results as CSV: `index,date,text,<category...>`
pub fn render_csv(categories: &[Category], results: &[LabelResult]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["index".to_string(), "date".to_string(), "text".to_string()];
    header.extend(categories.iter().map(|c| c.name.clone()));
    writer.write_record(&header)?;

    for result in results {
        let mut row = vec![
            result.index.to_string(),
            result.date.clone().unwrap_or_default(),
            result.text.clone(),
        ];
        row.extend(categories.iter().map(|c| {
            result
                .labels
                .get(&c.name)
                .map(|label| label.as_u8().to_string())
                .unwrap_or_default()
        }));
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| LabelerError::Output(e.to_string()))
}

/// Write results atomically to `path`
pub async fn write_results(path: &Path, categories: &[Category], results: &[LabelResult]) -> Result<()> {
    let bytes = render_csv(categories, results)?;
    write_atomic(path, &bytes)
        .await
        .map_err(|e| LabelerError::Output(format!("cannot write {}: {}", path.display(), e)))?;
    info!(path = %path.display(), rows = results.len(), "Results written");
    Ok(())
}
