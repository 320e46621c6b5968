use std::path::Path;

use tracing::{debug, info};

use crate::error::CaseError;
use crate::records::{CaseRecord, REQUIRED_COLUMNS};

/// Read the case export into memory. The returned records are never modified.
pub async fn read_cases<P: AsRef<Path>>(path: P) -> Result<Vec<CaseRecord>, CaseError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CaseError::io(path, e))?;
    debug!("read {} bytes from {}", bytes.len(), path.display());

    let records = parse_cases(path, &bytes)?;
    info!("loaded {} cases from {}", records.len(), path.display());
    Ok(records)
}

fn parse_cases(path: &Path, bytes: &[u8]) -> Result<Vec<CaseRecord>, CaseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader.headers()?;
    let mut missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(CaseError::MissingColumn {
            path: path.to_path_buf(),
            column: missing.join(", "),
        });
    }

    reader
        .deserialize::<CaseRecord>()
        .map(|row| row.map_err(CaseError::from))
        .collect()
}
