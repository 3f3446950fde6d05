use crate::error::{PrepError, Result};
use polars::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read a CSV file into a DataFrame with header and schema inference.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    debug!(
        "Read {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Write a DataFrame to a CSV file with headers.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Hex-encoded sha-256 of the raw file bytes.
///
/// Recorded in the validation report so a result can be tied back to the
/// exact input it was produced from.
pub fn file_fingerprint(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Column lookup that materializes to a `Series`.
pub fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| PrepError::MissingColumn(name.to_string()))
}

/// Non-null values of a column as f64, regardless of numeric width.
pub fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    let casted = series.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().flatten().collect())
}

/// Render a single cell for grouping keys and report output.
///
/// `AnyValue`'s own Display quotes strings; report values and stratification
/// keys want the bare text.
pub fn render_value(av: &AnyValue) -> String {
    match av {
        AnyValue::String(s) => (*s).to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}
