//! Table loading and writing

use crate::error::{HarnessError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Load a delimited file with a header row into a `DataFrame`.
///
/// `.tsv` files are read tab-separated, everything else comma-separated.
pub fn load_table(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let is_tsv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tsv"))
        .unwrap_or(false);
    let delimiter = if is_tsv { b'\t' } else { b',' };

    let file = File::open(path)?;
    let parse_opts = CsvParseOptions::default().with_separator(delimiter);

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .with_parse_options(parse_opts)
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| HarnessError::Data(format!("{}: {}", path.display(), e)))
}

/// Write a `DataFrame` as comma-separated text with a header row
pub fn write_table(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}
