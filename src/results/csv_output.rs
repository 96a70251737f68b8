//! CSV serialization of merged tables.
//!
//! Every cell is quoted (header included), embedded quotes are doubled and
//! rows are joined by a bare `\n` with no trailing newline.

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::AppError;

/// Writes `headers` then `rows` as one CSV string.
pub fn to_csv_string(headers: &[String], rows: &[Vec<String>]) -> Result<String, AppError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Csv(format!("Failed to flush CSV writer: {}", e.error())))?;
    let mut text = String::from_utf8(bytes)
        .map_err(|e| AppError::Csv(format!("CSV output is not UTF-8: {}", e)))?;

    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}
