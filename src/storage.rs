//! Tabular persistence for the detection log.
//!
//! The on-disk format is CSV with a fixed header
//! `FrameNumber,DebrisName,DetectionTime,X,Y` and one row per detection in
//! log order. Every field passes through a `FieldCodec` on the way out and
//! its inverse on the way in, so the file can hold either plaintext or sealed
//! (hex-armored ciphertext) cells with the same shape.
//!
//! Load is all-or-nothing: the first field that fails to decode or parse
//! aborts the whole operation with a typed `DecodeError`, and the caller
//! installs nothing.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use std::path::Path;
use std::str::FromStr;

use crate::crypto::FieldCodec;
use crate::log::DetectionRecord;

pub const CSV_COLUMNS: [&str; 5] = ["FrameNumber", "DebrisName", "DetectionTime", "X", "Y"];

/// Second-resolution wall-clock format used in the DetectionTime column.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A field of a persisted row failed to decode or parse.
///
/// Carries enough position information to name the offending cell. Load
/// aborts on the first such failure; no partially decoded log is ever
/// returned.
#[derive(Debug)]
pub struct DecodeError {
    /// 1-based data row (the header row does not count).
    pub row: usize,
    pub column: &'static str,
    pub reason: String,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "row {}, column {}: {}",
            self.row, self.column, self.reason
        )
    }
}

impl std::error::Error for DecodeError {}

/// Write records as CSV, header first, one encoded row per record in order.
pub fn save_records(
    path: &Path,
    records: &[DetectionRecord],
    codec: &dyn FieldCodec,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {} for writing", path.display()))?;
    writer.write_record(CSV_COLUMNS)?;

    for record in records {
        let fields = [
            record.frame_number.to_string(),
            record.label.clone(),
            record.detected_at.format(TIME_FORMAT).to_string(),
            record.x.to_string(),
            record.y.to_string(),
        ];
        let mut encoded = Vec::with_capacity(fields.len());
        for field in &fields {
            encoded.push(codec.encode(field)?);
        }
        writer.write_record(&encoded)?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

/// Read records back, skipping the header and inverting the codec per field.
///
/// Any decode or parse failure aborts the load with a `DecodeError`; I/O
/// failures surface as ordinary errors. The in-memory log is the caller's to
/// leave untouched on failure.
pub fn load_records(path: &Path, codec: &dyn FieldCodec) -> Result<Vec<DetectionRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open {} for reading", path.display()))?;

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row_number = i + 1;
        let row = row.with_context(|| format!("failed to read row {}", row_number))?;
        if row.len() != CSV_COLUMNS.len() {
            return Err(anyhow!(
                "row {}: expected {} columns, got {}",
                row_number,
                CSV_COLUMNS.len(),
                row.len()
            ));
        }

        let frame_field = decode_field(codec, &row[0], row_number, CSV_COLUMNS[0])?;
        let frame_number = parse_field(frame_field, row_number, CSV_COLUMNS[0])?;
        let label = decode_field(codec, &row[1], row_number, CSV_COLUMNS[1])?;
        let time_field = decode_field(codec, &row[2], row_number, CSV_COLUMNS[2])?;
        let detected_at = parse_time(&time_field, row_number)?;
        let x_field = decode_field(codec, &row[3], row_number, CSV_COLUMNS[3])?;
        let x = parse_field(x_field, row_number, CSV_COLUMNS[3])?;
        let y_field = decode_field(codec, &row[4], row_number, CSV_COLUMNS[4])?;
        let y = parse_field(y_field, row_number, CSV_COLUMNS[4])?;

        records.push(DetectionRecord {
            frame_number,
            label,
            detected_at,
            x,
            y,
        });
    }
    Ok(records)
}

fn decode_field(
    codec: &dyn FieldCodec,
    stored: &str,
    row: usize,
    column: &'static str,
) -> Result<String> {
    codec.decode(stored).map_err(|e| {
        DecodeError {
            row,
            column,
            reason: e.to_string(),
        }
        .into()
    })
}

fn parse_field<T>(text: String, row: usize, column: &'static str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    text.parse().map_err(|e: T::Err| {
        DecodeError {
            row,
            column,
            reason: format!("invalid value {:?}: {}", text, e),
        }
        .into()
    })
}

fn parse_time(text: &str, row: usize) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIME_FORMAT).map_err(|e| {
        DecodeError {
            row,
            column: CSV_COLUMNS[2],
            reason: format!("invalid timestamp {:?}: {}", text, e),
        }
        .into()
    })
}
