// ABOUTME: CSV ingest: line channel feeding batched bulk inserts

use crate::error::ScmError;
use crate::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::error;

use super::table::Table;
use super::Dataset;

/// Rows are buffered and handed to the table in bulk
const BATCH_SIZE: usize = 4096;
const LINE_CHANNEL_CAPACITY: usize = 512;

/// Stream a delimited file into a table. A reader thread feeds lines over a
/// bounded channel; the consumer splits on the single-byte delimiter, maps
/// fields to the schema columns in order (numeric-looking fields become
/// numbers, missing trailing fields nil) and bulk-inserts every
/// [BATCH_SIZE] rows. Empty lines are skipped.
pub fn load_csv(table: &Arc<Table>, filename: &Path, delimiter: &str) -> Result<(), ScmError> {
    if delimiter.len() != 1 {
        return Err(ScmError::runtime_error(
            "loadCSV",
            "delimiter must be 1 byte long",
        ));
    }
    let file = File::open(filename)
        .map_err(|e| ScmError::host_fault(&filename.display().to_string(), e))?;

    let (sender, receiver) = crossbeam_channel::bounded::<String>(LINE_CHANNEL_CAPACITY);
    let reader = std::thread::spawn(move || {
        for line in BufReader::new(file).lines() {
            match line {
                Ok(line) => {
                    if sender.send(line).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    error!("reading csv failed: {e}");
                    return;
                }
            }
        }
    });

    let columns = table.column_names();
    let mut buffer: Vec<Dataset> = Vec::with_capacity(BATCH_SIZE);
    for line in receiver {
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(delimiter);
        let mut row = Dataset::new();
        for column in &columns {
            match fields.next() {
                Some(field) => row.push(column, Value::simplify(field)),
                None => break,
            }
        }
        buffer.push(row);
        if buffer.len() >= BATCH_SIZE {
            table.insert_all(&buffer);
            buffer.clear();
        }
    }
    if !buffer.is_empty() {
        table.insert_all(&buffer);
    }
    let _ = reader.join();
    Ok(())
}
