//! Loading record collections from data files

use crate::config::StoreConfig;
use crate::error::{StoreContext, StoreError, StoreResult};
use crate::record::Record;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Load every record of the file at `path`, in file order
pub fn load(path: &Path, config: &StoreConfig) -> StoreResult<Vec<Record>> {
    let file = File::open(path).with_file_context(&path.display().to_string())?;
    read_records(file, config)
}

/// Parse records from a reader, one per line, checked against `config`'s limits.
///
/// Blank lines are skipped; any other line that does not decode is fatal.
pub fn read_records<R: Read>(reader: R, config: &StoreConfig) -> StoreResult<Vec<Record>> {
    let reader = BufReader::new(reader);
    let mut records = Vec::new();

    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let line_no = idx + 1;
        let bytes = bytes?;
        let line = std::str::from_utf8(&bytes)
            .map_err(|_| StoreError::parse_error(line_no, "line is not valid UTF-8"))?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(Record::parse_line(line, line_no, config)?);
    }

    Ok(records)
}
