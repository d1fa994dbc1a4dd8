//! Newline-delimited JSON: the wire and at-rest format of a record stream.
//!
//! One record per line, UTF-8. Blank lines are skipped. Line numbers in
//! errors are 1-based.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use avsafe_ledger_core::{Record, Value};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::traits::{check_link, AppendResult, Entry, RecordStore};

const EXTENSION: &str = "jsonl";

/// Iterator over the parsed lines of an NDJSON stream.
///
/// Yields one item per non-blank line. A line that is not JSON yields
/// [`StoreError::Parse`] and iteration continues; an I/O error is yielded
/// once and ends the iteration.
pub struct Lines<R> {
    inner: std::io::Lines<R>,
    line: usize,
    done: bool,
}

impl<R: BufRead> Lines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: reader.lines(),
            line: 0,
            done: false,
        }
    }

    /// 1-based number of the line last read.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let text = match self.inner.next()? {
                Ok(text) => text,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            self.line += 1;
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<Value>(trimmed).map_err(|source| {
                warn!(line = self.line, error = %source, "malformed NDJSON line");
                StoreError::Parse {
                    line: self.line,
                    source,
                }
            });
            return Some(parsed);
        }
    }
}

/// Read every line as a JSON value. The first malformed line fails.
pub fn read_values<R: BufRead>(reader: R) -> Result<Vec<Value>> {
    Lines::new(reader).collect()
}

/// Read every line as a record. The first malformed line fails.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<Record>> {
    read_entries(reader)?.into_iter().collect()
}

/// Read every line, keeping damaged lines as errors in their position.
///
/// Only an I/O failure fails the whole read.
pub fn read_entries<R: BufRead>(reader: R) -> Result<Vec<Entry>> {
    let mut lines = Lines::new(reader);
    let mut entries = Vec::new();
    while let Some(item) = lines.next() {
        let entry = match item {
            Ok(value) => lift(value, lines.line()),
            Err(e) if e.is_line_error() => Err(e),
            Err(e) => return Err(e),
        };
        entries.push(entry);
    }
    Ok(entries)
}

fn lift(value: Value, line: usize) -> Result<Record> {
    Record::from_value(value).map_err(|e| StoreError::InvalidRecord {
        line,
        reason: e.to_string(),
    })
}

/// A record serialized as one newline-terminated line.
pub fn encode_line(record: &Record) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}

/// Write one record as a single line in one write.
pub fn write_record<W: Write>(writer: &mut W, record: &Record) -> Result<()> {
    writer.write_all(&encode_line(record)?)?;
    Ok(())
}

/// Write records, one per line.
pub fn write_records<W: Write>(mut writer: W, records: &[Record]) -> Result<()> {
    for record in records {
        write_record(&mut writer, record)?;
    }
    writer.flush()?;
    Ok(())
}

/// File-backed store: a directory holding one `<chain_id>.jsonl` per chain.
///
/// Appends are serialized through an internal lock and each record is
/// written before `append` returns. Heads are cached after first use. A
/// failed write is cut back off the file and the cached head dropped.
#[derive(Debug)]
pub struct JsonlStore {
    dir: PathBuf,
    heads: Mutex<HashMap<String, Option<Record>>>,
}

impl JsonlStore {
    /// Open (creating if needed) a store directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            heads: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a chain's file.
    pub fn chain_path(&self, chain_id: &str) -> Result<PathBuf> {
        validate_chain_id(chain_id)?;
        Ok(self.dir.join(format!("{}.{}", chain_id, EXTENSION)))
    }

    fn read_chain(&self, chain_id: &str) -> Result<Vec<Entry>> {
        let path = self.chain_path(chain_id)?;
        match File::open(&path) {
            Ok(file) => read_entries(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_records(&self, chain_id: &str) -> Result<Vec<Record>> {
        self.read_chain(chain_id)?.into_iter().collect()
    }
}

/// Append `line` to the file at `path`, truncating back to the previous
/// length if the write fails.
fn append_line(path: &Path, line: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    if let Err(e) = file.write_all(line) {
        if let Err(undo) = file.set_len(len) {
            warn!(path = %path.display(), error = %undo, "partial line left in chain file");
        }
        return Err(e.into());
    }
    Ok(())
}

impl RecordStore for JsonlStore {
    fn append(&self, chain_id: &str, record: &Record) -> Result<AppendResult> {
        let path = self.chain_path(chain_id)?;
        let mut heads = self.heads.lock().map_err(|_| StoreError::Poisoned)?;
        if !heads.contains_key(chain_id) {
            let last = self.read_records(chain_id)?.pop();
            heads.insert(chain_id.to_owned(), last);
        }
        let last = heads.get(chain_id).and_then(Option::as_ref);
        let result = check_link(chain_id, last, record)?;
        if result == AppendResult::Appended {
            let line = encode_line(record)?;
            if let Err(e) = append_line(&path, &line) {
                heads.remove(chain_id);
                return Err(e);
            }
            debug!(chain_id, hash = record.hash(), "record appended");
            heads.insert(chain_id.to_owned(), Some(record.clone()));
        }
        Ok(result)
    }

    fn records(&self, chain_id: &str) -> Result<Vec<Record>> {
        self.read_records(chain_id)
    }

    fn entries(&self, chain_id: &str) -> Result<Vec<Entry>> {
        self.read_chain(chain_id)
    }

    fn chain_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_chain_id(stem).is_ok() && fs::metadata(&path)?.len() > 0 {
                ids.push(stem.to_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn head(&self, chain_id: &str) -> Result<Option<String>> {
        let heads = self.heads.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(cached) = heads.get(chain_id) {
            return Ok(cached.as_ref().map(|r| r.hash().to_owned()));
        }
        drop(heads);
        Ok(self.read_records(chain_id)?.last().map(|r| r.hash().to_owned()))
    }
}

/// Chain ids are `[A-Za-z0-9_.-]+`, not starting with `.`.
fn validate_chain_id(chain_id: &str) -> Result<()> {
    let valid = !chain_id.is_empty()
        && !chain_id.starts_with('.')
        && chain_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidChainId(chain_id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_lines_skip_blank_and_number_errors() {
        let input = "{\"a\":1}\n\n   \n{oops\n{\"b\":2}\n";
        let items: Vec<Result<Value>> = Lines::new(Cursor::new(input)).collect();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(StoreError::Parse { line: 4, .. })));
        assert!(items[2].is_ok());
    }

    #[test]
    fn test_read_records_rejects_non_record() {
        let err = read_records(Cursor::new("{\"idx\":1}\n")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { line: 1, .. }));
        assert!(err.is_line_error());
    }

    #[test]
    fn test_chain_id_validation() {
        assert!(validate_chain_id("dev-1_case.2025").is_ok());
        for bad in ["", "../etc", ".hidden", "a/b", "a b"] {
            assert!(validate_chain_id(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
