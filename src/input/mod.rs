//! Streaming dataset reader.
//!
//! Records are cut from the raw byte stream line by line, split with the
//! `csv` crate and every cell is then decoded with a fixed `encoding_rs` encoding. Only ASCII-compatible
//! encodings are accepted, so the delimiter and quote bytes can never be
//! part of a multi-byte sequence and per-cell decoding matches decoding the
//! whole file up front.

use csv::{ByteRecord, ReaderBuilder};
use encoding_rs::Encoding;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Failures while reading the dataset.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("unknown text encoding '{label}'")]
    UnknownEncoding { label: String },

    #[error("encoding '{name}' is not ASCII-compatible and cannot be read cell by cell")]
    UnsupportedEncoding { name: &'static str },

    #[error("delimiter '{0}' is not a single ASCII character")]
    InvalidDelimiter(char),

    #[error("line {line}: bytes are not valid {encoding}")]
    Undecodable { line: u64, encoding: &'static str },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// How to split and decode the dataset.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: char,
    pub encoding: &'static Encoding,
}

impl ReadOptions {
    /// Resolve a delimiter and a WHATWG encoding label.
    pub fn new(delimiter: char, encoding_label: &str) -> Result<Self, InputError> {
        if !delimiter.is_ascii() {
            return Err(InputError::InvalidDelimiter(delimiter));
        }

        let encoding = Encoding::for_label(encoding_label.trim().as_bytes()).ok_or_else(|| {
            InputError::UnknownEncoding {
                label: encoding_label.to_string(),
            }
        })?;
        if !encoding.is_ascii_compatible() {
            return Err(InputError::UnsupportedEncoding {
                name: encoding.name(),
            });
        }

        Ok(Self {
            delimiter,
            encoding,
        })
    }
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based line the record starts on.
    pub line: u64,
    pub cells: Vec<String>,
}

/// Record-at-a-time reader over a delimited dataset.
///
/// Physical lines are joined while a quoted field is still open, so a
/// quoted cell may span lines. A blank line outside quotes is returned as a row with no
/// cells instead of being skipped.
pub struct DatasetReader<R: BufRead> {
    source: R,
    parser: ReaderBuilder,
    delimiter: u8,
    encoding: &'static Encoding,
    line: u64,
    raw: Vec<u8>,
    record: ByteRecord,
}

impl DatasetReader<BufReader<File>> {
    /// Open a dataset file.
    pub fn open(path: &Path, options: &ReadOptions) -> std::io::Result<Self> {
        let file = File::open(path)?;
        debug!(
            "Reading {} as {} with delimiter {:?}",
            path.display(),
            options.encoding.name(),
            options.delimiter
        );
        Ok(Self::from_reader(BufReader::new(file), options))
    }
}

impl<R: BufRead> DatasetReader<R> {
    /// Wrap any buffered byte source.
    pub fn from_reader(source: R, options: &ReadOptions) -> Self {
        let mut parser = ReaderBuilder::new();
        parser
            .has_headers(false)
            .flexible(true)
            .delimiter(options.delimiter as u8);

        Self {
            source,
            parser,
            delimiter: options.delimiter as u8,
            encoding: options.encoding,
            line: 0,
            raw: Vec::new(),
            record: ByteRecord::new(),
        }
    }

    /// Read and decode the next record, `None` at end of input.
    pub fn next_row(&mut self) -> Result<Option<Row>, InputError> {
        self.raw.clear();
        let line = self.line + 1;

        loop {
            if self.source.read_until(b'\n', &mut self.raw)? == 0 {
                break;
            }
            self.line += 1;
            if !ends_in_quotes(&self.raw, self.delimiter) {
                break;
            }
        }

        if self.raw.is_empty() {
            return Ok(None);
        }

        let content = strip_terminator(&self.raw);
        if content.is_empty() {
            return Ok(Some(Row {
                line,
                cells: Vec::new(),
            }));
        }

        let mut parser = self.parser.from_reader(content);
        if !parser.read_byte_record(&mut self.record)? {
            self.record.clear();
        }

        let cells = self
            .record
            .iter()
            .map(|cell| {
                let text = if has_undefined_byte(self.encoding, cell) {
                    None
                } else {
                    self.encoding
                        .decode_without_bom_handling_and_without_replacement(cell)
                };
                text.map(|text| text.into_owned())
                    .ok_or(InputError::Undecodable {
                        line,
                        encoding: self.encoding.name(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Row { line, cells }))
    }
}

/// Windows-1251 leaves 0x98 unassigned; WHATWG decodes it to U+0098.
fn has_undefined_byte(encoding: &'static Encoding, cell: &[u8]) -> bool {
    encoding == encoding_rs::WINDOWS_1251 && cell.contains(&0x98)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Whether `raw` stops inside an open quoted field.
///
/// A quote only opens a field at its start; elsewhere it is literal. A
/// doubled quote inside a quoted field stays inside it.
fn ends_in_quotes(raw: &[u8], delimiter: u8) -> bool {
    let mut state = Scan::FieldStart;
    for &b in raw {
        state = match (state, b) {
            (Scan::Quoted, b'"') => Scan::QuoteInQuoted,
            (Scan::Quoted, _) => Scan::Quoted,
            (Scan::QuoteInQuoted, b'"') | (Scan::FieldStart, b'"') => Scan::Quoted,
            (_, b'\n') | (_, b'\r') => Scan::FieldStart,
            (_, b) if b == delimiter => Scan::FieldStart,
            _ => Scan::Unquoted,
        };
    }
    state == Scan::Quoted
}

fn strip_terminator(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}
