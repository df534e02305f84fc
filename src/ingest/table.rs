// src/ingest/table.rs - CP949 delimited tables
use anyhow::{Context, Result};
use encoding_rs::EUC_KR;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes read for the header-only probe. Header rows of the public extracts
/// are well under this.
const HEADER_PROBE_BYTES: u64 = 64 * 1024;

/// A decoded table: header row plus well-formed data rows.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows dropped because their field count differed from the header.
    pub malformed_rows: usize,
}

/// Decodes table bytes as CP949. A UTF-8 or UTF-16 BOM overrides the
/// default; malformed sequences become U+FFFD.
pub fn decode_table_bytes(bytes: &[u8]) -> String {
    let (text, _, _) = EUC_KR.decode(bytes);
    text.into_owned()
}

fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes())
}

fn first_record(text: &str) -> Option<Vec<String>> {
    let mut reader = csv_reader(text);
    let record = reader.records().next()?.ok()?;
    Some(record.iter().map(|f| f.trim().to_string()).collect())
}

/// Reads only the start of `path` and returns its header row.
pub fn probe_headers(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut head = Vec::new();
    file.take(HEADER_PROBE_BYTES)
        .read_to_end(&mut head)
        .with_context(|| format!("reading header of {}", path.display()))?;
    Ok(first_record(&decode_table_bytes(&head)).unwrap_or_default())
}

/// Parses decoded text into a table. The first record is the header.
pub fn parse_table(text: &str, source: &str) -> SourceTable {
    let mut reader = csv_reader(text);
    let mut records = reader.records();

    let headers: Vec<String> = match records.next() {
        Some(Ok(record)) => record.iter().map(|f| f.trim().to_string()).collect(),
        _ => {
            return SourceTable {
                source: source.to_string(),
                ..Default::default()
            }
        }
    };

    let mut rows = Vec::new();
    let mut malformed_rows = 0;
    for record in records {
        match record {
            Ok(record) if record.len() == headers.len() => {
                rows.push(record.iter().map(str::to_string).collect());
            }
            _ => malformed_rows += 1,
        }
    }

    SourceTable {
        source: source.to_string(),
        headers,
        rows,
        malformed_rows,
    }
}

pub fn load_table(path: &Path, source: &str) -> Result<SourceTable> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_table(&decode_table_bytes(&bytes), source))
}
