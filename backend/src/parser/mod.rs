//! CSV to JSON rows, with encoding and delimiter auto-detection.
//!
//! Every row becomes a JSON object keyed by header, with string values.
//! No demographic logic here: [`crate::ingest`] maps rows to records.

use serde_json::{Map, Value};
use std::path::Path;

/// CSV parsing error with context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => {
                write!(f, "Line {}, column '{}': {}", self.line, col, self.message)
            }
            (None, Some(val)) => {
                write!(f, "Line {} (value '{}'): {}", self.line, val, self.message)
            }
            _ => {
                write!(f, "Line {}: {}", self.line, self.message)
            }
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows as JSON objects
    pub records: Vec<Value>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string. Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to `,` when the header holds a single column.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text into JSON objects with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use schoolmix::csv_to_json;
///
/// let rows = csv_to_json("school_id,white\nA,10", ',').unwrap();
/// assert_eq!(rows[0]["school_id"], "A");
/// assert_eq!(rows[0]["white"], "10");
/// ```
pub fn csv_to_json(csv: &str, delimiter: char) -> Result<Vec<Value>, CsvError> {
    read_rows(csv, delimiter).map(|(_, rows)| rows)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file '{}': {}", path.as_ref().display(), e)))?;

    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV bytes with a caller-provided delimiter; encoding is still detected.
pub fn parse_bytes_with_delimiter(bytes: &[u8], delimiter: char) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV text with an explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> Result<ParseResult, CsvError> {
    let (headers, records) = read_rows(content, delimiter)?;
    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

fn read_rows(content: &str, delimiter: char) -> Result<(Vec<String>, Vec<Value>), CsvError> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let delimiter_byte = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| CsvError::new(0, "Unsupported delimiter").with_value(delimiter.to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {}", e)))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    // A repeated name would silently overwrite the earlier cell
    let mut names = std::collections::HashSet::new();
    if let Some(dup) = headers.iter().filter(|h| !h.is_empty()).find(|h| !names.insert(h.as_str())) {
        return Err(CsvError::new(1, "Duplicate column").with_column(dup.clone()));
    }

    let mut rows = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let fallback_line = idx + 2; // +1 for 0-index, +1 for header
        let record = result
            .map_err(|e| CsvError::new(fallback_line, format!("Cannot read line: {}", e)))?;

        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let raw_value = record.get(i).unwrap_or("");
            obj.insert(header.clone(), Value::String(raw_value.to_string()));
        }

        rows.push(Value::Object(obj));
    }

    Ok((headers, rows))
}
