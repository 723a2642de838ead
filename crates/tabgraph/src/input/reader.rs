//! Readers turning CSV/TSV, JSON and XML sources into a [`DataTable`].

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use indexmap::{IndexMap, IndexSet};
use quick_xml::events::{BytesStart, Event};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use super::source::{DataTable, Row, SourceFormat, SourceMetadata};
use crate::error::{ImportError, Result};

/// Delimiters to try when auto-detecting.
const DELIMITERS: &[u8] = &[b'\t', b',', b';', b'|'];

/// Keys of a JSON envelope object that may hold the record array.
const JSON_RECORD_KEYS: &[&str] = &["data", "records", "items", "nodes", "edges"];

/// Element names recognised as XML records, in priority order.
const XML_RECORD_TAGS: &[&str] = &["record", "item", "node", "edge", "row", "entry"];

/// Reader configuration.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Encoding label (utf-8, latin1, windows-1252, utf-16le, ...).
    pub encoding: String,
    /// CSV delimiter (None = tab for .tsv, auto-detect for .csv).
    pub delimiter: Option<u8>,
    /// CSV lines before the header, or leading JSON/XML records, to skip.
    pub skip_rows: usize,
    /// Maximum data rows to read (None = all).
    pub max_rows: Option<usize>,
    /// Quote character.
    pub quote: u8,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            delimiter: None,
            skip_rows: 0,
            max_rows: None,
            quote: b'"',
        }
    }
}

/// Reads source files into format-agnostic rows.
pub struct Reader {
    config: ReaderConfig,
}

impl Reader {
    /// Create a reader with default configuration.
    pub fn new() -> Self {
        Self {
            config: ReaderConfig::default(),
        }
    }

    /// Create a reader with custom configuration.
    pub fn with_config(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Read a file and return the data table and metadata.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<(DataTable, SourceMetadata)> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)?;

        let mut file = File::open(path).map_err(|e| io_error(path, e))?;
        let size_bytes = file.metadata().map_err(|e| io_error(path, e))?.len();

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| io_error(path, e))?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let hash = format!("sha256:{:x}", hasher.finalize());

        let table = self.read_bytes(&contents, format)?;

        let metadata = SourceMetadata::new(
            path.to_path_buf(),
            hash,
            size_bytes,
            format,
            self.config.encoding.clone(),
            table.row_count(),
            table.column_count(),
        );

        Ok((table, metadata))
    }

    /// Decode and parse raw bytes of a known format.
    pub fn read_bytes(&self, bytes: &[u8], format: SourceFormat) -> Result<DataTable> {
        let text = decode(bytes, &self.config.encoding)?;
        if text.trim().is_empty() {
            return Ok(DataTable::default());
        }

        match format {
            SourceFormat::Csv => {
                let delimiter = self.config.delimiter.unwrap_or_else(|| {
                    let body: Vec<&str> = text.lines().skip(self.config.skip_rows).collect();
                    detect_delimiter(&body.join("\n"))
                });
                self.read_csv(&text, delimiter)
            }
            SourceFormat::Tsv => self.read_csv(&text, self.config.delimiter.unwrap_or(b'\t')),
            SourceFormat::Json => self.read_json(&text),
            SourceFormat::Xml => self.read_xml(&text),
        }
    }

    /// Parse delimited text. The first non-skipped line is the header.
    fn read_csv(&self, text: &str, delimiter: u8) -> Result<DataTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .quote(self.config.quote)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records().skip(self.config.skip_rows);

        let header = match records.next() {
            Some(record) => record?,
            None => return Ok(DataTable::default()),
        };
        let columns = normalize_headers(header.iter());

        let mut rows = Vec::new();
        let mut truncated = false;

        for result in records {
            if self.config.max_rows.is_some_and(|max| rows.len() >= max) {
                truncated = true;
                break;
            }

            let record = result?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let mut values = IndexMap::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                values.insert(column.clone(), record.get(i).unwrap_or("").to_string());
            }
            rows.push(Row::new(rows.len(), values));
        }

        let mut table = DataTable::new(columns, rows);
        table.truncated = truncated;
        Ok(table)
    }

    /// Parse a JSON array of flat objects (or an envelope holding one).
    fn read_json(&self, text: &str) -> Result<DataTable> {
        let document: JsonValue = serde_json::from_str(text)?;

        let items = match document {
            JsonValue::Array(items) => items,
            JsonValue::Object(mut map) => {
                let key = JSON_RECORD_KEYS
                    .iter()
                    .copied()
                    .find(|k| matches!(map.get(*k), Some(JsonValue::Array(_))));
                match key.and_then(|k| map.remove(k)) {
                    Some(JsonValue::Array(items)) => items,
                    _ => vec![JsonValue::Object(map)],
                }
            }
            other => {
                return Err(ImportError::Parse {
                    format: "json".to_string(),
                    message: format!("expected an array of objects, found {}", json_kind(&other)),
                });
            }
        };

        let records = items.into_iter().map(|item| match item {
            JsonValue::Object(map) => map
                .into_iter()
                .map(|(key, value)| (key, json_cell(&value)))
                .collect(),
            scalar => vec![("value".to_string(), json_cell(&scalar))],
        });

        Ok(self.table_from_records(records))
    }

    /// Parse XML whose root holds repeated record elements.
    fn read_xml(&self, text: &str) -> Result<DataTable> {
        let Some(root) = parse_xml_tree(text)? else {
            return Ok(DataTable::default());
        };

        let records = find_xml_records(&root).into_iter().map(|record| {
            let mut fields: IndexMap<String, String> = IndexMap::new();
            for (name, value) in &record.attributes {
                fields.insert(name.clone(), value.clone());
            }
            for child in &record.children {
                fields.insert(child.name.clone(), child.text_content());
            }
            fields.into_iter().collect::<Vec<_>>()
        });

        Ok(self.table_from_records(records))
    }

    /// Build a table from keyed records, applying skip/max and taking the
    /// union of keys (first-seen order) as columns.
    fn table_from_records(
        &self,
        records: impl Iterator<Item = Vec<(String, String)>>,
    ) -> DataTable {
        let mut columns: IndexSet<String> = IndexSet::new();
        let mut kept: Vec<IndexMap<String, String>> = Vec::new();
        let mut truncated = false;

        for record in records.skip(self.config.skip_rows) {
            if self.config.max_rows.is_some_and(|max| kept.len() >= max) {
                truncated = true;
                break;
            }
            let fields: IndexMap<String, String> = record.into_iter().collect();
            for key in fields.keys() {
                if !columns.contains(key) {
                    columns.insert(key.clone());
                }
            }
            kept.push(fields);
        }

        let columns: Vec<String> = columns.into_iter().collect();
        let rows = kept
            .into_iter()
            .enumerate()
            .map(|(index, mut fields)| {
                let values = columns
                    .iter()
                    .map(|c| (c.clone(), fields.swap_remove(c).unwrap_or_default()))
                    .collect();
                Row::new(index, values)
            })
            .collect();

        let mut table = DataTable::new(columns, rows);
        table.truncated = truncated;
        table
    }
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ImportError {
    if source.kind() == ErrorKind::NotFound {
        ImportError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        ImportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Decode bytes with the named encoding. Malformed input is an error.
fn decode(bytes: &[u8], label: &str) -> Result<String> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ImportError::Encoding(format!("unknown encoding '{}'", label)))?;

    let bytes = if encoding == UTF_8 {
        bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
    } else {
        bytes
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            ImportError::Encoding(format!("input is not valid {}", encoding.name()))
        })
}

/// Trim header names, name blank headers by position and suffix duplicates.
fn normalize_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: IndexMap<String, usize> = IndexMap::new();
    let mut columns = Vec::new();

    for (i, name) in raw.enumerate() {
        let mut name = name.trim().to_string();
        if name.is_empty() {
            name = format!("column_{}", i + 1);
        }

        let count = seen.entry(name.clone()).or_insert(0);
        if *count > 0 {
            columns.push(format!("{}.{}", name, count));
        } else {
            columns.push(name);
        }
        *count += 1;
    }

    columns
}

fn json_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Minimal owned XML element tree.
#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();

        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            attributes.push((local, attr.unescape_value()?.into_owned()));
        }

        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    /// Own text followed by descendant text, space separated.
    fn text_content(&self) -> String {
        let mut parts = Vec::new();
        if !self.text.trim().is_empty() {
            parts.push(self.text.trim().to_string());
        }
        for child in &self.children {
            let text = child.text_content();
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts.join(" ")
    }
}

fn parse_xml_tree(text: &str) -> Result<Option<XmlElement>> {
    let mut reader = quick_xml::Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(XmlElement::from_start(&start)?),
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ImportError::Parse {
            format: "xml".to_string(),
            message: format!("element <{}> is never closed", open.name),
        });
    }

    Ok(root)
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn find_xml_records(root: &XmlElement) -> Vec<&XmlElement> {
    for tag in XML_RECORD_TAGS {
        let mut found = Vec::new();
        collect_named(root, tag, &mut found);
        if !found.is_empty() {
            return found;
        }
    }
    root.children.iter().collect()
}

fn collect_named<'a>(element: &'a XmlElement, tag: &str, out: &mut Vec<&'a XmlElement>) {
    for child in &element.children {
        if child.name == tag {
            out.push(child);
        } else {
            collect_named(child, tag, out);
        }
    }
}

/// Detect the delimiter by analyzing the first few lines (comma if undecidable).
fn detect_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_delimiter_in_line(line, delim))
            .collect();

        let Some(&first_count) = counts.first() else {
            continue;
        };
        if first_count == 0 {
            continue;
        }

        let consistent = counts.iter().all(|&c| c == first_count);
        let variance: f64 = if counts.len() > 1 {
            let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
            counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / counts.len() as f64
        } else {
            0.0
        };

        // Higher count with lower variance wins; tab gets a slight bonus.
        let score = if consistent {
            first_count * 1000 + (if delim == b'\t' { 100 } else { 0 })
        } else if variance < 1.0 {
            first_count * 100
        } else {
            first_count
        };

        if score > best_score {
            best_score = score;
            best_delimiter = delim;
        }
    }

    best_delimiter
}

/// Count delimiter occurrences in a line, respecting quotes.
fn count_delimiter_in_line(line: &str, delimiter: u8) -> usize {
    let delim_char = delimiter as char;
    let mut count = 0;
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == delim_char && !in_quotes => count += 1,
            _ => {}
        }
    }

    count
}
