//! Fuzz target for the source readers.
//!
//! Every format must either produce a table or return an error on
//! arbitrary bytes; panics are bugs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tabgraph::input::{Reader, ReaderConfig};
use tabgraph::SourceFormat;

fuzz_target!(|data: &[u8]| {
    // Only process reasonable-sized inputs to avoid OOM
    if data.len() > 100_000 {
        return;
    }

    for format in [
        SourceFormat::Csv,
        SourceFormat::Tsv,
        SourceFormat::Json,
        SourceFormat::Xml,
    ] {
        let _ = Reader::new().read_bytes(data, format);
    }

    let latin1 = Reader::with_config(ReaderConfig {
        encoding: "latin1".to_string(),
        skip_rows: 1,
        max_rows: Some(10),
        ..ReaderConfig::default()
    });
    let _ = latin1.read_bytes(data, SourceFormat::Csv);
});
