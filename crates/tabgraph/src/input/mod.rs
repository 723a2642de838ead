//! Source reading and the format-agnostic row abstraction.

mod reader;
mod source;

pub use reader::{Reader, ReaderConfig};
pub use source::{DataTable, Row, SourceFormat, SourceMetadata};
