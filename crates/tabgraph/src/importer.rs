//! Import orchestrator and public API.

use std::fmt;
use std::fmt::Write as _;
use std::path::Path;

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ImportError, Result};
use crate::input::{DataTable, Reader, ReaderConfig, SourceMetadata};
use crate::mapping::{resolve, suggest, MappingSuggestion};
use crate::model::{DataType, GraphData, GraphMetadata, GraphSummary, ImportConfig};
use crate::transform::GraphTransformer;
use crate::validation::{
    validate_columns, validate_graph_structure, validate_mapping_config, Diagnostic,
    DiagnosticKind, Diagnostics, TypeDetectionConfig, TypeValidator,
};

/// Configuration shared by every call on an [`Importer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterConfig {
    pub type_detection: TypeDetectionConfig,
    /// Rows read by [`Importer::preview`] when the caller sets no cap.
    pub preview_rows: usize,
    /// Rows read before suggesting a mapping.
    pub suggestion_rows: usize,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            type_detection: TypeDetectionConfig::default(),
            preview_rows: 10,
            suggestion_rows: 100,
        }
    }
}

/// Pipeline stages, entered strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Idle,
    Reading,
    MappingResolution,
    Validating,
    Transforming,
    Done,
    Failed,
}

impl ImportStage {
    pub fn label(&self) -> &'static str {
        match self {
            ImportStage::Idle => "idle",
            ImportStage::Reading => "reading",
            ImportStage::MappingResolution => "mapping resolution",
            ImportStage::Validating => "validating",
            ImportStage::Transforming => "transforming",
            ImportStage::Done => "done",
            ImportStage::Failed => "failed",
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one import.
///
/// `errors` is non-empty exactly when `success` is false, and `graph_data`
/// is only present on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    /// Rows turned into a node or an edge.
    pub processed_rows: usize,
    /// Rows read from the source (after skip/max).
    pub total_rows: usize,
    pub graph_data: Option<GraphData>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// Human-readable trace of the run.
    pub import_log: String,
    /// Final state: `Done` or `Failed`.
    pub stage: ImportStage,
    /// Stage that was running when the import failed.
    pub failed_stage: Option<ImportStage>,
}

impl ImportResult {
    /// Summary of the imported graph, if any.
    pub fn summary(&self) -> Option<GraphSummary> {
        self.graph_data.as_ref().map(GraphData::summary)
    }

    /// Errors followed by warnings.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }

    /// Number of diagnostics of a kind.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics().filter(|d| d.kind == kind).count()
    }
}

/// Options for a bounded preview read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewOptions {
    /// Encoding label (None = utf-8).
    pub encoding: Option<String>,
    /// Row cap (None = the importer's `preview_rows`).
    pub max_rows: Option<usize>,
    pub skip_rows: usize,
    pub delimiter: Option<u8>,
}

impl PreviewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }
}

/// Columns, detected types and a bounded sample of raw rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub inferred_types: IndexMap<String, DataType>,
    pub sample_rows: Vec<IndexMap<String, String>>,
    /// Row count of the source, or None when the read stopped early.
    pub total_rows: Option<usize>,
}

/// Line-oriented, timestamped trace of one import.
struct ImportLog {
    text: String,
}

impl ImportLog {
    fn new(config: &ImportConfig) -> Self {
        let mut log = Self {
            text: String::new(),
        };
        log.line(format!("Import started at {}", Utc::now().to_rfc3339()));
        log.line(format!("File: {}", config.file_path.display()));
        log.line(format!("Encoding: {}", config.file_encoding));
        if config.skip_rows > 0 || config.max_rows.is_some() {
            log.line(format!(
                "Rows: skip {}, max {}",
                config.skip_rows,
                config
                    .max_rows
                    .map_or_else(|| "all".to_string(), |m| m.to_string())
            ));
        }
        log
    }

    fn line(&mut self, message: impl AsRef<str>) {
        let _ = writeln!(
            self.text,
            "[{}] {}",
            Utc::now().format("%H:%M:%S%.3f"),
            message.as_ref()
        );
    }

    fn stage(&mut self, stage: ImportStage) {
        self.line(format!("Stage: {}", stage));
    }

    fn source(&mut self, source: &SourceMetadata, table: &DataTable) {
        self.line(format!(
            "Read {} rows, {} columns ({}, {} bytes, {})",
            table.row_count(),
            table.column_count(),
            source.format,
            source.size_bytes,
            source.hash
        ));
    }

    fn mapping(&mut self, config: &ImportConfig) {
        for (role, column) in &config.mapping_config {
            self.line(format!("  {} <- {}", role, column));
        }
    }

    fn column_types(&mut self, types: &IndexMap<String, DataType>) {
        for (column, data_type) in types {
            self.line(format!("  {}: {}", column, data_type));
        }
    }

    fn summary(&mut self, summary: &GraphSummary) {
        self.line(format!(
            "Graph: {} nodes, {} edges",
            summary.total_nodes, summary.total_edges
        ));
        for (level, count) in &summary.node_levels {
            self.line(format!("  level {}: {} nodes", level, count));
        }
        for (rel, count) in &summary.edge_types {
            let rel = if rel.is_empty() { "(untyped)" } else { rel.as_str() };
            self.line(format!("  {}: {} edges", rel, count));
        }
    }

    fn finish(mut self, diagnostics: &Diagnostics, stage: ImportStage) -> String {
        self.line(format!(
            "{} errors, {} warnings",
            diagnostics.errors().len(),
            diagnostics.warnings().len()
        ));
        for diagnostic in diagnostics.errors().iter().chain(diagnostics.warnings()) {
            self.line(format!("  {} {}", diagnostic.id, diagnostic));
        }
        self.line(format!("Import {}", stage));
        self.text
    }
}

/// Runs the read, map, validate and transform pipeline.
///
/// An importer holds only configuration; each call builds its own state, so
/// one importer can serve concurrent callers.
pub struct Importer {
    config: ImporterConfig,
    validator: TypeValidator,
}

impl Importer {
    /// Create an importer with default configuration.
    pub fn new() -> Self {
        Self::with_config(ImporterConfig::default())
    }

    /// Create an importer with custom configuration.
    pub fn with_config(config: ImporterConfig) -> Self {
        let validator = TypeValidator::with_config(config.type_detection.clone());
        Self { config, validator }
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    /// Import a source file into a graph.
    ///
    /// Never returns an error: fatal problems are reported in
    /// `ImportResult::errors` with `success = false`.
    pub fn import(&self, config: &ImportConfig) -> ImportResult {
        let mut diagnostics = Diagnostics::new();
        let mut log = ImportLog::new(config);

        info!(file = %config.file_path.display(), "Starting import");

        // Reading
        log.stage(ImportStage::Reading);
        let reader = Reader::with_config(ReaderConfig {
            encoding: config.file_encoding.clone(),
            delimiter: config.delimiter,
            skip_rows: config.skip_rows,
            max_rows: config.max_rows,
            ..ReaderConfig::default()
        });
        let (table, source) = match reader.read_file(&config.file_path) {
            Ok(read) => read,
            Err(err) => return self.fail(ImportStage::Reading, err, diagnostics, log, 0),
        };
        log.source(&source, &table);
        debug!(
            rows = table.row_count(),
            columns = table.column_count(),
            format = %source.format,
            "Read source"
        );

        // Mapping resolution
        log.stage(ImportStage::MappingResolution);
        log.mapping(config);
        diagnostics.extend(validate_mapping_config(&config.mapping_config, &table.columns));
        if diagnostics.has_errors() {
            return self.finish_failed(
                ImportStage::MappingResolution,
                diagnostics,
                log,
                table.row_count(),
            );
        }
        let mapping = match resolve(&config.mapping_config) {
            Ok(mapping) => mapping,
            Err(err) => {
                return self.fail(
                    ImportStage::MappingResolution,
                    err,
                    diagnostics,
                    log,
                    table.row_count(),
                );
            }
        };

        // Validating
        log.stage(ImportStage::Validating);
        let (column_types, column_diagnostics) =
            validate_columns(&table, &mapping, &config.data_types, &self.validator);
        diagnostics.extend(column_diagnostics);
        log.column_types(&column_types);

        // Transforming
        log.stage(ImportStage::Transforming);
        let outcome = GraphTransformer::new(&mapping, &column_types)
            .with_declared_types(&config.data_types)
            .with_dangling_edges(config.dangling_edges)
            .transform(&table, &mut diagnostics);
        diagnostics.extend(validate_graph_structure(&outcome.graph, config.dangling_edges));

        if outcome.processed_rows == 0 {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::EmptyDataset,
                if table.is_empty() {
                    "Source contains no data rows".to_string()
                } else {
                    format!("None of the {} rows produced a node or an edge", table.row_count())
                },
            ));
        }
        log.line(format!(
            "Processed {} of {} rows ({} nodes, {} edges, {} skipped)",
            outcome.processed_rows,
            table.row_count(),
            outcome.node_rows,
            outcome.edge_rows,
            outcome.skipped_rows
        ));

        if diagnostics.has_errors() {
            return self.finish_failed(
                ImportStage::Transforming,
                diagnostics,
                log,
                table.row_count(),
            );
        }

        let mut graph = outcome.graph;
        let summary = graph.summary();
        graph.metadata = GraphMetadata {
            source_file: source.file.clone(),
            source_format: source.format.to_string(),
            source_hash: source.hash.clone(),
            encoding: source.encoding.clone(),
            total_rows: table.row_count(),
            processed_rows: outcome.processed_rows,
            column_count: table.column_count(),
            column_types,
            levels: summary.node_levels.clone(),
            imported_at: Some(Utc::now()),
        };
        log.summary(&summary);

        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            warnings = diagnostics.warnings().len(),
            "Import complete"
        );

        let import_log = log.finish(&diagnostics, ImportStage::Done);
        let (errors, warnings) = diagnostics.into_parts();
        ImportResult {
            success: true,
            processed_rows: outcome.processed_rows,
            total_rows: table.row_count(),
            graph_data: Some(graph),
            errors,
            warnings,
            import_log,
            stage: ImportStage::Done,
            failed_stage: None,
        }
    }

    /// Read the first rows of a source and detect column types.
    ///
    /// Skips mapping and transformation entirely.
    pub fn preview(&self, path: impl AsRef<Path>, options: &PreviewOptions) -> Result<Preview> {
        let max_rows = options.max_rows.unwrap_or(self.config.preview_rows);
        let reader = Reader::with_config(ReaderConfig {
            encoding: options
                .encoding
                .clone()
                .unwrap_or_else(|| ReaderConfig::default().encoding),
            delimiter: options.delimiter,
            skip_rows: options.skip_rows,
            max_rows: Some(max_rows),
            ..ReaderConfig::default()
        });
        let (table, _) = reader.read_file(path)?;

        let inferred_types = table
            .columns
            .iter()
            .map(|column| {
                let values: Vec<&str> = table.column_values(column).collect();
                (column.clone(), self.validator.detect_data_type(&values))
            })
            .collect();

        Ok(Preview {
            total_rows: (!table.truncated).then(|| table.row_count()),
            sample_rows: table.rows.iter().map(|row| row.values.clone()).collect(),
            columns: table.columns,
            inferred_types,
        })
    }

    /// Suggest a mapping from the columns of a source.
    pub fn suggest_mapping(
        &self,
        path: impl AsRef<Path>,
        encoding: Option<&str>,
    ) -> Result<MappingSuggestion> {
        let mut options = PreviewOptions::new().with_max_rows(self.config.suggestion_rows);
        options.encoding = encoding.map(str::to_string);
        let preview = self.preview(path, &options)?;
        Ok(suggest(&preview.columns))
    }

    fn fail(
        &self,
        stage: ImportStage,
        err: ImportError,
        mut diagnostics: Diagnostics,
        log: ImportLog,
        total_rows: usize,
    ) -> ImportResult {
        diagnostics.push(err.to_diagnostic());
        self.finish_failed(stage, diagnostics, log, total_rows)
    }

    fn finish_failed(
        &self,
        stage: ImportStage,
        diagnostics: Diagnostics,
        mut log: ImportLog,
        total_rows: usize,
    ) -> ImportResult {
        warn!(
            stage = %stage,
            errors = diagnostics.errors().len(),
            "Import failed"
        );
        log.line(format!("Failed during {}", stage));

        let import_log = log.finish(&diagnostics, ImportStage::Failed);
        let (errors, warnings) = diagnostics.into_parts();
        ImportResult {
            success: false,
            processed_rows: 0,
            total_rows,
            graph_data: None,
            errors,
            warnings,
            import_log,
            stage: ImportStage::Failed,
            failed_stage: Some(stage),
        }
    }
}

impl Default for Importer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_import_nodes() {
        let file = csv_file("id,name\n1,Alice\n2,Bob\n");
        let config = ImportConfig::new(file.path())
            .with_mapping("node_id", "id")
            .with_mapping("node_name", "name");

        let result = Importer::new().import(&config);

        assert!(result.success, "{}", result.import_log);
        assert_eq!(result.processed_rows, 2);
        assert_eq!(result.total_rows, 2);
        assert_eq!(result.stage, ImportStage::Done);
        assert_eq!(result.failed_stage, None);
        let graph = result.graph_data.unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.metadata.source_format, "csv");
        assert!(graph.metadata.source_hash.starts_with("sha256:"));
        assert_eq!(graph.metadata.column_types["id"], DataType::Integer);
        assert_eq!(graph.metadata.levels[&1], 2);
        assert!(result.import_log.contains("Stage: transforming"));
    }

    #[test]
    fn test_missing_file_fails() {
        let config = ImportConfig::new("/nonexistent/nodes.csv").with_mapping("node_id", "id");
        let result = Importer::new().import(&config);

        assert!(!result.success);
        assert!(result.graph_data.is_none());
        assert_eq!(result.errors[0].kind, DiagnosticKind::FileNotFound);
        assert_eq!(result.stage, ImportStage::Failed);
        assert_eq!(result.failed_stage, Some(ImportStage::Reading));
    }

    #[test]
    fn test_unmapped_column_fails() {
        let file = csv_file("id,name\n1,Alice\n");
        let config = ImportConfig::new(file.path())
            .with_mapping("node_id", "id")
            .with_mapping("node_name", "full_name");

        let result = Importer::new().import(&config);

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, DiagnosticKind::MappingConfigInvalid);
        assert!(result.import_log.contains("Failed during mapping resolution"));
        assert_eq!(result.failed_stage, Some(ImportStage::MappingResolution));
    }

    #[test]
    fn test_reject_policy_fails() {
        let file = csv_file("from,to\na,b\n");
        let config = ImportConfig::new(file.path())
            .with_mapping("node_id", "from")
            .with_mapping("edge_source", "from")
            .with_mapping("edge_target", "to")
            .with_dangling_edges(crate::model::DanglingEdgePolicy::Reject);

        let result = Importer::new().import(&config);

        assert!(!result.success);
        assert_eq!(result.count(DiagnosticKind::DanglingEdgeReference), 1);
        assert!(result.graph_data.is_none());
        assert_eq!(result.failed_stage, Some(ImportStage::Transforming));
    }

    #[test]
    fn test_preview() {
        let file = csv_file("id,score\n1,1.5\n2,2.5\n3,3.5\n");
        let importer = Importer::new();

        let preview = importer
            .preview(file.path(), &PreviewOptions::new().with_max_rows(2))
            .unwrap();
        assert_eq!(preview.columns, vec!["id", "score"]);
        assert_eq!(preview.inferred_types["score"], DataType::Float);
        assert_eq!(preview.sample_rows.len(), 2);
        assert_eq!(preview.total_rows, None);

        let full = importer.preview(file.path(), &PreviewOptions::new()).unwrap();
        assert_eq!(full.total_rows, Some(3));
    }

    #[test]
    fn test_suggest_mapping() {
        let file = csv_file("source,target,weight\na,b,1\n");
        let suggestion = Importer::new().suggest_mapping(file.path(), None).unwrap();

        assert_eq!(suggestion.mapping["edge_source"], "source");
        assert_eq!(suggestion.mapping["edge_target"], "target");
        assert_eq!(suggestion.mapping["edge_weight"], "weight");
    }
}
