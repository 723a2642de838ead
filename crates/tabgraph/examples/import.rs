//! Example: Import a data file as a graph using a suggested mapping.
//!
//! Usage:
//!   cargo run --example import -- <file_path>
//!
//! Example:
//!   cargo run --example import -- org_chart.csv

use std::env;
use std::path::Path;

use tabgraph::{ImportConfig, Importer, PreviewOptions, Severity};

fn main() -> tabgraph::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cargo run --example import -- <file_path>");
        eprintln!("\nExample:");
        eprintln!("  cargo run --example import -- org_chart.csv");
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    let importer = Importer::new();

    let separator = "=".repeat(80);
    println!("{}", separator);
    println!("Import: {}", path.display());
    println!("{}", separator);
    println!();

    // Preview columns and detected types
    let preview = importer.preview(path, &PreviewOptions::new())?;
    println!("## Columns ({})", preview.columns.len());
    for (column, data_type) in &preview.inferred_types {
        println!("  {:24} {}", column, data_type);
    }
    println!();

    // Suggest a mapping from column names
    let suggestion = importer.suggest_mapping(path, None)?;
    println!("## Suggested mapping");
    for field in &suggestion.fields {
        println!(
            "  {:24} <- {:24} (confidence: {:.0}%)",
            field.role,
            field.column,
            field.confidence * 100.0
        );
    }
    println!();

    let config = ImportConfig::new(path).with_mapping_config(suggestion.mapping);
    let result = importer.import(&config);

    println!(
        "## Result: {} ({} of {} rows processed)",
        if result.success { "success" } else { "failed" },
        result.processed_rows,
        result.total_rows
    );
    println!();

    for diagnostic in result.diagnostics() {
        let marker = match diagnostic.severity {
            Severity::Error => "E",
            Severity::Warning => "W",
            Severity::Info => "I",
        };
        println!("  {} {}", marker, diagnostic);
    }
    println!();

    if let Some(summary) = result.summary() {
        println!("## Graph");
        println!("  Nodes: {}", summary.total_nodes);
        println!("  Edges: {}", summary.total_edges);
        for (level, count) in &summary.node_levels {
            println!("  Level {}: {} nodes", level, count);
        }
        println!();
    }

    println!("{}", separator);

    Ok(())
}
