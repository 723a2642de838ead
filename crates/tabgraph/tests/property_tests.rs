//! Property-based tests for type detection, coercion, suggestion and import.
//!
//! Properties checked:
//! 1. **No panics**: detection, coercion and suggestion accept any input
//! 2. **Determinism**: the same input always produces the same output
//! 3. **Invariants**: node ids stay unique and levels stay positive
//!
//! ```bash
//! PROPTEST_CASES=10000 cargo test -p tabgraph --test property_tests
//! ```

use std::collections::HashSet;
use std::io::Write;

use proptest::prelude::*;
use tempfile::NamedTempFile;

use tabgraph::validation::TypeValidator;
use tabgraph::{suggest, DataType, ImportConfig, Importer, Value};

// =============================================================================
// Test Strategies
// =============================================================================

/// Arbitrary cell text, including null tokens and numeric-looking values.
fn cell() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9_\\-\\.\\s]{0,20}",
        "-?[0-9]{1,12}",
        "-?[0-9]{1,6}\\.[0-9]{1,6}",
        "(true|false|TRUE|yes|no|1|0)",
        "20[0-9]{2}-[01][0-9]-[0-3][0-9]",
        "(NA|null|N/A|none|\\.|-|)",
    ]
}

fn data_type() -> impl Strategy<Value = DataType> {
    prop::sample::select(DataType::ALL.to_vec())
}

/// Column names like the ones found in exported spreadsheets.
fn column_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "(id|name|source|target|from|to|weight|level|type|score)",
        "[A-Za-z][A-Za-z0-9 _\\-]{0,15}",
    ]
}

// =============================================================================
// Type Detection
// =============================================================================

proptest! {
    #[test]
    fn detection_is_deterministic(values in prop::collection::vec(cell(), 0..60)) {
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let validator = TypeValidator::new();
        prop_assert_eq!(validator.detect_data_type(&refs), validator.detect_data_type(&refs));
    }

    #[test]
    fn detected_type_coerces_every_value(values in prop::collection::vec(cell(), 1..60)) {
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let detected = TypeValidator::new().detect_data_type(&refs);

        // Samples cover the whole column below the sample size.
        for value in &refs {
            prop_assert!(
                TypeValidator::coerce(value, detected).is_ok(),
                "{:?} detected as {} but does not coerce", value, detected
            );
        }
    }

    #[test]
    fn integers_detect_as_integer(values in prop::collection::vec(any::<i64>(), 1..50)) {
        let owned: Vec<String> = values.iter().map(i64::to_string).collect();
        let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
        prop_assert_eq!(TypeValidator::new().detect_data_type(&refs), DataType::Integer);
    }
}

// =============================================================================
// Coercion
// =============================================================================

proptest! {
    #[test]
    fn coercion_never_panics(raw in ".{0,40}", target in data_type()) {
        let _ = TypeValidator::coerce(&raw, target);
    }

    #[test]
    fn coercion_result_matches_target(raw in cell(), target in data_type()) {
        if let Ok(value) = TypeValidator::coerce(&raw, target) {
            prop_assert!(value.is_null() || value.data_type() == Some(target));
        }
    }

    #[test]
    fn float_coercion_round_trips(f in -1.0e12f64..1.0e12) {
        let value = TypeValidator::coerce(&f.to_string(), DataType::Float).unwrap();
        prop_assert_eq!(value, Value::Float(f));
    }
}

// =============================================================================
// Suggestion
// =============================================================================

proptest! {
    #[test]
    fn suggestion_uses_each_column_once(columns in prop::collection::vec(column_name(), 0..12)) {
        let suggestion = suggest(&columns);

        prop_assert_eq!(suggestion.fields.len(), columns.len());
        prop_assert_eq!(suggestion.mapping.len(), columns.len());
        for field in &suggestion.fields {
            prop_assert!((0.0..=1.0).contains(&field.confidence));
        }
        prop_assert_eq!(suggest(&columns), suggestion);
    }
}

// =============================================================================
// Import Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn import_invariants(rows in prop::collection::vec(("[a-e]{0,1}", "-?[0-9]{1,2}|x|"), 0..30)) {
        let mut content = String::from("id,level\n");
        for (id, level) in &rows {
            content.push_str(&format!("{},{}\n", id, level));
        }
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let config = ImportConfig::new(file.path())
            .with_mapping("node_id", "id")
            .with_mapping("node_level", "level");
        let importer = Importer::new();
        let first = importer.import(&config);
        let second = importer.import(&config);

        prop_assert!(first.success);
        prop_assert_eq!(first.errors.is_empty(), first.success);
        let graph = first.graph_data.unwrap();

        let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        prop_assert_eq!(ids.len(), graph.nodes.len());
        prop_assert!(graph.nodes.iter().all(|n| n.level >= 1));
        prop_assert!(first.processed_rows <= first.total_rows);
        prop_assert_eq!(graph.nodes, second.graph_data.unwrap().nodes);
    }
}
