//! Fuzz target for type detection and coercion.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tabgraph::validation::TypeValidator;
use tabgraph::DataType;

#[derive(Debug, Arbitrary)]
struct Input {
    values: Vec<String>,
    target: u8,
}

fuzz_target!(|input: Input| {
    let refs: Vec<&str> = input.values.iter().map(String::as_str).collect();
    let validator = TypeValidator::new();
    let detected = validator.detect_data_type(&refs);

    // Within the sample size, every value coerces to the detected type.
    if refs.len() <= validator.config().sample_size {
        for value in &refs {
            assert!(TypeValidator::coerce(value, detected).is_ok());
        }
    }

    let target = DataType::ALL[input.target as usize % DataType::ALL.len()];
    for value in &refs {
        let _ = TypeValidator::coerce(value, target);
    }
});
