//! Shared test helpers.

use crate::error::Error;
use crate::generator::{Cli, Generator};
use crate::StringId;

/// Test configuration constants
pub mod config {
    /// Input name used for in-memory generation
    pub const TEST_FILENAME: &str = "test.def";
}

/// Interns a string for tests.
pub fn sid(s: &str) -> StringId {
    StringId::new(s)
}

/// Runs the whole pipeline over in-memory source, returning the generated
/// text and the collected non-fatal diagnostic messages.
pub fn generate_with_diags(source: &str) -> (String, Vec<String>) {
    let mut generator = Generator::new(Cli {
        input_file: config::TEST_FILENAME.to_string(),
        ..Default::default()
    });
    let output = generator
        .generate(config::TEST_FILENAME, source)
        .expect("generation failed");
    let diags = generator
        .diagnostics()
        .messages()
        .iter()
        .map(|d| d.message.clone())
        .collect();
    (output, diags)
}

/// Runs the whole pipeline, asserting that no diagnostics were produced.
pub fn generate_clean(source: &str) -> String {
    let (output, diags) = generate_with_diags(source);
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
    output
}

/// Runs the whole pipeline expecting a fatal error.
pub fn generate_err(source: &str) -> Error {
    let mut generator = Generator::new(Cli {
        input_file: config::TEST_FILENAME.to_string(),
        ..Default::default()
    });
    generator
        .generate(config::TEST_FILENAME, source)
        .expect_err("generation unexpectedly succeeded")
}
