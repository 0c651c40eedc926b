//! Generator driver: command line plus the one-pass pipeline.

use crate::diagnostic::Diagnostics;
use crate::emit::Emitter;
use crate::error::{self, Error, Report};
use crate::logger::Logger;
use crate::model::Model;
use crate::options::GenOptions;
use crate::parser;
use crate::preprocess::Preprocessor;
use clap::Parser as ClapParser;
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line arguments for the decoder generator.
#[derive(ClapParser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The input description file
    #[arg()]
    pub input_file: String,

    /// Output file
    #[arg(short, long)]
    pub output_file: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Maximum number of call declarations per input
    #[arg(long, default_value_t = 4096)]
    pub max_calls: usize,

    /// Maximum conditional nesting depth
    #[arg(long, default_value_t = 16)]
    pub max_cond_depth: usize,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            input_file: String::new(),
            output_file: None,
            verbose: false,
            max_calls: GenOptions::default().max_calls,
            max_cond_depth: GenOptions::default().max_cond_depth,
        }
    }
}

/// Drives the whole pipeline for one input description and one output
/// file per invocation.
pub struct Generator {
    cli: Cli,
    logger: Logger,
    diag: Diagnostics,
}

impl Generator {
    pub fn new(cli: Cli) -> Self {
        let logger = Logger::new(cli.verbose);
        Self {
            cli,
            logger,
            diag: Diagnostics::new(),
        }
    }

    /// Reads the input file, generates, and writes the output file.
    pub fn run(&mut self) -> Result<(), Error> {
        let source = fs::read_to_string(&self.cli.input_file)?;
        let input_name = self.cli.input_file.clone();
        let output = self.generate(&input_name, &source)?;

        let out_path = match &self.cli.output_file {
            Some(path) => PathBuf::from(path),
            None => Path::new(&self.cli.input_file).with_extension("c"),
        };
        fs::write(&out_path, output)?;
        self.logger.log(&format!("wrote {}", out_path.display()));
        Ok(())
    }

    /// Runs the pipeline over in-memory source; also backs the tests.
    pub fn generate(&mut self, input_name: &str, source: &str) -> Result<String, Error> {
        self.logger.log("parsing description");
        let root = parser::parse(source)?;

        let opts = GenOptions {
            max_calls: self.cli.max_calls,
            max_cond_depth: self.cli.max_cond_depth,
            ..GenOptions::default()
        };
        let mut model = Model::new();
        let preprocessor = Preprocessor::new(&mut model, &mut self.diag, opts);
        let out = preprocessor.process(&root)?;
        self.logger.log(&format!(
            "{} calls in {} top-level groups",
            out.calls.len(),
            out.groups.len()
        ));

        let emitter = Emitter::new(&model, &mut self.diag, &out, opts);
        Ok(emitter.emit(input_name))
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    /// Prints collected non-fatal diagnostics to stderr.
    pub fn flush_diagnostics(&self) {
        self.diag.flush(&self.cli.input_file);
    }

    /// Prints a fatal error to stderr.
    pub fn report_error(&self, err: &Error) {
        let report = Report::new(
            err.to_string(),
            Some(self.cli.input_file.clone()),
            err.location(),
        );
        error::report(&report);
    }
}
