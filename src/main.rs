use clap::Parser as ClapParser;
use std::process::exit;
use tracegen::generator::{Cli, Generator};

/// The main entry point for the application.
fn main() {
    env_logger::init();
    if !run() {
        exit(1);
    }
}

/// Parses command-line arguments and runs the generator.
fn run() -> bool {
    let cli = Cli::parse();
    let mut generator = Generator::new(cli);
    match generator.run() {
        Ok(()) => {
            generator.flush_diagnostics();
            true
        }
        Err(e) => {
            generator.flush_diagnostics();
            generator.report_error(&e);
            false
        }
    }
}
