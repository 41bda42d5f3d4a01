//! cv-forge – renders a YAML résumé into a themed PDF.
//!
//! Usage:
//!   cv-forge [--theme <name> | -t <name>] [input.yml] [output.pdf]
//!
//! Tokens may appear in any order. The input defaults to `cv.yml` and the
//! output to the input name with `.yml` replaced by `.pdf`.

use std::{env, process};

use cv_forge::pipeline::run;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    match run(&args) {
        Ok(outcome) => {
            eprintln!(
                "Wrote '{}' ({} bytes, {} page{})",
                outcome.output.display(),
                outcome.bytes,
                outcome.pages,
                if outcome.pages == 1 { "" } else { "s" }
            );
        }
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_usage_error() {
                print_usage();
            }
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  cv-forge [--theme <name>] [input.yml] [output.pdf]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  input.yml          YAML résumé (default: cv.yml)");
    eprintln!("  output.pdf         Output path (default: input name with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!(
        "  --theme, -t NAME   Theme from the bundled set or ./themes/NAME/index.html (default: default)"
    );
    eprintln!();
    eprintln!("Set RUST_LOG=debug for resolution and layout details.");
}
