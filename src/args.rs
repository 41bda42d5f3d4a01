//! Argument resolution – picks the theme, input and output paths out of the
//! raw command line.
//!
//! Arguments are order-independent tokens and anything unrecognised is
//! ignored, so `cv-forge -t classic me.yml` and `cv-forge me.yml foo -t
//! classic` are equivalent.

use crate::error::{Error, Result};

/// Theme used when no `--theme`/`-t` flag is given.
pub const DEFAULT_THEME: &str = "default";
/// Input file used when no `.yml` token is given.
pub const DEFAULT_INPUT_FILE: &str = "cv.yml";

pub const INPUT_EXTENSION: &str = ".yml";
pub const OUTPUT_EXTENSION: &str = ".pdf";

const THEME_FLAGS: [&str; 2] = ["--theme", "-t"];

/// Return the value following the first `--theme` or `-t` flag.
pub fn resolve_theme<S: AsRef<str>>(args: &[S]) -> Result<String> {
    let mut iter = args.iter().map(AsRef::as_ref);
    while let Some(arg) = iter.next() {
        if THEME_FLAGS.contains(&arg) {
            return match iter.next() {
                Some(theme) => Ok(theme.to_string()),
                None => Err(Error::MissingArgumentValue {
                    flag: arg.to_string(),
                }),
            };
        }
    }
    Ok(DEFAULT_THEME.to_string())
}

/// First token ending in `.yml`, or `cv.yml`.
pub fn resolve_input_file<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(AsRef::as_ref)
        .find(|arg| arg.ends_with(INPUT_EXTENSION))
        .unwrap_or(DEFAULT_INPUT_FILE)
        .to_string()
}

/// First token ending in `.pdf`, or the input file renamed to `.pdf`.
pub fn resolve_output_file<S: AsRef<str>>(args: &[S], input_file: &str) -> String {
    args.iter()
        .map(AsRef::as_ref)
        .find(|arg| arg.ends_with(OUTPUT_EXTENSION))
        .map(str::to_string)
        .unwrap_or_else(|| swap_extension(input_file))
}

fn swap_extension(input_file: &str) -> String {
    match input_file.strip_suffix(INPUT_EXTENSION) {
        Some(stem) => format!("{stem}{OUTPUT_EXTENSION}"),
        None => format!("{input_file}{OUTPUT_EXTENSION}"),
    }
}

/// The three values the pipeline needs from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub theme: String,
    pub input_file: String,
    pub output_file: String,
}

impl Invocation {
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let theme = resolve_theme(args)?;
        let input_file = resolve_input_file(args);
        let output_file = resolve_output_file(args, &input_file);
        Ok(Self {
            theme,
            input_file,
            output_file,
        })
    }
}
