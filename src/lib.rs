//! # cv-forge – YAML résumé → themed PDF
//!
//! A run is a linear pipeline ([`pipeline`]):
//!
//! 1. **Arguments** – theme name, input and output paths ([`args`])
//! 2. **Theme** – locate `themes/<name>/index.html`, bundled resources
//!    first, then the working directory ([`theme`], [`resources`])
//! 3. **YAML** – load the résumé as a generic mapping ([`document`])
//! 4. **Template** – merge the mapping into the Handlebars theme
//!    ([`template`])
//! 5. **Render** – strict XHTML → CSS → Taffy layout → pages → PDF ([`pdf`])
//!
//! ```no_run
//! let outcome = cv_forge::pipeline::run(&["-t", "default", "me.yml"])?;
//! println!("{} pages", outcome.pages);
//! # Ok::<(), cv_forge::pipeline::StageError>(())
//! ```

pub mod args;
pub mod document;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod resources;
pub mod template;
pub mod theme;

pub use args::{resolve_input_file, resolve_output_file, resolve_theme, Invocation};
pub use document::{load_yaml_mapping, Mapping, Value};
pub use error::{Error, Result};
pub use pdf::{render_to_pdf, PdfRenderer, RenderOptions};
pub use template::merge_template;
pub use theme::{resolve_theme_location, theme_relative_path, Theme};
