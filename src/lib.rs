//! cser — serializer generator for C record declarations.
//!
//! Parses record-type declarations written in a C struct subset and emits
//! companion store/load routine source for one or more wire formats: a
//! big-endian presence-flagged binary format and a tag-based nested
//! document format.
//!
//! # Quick start
//!
//! Generate the `.h`/`.c` pair for a root type (suitable for build
//! scripts):
//!
//! ```no_run
//! use cser::config::Config;
//! use std::path::Path;
//!
//! let cfg = Config {
//!     roots: vec!["foo".to_string()],
//!     ..Config::default()
//! };
//! cser::run(&cfg, Path::new(".")).unwrap();
//! ```
//!
//! Or keep the generated text in memory:
//!
//! ```no_run
//! # use cser::config::Config;
//! let cfg = Config { roots: vec!["foo".to_string()], ..Config::default() };
//! let out = cser::generate(&cfg, "typedef struct { int a; } foo;").unwrap();
//! assert!(out.header.contains("cser_raw_store_foo"));
//! ```

use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

pub mod config;
pub mod emit;
pub mod frontend;
pub mod model;
pub mod parse;
pub mod reach;

pub use emit::Output;

/// Generation-time failure classes. Each maps onto one of the stable
/// process exit codes the CLI promises.
#[derive(Debug)]
pub enum Error {
    /// Malformed input or a semantic error in the declarations.
    Syntax { line: usize, msg: String },
    /// A bug or an impossible registry state.
    Internal(String),
    /// More than one level of pointer indirection reached emission.
    PtrLevel { type_name: String, level: usize },
    /// A native type the selected backend cannot express.
    EmitterDomain { type_name: String },
    /// Output file could not be opened.
    CreateOutput { path: PathBuf, source: std::io::Error },
    UnknownRoot(String),
    RootNotComposite(String),
    HeaderWrite { path: PathBuf, source: std::io::Error },
    SourceWrite { path: PathBuf, source: std::io::Error },
    NoRoots,
}

impl Error {
    /// The stable process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Syntax { .. } => 1,
            Error::Internal(_) => 2,
            Error::PtrLevel { .. } | Error::EmitterDomain { .. } | Error::CreateOutput { .. } => 3,
            Error::UnknownRoot(_) => 4,
            Error::RootNotComposite(_) => 5,
            Error::HeaderWrite { .. } => 6,
            Error::SourceWrite { .. } => 7,
            Error::NoRoots => 9,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax { line, msg } => write!(f, "line {line}: {msg}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
            Error::PtrLevel { type_name, level } => {
                write!(f, "unsupported pointer level {level} for '{type_name}'")
            }
            Error::EmitterDomain { type_name } => {
                write!(f, "floating type '{type_name}' is not supported by this backend")
            }
            Error::CreateOutput { path, source } => {
                write!(f, "cannot open output file '{}': {source}", path.display())
            }
            Error::UnknownRoot(name) => write!(f, "type '{name}' not found"),
            Error::RootNotComposite(name) => write!(f, "type '{name}' is not a struct"),
            Error::HeaderWrite { path, source } => {
                write!(f, "writing to '{}' failed: {source}", path.display())
            }
            Error::SourceWrite { path, source } => {
                write!(f, "writing to '{}' failed: {source}", path.display())
            }
            Error::NoRoots => write!(f, "no types specified"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::CreateOutput { source, .. }
            | Error::HeaderWrite { source, .. }
            | Error::SourceWrite { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Run the full pipeline: read the declaration source, generate, and
/// write the `<basename>.h` / `<basename>.c` pair under `base_dir`.
///
/// Returns the paths of the written header and source.
pub fn run(cfg: &config::Config, base_dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    let source_text = match &cfg.input {
        Some(path) => {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                base_dir.join(path)
            };
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading declarations from {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading declarations from stdin")?;
            buf
        }
    };

    let output = generate(cfg, &source_text)?;

    let header_path = base_dir.join(format!("{}.h", cfg.output.basename));
    let source_path = base_dir.join(format!("{}.c", cfg.output.basename));
    write_output(&header_path, &output.header, true)?;
    write_output(&source_path, &output.source, false)?;

    info!(
        header = %header_path.display(),
        source = %source_path.display(),
        "wrote generated pair"
    );
    Ok((header_path, source_path))
}

fn write_output(path: &Path, text: &str, is_header: bool) -> Result<()> {
    let mut file = std::fs::File::create(path).map_err(|source| Error::CreateOutput {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(text.as_bytes()).map_err(|source| {
        if is_header {
            Error::HeaderWrite {
                path: path.to_path_buf(),
                source,
            }
        } else {
            Error::SourceWrite {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Generate the header/source pair for `source` declarations in memory.
pub fn generate(cfg: &config::Config, source: &str) -> anyhow::Result<Output> {
    let mut fe = frontend::Frontend::new();
    parse::parse(source, &mut fe)?;
    let mut registry = fe.into_registry();

    reach::filter_used(&mut registry, &cfg.roots)?;

    let out = emit::assemble(&registry, cfg)?;

    info!(
        roots = cfg.roots.len(),
        types = registry.types().len(),
        aliases = registry.aliases().len(),
        "generation complete"
    );
    Ok(out)
}
