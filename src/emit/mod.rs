//! Emission core — backend dispatch, identifier mangling, and assembly of
//! the generated header/source pair.

pub mod raw;
pub mod writer;
pub mod xml;

use tracing::info;

use crate::Result;
use crate::config::{Backend, Config};
use crate::model::Registry;

/// The generated output pair: declarations and definitions.
#[derive(Debug, Default, Clone)]
pub struct Output {
    pub header: String,
    pub source: String,
}

/// Mangle a type name into a C identifier fragment. Model type names only
/// ever contain identifier characters and spaces (`unsigned long`,
/// `struct foo`), so mapping spaces suffices.
pub fn c_ident(name: &str) -> String {
    name.replace(' ', "_")
}

/// Sanitize the output basename into an include-guard identifier.
fn guard_ident(basename: &str) -> String {
    basename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Walk the filtered registry with every selected backend and assemble the
/// header and source texts.
pub fn assemble(registry: &Registry, cfg: &Config) -> Result<Output> {
    let mut out = Output::default();
    let basename = &cfg.output.basename;
    let guard = format!("_{}_h_", guard_ident(basename));

    out.header
        .push_str("/* Generated by cser. Do not edit. */\n");
    out.header.push_str(&format!("#ifndef {guard}\n"));
    out.header.push_str(&format!("#define {guard}\n"));
    for inc in &cfg.includes {
        out.header.push_str(&format!("#include \"{inc}\"\n"));
    }
    out.header.push('\n');

    out.source
        .push_str("/* Generated by cser. Do not edit. */\n");
    out.source.push_str(&format!("#include \"{basename}.h\"\n\n"));

    let backends = cfg.backends_or_default();
    for backend in &backends {
        match backend {
            Backend::Raw => raw::emit(registry, &mut out)?,
            Backend::Xml => xml::emit(registry, &mut out)?,
        }
    }

    out.header.push_str("#endif\n");

    info!(
        backends = backends.len(),
        types = registry.types().len(),
        aliases = registry.aliases().len(),
        "emission complete"
    );
    Ok(out)
}
