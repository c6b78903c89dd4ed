//! Binary backend — big-endian, presence-flagged store/load routines.
//!
//! Integers travel in network byte order at their host width. Nullable
//! pointer slots are preceded by a one-byte presence flag on both the
//! store and load side. Variable-length arrays take their element count
//! from the previously serialized sibling member; zero-terminated arrays
//! carry their natural all-zero terminator in the stream.

use tracing::{debug, warn};

use super::writer::CWriter;
use super::{Output, c_ident};
use crate::model::{Cardinality, Member, Registry, Type, TypeKind};
use crate::{Error, Result};

const PRELUDE: &str = "\
#include <stdint.h>
#include <stdlib.h>
#include <string.h>
#include <sys/types.h>
#include <errno.h>

/* The callback functions take a buffer, a length, and an opaque  */
/* pointer which is passed through. They MUST return zero (0) on  */
/* success. Any non-zero value is treated as an error and bubbled */
/* back up to the caller. Note that \"short\" reads and writes    */
/* are NOT used or supported in this interface, unlike that of    */
/* read(2)/write(2).                                              */
typedef int (*cser_raw_write_fn) (const uint8_t *bytes, size_t n, void *q);
typedef int (*cser_raw_read_fn) (uint8_t *bytes, size_t n, void *q);

";

fn is_float(name: &str) -> bool {
    name.contains("float") || name.contains("double")
}

/// Emit raw store/load routines for every surviving type and alias.
pub fn emit(registry: &Registry, out: &mut Output) -> Result<()> {
    out.header.push_str(PRELUDE);

    let mut src = CWriter::new();
    for t in registry.types() {
        match &t.kind {
            TypeKind::Native if t.name == "void" => {
                debug!("skipping void native in raw backend");
            }
            TypeKind::Native if is_float(&t.name) => {
                // Byte shifting does not apply to floating types.
                return Err(Error::EmitterDomain {
                    type_name: t.name.clone(),
                });
            }
            TypeKind::Native => {
                store_native(t, out, &mut src);
                load_native(t, out, &mut src);
            }
            TypeKind::Composite { members } => {
                store_struct(t, members, out, &mut src);
                load_struct(t, members, out, &mut src);
            }
            TypeKind::Decorated { .. } => {
                warn!(name = %t.name, "decorated type has no routines of its own");
            }
        }
    }

    for a in registry.aliases() {
        if matches!(
            registry.lookup(&a.actual_name),
            Some(Type {
                kind: TypeKind::Native,
                name,
                ..
            }) if name == "void"
        ) {
            debug!(alias = %a.alias_name, "skipping void alias in raw backend");
            continue;
        }
        let ualias = c_ident(&a.alias_name);
        let uactual = c_ident(&a.actual_name);
        out.header.push_str(&format!(
            "static inline int cser_raw_store_{ualias} (const {} *val, cser_raw_write_fn w, void *q)\n\
             {{ return cser_raw_store_{uactual} (val, w, q); }}\n",
            a.alias_name
        ));
        out.header.push_str(&format!(
            "static inline int cser_raw_load_{ualias} ({} *val, cser_raw_read_fn r, void *q)\n\
             {{ return cser_raw_load_{uactual} (val, r, q); }}\n",
            a.alias_name
        ));
        debug!(alias = %a.alias_name, actual = %a.actual_name, "emitted raw forwarders");
    }

    out.source.push_str(&src.into_string());
    Ok(())
}

//
// Natives
//

fn store_native(t: &Type, out: &mut Output, w: &mut CWriter) {
    let utype = c_ident(&t.name);
    let name = &t.name;
    out.header.push_str(&format!(
        "int cser_raw_store_{utype} (const {name} *val, cser_raw_write_fn w, void *q);\n"
    ));

    w.line(format!(
        "int cser_raw_store_{utype} (const {name} *val, cser_raw_write_fn w, void *q)"
    ));
    w.open();
    w.line(format!("{name} tmp = *val;"));
    w.line(format!("uint8_t bytes[sizeof ({name})];"));
    w.line(format!("for (unsigned i = 1; i <= sizeof ({name}); ++i)"));
    w.open();
    w.line(format!("bytes[sizeof ({name}) - i] = (uint8_t)(tmp & 0xff);"));
    w.line("tmp >>= 8;");
    w.close();
    w.line(format!("return w (bytes, sizeof ({name}), q);"));
    w.close();
    w.blank();
}

fn load_native(t: &Type, out: &mut Output, w: &mut CWriter) {
    let utype = c_ident(&t.name);
    let name = &t.name;
    out.header.push_str(&format!(
        "int cser_raw_load_{utype} ({name} *val, cser_raw_read_fn r, void *q);\n"
    ));

    w.line(format!(
        "int cser_raw_load_{utype} ({name} *val, cser_raw_read_fn r, void *q)"
    ));
    w.open();
    w.line(format!("uint8_t bytes[sizeof ({name})];"));
    w.line(format!("int ret = r (bytes, sizeof ({name}), q);"));
    w.line("if (ret != 0)");
    w.then("return ret;");
    w.line(format!("{name} tmp = 0;"));
    w.line(format!("for (unsigned i = 0; i < sizeof ({name}); ++i)"));
    w.then(&format!("tmp = ({name})((tmp << 8) | bytes[i]);"));
    w.line("*val = tmp;");
    w.line("return 0;");
    w.close();
    w.blank();
}

//
// Composite store
//

/// `present` flag plus write, leaving the caller to open the guarded block.
fn store_presence(w: &mut CWriter, expr: &str) {
    w.line(format!("uint8_t present = ({expr} != 0);"));
    w.line("int pret = w (&present, sizeof (present), q);");
    w.line("if (pret != 0)");
    w.then("return pret;");
    w.line("if (present)");
}

fn store_element(w: &mut CWriter, m: &Member, target: &str) {
    let elem = c_ident(&m.base_type);
    let base = &m.base_type;
    w.line(format!(
        "int ret = cser_raw_store_{elem} (({base} *){target}, w, q);"
    ));
    w.line("if (ret != 0)");
    w.then("return ret;");
}

fn store_struct(t: &Type, members: &[Member], out: &mut Output, w: &mut CWriter) {
    let utype = c_ident(&t.name);
    let name = &t.name;
    out.header.push_str(&format!(
        "int cser_raw_store_{utype} (const {name} *val, cser_raw_write_fn w, void *q);\n"
    ));

    w.line(format!(
        "int cser_raw_store_{utype} (const {name} *val, cser_raw_write_fn w, void *q)"
    ));
    w.open();
    for m in members {
        let mn = &m.name;
        w.open();
        match m.decor.cardinality {
            Cardinality::Single if !m.decor.is_ptr() => {
                store_element(w, m, &format!("&val->{mn}"));
            }
            Cardinality::Single => {
                store_presence(w, &format!("val->{mn}"));
                w.open();
                store_element(w, m, &format!("val->{mn}"));
                w.close();
            }
            Cardinality::FixedArray => {
                let sz = m.decor.arr_sz.as_deref().unwrap_or("0");
                w.line(format!("for (size_t i = 0; i < ({sz}); ++i)"));
                w.open();
                if m.decor.is_ptr() {
                    store_presence(w, &format!("val->{mn}[i]"));
                    w.open();
                    store_element(w, m, &format!("val->{mn}[i]"));
                    w.close();
                } else {
                    store_element(w, m, &format!("&val->{mn}[i]"));
                }
                w.close();
            }
            Cardinality::VarArray => {
                let len = m.decor.var_size_member.as_deref().unwrap_or("0");
                store_presence(w, &format!("val->{mn}"));
                w.open();
                w.line(format!("for (size_t i = 0; i < val->{len}; ++i)"));
                w.open();
                store_element(w, m, &format!("&val->{mn}[i]"));
                w.close();
                w.close();
            }
            Cardinality::ZeroTermArray => {
                store_presence(w, &format!("val->{mn}"));
                w.open();
                w.line(format!(
                    "for (size_t i = 0; (i == 0) || (val->{mn}[i - 1]); ++i)"
                ));
                w.open();
                store_element(w, m, &format!("&val->{mn}[i]"));
                w.close();
                w.close();
            }
        }
        w.close();
    }
    w.line("return 0;");
    w.close();
    w.blank();
}

//
// Composite load
//

fn load_presence(w: &mut CWriter) {
    w.line("uint8_t present;");
    w.line("int pret = r (&present, sizeof (present), q);");
    w.line("if (pret != 0)");
    w.then("return pret;");
}

/// In-place element load through the resolved base type; the member's
/// declared type may be an alias of it.
fn load_element(w: &mut CWriter, m: &Member, target: &str) {
    let elem = c_ident(&m.base_type);
    let base = &m.base_type;
    w.line(format!(
        "int ret = cser_raw_load_{elem} (({base} *)&{target}, r, q);"
    ));
    w.line("if (ret != 0)");
    w.then("return ret;");
}

/// Allocate-and-load for a single nullable slot, assigning on success.
fn load_pointer_slot(w: &mut CWriter, m: &Member, target: &str) {
    let elem = c_ident(&m.base_type);
    let base = &m.base_type;
    w.line(format!("{base} *tmp_item = calloc (1, sizeof ({base}));"));
    w.line("if (!tmp_item)");
    w.then("return -ENOMEM;");
    w.line(format!("int ret = cser_raw_load_{elem} (tmp_item, r, q);"));
    w.line("if (ret != 0)");
    w.open();
    w.line("free (tmp_item);");
    w.line("return ret;");
    w.close();
    w.line(format!("{target} = tmp_item;"));
}

fn load_struct(t: &Type, members: &[Member], out: &mut Output, w: &mut CWriter) {
    let utype = c_ident(&t.name);
    let name = &t.name;
    out.header.push_str(&format!(
        "int cser_raw_load_{utype} ({name} *val, cser_raw_read_fn r, void *q);\n"
    ));

    w.line(format!(
        "int cser_raw_load_{utype} ({name} *val, cser_raw_read_fn r, void *q)"
    ));
    w.open();
    for m in members {
        let mn = &m.name;
        let base = &m.base_type;
        w.open();
        match m.decor.cardinality {
            Cardinality::Single if !m.decor.is_ptr() => {
                load_element(w, m, &format!("val->{mn}"));
            }
            Cardinality::Single => {
                load_presence(w);
                w.line("if (!present)");
                w.then(&format!("val->{mn} = 0;"));
                w.line("else");
                w.open();
                load_pointer_slot(w, m, &format!("val->{mn}"));
                w.close();
            }
            Cardinality::FixedArray => {
                let sz = m.decor.arr_sz.as_deref().unwrap_or("0");
                w.line(format!("for (size_t i = 0; i < ({sz}); ++i)"));
                w.open();
                if m.decor.is_ptr() {
                    load_presence(w);
                    w.line("if (!present)");
                    w.then(&format!("val->{mn}[i] = 0;"));
                    w.line("else");
                    w.open();
                    load_pointer_slot(w, m, &format!("val->{mn}[i]"));
                    w.close();
                } else {
                    load_element(w, m, &format!("val->{mn}[i]"));
                }
                w.close();
            }
            Cardinality::VarArray => {
                let len = m.decor.var_size_member.as_deref().unwrap_or("0");
                let elem = c_ident(&m.base_type);
                load_presence(w);
                w.line("if (!present)");
                w.then(&format!("val->{mn} = 0;"));
                w.line("else");
                w.open();
                w.line(format!("{base} *items = calloc (val->{len}, sizeof ({base}));"));
                w.line("if (!items)");
                w.then("return -ENOMEM;");
                w.line(format!("for (size_t i = 0; i < val->{len}; ++i)"));
                w.open();
                w.line(format!("int ret = cser_raw_load_{elem} (&items[i], r, q);"));
                w.line("if (ret != 0)");
                w.open();
                w.line("free (items);");
                w.line("return ret;");
                w.close();
                w.close();
                w.line(format!("val->{mn} = items;"));
                w.close();
            }
            Cardinality::ZeroTermArray => {
                // Incremental load with capacity doubling until a zero
                // element has been consumed; the fresh region is zeroed on
                // each grow.
                let elem = c_ident(&m.base_type);
                load_presence(w);
                w.line("if (!present)");
                w.then(&format!("val->{mn} = 0;"));
                w.line("else");
                w.open();
                w.line(format!("{base} *tmp = 0;"));
                w.line("size_t cap = 0;");
                w.line("size_t offs = 0;");
                w.line("do");
                w.open();
                w.line("if (offs >= cap)");
                w.open();
                w.line("size_t ncap = cap ? cap * 2 : 8;");
                w.line(format!(
                    "{base} *grown = realloc (tmp, ncap * sizeof ({base}));"
                ));
                w.line("if (!grown)");
                w.open();
                w.line("free (tmp);");
                w.line("return -ENOMEM;");
                w.close();
                w.line(format!("memset (grown + cap, 0, (ncap - cap) * sizeof ({base}));"));
                w.line("tmp = grown;");
                w.line("cap = ncap;");
                w.close();
                w.line(format!("int ret = cser_raw_load_{elem} (&tmp[offs], r, q);"));
                w.line("if (ret != 0)");
                w.open();
                w.line("free (tmp);");
                w.line("return ret;");
                w.close();
                w.line("++offs;");
                w.close_with("} while (tmp[offs - 1]);");
                w.line(format!("val->{mn} = tmp;"));
                w.close();
            }
        }
        w.close();
    }
    w.line("return 0;");
    w.close();
    w.blank();
}
