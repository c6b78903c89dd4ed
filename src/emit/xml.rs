//! Structured-document backend — tag-based store/load routines.
//!
//! The generated code talks to the host document layer through five glue
//! callbacks; nesting mirrors the declared shape, with per-member wrapper
//! tags and `"i"` tags around array elements. Nullness travels in the
//! tag's `has_value` flag. Floating-point natives are rejected at
//! generation time.

use tracing::{debug, warn};

use super::writer::CWriter;
use super::{Output, c_ident};
use crate::model::{Cardinality, Member, Registry, Type, TypeKind};
use crate::{Error, Result};

const PRELUDE: &str = "
/* cser xml backend */
#include <stdbool.h>
#include <stdint.h>
#include <stdlib.h>
#include <stdio.h>
#include <string.h>
#include <sys/types.h>
typedef struct cser_xml_tag
{
  const char *name;
  bool has_value;
} cser_xml_tag_t;
/* The following glue functions to your XML implementation must be provided: */
extern bool cser_xml_opentag (const cser_xml_tag_t *tag, void *ctx);
extern bool cser_xml_setvalue (const char *value, void *ctx);
extern bool cser_xml_closetag (const char *tagname, void *ctx);
extern bool cser_xml_nexttag (cser_xml_tag_t *tag, void *ctx);
extern char *cser_xml_getvalue (void *ctx);
/* end glue prototypes */

";

fn is_float(name: &str) -> bool {
    name.contains("float") || name.contains("double")
}

/// Character strings get a single `set_value` instead of per-element tags.
fn is_string(m: &Member) -> bool {
    m.decor.is_ptr() && m.decor.cardinality == Cardinality::ZeroTermArray && m.base_type == "char"
}

/// Emit xml store/load routines for every surviving type and alias.
pub fn emit(registry: &Registry, out: &mut Output) -> Result<()> {
    out.header.push_str(PRELUDE);

    let mut src = CWriter::new();
    for t in registry.types() {
        match &t.kind {
            TypeKind::Native if t.name == "void" => {
                debug!("skipping void native in xml backend");
            }
            TypeKind::Native if is_float(&t.name) => {
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
            debug!(alias = %a.alias_name, "skipping void alias in xml backend");
            continue;
        }
        let ualias = c_ident(&a.alias_name);
        let uactual = c_ident(&a.actual_name);
        out.header.push_str(&format!(
            "static inline bool cser_xml_store_{ualias} (const {} *val, void *ctx)\n\
             {{ return cser_xml_store_{uactual} (val, ctx); }}\n",
            a.alias_name
        ));
        out.header.push_str(&format!(
            "static inline bool cser_xml_load_{ualias} ({} *val, void *ctx)\n\
             {{ return cser_xml_load_{uactual} (val, ctx); }}\n",
            a.alias_name
        ));
        debug!(alias = %a.alias_name, actual = %a.actual_name, "emitted xml forwarders");
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
    let unsign = name.contains("unsigned");
    out.header.push_str(&format!(
        "bool cser_xml_store_{utype} (const {name} *val, void *ctx);\n"
    ));

    w.line(format!("bool cser_xml_store_{utype} (const {name} *val, void *ctx)"));
    w.open();
    w.line("char *str;");
    if unsign {
        w.line("if (asprintf (&str, \"%llu\", (unsigned long long)*val) < 0)");
    } else {
        w.line("if (asprintf (&str, \"%lld\", (long long)*val) < 0)");
    }
    w.then("return false;");
    w.line("if (!cser_xml_setvalue (str, ctx))");
    w.open();
    w.line("free (str);");
    w.line("return false;");
    w.close();
    w.line("free (str);");
    w.line("return true;");
    w.close();
    w.blank();
}

fn load_native(t: &Type, out: &mut Output, w: &mut CWriter) {
    let utype = c_ident(&t.name);
    let name = &t.name;
    let unsign = name.contains("unsigned");
    out.header.push_str(&format!(
        "bool cser_xml_load_{utype} ({name} *val, void *ctx);\n"
    ));

    w.line(format!("bool cser_xml_load_{utype} ({name} *val, void *ctx)"));
    w.open();
    w.line("char *str = cser_xml_getvalue (ctx);");
    w.line("if (!str)");
    w.then("return false;");
    if unsign {
        w.line(format!("{name} tmp = ({name})strtoull (str, 0, 0);"));
    } else {
        w.line(format!("{name} tmp = ({name})strtoll (str, 0, 0);"));
    }
    w.line("free (str);");
    w.line("*val = tmp;");
    w.line("return true;");
    w.close();
    w.blank();
}

//
// Composite store
//

/// Open the member's wrapper tag; `has_value` carries the nullness of
/// nullable slots.
fn store_open_member(w: &mut CWriter, name: &str, has_value: &str) {
    w.open();
    w.line(format!(
        "const cser_xml_tag_t tag = {{ \"{name}\", {has_value} }};"
    ));
    w.line("if (!cser_xml_opentag (&tag, ctx))");
    w.then("return false;");
    w.close();
}

/// One array element wrapped in its `"i"` tag.
fn store_element(w: &mut CWriter, m: &Member, has_value: Option<&str>, target: &str) {
    let elem = c_ident(&m.base_type);
    w.open();
    match has_value {
        Some(expr) => {
            w.line(format!("bool has_value = {expr};"));
            w.line("const cser_xml_tag_t tag = { \"i\", has_value };");
            w.line("if (!cser_xml_opentag (&tag, ctx))");
            w.then("return false;");
            w.line(format!(
                "if (has_value && !cser_xml_store_{elem} ({target}, ctx))"
            ));
            w.then("return false;");
        }
        None => {
            w.line("const cser_xml_tag_t tag = { \"i\", true };");
            w.line("if (!cser_xml_opentag (&tag, ctx))");
            w.then("return false;");
            w.line(format!("if (!cser_xml_store_{elem} ({target}, ctx))"));
            w.then("return false;");
        }
    }
    w.line("if (!cser_xml_closetag (\"i\", ctx))");
    w.then("return false;");
    w.close();
}

fn store_struct(t: &Type, members: &[Member], out: &mut Output, w: &mut CWriter) {
    let utype = c_ident(&t.name);
    let name = &t.name;
    out.header.push_str(&format!(
        "bool cser_xml_store_{utype} (const {name} *val, void *ctx);\n"
    ));

    w.line(format!("bool cser_xml_store_{utype} (const {name} *val, void *ctx)"));
    w.open();
    for m in members {
        let mn = &m.name;
        let elem = c_ident(&m.base_type);
        if is_string(m) {
            store_open_member(w, mn, &format!("val->{mn} != 0"));
            w.open();
            w.line(format!(
                "if (val->{mn} && !cser_xml_setvalue (val->{mn}, ctx))"
            ));
            w.then("return false;");
            w.close();
        } else {
            match m.decor.cardinality {
                Cardinality::Single if !m.decor.is_ptr() => {
                    store_open_member(w, mn, "true");
                    w.open();
                    w.line(format!("if (!cser_xml_store_{elem} (&val->{mn}, ctx))"));
                    w.then("return false;");
                    w.close();
                }
                Cardinality::Single => {
                    store_open_member(w, mn, &format!("val->{mn} != 0"));
                    w.open();
                    w.line(format!(
                        "if (val->{mn} && !cser_xml_store_{elem} (val->{mn}, ctx))"
                    ));
                    w.then("return false;");
                    w.close();
                }
                Cardinality::FixedArray => {
                    // Per-element nullness travels on the inner tags.
                    let sz = m.decor.arr_sz.as_deref().unwrap_or("0");
                    store_open_member(w, mn, "true");
                    w.line(format!("for (size_t i = 0; i < ({sz}); ++i)"));
                    if m.decor.is_ptr() {
                        store_element(
                            w,
                            m,
                            Some(&format!("val->{mn}[i] != 0")),
                            &format!("val->{mn}[i]"),
                        );
                    } else {
                        store_element(w, m, None, &format!("&val->{mn}[i]"));
                    }
                }
                Cardinality::VarArray => {
                    let len = m.decor.var_size_member.as_deref().unwrap_or("0");
                    store_open_member(w, mn, &format!("val->{mn} != 0"));
                    w.line(format!(
                        "for (size_t i = 0; val->{mn} && i < val->{len}; ++i)"
                    ));
                    store_element(w, m, None, &format!("&val->{mn}[i]"));
                }
                Cardinality::ZeroTermArray => {
                    store_open_member(w, mn, &format!("val->{mn} != 0"));
                    w.line(format!(
                        "for (size_t i = 0; val->{mn} && val->{mn}[i]; ++i)"
                    ));
                    store_element(w, m, None, &format!("&val->{mn}[i]"));
                    // End-of-list marker: one valueless "i" tag.
                    w.line(format!("if (val->{mn})"));
                    w.open();
                    w.line("const cser_xml_tag_t tag = { \"i\", false };");
                    w.line("if (!cser_xml_opentag (&tag, ctx))");
                    w.then("return false;");
                    w.line("if (!cser_xml_closetag (\"i\", ctx))");
                    w.then("return false;");
                    w.close();
                }
            }
        }
        w.line(format!("if (!cser_xml_closetag (\"{mn}\", ctx))"));
        w.then("return false;");
        w.blank();
    }
    w.line("return true;");
    w.close();
    w.blank();
}

//
// Composite load
//

/// Read the next tag and require the expected name.
fn load_expect_tag(w: &mut CWriter, name: &str) {
    w.line("if (!cser_xml_nexttag (&tag, ctx))");
    w.then("return false;");
    w.line(format!("if (strcmp (tag.name, \"{name}\") != 0)"));
    w.then("return false;");
}

/// Allocate-and-load for a nullable slot whose tag was just read.
fn load_pointer_slot(w: &mut CWriter, m: &Member, target: &str) {
    let elem = c_ident(&m.base_type);
    let base = &m.base_type;
    w.line("if (!tag.has_value)");
    w.then(&format!("{target} = 0;"));
    w.line("else");
    w.open();
    w.line(format!("{base} *tmpval = calloc (1, sizeof ({base}));"));
    w.line("if (!tmpval)");
    w.then("return false;");
    w.line(format!("if (!cser_xml_load_{elem} (tmpval, ctx))"));
    w.open();
    w.line("free (tmpval);");
    w.line("return false;");
    w.close();
    w.line(format!("{target} = tmpval;"));
    w.close();
}

fn load_struct(t: &Type, members: &[Member], out: &mut Output, w: &mut CWriter) {
    let utype = c_ident(&t.name);
    let name = &t.name;
    out.header.push_str(&format!(
        "bool cser_xml_load_{utype} ({name} *val, void *ctx);\n"
    ));

    w.line(format!("bool cser_xml_load_{utype} ({name} *val, void *ctx)"));
    w.open();
    w.line("cser_xml_tag_t tag;");
    for m in members {
        let mn = &m.name;
        let base = &m.base_type;
        let elem = c_ident(&m.base_type);
        load_expect_tag(w, mn);
        if is_string(m) {
            w.line("if (!tag.has_value)");
            w.then(&format!("val->{mn} = 0;"));
            w.line("else");
            w.open();
            w.line(format!("val->{mn} = cser_xml_getvalue (ctx);"));
            w.line(format!("if (!val->{mn})"));
            w.then("return false;");
            w.close();
        } else {
            match m.decor.cardinality {
                Cardinality::Single if !m.decor.is_ptr() => {
                    w.line(format!(
                        "if (!cser_xml_load_{elem} (({base} *)&val->{mn}, ctx))"
                    ));
                    w.then("return false;");
                }
                Cardinality::Single => {
                    load_pointer_slot(w, m, &format!("val->{mn}"));
                }
                Cardinality::FixedArray => {
                    let sz = m.decor.arr_sz.as_deref().unwrap_or("0");
                    w.line(format!("for (size_t i = 0; i < ({sz}); ++i)"));
                    w.open();
                    load_expect_tag(w, "i");
                    if m.decor.is_ptr() {
                        load_pointer_slot(w, m, &format!("val->{mn}[i]"));
                    } else {
                        w.line(format!(
                            "if (!cser_xml_load_{elem} (({base} *)&val->{mn}[i], ctx))"
                        ));
                        w.then("return false;");
                    }
                    w.close();
                }
                Cardinality::VarArray => {
                    // Element count comes from the already-loaded sibling;
                    // no length is read back from the document.
                    let len = m.decor.var_size_member.as_deref().unwrap_or("0");
                    w.line("if (!tag.has_value)");
                    w.then(&format!("val->{mn} = 0;"));
                    w.line("else");
                    w.open();
                    w.line(format!(
                        "{base} *items = calloc (val->{len}, sizeof ({base}));"
                    ));
                    w.line("if (!items)");
                    w.then("return false;");
                    w.line(format!("for (size_t i = 0; i < val->{len}; ++i)"));
                    w.open();
                    w.line("if (!cser_xml_nexttag (&tag, ctx))");
                    w.open();
                    w.line("free (items);");
                    w.line("return false;");
                    w.close();
                    w.line("if (strcmp (tag.name, \"i\") != 0)");
                    w.open();
                    w.line("free (items);");
                    w.line("return false;");
                    w.close();
                    w.line(format!("if (!cser_xml_load_{elem} (&items[i], ctx))"));
                    w.open();
                    w.line("free (items);");
                    w.line("return false;");
                    w.close();
                    w.close();
                    w.line(format!("val->{mn} = items;"));
                    w.close();
                }
                Cardinality::ZeroTermArray => {
                    // Grow-on-demand until a tag without a value arrives;
                    // the zeroed tail of the buffer is the terminator.
                    w.line("if (!tag.has_value)");
                    w.then(&format!("val->{mn} = 0;"));
                    w.line("else");
                    w.open();
                    w.line(format!("{base} *tmp = 0;"));
                    w.line("size_t cap = 0;");
                    w.line("size_t offs = 0;");
                    w.line("for (;;)");
                    w.open();
                    w.line("if (!cser_xml_nexttag (&tag, ctx))");
                    w.open();
                    w.line("free (tmp);");
                    w.line("return false;");
                    w.close();
                    w.line("if (strcmp (tag.name, \"i\") != 0)");
                    w.open();
                    w.line("free (tmp);");
                    w.line("return false;");
                    w.close();
                    w.line("if (!tag.has_value)");
                    w.then("break;");
                    w.line("if (offs + 2 > cap)");
                    w.open();
                    w.line("size_t ncap = cap ? cap * 2 : 8;");
                    w.line(format!(
                        "{base} *grown = realloc (tmp, ncap * sizeof ({base}));"
                    ));
                    w.line("if (!grown)");
                    w.open();
                    w.line("free (tmp);");
                    w.line("return false;");
                    w.close();
                    w.line(format!(
                        "memset (grown + cap, 0, (ncap - cap) * sizeof ({base}));"
                    ));
                    w.line("tmp = grown;");
                    w.line("cap = ncap;");
                    w.close();
                    w.line(format!("if (!cser_xml_load_{elem} (&tmp[offs], ctx))"));
                    w.open();
                    w.line("free (tmp);");
                    w.line("return false;");
                    w.close();
                    w.line("++offs;");
                    w.close();
                    w.line("if (!tmp)");
                    w.open();
                    w.line(format!("tmp = calloc (1, sizeof ({base}));"));
                    w.line("if (!tmp)");
                    w.then("return false;");
                    w.close();
                    w.line(format!("val->{mn} = tmp;"));
                    w.close();
                }
            }
        }
        w.blank();
    }
    w.line("return true;");
    w.close();
    w.blank();
}
