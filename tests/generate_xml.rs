//! End-to-end xml backend tests: tag shapes, string handling, nullness,
//! decimal rendering, and the floating-point rejection rule.

use cser::config::{Backend, Config};

fn xml_config(roots: &[&str]) -> Config {
    Config {
        backends: vec![Backend::Xml],
        roots: roots.iter().map(|r| r.to_string()).collect(),
        ..Config::default()
    }
}

fn generate(source: &str, roots: &[&str]) -> cser::Output {
    cser::generate(&xml_config(roots), source).expect("generation should succeed")
}

#[test]
fn glue_prototypes_in_header() {
    let out = generate("typedef struct { int a; } foo;", &["foo"]);
    assert!(
        out.header
            .contains("extern bool cser_xml_opentag (const cser_xml_tag_t *tag, void *ctx);")
    );
    assert!(
        out.header
            .contains("extern bool cser_xml_setvalue (const char *value, void *ctx);")
    );
    assert!(
        out.header
            .contains("extern bool cser_xml_closetag (const char *tagname, void *ctx);")
    );
    assert!(
        out.header
            .contains("extern bool cser_xml_nexttag (cser_xml_tag_t *tag, void *ctx);")
    );
    assert!(out.header.contains("extern char *cser_xml_getvalue (void *ctx);"));
}

#[test]
fn string_member_uses_single_setvalue() {
    let out = generate("typedef struct { char *s; } S;", &["S"]);
    // The wrapper tag carries nullness; the value goes out in one call.
    assert!(
        out.source
            .contains("const cser_xml_tag_t tag = { \"s\", val->s != 0 };")
    );
    assert!(
        out.source
            .contains("if (val->s && !cser_xml_setvalue (val->s, ctx))")
    );
    assert!(out.source.contains("if (!cser_xml_closetag (\"s\", ctx))"));
    // No per-character iteration anywhere in the store routine.
    assert!(!out.source.contains("cser_xml_store_char (&val->s[i]"));
    // Load: null slot stays null, otherwise the value is taken verbatim.
    assert!(out.source.contains("val->s = cser_xml_getvalue (ctx);"));
    assert!(out.source.contains("val->s = 0;"));
}

#[test]
fn integers_render_as_decimal_text() {
    let out = generate("typedef struct { int a; size_t n; } S;", &["S"]);
    // Signed natives format through long long...
    assert!(
        out.source
            .contains("if (asprintf (&str, \"%lld\", (long long)*val) < 0)")
    );
    // ...unsigned ones through unsigned long long.
    assert!(
        out.source
            .contains("if (asprintf (&str, \"%llu\", (unsigned long long)*val) < 0)")
    );
    // Loads parse back with the auto-base conversion.
    assert!(out.source.contains("strtoll (str, 0, 0);"));
    assert!(out.source.contains("strtoull (str, 0, 0);"));
}

#[test]
fn member_tags_wrap_values() {
    let out = generate("typedef struct { int a; } S;", &["S"]);
    assert!(
        out.source
            .contains("const cser_xml_tag_t tag = { \"a\", true };")
    );
    assert!(out.source.contains("if (!cser_xml_store_int (&val->a, ctx))"));
    assert!(out.source.contains("if (!cser_xml_closetag (\"a\", ctx))"));
    // Load checks the member tag name before descending.
    assert!(out.source.contains("if (strcmp (tag.name, \"a\") != 0)"));
}

#[test]
fn fixed_array_elements_wrapped_in_i_tags() {
    let out = generate("typedef struct { uint8_t d[4]; } P;", &["P"]);
    assert!(out.source.contains("for (size_t i = 0; i < (4); ++i)"));
    assert!(
        out.source
            .contains("const cser_xml_tag_t tag = { \"i\", true };")
    );
    assert!(out.source.contains("if (strcmp (tag.name, \"i\") != 0)"));
}

#[test]
fn pointer_slot_nullness_on_tags() {
    let out = generate(
        "typedef struct { int x; } inner;\n\
         typedef struct { inner *p; } outer;\n",
        &["outer"],
    );
    assert!(
        out.source
            .contains("const cser_xml_tag_t tag = { \"p\", val->p != 0 };")
    );
    assert!(
        out.source
            .contains("if (val->p && !cser_xml_store_inner (val->p, ctx))")
    );
    // Load: has_value gates allocation; absent slots are nulled.
    assert!(out.source.contains("if (!tag.has_value)"));
    assert!(out.source.contains("val->p = 0;"));
    assert!(out.source.contains("inner *tmpval = calloc (1, sizeof (inner));"));
}

#[test]
fn vararray_allocates_from_sibling_length() {
    let out = generate(
        "typedef struct {\n\
           size_t n;\n\
         #pragma cser vararray:n\n\
           int *a;\n\
         } S;\n",
        &["S"],
    );
    assert!(
        out.source
            .contains("for (size_t i = 0; val->a && i < val->n; ++i)")
    );
    // No length is read back from the document; the sibling carries it.
    assert!(out.source.contains("int *items = calloc (val->n, sizeof (int));"));
    assert!(out.source.contains("val->a = items;"));
}

#[test]
fn zeroterm_array_has_end_marker() {
    let out = generate(
        "typedef struct {\n\
         #pragma cser zeroterm\n\
           int *z;\n\
         } S;\n",
        &["S"],
    );
    // Store walks elements up to the terminator, then marks the end with
    // a valueless "i" tag.
    assert!(out.source.contains("for (size_t i = 0; val->z && val->z[i]; ++i)"));
    assert!(
        out.source
            .contains("const cser_xml_tag_t tag = { \"i\", false };")
    );
    // Load grows by doubling and zeroes the fresh region.
    assert!(out.source.contains("size_t ncap = cap ? cap * 2 : 8;"));
    assert!(
        out.source
            .contains("memset (grown + cap, 0, (ncap - cap) * sizeof (int));")
    );
    assert!(out.source.contains("val->z = tmp;"));
}

#[test]
fn float_member_is_rejected_with_code_3() {
    let err = cser::generate(&xml_config(&["F"]), "typedef struct { float f; } F;")
        .expect_err("floats are out of the xml backend's domain");
    let err = err.downcast_ref::<cser::Error>().expect("typed error");
    assert_eq!(err.exit_code(), 3);
    assert!(matches!(err, cser::Error::EmitterDomain { .. }));
}

#[test]
fn double_member_is_rejected() {
    let err = cser::generate(&xml_config(&["F"]), "typedef struct { double d; } F;")
        .expect_err("doubles are out of the xml backend's domain");
    assert!(
        err.downcast_ref::<cser::Error>()
            .is_some_and(|e| matches!(e, cser::Error::EmitterDomain { .. }))
    );
}

#[test]
fn alias_roots_emit_forwarders() {
    let out = generate(
        "typedef struct { int a; } inner;\n\
         typedef inner outer;\n",
        &["outer"],
    );
    assert!(
        out.header
            .contains("static inline bool cser_xml_store_outer (const outer *val, void *ctx)")
    );
    assert!(out.header.contains("{ return cser_xml_store_inner (val, ctx); }"));
    assert!(
        out.header
            .contains("static inline bool cser_xml_load_outer (outer *val, void *ctx)")
    );
}
