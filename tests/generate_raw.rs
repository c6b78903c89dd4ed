//! End-to-end raw backend tests: parse declarations, generate, and verify
//! the emitted C routine shapes.

use cser::config::{Backend, Config};

fn raw_config(roots: &[&str]) -> Config {
    Config {
        backends: vec![Backend::Raw],
        roots: roots.iter().map(|r| r.to_string()).collect(),
        ..Config::default()
    }
}

fn generate(source: &str, roots: &[&str]) -> cser::Output {
    cser::generate(&raw_config(roots), source).expect("generation should succeed")
}

#[test]
fn native_store_is_big_endian_byte_loop() {
    let out = generate("typedef struct { uint16_t v; } pair;", &["pair"]);
    assert!(
        out.header
            .contains("int cser_raw_store_unsigned_short (const unsigned short *val,")
    );
    assert!(out.source.contains("bytes[sizeof (unsigned short) - i] = (uint8_t)(tmp & 0xff);"));
    assert!(out.source.contains("tmp >>= 8;"));
    // Load mirrors with shift-accumulate.
    assert!(out.source.contains("tmp = (unsigned short)((tmp << 8) | bytes[i]);"));
    // The member store passes the field through the resolved base type.
    assert!(
        out.source
            .contains("int ret = cser_raw_store_unsigned_short ((unsigned short *)&val->v, w, q);")
    );
}

#[test]
fn callback_typedefs_in_header() {
    let out = generate("typedef struct { int a; } foo;", &["foo"]);
    assert!(
        out.header
            .contains("typedef int (*cser_raw_write_fn) (const uint8_t *bytes, size_t n, void *q);")
    );
    assert!(
        out.header
            .contains("typedef int (*cser_raw_read_fn) (uint8_t *bytes, size_t n, void *q);")
    );
}

#[test]
fn string_member_gets_presence_and_terminator_loop() {
    let out = generate("typedef struct { char *s; } S;", &["S"]);
    // Store: presence byte, then elements through the terminating zero.
    assert!(out.source.contains("uint8_t present = (val->s != 0);"));
    assert!(
        out.source
            .contains("for (size_t i = 0; (i == 0) || (val->s[i - 1]); ++i)")
    );
    assert!(
        out.source
            .contains("int ret = cser_raw_store_char ((char *)&val->s[i], w, q);")
    );
    // Load: absent slot is nulled, present slot grows by doubling.
    assert!(out.source.contains("val->s = 0;"));
    assert!(out.source.contains("size_t ncap = cap ? cap * 2 : 8;"));
    assert!(
        out.source
            .contains("memset (grown + cap, 0, (ncap - cap) * sizeof (char));")
    );
    assert!(out.source.contains("} while (tmp[offs - 1]);"));
}

#[test]
fn fixed_array_of_pointers() {
    let out = generate("typedef struct { int16_t *mc[3]; } S;", &["S"]);
    assert!(out.source.contains("for (size_t i = 0; i < (3); ++i)"));
    // Per-slot presence on store...
    assert!(out.source.contains("uint8_t present = (val->mc[i] != 0);"));
    assert!(
        out.source
            .contains("int ret = cser_raw_store_short ((short *)val->mc[i], w, q);")
    );
    // ...and on load, with explicit null for absent slots.
    assert!(out.source.contains("val->mc[i] = 0;"));
    assert!(out.source.contains("short *tmp_item = calloc (1, sizeof (short));"));
    assert!(out.source.contains("val->mc[i] = tmp_item;"));
}

#[test]
fn fixed_array_of_values_loads_in_place() {
    let out = generate("typedef struct { uint8_t d[4]; } P;", &["P"]);
    assert!(out.source.contains("for (size_t i = 0; i < (4); ++i)"));
    assert!(
        out.source
            .contains("int ret = cser_raw_load_unsigned_char ((unsigned char *)&val->d[i], r, q);")
    );
    // Value slots carry no presence byte.
    let load = out
        .source
        .split("int cser_raw_load_P")
        .nth(1)
        .expect("load routine present");
    assert!(!load.contains("present"));
}

#[test]
fn vararray_length_comes_from_sibling() {
    let out = generate(
        "typedef struct {\n\
           size_t n;\n\
         #pragma cser vararray:n\n\
           int *a;\n\
         } S;\n",
        &["S"],
    );
    // The length member serializes first as a plain native.
    assert!(
        out.source
            .contains("int ret = cser_raw_store_unsigned_long ((unsigned long *)&val->n, w, q);")
    );
    // Store: whole-array presence, then n elements; no length prefix.
    assert!(out.source.contains("uint8_t present = (val->a != 0);"));
    assert!(out.source.contains("for (size_t i = 0; i < val->n; ++i)"));
    // Load: one contiguous block sized from the already-loaded sibling.
    assert!(out.source.contains("int *items = calloc (val->n, sizeof (int));"));
    assert!(out.source.contains("val->a = items;"));
}

#[test]
fn single_pointer_member() {
    let out = generate(
        "typedef struct { int x; } inner;\n\
         typedef struct { inner *p; } outer;\n",
        &["outer"],
    );
    assert!(out.source.contains("uint8_t present = (val->p != 0);"));
    assert!(
        out.source
            .contains("int ret = cser_raw_store_inner ((inner *)val->p, w, q);")
    );
    assert!(out.source.contains("inner *tmp_item = calloc (1, sizeof (inner));"));
    assert!(out.source.contains("val->p = tmp_item;"));
}

#[test]
fn single_pragma_keeps_char_pointer_scalar() {
    let out = generate(
        "typedef struct {\n\
         #pragma cser single\n\
           char *c;\n\
         } S;\n",
        &["S"],
    );
    assert!(
        out.source
            .contains("int ret = cser_raw_store_char ((char *)val->c, w, q);")
    );
    assert!(!out.source.contains("val->c[i - 1]"));
}

#[test]
fn alias_roots_emit_forwarders() {
    let out = generate(
        "typedef struct inner_s { int a; } inner;\n\
         typedef inner outer;\n",
        &["outer"],
    );
    assert!(out.header.contains(
        "static inline int cser_raw_store_outer (const outer *val, cser_raw_write_fn w, void *q)"
    ));
    assert!(out.header.contains("{ return cser_raw_store_inner (val, w, q); }"));
    assert!(out.header.contains(
        "static inline int cser_raw_load_outer (outer *val, cser_raw_read_fn r, void *q)"
    ));
    // The chain bottoms out at the tagged struct's own routines.
    assert!(
        out.header
            .contains("int cser_raw_store_struct_inner_s (const struct inner_s *val,")
    );
}

#[test]
fn unreachable_types_are_dropped() {
    let out = generate(
        "typedef struct { int a; } used;\n\
         typedef struct { int b; } unused;\n\
         typedef unsigned long stray_t;\n",
        &["used"],
    );
    assert!(out.header.contains("cser_raw_store_used"));
    assert!(!out.header.contains("cser_raw_store_unused"));
    assert!(!out.header.contains("stray_t"));
}

#[test]
fn reachability_closes_over_nested_composites() {
    let out = generate(
        "typedef struct { uint8_t tag; } head;\n\
         typedef struct { head h; char *name; } rec;\n",
        &["rec"],
    );
    assert!(out.header.contains("cser_raw_store_head"));
    assert!(out.header.contains("cser_raw_store_unsigned_char"));
    assert!(out.header.contains("cser_raw_store_char"));
}

#[test]
fn double_pointer_member_fails_with_code_3() {
    let err = cser::generate(
        &raw_config(&["S"]),
        "typedef struct { int **pp; } S;",
    )
    .expect_err("double pointers are unsupported");
    let err = err.downcast_ref::<cser::Error>().expect("typed error");
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn unknown_root_fails_with_code_4() {
    let err = cser::generate(&raw_config(&["nope"]), "typedef struct { int a; } foo;")
        .expect_err("unknown root");
    let err = err.downcast_ref::<cser::Error>().expect("typed error");
    assert_eq!(err.exit_code(), 4);
    assert!(matches!(err, cser::Error::UnknownRoot(name) if name.as_str() == "nope"));
}

#[test]
fn non_composite_root_fails_with_code_5() {
    let err = cser::generate(&raw_config(&["int"]), "typedef struct { int a; } foo;")
        .expect_err("native root");
    let err = err.downcast_ref::<cser::Error>().expect("typed error");
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn no_roots_fails_with_code_9() {
    let err = cser::generate(&raw_config(&[]), "typedef struct { int a; } foo;")
        .expect_err("roots are required");
    let err = err.downcast_ref::<cser::Error>().expect("typed error");
    assert_eq!(err.exit_code(), 9);
}

#[test]
fn float_member_is_rejected() {
    let err = cser::generate(&raw_config(&["F"]), "typedef struct { float f; } F;")
        .expect_err("float has no byte-shift form");
    let err = err.downcast_ref::<cser::Error>().expect("typed error");
    assert_eq!(err.exit_code(), 3);
}
