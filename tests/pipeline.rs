//! Whole-pipeline tests: config loading, file output, include guards, and
//! backend concatenation.

use std::path::Path;

use cser::config::{Backend, Config};

const DECLS: &str = "typedef struct { int a; char *b; } foo;\n";

#[test]
fn run_writes_header_and_source_pair() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("decls.h"), DECLS).unwrap();

    let cfg = Config {
        input: Some("decls.h".into()),
        includes: vec!["mytypes.h".to_string()],
        backends: vec![Backend::Raw],
        roots: vec!["foo".to_string()],
        ..Config::default()
    };

    let (header_path, source_path) = cser::run(&cfg, dir.path()).expect("run succeeds");
    assert_eq!(header_path, dir.path().join("out.h"));
    assert_eq!(source_path, dir.path().join("out.c"));

    let header = std::fs::read_to_string(&header_path).unwrap();
    let source = std::fs::read_to_string(&source_path).unwrap();

    assert!(header.starts_with("/* Generated by cser. Do not edit. */\n#ifndef _out_h_\n"));
    assert!(header.contains("#define _out_h_"));
    assert!(header.contains("#include \"mytypes.h\""));
    assert!(header.trim_end().ends_with("#endif"));
    assert!(source.contains("#include \"out.h\""));
    assert!(source.contains("int cser_raw_store_foo (const foo *val, cser_raw_write_fn w, void *q)"));
}

#[test]
fn custom_basename_shapes_guard_and_include() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("decls.h"), DECLS).unwrap();

    let cfg = Config {
        input: Some("decls.h".into()),
        output: cser::config::OutputConfig {
            basename: "gen".to_string(),
        },
        roots: vec!["foo".to_string()],
        ..Config::default()
    };

    let (header_path, source_path) = cser::run(&cfg, dir.path()).expect("run succeeds");
    assert!(header_path.ends_with("gen.h"));
    let header = std::fs::read_to_string(&header_path).unwrap();
    let source = std::fs::read_to_string(&source_path).unwrap();
    assert!(header.contains("#ifndef _gen_h_"));
    assert!(source.contains("#include \"gen.h\""));
}

#[test]
fn selected_backends_concatenate_in_order() {
    let cfg = Config {
        backends: vec![Backend::Raw, Backend::Xml],
        roots: vec!["foo".to_string()],
        ..Config::default()
    };
    let out = cser::generate(&cfg, DECLS).expect("generation succeeds");

    let raw_at = out
        .header
        .find("cser_raw_write_fn")
        .expect("raw prelude present");
    let xml_at = out
        .header
        .find("cser xml backend")
        .expect("xml prelude present");
    assert!(raw_at < xml_at, "raw output should precede xml output");

    // Both backends cover the same type graph.
    assert!(out.source.contains("int cser_raw_store_foo"));
    assert!(out.source.contains("bool cser_xml_store_foo"));
}

#[test]
fn raw_is_the_default_backend() {
    let cfg = Config {
        roots: vec!["foo".to_string()],
        ..Config::default()
    };
    let out = cser::generate(&cfg, DECLS).expect("generation succeeds");
    assert!(out.header.contains("cser_raw_store_foo"));
    assert!(!out.header.contains("cser_xml_store_foo"));
}

#[test]
fn config_file_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toml_path = dir.path().join("cser.toml");
    std::fs::write(
        &toml_path,
        "input = \"decls.h\"\n\
         includes = [\"a.h\", \"b.h\"]\n\
         backends = [\"raw\", \"xml\"]\n\
         roots = [\"foo\"]\n\
         \n\
         [output]\n\
         basename = \"gen\"\n",
    )
    .unwrap();

    let cfg = cser::config::load_config(&toml_path).expect("config loads");
    assert_eq!(cfg.input.as_deref(), Some(Path::new("decls.h")));
    assert_eq!(cfg.includes, vec!["a.h".to_string(), "b.h".to_string()]);
    assert_eq!(cfg.backends, vec![Backend::Raw, Backend::Xml]);
    assert_eq!(cfg.roots, vec!["foo".to_string()]);
    assert_eq!(cfg.output.basename, "gen");
}

#[test]
fn config_defaults_are_minimal() {
    let cfg: Config = Config::default();
    assert!(cfg.input.is_none());
    assert_eq!(cfg.output.basename, "out");
    assert_eq!(cfg.backends_or_default(), vec![Backend::Raw]);
}

#[test]
fn malformed_config_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toml_path = dir.path().join("cser.toml");
    std::fs::write(&toml_path, "backends = [\"carrier-pigeon\"]\n").unwrap();
    assert!(cser::config::load_config(&toml_path).is_err());
}

#[test]
fn missing_input_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = Config {
        input: Some("absent.h".into()),
        roots: vec!["foo".to_string()],
        ..Config::default()
    };
    assert!(cser::run(&cfg, dir.path()).is_err());
}
