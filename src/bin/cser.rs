//! CLI entry point for cser.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;

use cser::config::{Backend, Config};

/// cser — generate C serialization routines from struct declarations.
#[derive(Parser, Debug)]
#[command(name = "cser", version, about)]
struct Cli {
    /// Print each parsed type as it is added to the model.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output basename; produces <basename>.h and <basename>.c.
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Add an #include "<file>" to the generated header (repeatable).
    #[arg(short = 'i', long = "include", value_name = "FILE")]
    includes: Vec<String>,

    /// Select an output backend: raw or xml (repeatable; default raw).
    #[arg(short = 'b', long = "backend", value_name = "BACKEND")]
    backends: Vec<String>,

    /// Read declarations from a file instead of standard input.
    #[arg(short = 'f', long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Load options from a cser.toml configuration file.
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root composite type names to generate serializers for.
    #[arg(value_name = "TYPE")]
    roots: Vec<String>,
}

fn main() {
    // Help and usage errors share the syntax exit code.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let default_filter = match cli.verbose {
        0 => "cser=info",
        1 => "cser=debug",
        _ => "cser=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = match &cli.config {
        Some(path) => match cser::config::load_config(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: {e:#}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    // CLI flags override and extend the config file.
    if cli.input.is_some() {
        cfg.input = cli.input.clone();
    }
    if let Some(basename) = &cli.output {
        cfg.output.basename = basename.clone();
    }
    cfg.includes.extend(cli.includes.iter().cloned());
    for backend in &cli.backends {
        match Backend::from_str(backend) {
            Ok(b) => cfg.backends.push(b),
            Err(msg) => {
                eprintln!("error: {msg}");
                std::process::exit(1);
            }
        }
    }
    cfg.roots.extend(cli.roots.iter().cloned());

    if cfg.roots.is_empty() {
        eprintln!("error: no types specified");
        std::process::exit(9);
    }

    if let Err(e) = cser::run(&cfg, Path::new(".")) {
        eprintln!("error: {e:#}");
        let code = e
            .downcast_ref::<cser::Error>()
            .map(cser::Error::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
