//! Load schema files and report diagnostics.
//!
//! Usage:
//!   check_schema [OPTIONS] [FILE.xml ...]
//!   check_schema < schema.xml
//!
//! All files are loaded into one protocol, in the order given, so later schemas may refer to
//! earlier ones with `@Schema.` references.
//!
//! Options:
//!   --verbose, -v   Also print info and debug diagnostics
//!   --quiet, -q     Only print errors
//!   --summary, -s   Print message lengths after a successful load
//!
//! `RUST_LOG` overrides the log filter for the underlying tracing output.

use std::io::{self, Read};

use protoschema::{Diagnostic, Level, Protocol};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn shows(self, level: Level) -> bool {
        match self {
            Verbosity::Quiet => level == Level::Error,
            Verbosity::Normal => level >= Level::Warning,
            Verbosity::Verbose => true,
        }
    }
}

fn init_logging(verbosity: Verbosity) {
    let default = match verbosity {
        Verbosity::Verbose => "protoschema=debug",
        _ => "off",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::Debug => "debug",
        Level::Info => "info",
        Level::Warning => "warning",
        Level::Error => "error",
    }
}

fn print_diagnostic(path: &str, d: &Diagnostic) {
    match d.line {
        Some(line) => println!("{}:{}: {}: {}", path, line, level_str(d.level), d.message),
        None => println!("{}: {}: {}", path, level_str(d.level), d.message),
    }
}

fn take_flag(args: &mut Vec<String>, long: &str, short: &str) -> bool {
    match args.iter().position(|a| a == long || a == short) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn print_summary(protocol: &Protocol) {
    for schema in protocol.schemas() {
        println!("schema {} (version {})", schema.name(), schema.ctx.version);
        for msg in &schema.messages {
            let max = match msg.max_length() {
                usize::MAX => "unbounded".to_string(),
                n => n.to_string(),
            };
            println!(
                "  {} id={} fields={} min={} max={}",
                msg.qualified_name,
                msg.id,
                msg.fields.len(),
                msg.min_length(),
                max
            );
        }
    }
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let verbosity = if take_flag(&mut args, "--verbose", "-v") {
        Verbosity::Verbose
    } else if take_flag(&mut args, "--quiet", "-q") {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };
    let summary = take_flag(&mut args, "--summary", "-s");
    init_logging(verbosity);

    let mut sources = Vec::new();
    if args.is_empty() {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src)?;
        sources.push(("<stdin>".to_string(), src));
    } else {
        for path in &args {
            match std::fs::read_to_string(path) {
                Ok(src) => sources.push((path.clone(), src)),
                Err(e) => {
                    eprintln!("{}: {}", path, e);
                    std::process::exit(1);
                }
            }
        }
    }

    let mut protocol = Protocol::new();
    let mut has_error = false;
    let mut total_warnings = 0usize;
    let mut total_errors = 0usize;
    let mut seen = 0usize;
    for (path, src) in &sources {
        let loaded = protocol.load_str(src);
        let entries = protocol.diagnostics().entries();
        for d in &entries[seen..] {
            match d.level {
                Level::Error => total_errors += 1,
                Level::Warning => total_warnings += 1,
                _ => {}
            }
            if verbosity.shows(d.level) {
                print_diagnostic(path, d);
            }
        }
        seen = entries.len();
        if loaded.is_err() {
            has_error = true;
            break;
        }
    }

    if summary && !has_error {
        print_summary(&protocol);
    }
    if total_errors > 0 || total_warnings > 0 {
        eprintln!(
            "check: {} error(s), {} warning(s)",
            total_errors, total_warnings
        );
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
