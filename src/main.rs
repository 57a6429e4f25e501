use clap::Parser;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use ariadne::{Label, Report, ReportKind, Source};
use itertools::Itertools;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use abdl::{AnyOf, CommitHash, Defs, Kind, PatternError, PatternErrorKind, Uri, Value, compile, json};

const EXIT_INVALID: u8 = 1;
const EXIT_BAD_PATTERN: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ABDL pattern to match
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// JSON document to match against; stdin when absent
    #[arg(value_name = "FILE")]
    file: Option<String>,

    /// Define a type test, e.g. `dict=map` or `coll=map|seq|set`
    #[arg(short = 't', long = "type", value_name = "NAME=KIND[|KIND]")]
    types: Vec<String>,

    /// Define a key parameter as JSON (taken as a plain string if it isn't JSON)
    #[arg(short = 'p', long = "param", value_name = "NAME=JSON")]
    params: Vec<String>,

    /// Define every built-in kind name (dict, list, str, ...)
    #[arg(long)]
    builtin_types: bool,

    /// Define a type test accepting git commit ids
    #[arg(long, value_name = "NAME")]
    commit: Vec<String>,

    /// Define a type test accepting URIs with one of the given schemes
    #[arg(long, value_name = "NAME=SCHEME[,SCHEME]")]
    uri: Vec<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_BAD_PATTERN)
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &Args) -> Result<ExitCode> {
    let defs = build_defs(args)?;
    debug!(names = ?defs.names().collect::<Vec<_>>(), "definitions");

    let pattern = match compile(&args.pattern, &defs) {
        Ok(pattern) => pattern,
        Err(err) => {
            report_pattern_error(&err);
            return Ok(ExitCode::from(EXIT_BAD_PATTERN));
        }
    };

    let text = match &args.file {
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            text
        }
    };
    let document: serde_json::Value = serde_json::from_str(&text).context("input is not valid JSON")?;
    let tree = Value::from(document);

    let mut out = io::stdout().lock();
    for result in pattern.matches(&tree) {
        match result {
            Ok(bindings) => writeln!(out, "{}", json::bindings_to_json(&bindings))?,
            Err(err) => {
                out.flush()?;
                eprintln!("validation error: {err}");
                return Ok(ExitCode::from(EXIT_INVALID));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn build_defs(args: &Args) -> Result<Defs> {
    let mut defs = if args.builtin_types {
        Defs::builtin_kinds()
    } else {
        Defs::new()
    };

    for spec in &args.types {
        let (name, kinds) = split_def(spec)?;
        let kinds: Vec<Kind> = kinds
            .split('|')
            .map(|k| Kind::from_name(k.trim()).with_context(|| format!("unknown kind `{k}` in `{spec}`")))
            .try_collect()?;
        defs = if let [kind] = kinds[..] {
            defs.with_kind(name, kind)
        } else {
            defs.with_predicate(name, AnyOf(kinds))
        };
    }

    for spec in &args.params {
        let (name, text) = split_def(spec)?;
        let key = serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(text));
        defs = defs.with_key(name, key);
    }

    for name in &args.commit {
        defs = defs.with_predicate(name.as_str(), CommitHash::default());
    }

    for spec in &args.uri {
        let (name, schemes) = split_def(spec)?;
        defs = defs.with_predicate(name, Uri::new(schemes.split(',').map(str::trim)));
    }

    Ok(defs)
}

fn split_def(spec: &str) -> Result<(&str, &str)> {
    match spec.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => bail!("expected NAME=VALUE, got `{spec}`"),
    }
}

fn report_pattern_error(err: &PatternError) {
    const SOURCE_ID: &str = "pattern";
    let len = err.pattern.chars().count();
    let span = err.pos..(err.pos + 1).min(len).max(err.pos);
    let label = match &err.kind {
        PatternErrorKind::UndefinedName(_) if !err.defs.is_empty() => {
            format!("defined names: {}", err.defs.names().join(", "))
        }
        PatternErrorKind::UndefinedName(_) => "no names are defined".to_string(),
        _ => err.message(),
    };
    let report = Report::build(ReportKind::Error, (SOURCE_ID, span.clone()))
        .with_message(err.to_string())
        .with_label(Label::new((SOURCE_ID, span)).with_message(label))
        .finish();
    if report
        .eprint((SOURCE_ID, Source::from(err.pattern.as_str())))
        .is_err()
    {
        eprintln!("{err}");
    }
}
