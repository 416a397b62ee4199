//! Command-line interface for guardtag
//! Prints the per-line permissions guard tags produce, and checks them against another parser.
//!
//! Usage:
//!   guardtag scan `<path>` [--format `<format>`] [--language `<id>`]
//!       Show permissions for a file
//!   guardtag export `<path>` [--language `<id>`]
//!       Print the validation request JSON
//!   guardtag validate `<path>` --external `<file>`
//!       Diff against another parser's regions
//!   guardtag languages
//!       List languages in the scope table
//!
//! Every subcommand accepts `--config <file>` to layer a TOML file over the
//! built-in defaults; `GUARDTAG_<SECTION>__<KEY>` variables override both.
//! Logging goes to stderr, filtered by `GUARDTAG_LOG`.

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgMatches, Command};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use guardtag::guard::formats::{render, OutputFormat};
use guardtag::guard::validation::schema::{ValidationRequest, ValidationResponse};
use guardtag::guard::{Document, GuardAnalysis, GuardEngine};
use guardtag_config::Loader;

fn main() {
    init_logging();

    let language_arg = Arg::new("language")
        .long("language")
        .short('l')
        .help("Language id (default: detected from the file extension)");

    let matches = Command::new("guardtag")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compute AI/human line permissions from guard tags")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("TOML file layered over the built-in configuration"),
        )
        .subcommand(
            Command::new("scan")
                .about("Show the permissions of every line")
                .arg(
                    Arg::new("path")
                        .help("Path to the source file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format")
                        .value_parser(PossibleValuesParser::new(OutputFormat::names()))
                        .default_value("table"),
                )
                .arg(language_arg.clone()),
        )
        .subcommand(
            Command::new("export")
                .about("Print the tagged regions as a validation request")
                .arg(
                    Arg::new("path")
                        .help("Path to the source file")
                        .required(true)
                        .index(1),
                )
                .arg(language_arg.clone()),
        )
        .subcommand(
            Command::new("validate")
                .about("Compare the tagged regions with another parser's")
                .arg(
                    Arg::new("path")
                        .help("Path to the source file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("external")
                        .long("external")
                        .short('e')
                        .help("Validation request JSON produced by the other parser")
                        .required(true),
                )
                .arg(language_arg),
        )
        .subcommand(Command::new("languages").about("List languages known to the scope table"))
        .get_matches();

    let Some((name, sub_matches)) = matches.subcommand() else {
        unreachable!()
    };
    let engine = build_engine(sub_matches.get_one::<String>("config"));

    match (name, sub_matches) {
        ("scan", scan_matches) => {
            let path = scan_matches.get_one::<String>("path").unwrap();
            let format = scan_matches.get_one::<String>("format").unwrap();
            handle_scan_command(&engine, path, format, language(scan_matches));
        }
        ("export", export_matches) => {
            let path = export_matches.get_one::<String>("path").unwrap();
            handle_export_command(&engine, path, language(export_matches));
        }
        ("validate", validate_matches) => {
            let path = validate_matches.get_one::<String>("path").unwrap();
            let external = validate_matches.get_one::<String>("external").unwrap();
            handle_validate_command(&engine, path, external, language(validate_matches));
        }
        ("languages", _) => {
            handle_languages_command(&engine);
        }
        _ => unreachable!(),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("GUARDTAG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn language(matches: &ArgMatches) -> Option<&str> {
    matches.get_one::<String>("language").map(String::as_str)
}

fn build_engine(config_path: Option<&String>) -> GuardEngine {
    let mut loader = Loader::new();
    if let Some(path) = config_path {
        loader = loader.with_file(path);
    }
    loader = loader.with_env();
    let config = loader.build().unwrap_or_else(|e| {
        eprintln!("Error loading configuration: {}", e);
        std::process::exit(1);
    });
    GuardEngine::from_config(&config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    })
}

fn read_source(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file: {}", e);
        std::process::exit(1);
    })
}

fn analyze(engine: &GuardEngine, document: &Document) -> GuardAnalysis {
    engine.analyze(document).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    })
}

fn document<'a>(
    engine: &GuardEngine,
    source: &'a str,
    path: &str,
    language: Option<&str>,
) -> Document<'a> {
    let detected = language.or_else(|| engine.detect_language(Path::new(path)));
    match detected {
        Some(id) => Document::new(source).with_language(id),
        None => Document::new(source),
    }
}

/// Handle the scan command
fn handle_scan_command(engine: &GuardEngine, path: &str, format: &str, language: Option<&str>) {
    let format: OutputFormat = format.parse().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let source = read_source(path);
    let document = document(engine, &source, path, language);
    let analysis = analyze(engine, &document);
    let output = render(format, &document, &analysis)
        .unwrap_or_else(|e| {
            eprintln!("Error rendering output: {}", e);
            std::process::exit(1);
        });
    print!("{}", output);
}

/// Handle the export command
fn handle_export_command(engine: &GuardEngine, path: &str, language: Option<&str>) {
    let source = read_source(path);
    let analysis = analyze(engine, &document(engine, &source, path, language));
    let json = analysis.validation_request(path).to_json().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    println!("{}", json);
}

/// Handle the validate command
fn handle_validate_command(
    engine: &GuardEngine,
    path: &str,
    external: &str,
    language: Option<&str>,
) {
    let source = read_source(path);
    let analysis = analyze(engine, &document(engine, &source, path, language));
    let request = ValidationRequest::from_json(&read_source(external)).unwrap_or_else(|e| {
        eprintln!("Error parsing {}: {}", external, e);
        std::process::exit(1);
    });
    if request.total_lines != analysis.line_count {
        tracing::warn!(
            engine = analysis.line_count,
            external = request.total_lines,
            "line counts differ"
        );
    }

    let report = engine.validate(&analysis, &request);
    let json = ValidationResponse::from(&report).to_json().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    println!("{}", json);
    if report.has_errors() {
        std::process::exit(1);
    }
}

/// Handle the languages command
fn handle_languages_command(engine: &GuardEngine) {
    let table = engine.scope_table();
    println!("Language scope table {}:\n", table.version());
    for language in table.languages() {
        let extensions: Vec<String> = language
            .extensions
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect();
        println!("  {}", language.id);
        println!("    extensions: {}", extensions.join(" "));
        let scopes: Vec<&str> = language.scope_names().collect();
        println!("    scopes: {}", scopes.join(" "));
    }
}
