use clap::Parser;
use miette::{GraphicalReportHandler, NamedSource, Report};
use motly_core::tree::Node;
use motly_core::{evaluate, resolver, schema, serialization, MotlyError, SemanticError};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

/// Parse MOTLY from stdin and print the tree as JSON.
#[derive(Parser)]
#[command(name = "motly", version, about)]
struct Cli {
    /// Validate the tree against a schema file after parsing.
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Emit compact JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut input = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut input) {
        eprintln!("error reading stdin: {err}");
        return ExitCode::FAILURE;
    }

    let outcome = evaluate(&input, Node::new());
    let mut failed = !outcome.diagnostics.is_empty();
    let mut had_syntax_error = false;
    for diagnostic in &outcome.diagnostics {
        if matches!(diagnostic, MotlyError::Syntax(_)) {
            had_syntax_error = true;
        }
        report("<stdin>", &input, diagnostic);
    }

    for err in resolver::validate_references(&outcome.value) {
        report_semantic(&err);
        failed = true;
    }

    if let Some(path) = &cli.schema {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let name = path.display().to_string();
                let schema_outcome = evaluate(&text, Node::new());
                if schema_outcome.diagnostics.is_empty() {
                    for err in schema::validate_schema(&outcome.value, &schema_outcome.value) {
                        report_semantic(&err);
                        failed = true;
                    }
                } else {
                    for diagnostic in &schema_outcome.diagnostics {
                        report(&name, &text, diagnostic);
                    }
                    failed = true;
                }
            }
            Err(err) => {
                eprintln!("error reading {}: {err}", path.display());
                failed = true;
            }
        }
    }

    if !had_syntax_error {
        let json = if cli.compact {
            serialization::to_json(&outcome.value)
        } else {
            serialization::to_json_pretty(&outcome.value)
        };
        match json {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("error serializing tree: {err}");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn report(name: &str, source: &str, diagnostic: &MotlyError) {
    match diagnostic {
        MotlyError::Syntax(err) => {
            let report = Report::new(err.clone())
                .with_source_code(NamedSource::new(name, source.to_string()));
            let mut rendered = String::new();
            if GraphicalReportHandler::new()
                .render_report(&mut rendered, &*report)
                .is_ok()
            {
                eprint!("{rendered}");
            } else {
                eprintln!("{}: {err}", err.begin.line + 1);
            }
        }
        MotlyError::Semantic(err) => report_semantic(err),
    }
}

fn report_semantic(err: &SemanticError) {
    eprintln!("{} @ {}: {err}", err.code(), err.path().join("."));
}
