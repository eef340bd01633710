//! Command-line front end
//!
//! Reads an expression from the argument or stdin, translates it with the
//! default table or with tables/options loaded from JSON files, and prints
//! the rendering. Errors print as the structured verbose value on stderr
//! with exit code 1.

use clap::Parser;
use mathspeak::{Evaluator, MathError, VerboseOutcome};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "mathspeak",
    version,
    about = "Translate math markup into spoken English"
)]
struct Cli {
    /// Expression to translate; reads stdin when omitted
    expression: Option<String>,

    /// JSON file with engine options
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// JSON file with a rule table ({words, types, rules} or a bare rules
    /// map)
    #[arg(long, value_name = "FILE")]
    rules: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(outcome) => {
            let rendered = serde_json::to_string_pretty(&outcome)
                .unwrap_or_else(|_| outcome.to_string());
            eprintln!("{}", rendered);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, VerboseOutcome> {
    let spec = build_spec(cli).map_err(|e| VerboseOutcome::failure(&e, "spec"))?;
    let evaluator = Evaluator::from_spec(&spec).map_err(|e| VerboseOutcome::failure(&e, "spec"))?;
    let expression = match &cli.expression {
        Some(e) => e.clone(),
        None => read_stdin().map_err(|e| VerboseOutcome::failure(&e, "user"))?,
    };
    let outcome = evaluator.evaluate_verbose(expression.trim());
    match outcome.result.clone() {
        Some(text) => Ok(text),
        None => Err(outcome),
    }
}

fn build_spec(cli: &Cli) -> Result<Value, MathError> {
    let mut spec = match &cli.options {
        Some(path) => match load_json(path)? {
            Value::Object(map) => map,
            other => {
                return Err(MathError::invalid_option_value("options", &other.to_string()))
            }
        },
        None => serde_json::Map::new(),
    };
    if let Some(path) = &cli.rules {
        let table = load_json(path)?;
        let is_full_table = table.get("rules").is_some()
            || table.get("words").is_some()
            || table.get("types").is_some();
        if is_full_table {
            for key in ["words", "types", "rules"] {
                if let Some(part) = table.get(key) {
                    spec.insert(key.to_string(), part.clone());
                }
            }
        } else {
            spec.insert("rules".to_string(), table);
        }
    }
    Ok(Value::Object(spec))
}

fn load_json(path: &Path) -> Result<Value, MathError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| MathError::internal_at(format!("cannot read {}: {}", path.display(), e), "cli"))?;
    serde_json::from_str(&text)
        .map_err(|e| MathError::internal_at(format!("invalid JSON in {}: {}", path.display(), e), "cli"))
}

fn read_stdin() -> Result<String, MathError> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| MathError::internal_at(format!("cannot read stdin: {}", e), "cli"))?;
    Ok(buf)
}
