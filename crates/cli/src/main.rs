use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fpipe_engine::{Term, Value, store, variables};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

mod config;
mod template;

use config::CliConfig;

type JsonContext = JsonMap<String, JsonValue>;

/// Resolve pipeline templates against JSON contexts.
#[derive(Parser, Debug)]
#[command(name = "fpipe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a template against a context and print the result as JSON
    Resolve(ResolveArgs),
}

#[derive(clap::Args, Debug)]
struct ResolveArgs {
    /// JSON object supplying the fields `$attr` placeholders read
    #[arg(long)]
    context: PathBuf,

    /// JSON template; `$var`, `$attr`, `$tuple` and `$set` objects are placeholders and containers
    #[arg(long)]
    template: PathBuf,

    /// Initial variable value, as NAME=JSON (repeatable)
    #[arg(long = "var", value_name = "NAME=JSON", value_parser = parse_binding)]
    vars: Vec<(String, JsonValue)>,

    /// Store the result into this context field and print the updated context
    #[arg(long, value_name = "FIELD")]
    store_into: Option<String>,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

/// CLI entry point
fn main() -> Result<()> {
    let config = CliConfig::load().context("failed to load fpipe config")?;
    init_tracing(config.log_filter.as_deref());
    let Cli { command } = Cli::parse();
    match command {
        Command::Resolve(args) => {
            let output = run_resolve(&args, &config)?;
            println!("{output}");
        }
    }
    Ok(())
}

fn init_tracing(configured: Option<&str>) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_resolve(args: &ResolveArgs, config: &CliConfig) -> Result<String> {
    let context = match read_json(&args.context)? {
        JsonValue::Object(fields) => fields,
        other => bail!("context must be a JSON object, found {}", json_kind(&other)),
    };
    let template = read_json(&args.template)?;
    let output = resolve(context, &template, &args.vars, args.store_into.as_deref())?;
    let rendered = if args.pretty || config.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    Ok(rendered)
}

/// Resolves `template` as the trailing term of a scoped pipeline run against `context`.
fn resolve(
    mut context: JsonContext,
    template: &JsonValue,
    bindings: &[(String, JsonValue)],
    store_into: Option<&str>,
) -> Result<JsonValue> {
    let result = variables(|scope| {
        for (name, value) in bindings {
            scope.variable_with(name, Value::from(value.clone()))?;
        }
        let decoded = template::decode(scope, template)?;
        let terms: Vec<Term<JsonContext>> = match store_into {
            Some(field) => vec![store(scope.attribute(field)?, decoded).into()],
            None => vec![Term::Value(decoded)],
        };
        debug!(placeholders = scope.len(), "template decoded");
        scope.pipeline(terms)?.call(&mut context)
    })
    .context("failed to resolve template")?;

    match store_into {
        Some(_) => Ok(JsonValue::Object(context)),
        None => Ok(result.to_json()?),
    }
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let data = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn parse_binding(raw: &str) -> Result<(String, JsonValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=JSON, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    let value = serde_json::from_str(value).map_err(|error| format!("invalid JSON for '{name}': {error}"))?;
    Ok((name.to_string(), value))
}
