//! Command-line front end for the extraction client and validator

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scrape_assistant::client::ExtractClient;
use scrape_assistant::config::Config;
use scrape_assistant::keystore::{FileKeyStore, KeyStore};
use scrape_assistant::models;
use scrape_assistant::session::FormSession;
use scrape_assistant::types::{ExtractionResult, FieldType};
use scrape_assistant::validate::{outcome_message, validate_field, ValidationTarget, Validity};

#[derive(Parser)]
#[command(name = "scrape-assistant", version, about = "AI-assisted selector extraction with local validation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit HTML to the extraction API and validate the result locally
    Extract {
        /// HTML files to extract from; oversized files become attachments
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
        /// Field to extract, as `name`, `name:type` or `name:type:hint`
        #[arg(long = "field", default_value = "Title")]
        fields: Vec<String>,
        /// Model id from `models`
        #[arg(long)]
        model: Option<String>,
        /// API key; falls back to the saved key
        #[arg(long)]
        api_key: Option<String>,
        /// Write the raw extraction result as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-validate a saved extraction result against an HTML snapshot
    Validate {
        /// Extraction result JSON, as written by `extract --output`
        result: PathBuf,
        /// HTML snapshot to validate against
        html: PathBuf,
    },
    /// List the models the extraction API accepts
    Models,
    /// Save the API key for later runs
    SetKey { key: String },
    /// Forget the saved API key
    ClearKey,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract {
            files,
            fields,
            model,
            api_key,
            output,
        } => extract(files, fields, model, api_key, output),
        Command::Validate { result, html } => validate(result, html),
        Command::Models => {
            list_models();
            Ok(())
        }
        Command::SetKey { key } => {
            FileKeyStore::new()?.save(&key)?;
            println!("API key saved");
            Ok(())
        }
        Command::ClearKey => {
            FileKeyStore::new()?.clear()?;
            println!("API key cleared");
            Ok(())
        }
    }
}

fn extract(
    files: Vec<PathBuf>,
    field_specs: Vec<String>,
    model: Option<String>,
    api_key: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = Config::from_env();
    let api_key = match api_key {
        Some(key) => key,
        None => FileKeyStore::new()?
            .load()?
            .context("no API key; pass --api-key or run `set-key`")?,
    };

    let mut session = FormSession::new();
    session.remove_field("default");
    for spec in &field_specs {
        let (name, field_type, info) = parse_field_spec(spec)?;
        session.add_field(name, field_type, info);
    }
    session.set_model(model.unwrap_or(config.default_model.clone()));

    for path in &files {
        let html = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        session.set_html_input(html);
    }

    let request = session.begin_submit()?;
    let client = ExtractClient::new(&config)?;
    let result = match client.extract(&api_key, &request) {
        Ok(result) => result,
        Err(e) => {
            session.fail_submit();
            return Err(e.into());
        }
    };
    let version = session.complete_submit(result.clone());
    info!(version, model = %result.model, "recorded extraction result");

    if let Some(path) = &output {
        fs::write(path, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let snapshot = session.results.latest().map(|r| r.html_input.clone()).unwrap_or_default();
    print_report(&result, &snapshot);
    Ok(())
}

fn validate(result_path: PathBuf, html_path: PathBuf) -> Result<()> {
    let raw = fs::read_to_string(&result_path)
        .with_context(|| format!("reading {}", result_path.display()))?;
    let result: ExtractionResult =
        serde_json::from_str(&raw).context("parsing extraction result JSON")?;
    let html = fs::read_to_string(&html_path)
        .with_context(|| format!("reading {}", html_path.display()))?;

    print_report(&result, &html);
    Ok(())
}

/// `name`, `name:type` or `name:type:hint`
fn parse_field_spec(spec: &str) -> Result<(String, FieldType, String)> {
    let mut parts = spec.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        bail!("empty field name in `{spec}`");
    }
    let field_type = match parts.next().map(str::trim) {
        None | Some("") | Some("text") => FieldType::Text,
        Some("number") => FieldType::Number,
        Some("link") => FieldType::Link,
        Some("image") => FieldType::Image,
        Some(other) => bail!("unknown field type `{other}` in `{spec}`"),
    };
    let info = parts.next().unwrap_or_default().trim().to_string();
    Ok((name.to_string(), field_type, info))
}

fn list_models() {
    for model in models::MODELS {
        let default = if model.is_default { " (default)" } else { "" };
        println!(
            "{:<45} {:<25} {:?} ${}/M in, ${}/M out{}",
            model.id, model.label, model.indicator, model.price_input, model.price_output, default
        );
    }
}

fn print_report(result: &ExtractionResult, html: &str) {
    println!(
        "model {}  tokens {}/{}  price ${:.6}",
        result.model, result.usage.input_tokens, result.usage.output_tokens, result.total_price
    );

    for field in &result.fields {
        println!("\n{}", field.field);
        let validation = validate_field(html, field);

        if let Some(outcome) = &validation.selector {
            let target = ValidationTarget::Selector {
                selector: &field.selector,
                method: field.extract_method,
            };
            print_line("selector", &field.selector, outcome.validity, outcome_message(&target, outcome));
            if let Some(value) = &outcome.extracted {
                println!("    extracted: {}", clip(value));
            }
        }
        if let Some(outcome) = &validation.regex {
            let target = ValidationTarget::Regex {
                pattern: &field.regex,
                selector: &field.selector,
                method: field.extract_method,
                mode: field.regex_use,
                match_index: field.regex_match_index_to_use,
            };
            print_line("regex", &field.regex, outcome.validity, outcome_message(&target, outcome));
            if let Some(value) = &outcome.extracted {
                println!("    extracted: {}", clip(value));
            }
        }
        if let Some(outcome) = &validation.code {
            let target = ValidationTarget::Code {
                source: &field.java_script_function,
            };
            print_line("code", "javascript function", outcome.validity, outcome_message(&target, outcome));
            if let Some(value) = &outcome.extracted {
                println!("    extracted: {}", clip(value));
            }
        }
    }
}

fn print_line(kind: &str, detail: &str, validity: Validity, message: Option<&'static str>) {
    let mark = match validity {
        Validity::Valid => "ok",
        Validity::Invalid => "FAIL",
        Validity::Indeterminate => "????",
    };
    match message {
        Some(message) => println!("  [{mark:>4}] {kind}: {detail}  ({message})"),
        None => println!("  [{mark:>4}] {kind}: {detail}"),
    }
}

fn clip(value: &str) -> String {
    let flat = value.replace('\n', " ");
    if flat.chars().count() > 120 {
        let mut out: String = flat.chars().take(120).collect();
        out.push('…');
        out
    } else {
        flat
    }
}
