/// Version injected at compile time via CLOUDMODELS_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("CLOUDMODELS_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cloudmodels::model::validate::list_invalid_properties_in;
use cloudmodels::model::{
    Deserializer, Diagnostic, DiagnosticsSink, Instance, RecordingSink, Registry, Serializer, TracingSink,
};
use cloudmodels::transport::{format_api_error, ModelClient};
use cloudmodels::Config;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Inspect cloud SDK model descriptors and run payloads through the codec
#[derive(Parser, Debug)]
#[command(name = "cloudmodels", version = VERSION, about, long_about = None)]
struct Args {
    /// Extra descriptor file or directory (repeatable)
    #[arg(short, long = "descriptors", global = true)]
    descriptors: Vec<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered models
    List {
        /// Only show models with a discriminator
        #[arg(long)]
        polymorphic: bool,
    },
    /// Show the fields of a model
    Show { model: String },
    /// Decode a payload and print it re-serialized
    Decode {
        #[arg(short, long)]
        model: Option<String>,
        /// JSON file; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Decode a payload and report validation problems
    Validate {
        #[arg(short, long)]
        model: Option<String>,
        file: Option<PathBuf>,
    },
    /// GET a resource and decode the response
    Fetch {
        #[arg(short, long)]
        model: Option<String>,
        /// Request path relative to the base URL
        path: String,
        /// Service endpoint (overrides config)
        #[arg(long)]
        base_url: Option<String>,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = parse_query)]
        query: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG narrows or widens per target; --log-level is the default
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(Level::TRACE))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudmodels started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("cloudmodels").join("cloudmodels.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cloudmodels").join("cloudmodels.log");
    }
    PathBuf::from("cloudmodels.log")
}

fn parse_query(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let mut config = Config::load();

    // --descriptors applies to this run only and never reaches the saved config
    let registry = config
        .registry_with(&args.descriptors)
        .context("Failed to load model descriptors")?;
    tracing::info!("Loaded {} models", registry.len());

    match args.command {
        Command::List { polymorphic } => list_models(&registry, polymorphic),
        Command::Show { model } => show_model(&registry, &model),
        Command::Decode { model, file } => {
            let model = resolve_model(&mut config, model)?;
            let raw = read_payload(file.as_ref())?;
            let instance = decode_reporting(&registry, &config, &raw, &model)?;
            print_json(&Serializer::new(&registry).serialize(&instance)?)
        }
        Command::Validate { model, file } => {
            let model = resolve_model(&mut config, model)?;
            let raw = read_payload(file.as_ref())?;
            let instance = decode_reporting(&registry, &config, &raw, &model)?;
            let problems = list_invalid_properties_in(&registry, &instance);
            if problems.is_empty() {
                println!("{} is valid", instance.model());
                return Ok(());
            }
            for problem in &problems {
                println!("{}", problem);
            }
            anyhow::bail!("{} has {} invalid properties", instance.model(), problems.len())
        }
        Command::Fetch {
            model,
            path,
            base_url,
            query,
        } => {
            let model = resolve_model(&mut config, model)?;
            let base_url = base_url
                .or_else(|| config.base_url.clone())
                .context("No base URL configured. Use --base-url or set base_url in config.json")?;

            let recording = RecordingSink::new();
            let sink: &dyn DiagnosticsSink = if config.warn_on_fallback {
                &TracingSink
            } else {
                &recording
            };
            let client = ModelClient::new(&base_url, &registry)?.with_sink(sink);
            let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

            let instance = match client.get_with_query(&path, &query, &model).await {
                Ok(instance) => instance,
                Err(e) => anyhow::bail!(format_api_error(&e)),
            };
            print_diagnostics(&recording.take());
            print_json(&Serializer::new(&registry).serialize(&instance)?)
        }
    }
}

fn list_models(registry: &Registry, polymorphic: bool) -> Result<()> {
    for name in registry.model_names() {
        match registry.group(name) {
            Some(group) => {
                let members: Vec<String> = group
                    .members
                    .iter()
                    .map(|(value, def)| format!("{}={}", value, def.name))
                    .collect();
                println!("{} [{}: {}]", name, group.field, members.join(", "));
            }
            None if !polymorphic => println!("{}", name),
            None => {}
        }
    }
    Ok(())
}

fn show_model(registry: &Registry, name: &str) -> Result<()> {
    let def = registry
        .model(name)
        .with_context(|| format!("Unknown model '{}'", name))?;

    println!("{}", def.name);
    if let Some(parent) = &def.parent {
        println!("  extends {}", parent);
    }
    if let Some(value) = &def.discriminator_value {
        println!("  discriminator value {}", value);
    }
    for field in &def.fields {
        let mut flags = Vec::new();
        if field.required {
            flags.push("required".to_string());
        }
        if field.nullable {
            flags.push("nullable".to_string());
        }
        if let Some(default) = &field.default {
            flags.push(format!("default {}", default));
        }
        println!(
            "  {:<32} {:<32} {}{}",
            field.logical,
            field.wire,
            field.ty,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        );
    }
    if let Some(disc) = &def.discriminator {
        println!("  subtypes by {}:", disc.field);
        for (value, model) in &disc.mapping {
            println!("    {:<30} {}", value, model);
        }
    }
    Ok(())
}

/// CLI flag first, then the last model used
fn resolve_model(config: &mut Config, model: Option<String>) -> Result<String> {
    let model = model
        .or_else(|| config.last_model.clone())
        .context("No model given. Use --model")?;
    if let Err(e) = config.set_last_model(&model) {
        tracing::warn!("Failed to save config: {}", e);
    }
    Ok(model)
}

fn read_payload(file: Option<&PathBuf>) -> Result<Value> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("Payload is not valid JSON")
}

fn decode_reporting(registry: &Registry, config: &Config, raw: &Value, model: &str) -> Result<Instance> {
    let recording = RecordingSink::new();
    let sink: &dyn DiagnosticsSink = if config.warn_on_fallback {
        &TracingSink
    } else {
        &recording
    };
    let instance = Deserializer::new(registry)
        .with_sink(sink)
        .deserialize_model(raw, model)
        .with_context(|| format!("Failed to decode payload as {}", model))?;

    if instance.model() != model {
        eprintln!("decoded as {}", instance.model());
    }
    print_diagnostics(&recording.take());
    Ok(instance)
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
