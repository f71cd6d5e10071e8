use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::harness::{validate_syntax, Harness};
use crate::parser::{self, trigger::TriggerShape};
use crate::types::{LogKind, TriggerConfig, ValidationResult};
use crate::workflow::Workflow;

#[derive(Parser, Debug)]
#[command(name = "flowops")]
#[command(about = "FlowOps - validate and test-run workflow scripts", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Wall-clock limit for a test run in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate and test-run a script against a mocked SDK
    Test {
        /// Script file, or a workflow definition (.toml / .json)
        file: PathBuf,

        /// Integration to mock (overrides the definition's trigger)
        #[arg(short = 'i', long)]
        integration: Option<String>,

        /// Event to mock (default: "default")
        #[arg(short = 'e', long, requires = "integration")]
        event: Option<String>,

        /// Trigger option as key=value; the value is parsed as JSON when possible
        #[arg(short = 'o', long = "option", value_parser = parse_option, requires = "integration")]
        options: Vec<(String, JsonValue)>,

        /// Print the validation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the syntax checks only
    Check {
        file: PathBuf,
    },

    /// Show the recognized trigger shape
    Inspect {
        file: PathBuf,

        /// Also print the parsed syntax tree as JSON
        #[arg(long)]
        ast: bool,
    },

    /// Validate a workflow definition's column schema
    Schema {
        file: PathBuf,
    },
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

pub async fn run_cli_from_args(args: Vec<String>) -> Result<ExitCode> {
    let cli = Cli::try_parse_from(args)?;
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<ExitCode> {
    // Load configuration before any command output
    let config = Config::builder()
        .config_path(cli.config.clone())
        .timeout_ms(cli.timeout_ms)
        .build()
        .context("Failed to load configuration")?;
    init_tracing(&config.logging.filter);

    match cli.command {
        Commands::Test {
            file,
            integration,
            event,
            options,
            json,
        } => {
            let source = Source::load(&file)?;
            let trigger = match integration {
                Some(integration) => {
                    let mut trigger = TriggerConfig::new(
                        integration,
                        event.unwrap_or_else(|| "default".to_string()),
                    );
                    trigger.options.extend(options);
                    Some(trigger)
                }
                None => source.trigger,
            };

            let harness = Harness::new(config.sandbox_settings());
            let result = harness.execute(&source.script, trigger.as_ref()).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            Ok(exit_code(result.is_valid()))
        }

        Commands::Check { file } => {
            let source = Source::load(&file)?;
            let errors = validate_syntax(&source.script);
            for error in &errors {
                println!("{}", error);
            }
            if errors.is_empty() {
                println!("{}: ok", file.display());
            }
            Ok(exit_code(errors.is_empty()))
        }

        Commands::Inspect { file, ast } => {
            let source = Source::load(&file)?;
            let shape = TriggerShape::recognize(&source.script);
            println!("Shape: {}", shape.name());
            if let Some(info) = shape.info() {
                println!("{}", serde_json::to_string_pretty(&info)?);
            }
            if ast {
                let program = parser::parse_script(&source.script)
                    .map_err(|e| anyhow::anyhow!(e.summary()))
                    .with_context(|| format!("Failed to parse {}", file.display()))?;
                println!("{}", serde_json::to_string_pretty(&program)?);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Schema { file } => {
            let workflow = Workflow::load(&file)
                .with_context(|| format!("Failed to load workflow {}", file.display()))?;
            if let Err(e) = workflow.validate() {
                println!("{}: {}", workflow.name, e);
                return Ok(exit_code(false));
            }
            match workflow.database_definition() {
                Some(definition) => println!("{}", serde_json::to_string_pretty(&definition)?),
                None => println!("{}: no database columns", workflow.name),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Install the global subscriber; `RUST_LOG` wins over the configured filter
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    // Output goes to stderr so `--json` stays machine-readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Script text plus the trigger carried by a definition file
#[derive(Debug)]
struct Source {
    script: String,
    trigger: Option<TriggerConfig>,
}

impl Source {
    fn load(path: &Path) -> Result<Self> {
        let is_definition = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("toml") | Some("json")
        );

        if is_definition {
            let workflow = Workflow::load(path)
                .with_context(|| format!("Failed to load workflow {}", path.display()))?;
            return Ok(Self {
                script: workflow.script,
                trigger: workflow.trigger,
            });
        }

        let script = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self {
            script,
            trigger: None,
        })
    }
}

fn parse_option(raw: &str) -> std::result::Result<(String, JsonValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.is_empty() {
        return Err("option key must not be empty".to_string());
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn print_result(result: &ValidationResult) {
    for entry in result.logs() {
        let label = match entry.kind {
            LogKind::Info => "info",
            LogKind::Warning => "warn",
            LogKind::Error => "error",
            LogKind::Result => "result",
        };
        println!("[{}] {}", label, entry.message);
    }
    for error in result.errors() {
        println!("{}", error);
    }
    if result.is_valid() {
        println!("valid");
    } else {
        println!("invalid ({} errors)", result.errors().len());
    }
}

fn exit_code(valid: bool) -> ExitCode {
    if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
