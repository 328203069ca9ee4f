use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::chunk::Chunk;
use crate::config::VmConfig;
use crate::diagnostics::PerformanceCounter;
use crate::script::Script;
use crate::value::{HostFunction, Value};

#[derive(Parser)]
#[command(name = "lune")]
#[command(about = "Lune - run and inspect compiled script chunks", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a chunk's main body, then optionally call one of its global functions
    Run {
        /// Path to a JSON chunk
        chunk: PathBuf,

        /// Global function to call after the main body ran
        #[arg(short = 'f', long = "function")]
        function: Option<String>,

        /// Arguments for the function (numbers, true/false/nil, or strings)
        args: Vec<String>,
    },

    /// Print a chunk's fingerprint and function table
    Inspect {
        /// Path to a JSON chunk
        chunk: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Resolve configuration, honoring `--config`
pub fn load_config(cli: &Cli) -> Result<VmConfig> {
    VmConfig::builder()
        .config_path(cli.config.clone())
        .build()
        .context("Failed to load configuration")
}

/// Execute an already-parsed command
pub fn run_cli_with_args(cli: Cli, config: VmConfig) -> Result<()> {
    match cli.command {
        Commands::Run {
            chunk,
            function,
            args,
        } => {
            let script = Script::with_config(read_chunk(&chunk)?, config);
            script.register_function(HostFunction::new("print", |_, args| {
                println!("{}", Value::tuple(args.to_vec()));
                Ok(Value::Nil)
            }));

            let main_result = script.run().context("Main body failed")?;

            let result = match function {
                Some(name) => {
                    let args: Vec<Value> = args.iter().map(|raw| parse_arg(raw)).collect();
                    script
                        .call_global(&name, &args)
                        .with_context(|| format!("Call to '{}' failed", name))?
                }
                None => main_result,
            };

            println!("{}", result);

            let sample = script
                .performance_stats()
                .sample(PerformanceCounter::Execution);
            debug!(calls = sample.count, elapsed = ?sample.total, "execution stats");
        }

        Commands::Inspect { chunk } => {
            let chunk = read_chunk(&chunk)?;
            println!("Fingerprint: {}", chunk.fingerprint());
            println!("Instructions: {}", chunk.code.len());
            println!("Functions:");
            for (index, function) in chunk.functions.iter().enumerate() {
                println!(
                    "  #{:<3} {:<20} entry={:<5} params={}{}",
                    index,
                    function.name,
                    function.entry_point,
                    function.params,
                    if function.variadic { ", ..." } else { "" }
                );
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn read_chunk(path: &PathBuf) -> Result<Chunk> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chunk {}", path.display()))?;
    Chunk::from_json(&source).with_context(|| format!("Failed to load chunk {}", path.display()))
}

/// Interpret a command-line argument as a script value
fn parse_arg(raw: &str) -> Value {
    match raw {
        "nil" => Value::Nil,
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => raw
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::from(raw)),
    }
}
