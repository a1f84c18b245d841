use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use vmprov_compiler::memory::{Fixture, MemoryInventory, MemoryVmStore};
use vmprov_compiler::{ProvisioningCompiler, SpecFormat, decoder};
use vmprov_core::config::CompilerConfig;
use vmprov_core::error::{CompileError, Stage, StageError};
use vmprov_core::spec::ProvisioningSpec;

use crate::logging::{self, LogFormat};
use crate::output::{self, ResultView};
use crate::ui;

#[derive(Parser)]
#[command(
    name = "vmprov",
    version,
    about = "Compile VM provisioning specs into platform configuration"
)]
struct Cli {
    /// Log format: human, json
    #[arg(long, global = true, default_value = "human")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a spec against a fixture inventory and print the result
    Compile {
        /// Spec document (JSON or XML)
        #[arg(long)]
        spec: PathBuf,
        /// TOML fixture describing datacenters, VMs, and datastores
        #[arg(long)]
        fixture: PathBuf,
        /// Compiler config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Spec format: auto, json, xml
        #[arg(long, default_value = "auto", value_parser = ["auto", "json", "xml"])]
        format: String,
        /// Print only the guest customization payload
        #[arg(long, conflicts_with = "config_spec")]
        customization: bool,
        /// Print only the VM config payload
        #[arg(long)]
        config_spec: bool,
    },
    /// Decode a spec and run the stages that need no remote call
    Check {
        /// Spec document (JSON or XML)
        spec: PathBuf,
        /// Compiler config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Spec format: auto, json, xml
        #[arg(long, default_value = "auto", value_parser = ["auto", "json", "xml"])]
        format: String,
    },
    /// Print the effective compiler config as TOML
    Config {
        /// Compiler config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ============================================================================
// Command dispatch
// ============================================================================

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogFormat::from_str_arg(&cli.log_format));

    match cli.command {
        Commands::Compile {
            spec,
            fixture,
            config,
            format,
            customization,
            config_spec,
        } => cmd_compile(
            &spec,
            &fixture,
            config.as_deref(),
            &format,
            ResultView::from_flags(customization, config_spec),
        ),
        Commands::Check {
            spec,
            config,
            format,
        } => cmd_check(&spec, config.as_deref(), &format),
        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}

fn cmd_compile(
    spec_path: &Path,
    fixture_path: &Path,
    config_path: Option<&Path>,
    format: &str,
    view: ResultView,
) -> Result<()> {
    let config = load_config(config_path)?;
    let fixture = Fixture::from_file(fixture_path)?;
    let (inventory, store) = fixture.into_collaborators();
    let compiler = ProvisioningCompiler::new(config, Arc::new(inventory), Arc::new(store))
        .context("Invalid compiler config")?;
    let spec = read_spec(spec_path, format).map_err(fail)?;

    let result = block_on(async {
        let token = CancellationToken::new();
        let on_interrupt = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling compile");
                on_interrupt.cancel();
            }
        });
        Ok(compiler.compile(&spec, &token).await)
    })?;

    match result {
        Ok(result) => {
            output::render_result(&result, view)?;
            ui::success(&format!(
                "Compiled {} into {} on {}",
                spec.metadata.vm_id,
                result.datacenter.inventory_path,
                result.storage.datastore().name
            ));
            Ok(())
        }
        Err(e) => Err(fail(e)),
    }
}

fn cmd_check(spec_path: &Path, config_path: Option<&Path>, format: &str) -> Result<()> {
    let config = load_config(config_path)?;
    // The local stages never reach the collaborators.
    let compiler = ProvisioningCompiler::new(
        config,
        Arc::new(MemoryInventory::new()),
        Arc::new(MemoryVmStore::new()),
    )
    .context("Invalid compiler config")?;
    let spec = read_spec(spec_path, format).map_err(fail)?;

    let plan = compiler.check(&spec).map_err(fail)?;
    output::render_json(&plan)?;
    ui::success(&format!("{} passed local checks", spec.metadata.vm_id));
    Ok(())
}

fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<CompilerConfig> {
    match path {
        Some(path) => CompilerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(CompilerConfig::default()),
    }
}

/// Read and decode a spec. An unreadable file fails at the decode stage.
fn read_spec(path: &Path, format: &str) -> std::result::Result<ProvisioningSpec, CompileError> {
    let raw = std::fs::read(path).map_err(|e| {
        StageError::Decode(format!("failed to read {}: {}", path.display(), e)).at(Stage::Decode)
    })?;
    let decoded = match format {
        "json" => decoder::decode_as(&raw, SpecFormat::Json),
        "xml" => decoder::decode_as(&raw, SpecFormat::Xml),
        _ => decoder::decode(&raw),
    };
    decoded.map_err(|e| StageError::from(e).at(Stage::Decode))
}

/// Report a compile failure and turn it into the command's error.
fn fail(err: CompileError) -> anyhow::Error {
    output::render_failure(&err);
    anyhow::Error::new(err)
}

fn block_on<F, T>(f: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "Failed to create tokio runtime")?;
    runtime.block_on(f)
}
