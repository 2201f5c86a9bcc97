use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deploykit_tools::config::{process_env, DEFAULT_CONFIG_FILE};
use deploykit_tools::remap::DEFAULT_REMAPPINGS_FILE;
use deploykit_tools::{AccountRef, ChainContext, Config, ConfigError, ProjectConfig, Remapper};

#[derive(Parser)]
#[command(name = "deploykit")]
#[command(about = "Resolve deploy configuration and preprocess contract sources")]
struct Cli {
    /// Project configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the account bound to every named role on a network
    Accounts {
        /// Network to resolve against
        #[arg(short, long)]
        network: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a single named role
    Resolve {
        /// Role name, e.g. deployer
        role: String,
        /// Network to resolve against
        #[arg(short, long, conflicts_with = "chain_id")]
        network: Option<String>,
        /// Resolve against a raw chain id instead of a declared network
        #[arg(long)]
        chain_id: Option<u64>,
    },
    /// Rewrite import paths of contract sources
    Remap {
        /// Source files to preprocess
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Rules file (find=replace per line)
        #[arg(short, long)]
        rules: Option<PathBuf>,
        /// Write results here instead of stdout
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Print the resolved configuration
    Config {
        /// Network to resolve against
        #[arg(short, long)]
        network: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Accounts { network, json } => accounts(&cli.config, network.as_deref(), json),
        Commands::Resolve {
            role,
            network,
            chain_id,
        } => resolve(&cli.config, &role, network.as_deref(), chain_id),
        Commands::Remap {
            files,
            rules,
            out_dir,
        } => remap(&cli.config, files, rules, out_dir).await,
        Commands::Config { network, json } => {
            let config = load_config(&cli.config, network.as_deref())?;
            if json {
                println!("{}", config.to_json()?);
            } else {
                config.print_summary();
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path, network: Option<&str>) -> Result<Config> {
    Config::load(path, network)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn accounts(path: &Path, network: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(path, network)?;
    let plan = config.signer_plan()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Named accounts on {}", plan.chain);
    for entry in &plan.entries {
        let account = match &entry.account {
            AccountRef::Index(index) => format!("signer #{}", index),
            AccountRef::Address(addr) => addr.clone(),
        };
        let note = if entry.in_window {
            ""
        } else {
            "  (outside derived signers)"
        };
        println!("  {:<20} {}{}", entry.role, account, note);
    }
    Ok(())
}

fn resolve(path: &Path, role: &str, network: Option<&str>, chain_id: Option<u64>) -> Result<()> {
    let project = ProjectConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    let ctx = match chain_id {
        Some(id) => ChainContext::new(id, format!("chain-{}", id)),
        None => {
            let name = project.select_network(network, process_env);
            ChainContext::for_network(&project, &name)?
        }
    };

    let account = project.role_table()?.resolve(role, &ctx)?;
    println!("{}", account);
    Ok(())
}

/// Rules file used when `--rules` is not given: the project's
/// `[preprocess].remappings`, relative to the project file. Only a missing
/// project file falls back to the default name.
fn default_rules_path(config_path: &Path) -> Result<PathBuf> {
    let base = config_path.parent().unwrap_or_else(|| Path::new(""));
    match ProjectConfig::load(config_path) {
        Ok(project) => Ok(base.join(project.preprocess.remappings)),
        Err(ConfigError::MissingConfigFile(_)) => {
            tracing::debug!(path = %config_path.display(), "no project file, using default rules path");
            Ok(base.join(DEFAULT_REMAPPINGS_FILE))
        }
        Err(err) => Err(err)
            .with_context(|| format!("failed to load configuration from {}", config_path.display())),
    }
}

async fn remap(
    config_path: &Path,
    files: Vec<PathBuf>,
    rules: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    let rules_path = match rules {
        Some(path) => path,
        None => default_rules_path(config_path)?,
    };
    let remapper = Remapper::from_file(&rules_path)
        .with_context(|| format!("failed to load remappings from {}", rules_path.display()))?;
    let remapper = Arc::new(remapper);

    let handles: Vec<_> = files
        .into_iter()
        .map(|file| tokio::spawn(remap_file(Arc::clone(&remapper), file)))
        .collect();

    // Wait for every file before acting so a failure leaves no task running
    // and nothing half-written
    let mut outputs = Vec::with_capacity(handles.len());
    let mut first_error = None;
    for handle in handles {
        match handle.await? {
            Ok(output) => outputs.push(output),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let Some(dir) = out_dir else {
        // Argument order, as given on the command line
        for (_, output) in &outputs {
            print!("{}", output);
        }
        return Ok(());
    };

    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for (file, output) in outputs {
        let name = file
            .file_name()
            .with_context(|| format!("{} has no file name", file.display()))?;
        let target = dir.join(name);
        tokio::fs::write(&target, &output)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;
        tracing::info!(source = %file.display(), target = %target.display(), "remapped");
    }
    Ok(())
}

/// Read and preprocess one source.
async fn remap_file(remapper: Arc<Remapper>, file: PathBuf) -> Result<(PathBuf, String)> {
    let source = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let output = remapper.transform_source(&source);
    Ok((file, output))
}
