//! Multi-network deploy configuration
//!
//! This module provides typed, validated configuration for a contract
//! build/deploy pipeline. The project file (`deploykit.toml`) declares the
//! compiler, every network, the named accounts and the preprocessing step.
//! A [`Config`] is the project file resolved against one active network,
//! which is selected in priority order:
//!
//! 1. The network passed explicitly (e.g. `--network`)
//! 2. The `DEPLOYKIT_NETWORK` environment variable
//! 3. `[default].network` in the project file
//! 4. `hardhat`
//!
//! # Examples
//!
//! ```rust,no_run
//! use deploykit_tools::config::Config;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(Path::new("deploykit.toml"), None)?;
//! println!("Network: {}", config.chain);
//! println!("RPC URL: {}", config.rpc_url);
//! # Ok(())
//! # }
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::chain::ChainContext;
use crate::error::ConfigError;
use crate::remap::DEFAULT_REMAPPINGS_FILE;
use crate::roles::{AccountRef, RoleTable};

/// Default project file name
pub const DEFAULT_CONFIG_FILE: &str = "deploykit.toml";

/// Environment variable selecting the active network
pub const NETWORK_ENV: &str = "DEPLOYKIT_NETWORK";

/// Network used when nothing else selects one
pub const DEFAULT_NETWORK: &str = "hardhat";

/// Signers derived from a mnemonic when `count` is not declared
pub const DEFAULT_ACCOUNT_COUNT: u32 = 10;

static ENV_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Look a variable up in the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Expand `${VAR}` placeholders. Unset variables expand to an empty string.
pub fn expand_env<F>(text: &str, env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let key = &caps[1];
            env(key).unwrap_or_else(|| {
                tracing::warn!(variable = key, "environment variable is not set, expanding to empty");
                String::new()
            })
        })
        .into_owned()
}

/// `[compiler]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// solc version, e.g. `0.8.4`
    pub version: String,
    #[serde(default)]
    pub optimizer_runs: Option<u32>,
}

/// Mnemonic-derived signer window of a network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MnemonicAccounts {
    /// Name of the variable holding the mnemonic
    pub mnemonic_env: String,
    #[serde(default)]
    pub initial_index: u32,
    #[serde(default = "default_account_count")]
    pub count: u32,
}

fn default_account_count() -> u32 {
    DEFAULT_ACCOUNT_COUNT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkingConfig {
    pub url: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// `[networks.<name>]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// RPC endpoint; may contain `${VAR}` placeholders. Absent for the
    /// in-process network.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Gas price in wei
    #[serde(default)]
    pub gas_price: Option<u64>,
    #[serde(default)]
    pub block_gas_limit: Option<u64>,
    #[serde(default)]
    pub allow_unlimited_contract_size: bool,
    #[serde(default)]
    pub accounts: Option<MnemonicAccounts>,
    #[serde(default)]
    pub forking: Option<ForkingConfig>,
}

/// `[preprocess]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    #[serde(default = "default_remappings")]
    pub remappings: PathBuf,
}

fn default_remappings() -> PathBuf {
    PathBuf::from(DEFAULT_REMAPPINGS_FILE)
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            remappings: default_remappings(),
        }
    }
}

/// `[paths]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub sources: PathBuf,
    pub tests: PathBuf,
    pub cache: PathBuf,
    pub artifacts: PathBuf,
    pub deploy: PathBuf,
    pub deployments: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources: PathBuf::from("./contracts"),
            tests: PathBuf::from("./test"),
            cache: PathBuf::from("./cache"),
            artifacts: PathBuf::from("./build/contracts"),
            deploy: PathBuf::from("./deploy"),
            deployments: PathBuf::from("./deployments"),
        }
    }
}

/// Default profile section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultProfile {
    pub network: Option<String>,
}

/// Complete project file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub default: Option<DefaultProfile>,
    pub compiler: CompilerSettings,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Raw role declarations: `role -> { default = n, "<chain id>" = n | "0x.." }`
    #[serde(default)]
    pub named_accounts: BTreeMap<String, BTreeMap<String, AccountRef>>,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl ProjectConfig {
    /// Parse and validate a project file's contents.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let project: ProjectConfig = toml::from_str(content)?;
        project.validate()?;
        Ok(project)
    }

    /// Read the project file at `path`, loading `.env` first so later
    /// environment lookups see it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Load .env file if it exists (non-fatal)
        let _ = dotenvy::dotenv();

        if !path.exists() {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Build the immutable role table from `[named_accounts]`.
    pub fn role_table(&self) -> Result<RoleTable, ConfigError> {
        RoleTable::from_declarations(&self.named_accounts)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.compiler.version.trim().is_empty() {
            return Err(ConfigError::MissingField("compiler.version".to_string()));
        }

        for (name, network) in &self.networks {
            if let Some(accounts) = &network.accounts {
                if accounts.mnemonic_env.trim().is_empty() {
                    return Err(ConfigError::MissingField(format!(
                        "networks.{}.accounts.mnemonic_env",
                        name
                    )));
                }
            }
        }

        // Reject bad role declarations at load time rather than on first use
        self.role_table()?;
        Ok(())
    }

    /// Pick the active network name.
    pub fn select_network<F>(&self, explicit: Option<&str>, env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        explicit
            .map(str::to_string)
            .or_else(|| env(NETWORK_ENV))
            .or_else(|| self.default.as_ref().and_then(|d| d.network.clone()))
            .unwrap_or_else(|| DEFAULT_NETWORK.to_string())
    }
}

/// Seed phrase read from the environment. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Mnemonic(String);

impl Mnemonic {
    /// Read the mnemonic from `key`. Words may be separated by underscores,
    /// which `.env` files need for unquoted values.
    pub fn from_env<F>(key: &str, env: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match env(key) {
            Some(raw) if !raw.trim().is_empty() => Some(Mnemonic(raw.trim().replace('_', " "))),
            _ => {
                tracing::warn!(variable = key, "mnemonic is not set, signers cannot be derived");
                None
            }
        }
    }

    pub fn phrase(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mnemonic({} words)", self.word_count())
    }
}

/// Range of signer indices derived for a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignerWindow {
    pub initial_index: u32,
    pub count: u32,
}

impl SignerWindow {
    pub fn contains(&self, index: u32) -> bool {
        index < self.count
    }
}

/// One role's binding on the active chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerEntry {
    pub role: String,
    pub account: AccountRef,
    /// False when an index binding points past the derived signers
    pub in_window: bool,
}

/// Everything a deploy driver needs to construct signers for one chain
#[derive(Debug, Clone, Serialize)]
pub struct SignerPlan {
    pub chain: ChainContext,
    pub window: Option<SignerWindow>,
    pub entries: Vec<SignerEntry>,
}

/// Resolved runtime configuration for the active network
#[derive(Debug, Clone)]
pub struct Config {
    /// Active chain
    pub chain: ChainContext,
    /// RPC endpoint with placeholders expanded; empty for the in-process network
    pub rpc_url: String,
    /// Fork source for the in-process network
    pub fork_url: Option<String>,
    /// Gas price in wei
    pub gas_price: Option<u64>,
    /// Mnemonic for signer derivation (optional)
    pub mnemonic: Option<Mnemonic>,
    pub signer_window: Option<SignerWindow>,
    pub compiler: CompilerSettings,
    pub roles: RoleTable,
    pub remappings: PathBuf,
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from `.env`, the process environment and the
    /// project file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The project file is missing or invalid
    /// - The selected network is not declared
    /// - A declared URL is not http(s)
    pub fn load(path: &Path, network: Option<&str>) -> Result<Self, ConfigError> {
        let project = ProjectConfig::load(path)?;
        Self::resolve(project, network, process_env)
    }

    /// Resolve `project` against one network, reading variables through `env`.
    pub fn resolve<F>(project: ProjectConfig, network: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = project.select_network(network, &env);
        let chain = ChainContext::for_network(&project, &name)?;
        let declared = &project.networks[&name];

        let rpc_url = declared
            .url
            .as_deref()
            .map(|url| expand_env(url, &env))
            .unwrap_or_default();
        let fork_url = declared
            .forking
            .as_ref()
            .map(|fork| expand_env(&fork.url, &env));

        Self::validate(&name, declared.url.is_some(), &rpc_url, fork_url.as_deref())?;

        let mnemonic = declared
            .accounts
            .as_ref()
            .and_then(|accounts| Mnemonic::from_env(&accounts.mnemonic_env, &env));
        let signer_window = declared.accounts.as_ref().map(|accounts| SignerWindow {
            initial_index: accounts.initial_index,
            count: accounts.count,
        });

        let roles = project.role_table()?;
        tracing::debug!(network = %name, chain_id = chain.chain_id, roles = roles.len(), "configuration resolved");

        Ok(Config {
            chain,
            rpc_url,
            fork_url,
            gas_price: declared.gas_price,
            mnemonic,
            signer_window,
            compiler: project.compiler,
            roles,
            remappings: project.preprocess.remappings,
            paths: project.paths,
        })
    }

    /// Validate connection values
    ///
    /// A URL that is only empty because its placeholders were unset is
    /// reported and skipped; an undeclared URL is an error.
    fn validate(
        network: &str,
        url_declared: bool,
        rpc_url: &str,
        fork_url: Option<&str>,
    ) -> Result<(), ConfigError> {
        if !url_declared && network != DEFAULT_NETWORK {
            return Err(ConfigError::MissingField(format!("networks.{}.url", network)));
        }

        let declared_urls = std::iter::once(rpc_url)
            .filter(|_| url_declared)
            .chain(fork_url);
        for url in declared_urls {
            if url.is_empty() {
                tracing::warn!(network, "URL expanded to empty, connection will be unavailable");
                continue;
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "URL for network {} must start with http:// or https://: {}",
                    network, url
                )));
            }
        }

        Ok(())
    }

    /// Resolve every named account on the active chain and check index
    /// bindings against the derived signer window.
    pub fn signer_plan(&self) -> Result<SignerPlan, ConfigError> {
        let resolved = self.roles.resolve_all(&self.chain)?;

        let entries = resolved
            .into_iter()
            .map(|(role, account)| {
                let in_window = match (account.as_index(), self.signer_window) {
                    (Some(index), Some(window)) => window.contains(index),
                    _ => true,
                };
                if !in_window {
                    tracing::warn!(
                        role = %role,
                        %account,
                        network = %self.chain.network,
                        "signer index is outside the derived accounts"
                    );
                }
                SignerEntry {
                    role,
                    account,
                    in_window,
                }
            })
            .collect();

        Ok(SignerPlan {
            chain: self.chain.clone(),
            window: self.signer_window,
            entries,
        })
    }

    /// Print the resolved configuration
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════════╗");
        println!("║              DEPLOY CONFIGURATION RESOLVED                     ║");
        println!("╚════════════════════════════════════════════════════════════════╝");
        println!("  Network:             {}", self.chain.network);
        println!("  Chain ID:            {}", self.chain.chain_id);

        if self.rpc_url.is_empty() {
            println!("  RPC URL:             (in-process)");
        } else {
            println!("  RPC URL:             {}", self.rpc_url);
        }

        if let Some(ref fork) = self.fork_url {
            println!("  Forking:             {}", fork);
        }

        if let Some(gas_price) = self.gas_price {
            println!("  Gas Price:           {} wei", gas_price);
        }

        println!("  Compiler:            solc {}", self.compiler.version);

        match (&self.mnemonic, self.signer_window) {
            (Some(mnemonic), Some(window)) => println!(
                "  Signers:             {} from a {}-word mnemonic (offset {})",
                window.count,
                mnemonic.word_count(),
                window.initial_index
            ),
            (None, Some(_)) => println!("  Signers:             (mnemonic not set)"),
            _ => println!("  Signers:             (node defaults)"),
        }

        println!("  Named Accounts:      {}", self.roles.len());
        println!("  Remappings:          {}", self.remappings.display());
        println!("  Sources:             {}", self.paths.sources.display());
        println!("╚════════════════════════════════════════════════════════════════╝");
    }

    /// Get configuration as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// Manual Serialize impl for Config so the mnemonic never leaves the process
impl Serialize for Config {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(9))?;
        map.serialize_entry("network", &self.chain.network)?;
        map.serialize_entry("chain_id", &self.chain.chain_id)?;
        map.serialize_entry("rpc_url", &self.rpc_url)?;
        map.serialize_entry("fork_url", &self.fork_url)?;
        map.serialize_entry("gas_price", &self.gas_price)?;
        map.serialize_entry("mnemonic_set", &self.mnemonic.is_some())?;
        map.serialize_entry("signer_window", &self.signer_window)?;
        map.serialize_entry("compiler", &self.compiler)?;
        map.serialize_entry("remappings", &self.remappings)?;
        map.end()
    }
}
