//! Named-account resolution
//!
//! A role (`deployer`, `protocolOwner`, ...) maps to a default signer index
//! and, optionally, per-chain overrides. An override is either another
//! signer index or a literal address owned outside the configured mnemonic.
//!
//! ```rust
//! use deploykit_tools::{AccountRef, ChainContext, RoleBinding, RoleTable};
//!
//! # fn main() -> Result<(), deploykit_tools::ConfigError> {
//! let table = RoleTable::new([
//!     RoleBinding::new("deployer", 0),
//!     RoleBinding::new("protocolOwner", 1).with_override(1, AccountRef::address("0xABC"))?,
//! ]);
//!
//! let mainnet = ChainContext::new(1, "mainnet");
//! assert_eq!(table.resolve("protocolOwner", &mainnet)?, AccountRef::address("0xABC"));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::chain::ChainContext;
use crate::error::ConfigError;

/// Key holding the default index inside a role declaration.
pub const DEFAULT_KEY: &str = "default";

/// Resolved identity for a role on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountRef {
    /// Position in the signer list derived for the network
    Index(u32),
    /// Externally-owned address literal
    Address(String),
}

impl AccountRef {
    pub fn address(addr: impl Into<String>) -> Self {
        AccountRef::Address(addr.into())
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            AccountRef::Index(index) => Some(*index),
            AccountRef::Address(_) => None,
        }
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Index(index) => write!(f, "{}", index),
            AccountRef::Address(addr) => write!(f, "{}", addr),
        }
    }
}

/// One named role's account assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBinding {
    pub role: String,
    pub default_index: u32,
    pub overrides: BTreeMap<u64, AccountRef>,
}

impl RoleBinding {
    pub fn new(role: impl Into<String>, default_index: u32) -> Self {
        Self {
            role: role.into(),
            default_index,
            overrides: BTreeMap::new(),
        }
    }

    /// Add a chain-specific override.
    ///
    /// A second override for the same chain is rejected with
    /// `AmbiguousOverride`.
    pub fn with_override(mut self, chain_id: u64, account: AccountRef) -> Result<Self, ConfigError> {
        if self.overrides.contains_key(&chain_id) {
            return Err(ConfigError::AmbiguousOverride {
                role: self.role,
                chain_id,
            });
        }
        self.overrides.insert(chain_id, account);
        Ok(self)
    }

    /// Build a binding from its declared form, e.g. the TOML table
    /// `{ default = 1, "137" = "0x..." }`.
    pub fn from_declaration(
        role: &str,
        declaration: &BTreeMap<String, AccountRef>,
    ) -> Result<Self, ConfigError> {
        let default_index = match declaration.get(DEFAULT_KEY) {
            Some(AccountRef::Index(index)) => *index,
            Some(AccountRef::Address(_)) => {
                return Err(ConfigError::ValidationError(format!(
                    "named_accounts.{}.default must be a signer index",
                    role
                )))
            }
            None => {
                return Err(ConfigError::MissingField(format!(
                    "named_accounts.{}.default",
                    role
                )))
            }
        };

        let mut binding = RoleBinding::new(role, default_index);
        for (key, account) in declaration {
            if key == DEFAULT_KEY {
                continue;
            }
            let chain_id: u64 = key.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "named_accounts.{}: '{}' is not a chain id",
                    role, key
                ))
            })?;
            if let AccountRef::Address(addr) = account {
                validate_address(role, addr)?;
            }
            binding = binding.with_override(chain_id, account.clone())?;
        }
        Ok(binding)
    }

    /// The account this role uses on `chain_id`; the default when no
    /// override exists.
    pub fn account_for(&self, chain_id: u64) -> AccountRef {
        self.overrides
            .get(&chain_id)
            .cloned()
            .unwrap_or(AccountRef::Index(self.default_index))
    }
}

fn validate_address(role: &str, addr: &str) -> Result<(), ConfigError> {
    if !addr.starts_with("0x") || addr.len() <= 2 {
        return Err(ConfigError::ValidationError(format!(
            "named_accounts.{}: address override must be a 0x-prefixed literal, got '{}'",
            role, addr
        )));
    }
    Ok(())
}

/// All declared roles, keyed by name. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTable {
    bindings: BTreeMap<String, RoleBinding>,
}

impl RoleTable {
    pub fn new(bindings: impl IntoIterator<Item = RoleBinding>) -> Self {
        Self {
            bindings: bindings
                .into_iter()
                .map(|binding| (binding.role.clone(), binding))
                .collect(),
        }
    }

    pub fn from_declarations(
        declarations: &BTreeMap<String, BTreeMap<String, AccountRef>>,
    ) -> Result<Self, ConfigError> {
        let bindings = declarations
            .iter()
            .map(|(role, declaration)| RoleBinding::from_declaration(role, declaration))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(bindings))
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn get(&self, role: &str) -> Option<&RoleBinding> {
        self.bindings.get(role)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve `role` on the chain in `ctx`.
    ///
    /// Chains without an override fall back to the role's default index.
    pub fn resolve(&self, role: &str, ctx: &ChainContext) -> Result<AccountRef, ConfigError> {
        let binding = self.bindings.get(role).ok_or_else(|| ConfigError::UnknownRole {
            role: role.to_string(),
        })?;
        let account = binding.account_for(ctx.chain_id);
        tracing::debug!(role, chain_id = ctx.chain_id, %account, "resolved named account");
        Ok(account)
    }

    /// Resolve every declared role on the chain in `ctx`. Either the whole
    /// table resolves or the first failure is returned.
    pub fn resolve_all(&self, ctx: &ChainContext) -> Result<BTreeMap<String, AccountRef>, ConfigError> {
        self.roles()
            .map(|role| Ok::<_, ConfigError>((role.to_string(), self.resolve(role, ctx)?)))
            .collect()
    }
}
