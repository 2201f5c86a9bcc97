//! Chain identity passed explicitly into account resolution.

use serde::Serialize;
use std::fmt;

use crate::config::ProjectConfig;
use crate::error::ConfigError;

/// Chain ids of networks that are commonly declared without an explicit
/// `chain_id`.
const WELL_KNOWN_CHAINS: &[(&str, u64)] = &[
    ("hardhat", 31337),
    ("localhost", 31337),
    ("mainnet", 1),
    ("sepolia", 11155111),
    ("polygon", 137),
    ("mumbai", 80001),
];

/// Look up the chain id conventionally used for a network name.
pub fn well_known_chain_id(network: &str) -> Option<u64> {
    let network = network.to_lowercase();
    WELL_KNOWN_CHAINS
        .iter()
        .find(|(name, _)| *name == network)
        .map(|(_, id)| *id)
}

/// The key a resolution runs against: a chain id plus the network label it
/// was selected by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainContext {
    pub chain_id: u64,
    pub network: String,
}

impl ChainContext {
    pub fn new(chain_id: u64, network: impl Into<String>) -> Self {
        Self {
            chain_id,
            network: network.into(),
        }
    }

    /// Build the context for a declared network.
    ///
    /// The network's own `chain_id` wins; otherwise the well-known id for its
    /// name is used.
    ///
    /// # Errors
    ///
    /// - `UnknownNetwork` if `name` is not declared under `[networks]`
    /// - `MissingField` if neither an explicit nor a well-known id exists
    pub fn for_network(config: &ProjectConfig, name: &str) -> Result<Self, ConfigError> {
        let network = config
            .networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))?;

        let chain_id = network
            .chain_id
            .or_else(|| well_known_chain_id(name))
            .ok_or_else(|| ConfigError::MissingField(format!("networks.{}.chain_id", name)))?;

        Ok(Self::new(chain_id, name))
    }
}

impl fmt::Display for ChainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (chain {})", self.network, self.chain_id)
    }
}
