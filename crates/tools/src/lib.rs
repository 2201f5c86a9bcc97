//! deploykit Tools Library
//!
//! Provides configuration resolution for multi-network contract deployment:
//! named-account resolution per chain and import-path remapping ahead of
//! compilation.

pub mod chain;
pub mod config;
pub mod error;
pub mod remap;
pub mod roles;

pub use chain::ChainContext;
pub use config::{Config, ProjectConfig, SignerPlan};
pub use error::ConfigError;
pub use remap::{load_rules, transform_line, Remapper, RemappingRule};
pub use roles::{AccountRef, RoleBinding, RoleTable};
