// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Network Configuration & Constants
//!
//! Every tier limit and well-known identifier of the CBDC network lives
//! here, together with [`NetworkConfig`], the serde-loadable description of
//! a whole three-partition deployment. Defaults reproduce the original
//! deployment: one central bank (`korea`), a head office and a branch bank,
//! and three user accounts.

use std::collections::HashSet;
use std::path::Path;

use cbdc_ledger::config::StoreConfig;
use cbdc_ledger::PartitionAddress;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Tier Limits
// ---------------------------------------------------------------------------

/// Ceiling on cumulative issuance by the central authority.
pub const MAX_VAL_ADMIN: i64 = 10_000;

/// Ceiling on any single user account balance.
pub const MAX_VAL_USER: i64 = 1_000;

// ---------------------------------------------------------------------------
// Well-known Identifiers
// ---------------------------------------------------------------------------

/// Key of the central authority's aggregate balance record.
pub const CBDC_NAME: &str = "korea";

/// The only bank account allowed to receive newly minted value.
pub const HEAD_OFFICE: &str = "Bank0";

/// How the central authority appears as a sender in bank-tier history.
pub const CENTRAL_BANK_NAME: &str = "Central Bank";

/// Keys starting with this character are reserved for ledger bookkeeping
/// (history sequence, credit legs) and can never be account ids.
pub const RESERVED_KEY_PREFIX: char = '~';

/// How many times a compensation that lost an MVCC race is resubmitted
/// before its leg is reported for manual reconciliation.
pub const COMPENSATION_ATTEMPTS: usize = 3;

// ---------------------------------------------------------------------------
// Partition Addresses
// ---------------------------------------------------------------------------

pub const ADMIN_CHAINCODE: &str = "adminchaincode";
pub const ADMIN_CHANNEL: &str = "admin-channel";
pub const REGULATORY_CHAINCODE: &str = "regulatorychaincode";
pub const REGULATORY_CHANNEL: &str = "regulatory-channel";
pub const USER_CHAINCODE: &str = "userchaincode";
pub const USER_CHANNEL: &str = "user-channel";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`NetworkConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Config Types
// ---------------------------------------------------------------------------

/// An account created by a tier's `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAccount {
    pub id: String,
    pub name: String,
}

impl SeedAccount {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Central authority tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralConfig {
    pub partition: PartitionAddress,
    /// Key of the aggregate balance record.
    pub aggregate_id: String,
    /// Ceiling on cumulative issuance.
    pub max_issuance: i64,
    /// The only bank the authority will transfer to.
    pub head_office: String,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            partition: PartitionAddress::new(ADMIN_CHAINCODE, ADMIN_CHANNEL),
            aggregate_id: CBDC_NAME.to_string(),
            max_issuance: MAX_VAL_ADMIN,
            head_office: HEAD_OFFICE.to_string(),
        }
    }
}

/// Bank (regulatory) tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    pub partition: PartitionAddress,
    /// The only bank account `credit` accepts.
    pub head_office: String,
    /// Sender recorded in history for value arriving from the authority.
    pub authority_name: String,
    /// Per-account balance ceiling. `None` means unbounded.
    pub ceiling: Option<i64>,
    pub accounts: Vec<SeedAccount>,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            partition: PartitionAddress::new(REGULATORY_CHAINCODE, REGULATORY_CHANNEL),
            head_office: HEAD_OFFICE.to_string(),
            authority_name: CENTRAL_BANK_NAME.to_string(),
            ceiling: None,
            accounts: vec![
                SeedAccount::new("Bank0", "Shinhan-Main"),
                SeedAccount::new("Bank1", "Shinhan-Sub"),
            ],
        }
    }
}

/// User (account) tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub partition: PartitionAddress,
    /// Per-account balance ceiling.
    pub ceiling: i64,
    pub accounts: Vec<SeedAccount>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            partition: PartitionAddress::new(USER_CHAINCODE, USER_CHANNEL),
            ceiling: MAX_VAL_USER,
            accounts: vec![
                SeedAccount::new("User0", "Hyeon Hee"),
                SeedAccount::new("User1", "Geum Bo"),
                SeedAccount::new("User2", "Test"),
            ],
        }
    }
}

/// A full three-partition deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub central: CentralConfig,
    pub bank: BankConfig,
    pub user: UserConfig,
    pub store: StoreConfig,
}

impl NetworkConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: NetworkConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks the cross-field rules a deployment depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.central.max_issuance <= 0 {
            return Err(ConfigError::Invalid("central max_issuance must be positive".into()));
        }
        if self.user.ceiling <= 0 {
            return Err(ConfigError::Invalid("user ceiling must be positive".into()));
        }
        if matches!(self.bank.ceiling, Some(c) if c <= 0) {
            return Err(ConfigError::Invalid("bank ceiling must be positive".into()));
        }
        if self.central.head_office != self.bank.head_office {
            return Err(ConfigError::Invalid(format!(
                "central head office {} differs from bank head office {}",
                self.central.head_office, self.bank.head_office
            )));
        }
        if !self.bank.accounts.iter().any(|a| a.id == self.bank.head_office) {
            return Err(ConfigError::Invalid(format!(
                "head office {} is not a seeded bank account",
                self.bank.head_office
            )));
        }

        let addresses: HashSet<&PartitionAddress> = [
            &self.central.partition,
            &self.bank.partition,
            &self.user.partition,
        ]
        .into_iter()
        .collect();
        if addresses.len() != 3 {
            return Err(ConfigError::Invalid("partition addresses must be distinct".into()));
        }

        validate_key(&self.central.aggregate_id)?;
        for accounts in [&self.bank.accounts, &self.user.accounts] {
            let mut seen = HashSet::new();
            for account in accounts {
                validate_key(&account.id)?;
                if !seen.insert(account.id.as_str()) {
                    return Err(ConfigError::Invalid(format!("duplicate account id {}", account.id)));
                }
            }
        }
        Ok(())
    }
}

/// Account ids share the key space with history records (decimal ids) and
/// bookkeeping keys (reserved prefix), so neither shape is allowed.
fn validate_key(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Invalid("account id must not be empty".into()));
    }
    if !crate::model::is_account_key(id) {
        return Err(ConfigError::Invalid(format!(
            "account id {id} would collide with history or bookkeeping keys"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        NetworkConfig::default().validate().unwrap();
    }

    #[test]
    fn defaults_match_original_deployment() {
        let config = NetworkConfig::default();
        assert_eq!(config.central.aggregate_id, "korea");
        assert_eq!(config.central.max_issuance, 10_000);
        assert_eq!(config.user.ceiling, 1_000);
        assert_eq!(config.bank.ceiling, None);
        assert_eq!(config.bank.accounts.len(), 2);
        assert_eq!(config.user.accounts.len(), 3);
        assert_eq!(config.bank.partition.to_string(), "regulatorychaincode@regulatory-channel");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = NetworkConfig::from_json_str(r#"{"bank":{"ceiling":5000}}"#).unwrap();
        assert_eq!(config.bank.ceiling, Some(5000));
        assert_eq!(config.bank.head_office, "Bank0");
        assert_eq!(config.user.ceiling, 1_000);
    }

    #[test]
    fn numeric_account_id_rejected() {
        let json = r#"{"user":{"accounts":[{"id":"42","name":"x"}]}}"#;
        assert!(matches!(
            NetworkConfig::from_json_str(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn reserved_prefix_rejected() {
        let json = r#"{"user":{"accounts":[{"id":"~history/seq","name":"x"}]}}"#;
        assert!(NetworkConfig::from_json_str(json).is_err());
    }

    #[test]
    fn duplicate_account_rejected() {
        let mut config = NetworkConfig::default();
        config.user.accounts.push(SeedAccount::new("User0", "again"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn head_office_must_be_seeded() {
        let mut config = NetworkConfig::default();
        config.bank.accounts.retain(|a| a.id != "Bank0");
        assert!(config.validate().is_err());
    }

    #[test]
    fn shared_partition_address_rejected() {
        let mut config = NetworkConfig::default();
        config.user.partition = config.bank.partition.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            NetworkConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");
        std::fs::write(&path, r#"{"user":{"ceiling":250}}"#).unwrap();
        let config = NetworkConfig::load(&path).unwrap();
        assert_eq!(config.user.ceiling, 250);
    }
}
