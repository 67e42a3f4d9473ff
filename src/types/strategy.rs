use crate::types::conversions::{checksum, u256_to_u64};
use chrono::{DateTime, TimeZone, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Historical vault calling convention of a strategy's parent vault.
///
/// Any tag outside the legacy set resolves to [`VaultVersion::Current`]; this is a
/// compatibility default, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VaultVersion {
    V022,
    V030,
    V031,
    #[default]
    Current,
}

impl VaultVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultVersion::V022 => "0.2.2",
            VaultVersion::V030 => "0.3.0",
            VaultVersion::V031 => "0.3.1",
            VaultVersion::Current => "current",
        }
    }

    /// ABI variant used to encode and decode the `strategies(address)` call.
    pub fn strategies_abi(&self) -> StrategiesAbi {
        match self {
            VaultVersion::V022 => StrategiesAbi::V022,
            VaultVersion::V030 | VaultVersion::V031 => StrategiesAbi::V030,
            VaultVersion::Current => StrategiesAbi::Current,
        }
    }
}

impl From<&str> for VaultVersion {
    fn from(tag: &str) -> Self {
        match tag {
            "0.2.2" => VaultVersion::V022,
            "0.3.0" => VaultVersion::V030,
            "0.3.1" => VaultVersion::V031,
            _ => VaultVersion::Current,
        }
    }
}

impl From<String> for VaultVersion {
    fn from(tag: String) -> Self {
        VaultVersion::from(tag.as_str())
    }
}

impl From<VaultVersion> for String {
    fn from(version: VaultVersion) -> Self {
        version.as_str().to_string()
    }
}

impl fmt::Display for VaultVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout of the vault `strategies(address)` return tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategiesAbi {
    /// 8 fields, position 2 is `debtLimit`
    V022,
    /// 8 fields, position 2 is `debtRatio`
    V030,
    /// 9 fields with min/max debt per harvest
    Current,
}

/// Read-only methods queried for every tracked strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyMethod {
    CreditAvailable,
    DebtOutstanding,
    ExpectedReturn,
    Strategies,
    EstimatedTotalAssets,
    IsActive,
    KeepCrv,
}

impl StrategyMethod {
    /// Fixed order in which a pass queries an entity.
    pub const ALL: [StrategyMethod; 7] = [
        StrategyMethod::CreditAvailable,
        StrategyMethod::DebtOutstanding,
        StrategyMethod::ExpectedReturn,
        StrategyMethod::Strategies,
        StrategyMethod::EstimatedTotalAssets,
        StrategyMethod::IsActive,
        StrategyMethod::KeepCrv,
    ];

    /// Solidity/Vyper function name.
    pub fn abi_name(&self) -> &'static str {
        match self {
            StrategyMethod::CreditAvailable => "creditAvailable",
            StrategyMethod::DebtOutstanding => "debtOutstanding",
            StrategyMethod::ExpectedReturn => "expectedReturn",
            StrategyMethod::Strategies => "strategies",
            StrategyMethod::EstimatedTotalAssets => "estimatedTotalAssets",
            StrategyMethod::IsActive => "isActive",
            StrategyMethod::KeepCrv => "keepCRV",
        }
    }

    /// Whether the call goes to the vault (with the strategy as argument) or to the strategy itself.
    pub fn targets_vault(&self) -> bool {
        matches!(
            self,
            StrategyMethod::CreditAvailable
                | StrategyMethod::DebtOutstanding
                | StrategyMethod::ExpectedReturn
                | StrategyMethod::Strategies
        )
    }
}

impl fmt::Display for StrategyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abi_name())
    }
}

/// One tracked strategy, as supplied by the manifest source for a pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestEntry {
    pub chain_id: u64,
    pub vault: Address,
    pub strategy: Address,
    pub vault_version: VaultVersion,
}

impl ManifestEntry {
    pub fn new(chain_id: u64, vault: Address, strategy: Address, vault_version: impl Into<VaultVersion>) -> Self {
        Self {
            chain_id,
            vault,
            strategy,
            vault_version: vault_version.into(),
        }
    }

    /// Correlation name shared by all calls issued for this strategy.
    pub fn display_name(&self) -> String {
        checksum(&self.strategy)
    }
}

/// Normalized on-chain state of one strategy.
///
/// Every field starts at zero/false and only moves when the matching call
/// returned a well-shaped value during the pass that produced the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyMulticallData {
    pub credit_available: U256,
    pub debt_outstanding: U256,
    pub expected_return: U256,
    pub estimated_total_assets: U256,
    pub keep_crv: U256,
    pub performance_fee: U256,
    pub activation: U256,
    pub debt_ratio: U256,
    pub debt_limit: U256,
    pub rate_limit: U256,
    pub min_debt_per_harvest: U256,
    pub max_debt_per_harvest: U256,
    pub last_report: U256,
    pub total_debt: U256,
    pub total_gain: U256,
    pub total_loss: U256,
    pub is_active: bool,
}

impl StrategyMulticallData {
    pub fn activation_time(&self) -> Option<DateTime<Utc>> {
        unix_seconds(self.activation)
    }

    pub fn last_report_time(&self) -> Option<DateTime<Utc>> {
        unix_seconds(self.last_report)
    }
}

fn unix_seconds(value: U256) -> Option<DateTime<Utc>> {
    if value.is_zero() {
        return None;
    }
    let secs = i64::try_from(u256_to_u64(value).ok()?).ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Strategy description published by the metadata API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localization: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_tags_dispatch_to_three_abis() {
        assert_eq!(VaultVersion::from("0.2.2").strategies_abi(), StrategiesAbi::V022);
        assert_eq!(VaultVersion::from("0.3.0").strategies_abi(), StrategiesAbi::V030);
        assert_eq!(VaultVersion::from("0.3.1").strategies_abi(), StrategiesAbi::V030);
        assert_eq!(VaultVersion::from("0.4.3").strategies_abi(), StrategiesAbi::Current);
        assert_eq!(VaultVersion::from("").strategies_abi(), StrategiesAbi::Current);
        assert_eq!(VaultVersion::from("garbage"), VaultVersion::Current);
    }

    #[test]
    fn version_tags_match_exactly() {
        assert_eq!(VaultVersion::from(" 0.2.2"), VaultVersion::Current);
        assert_eq!(VaultVersion::from("0.3.0\n"), VaultVersion::Current);
        assert_eq!(VaultVersion::from("v0.3.1"), VaultVersion::Current);
        assert_eq!(VaultVersion::from("0.3.1"), VaultVersion::V031);
    }

    #[test]
    fn version_deserializes_from_plain_string() {
        let v: VaultVersion = serde_json::from_str("\"0.3.1\"").unwrap();
        assert_eq!(v, VaultVersion::V031);
        let v: VaultVersion = serde_json::from_str("\"0.4.6\"").unwrap();
        assert_eq!(v, VaultVersion::Current);
    }

    #[test]
    fn vault_methods_are_the_first_four() {
        let vault_methods: Vec<_> = StrategyMethod::ALL.iter().filter(|m| m.targets_vault()).collect();
        assert_eq!(vault_methods.len(), 4);
        assert_eq!(StrategyMethod::KeepCrv.abi_name(), "keepCRV");
    }

    #[test]
    fn timestamps_are_none_when_unset() {
        let mut data = StrategyMulticallData::default();
        assert!(data.last_report_time().is_none());
        data.last_report = U256::from(1_650_000_000u64);
        assert_eq!(data.last_report_time().map(|t| t.timestamp()), Some(1_650_000_000));
        data.activation = U256::MAX;
        assert!(data.activation_time().is_none());
    }

    #[test]
    fn meta_tolerates_missing_fields() {
        let meta: StrategyMeta = serde_json::from_str(r#"{"name":"Curve Boost","addresses":["0x1"],"extra":1}"#).unwrap();
        assert_eq!(meta.name, "Curve Boost");
        assert!(meta.description.is_empty());
        assert!(meta.protocols.is_empty());
    }
}
