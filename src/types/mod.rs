pub mod conversions;
pub mod raw;
pub mod strategy;

pub use raw::{CallKey, RawResults, RawValue};
pub use strategy::{
    ManifestEntry, StrategiesAbi, StrategyMeta, StrategyMethod, StrategyMulticallData, VaultVersion,
};
