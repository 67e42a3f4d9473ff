//! Version-Aware Result Decoder
//!
//! Turns the merged [`RawResults`] of a pass into one [`StrategyMulticallData`]
//! per manifest entry. Nothing here fails: a missing key, a wrong element
//! count or a mistyped value leaves the affected field at its zero default and
//! never touches other fields or other strategies.
//!
//! The `strategies(address)` tuple is mapped on `(vault version, arity)`:
//!
//! | version          | arity | position 2  | positions 3..               |
//! |------------------|-------|-------------|-----------------------------|
//! | `0.2.2`          | 8     | debtLimit   | rateLimit, lastReport, ...  |
//! | `0.3.0`, `0.3.1` | 8     | debtRatio   | rateLimit, lastReport, ...  |
//! | any              | 9     | debtRatio   | minDebt, maxDebt, lastReport, ... |
//!
//! Any other combination leaves the whole status block at its defaults.

use crate::types::{
    ManifestEntry, RawResults, RawValue, StrategyMethod, StrategyMulticallData, VaultVersion,
};
use ethers::types::{Address, U256};
use log::debug;
use std::collections::HashMap;

/// Decodes every manifest entry. Entries sharing a strategy address keep the
/// last one, mirroring how the store is keyed.
pub fn decode_strategies(
    entries: &[ManifestEntry],
    results: &RawResults,
) -> HashMap<Address, StrategyMulticallData> {
    entries
        .iter()
        .map(|entry| (entry.strategy, decode_strategy(entry, results)))
        .collect()
}

pub fn decode_strategy(entry: &ManifestEntry, results: &RawResults) -> StrategyMulticallData {
    let name = entry.display_name();
    let single = |method: StrategyMethod| results.get(&name, method);

    let mut data = StrategyMulticallData {
        credit_available: single_uint(single(StrategyMethod::CreditAvailable)),
        debt_outstanding: single_uint(single(StrategyMethod::DebtOutstanding)),
        expected_return: single_uint(single(StrategyMethod::ExpectedReturn)),
        estimated_total_assets: single_uint(single(StrategyMethod::EstimatedTotalAssets)),
        keep_crv: single_uint(single(StrategyMethod::KeepCrv)),
        is_active: single_bool(single(StrategyMethod::IsActive)),
        ..Default::default()
    };

    if let Some(values) = single(StrategyMethod::Strategies) {
        apply_strategy_params(&mut data, entry.vault_version, values, &name);
    }

    data
}

fn single_uint(values: Option<&[RawValue]>) -> U256 {
    match values {
        Some([value]) => uint(value),
        _ => U256::zero(),
    }
}

fn single_bool(values: Option<&[RawValue]>) -> bool {
    match values {
        Some([value]) => value.as_bool().unwrap_or(false),
        _ => false,
    }
}

fn uint(value: &RawValue) -> U256 {
    value.as_uint().unwrap_or_default()
}

/// Maps the `strategies(address)` tuple onto `data`.
///
/// Version decides between the two 8-field layouts; a 9-field tuple is always
/// read with the current layout, whatever the declared version.
pub fn apply_strategy_params(
    data: &mut StrategyMulticallData,
    version: VaultVersion,
    values: &[RawValue],
    name: &str,
) {
    match (version, values) {
        (
            VaultVersion::V022,
            [performance_fee, activation, debt_limit, rate_limit, last_report, total_debt, total_gain, total_loss],
        ) => {
            data.performance_fee = uint(performance_fee);
            data.activation = uint(activation);
            data.debt_limit = uint(debt_limit);
            data.rate_limit = uint(rate_limit);
            data.last_report = uint(last_report);
            data.total_debt = uint(total_debt);
            data.total_gain = uint(total_gain);
            data.total_loss = uint(total_loss);
        }
        (
            VaultVersion::V030 | VaultVersion::V031,
            [performance_fee, activation, debt_ratio, rate_limit, last_report, total_debt, total_gain, total_loss],
        ) => {
            data.performance_fee = uint(performance_fee);
            data.activation = uint(activation);
            data.debt_ratio = uint(debt_ratio);
            data.rate_limit = uint(rate_limit);
            data.last_report = uint(last_report);
            data.total_debt = uint(total_debt);
            data.total_gain = uint(total_gain);
            data.total_loss = uint(total_loss);
        }
        (
            _,
            [performance_fee, activation, debt_ratio, min_debt_per_harvest, max_debt_per_harvest, last_report, total_debt, total_gain, total_loss],
        ) => {
            data.performance_fee = uint(performance_fee);
            data.activation = uint(activation);
            data.debt_ratio = uint(debt_ratio);
            data.min_debt_per_harvest = uint(min_debt_per_harvest);
            data.max_debt_per_harvest = uint(max_debt_per_harvest);
            data.last_report = uint(last_report);
            data.total_debt = uint(total_debt);
            data.total_gain = uint(total_gain);
            data.total_loss = uint(total_loss);
        }
        (version, values) => {
            debug!(
                "strategies() for {} returned {} fields under vault version {}, keeping defaults",
                name,
                values.len(),
                version
            );
        }
    }
}
