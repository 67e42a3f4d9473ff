//! Call Descriptor Builder
//!
//! Pure construction of the read-only calls issued for each tracked strategy.
//! Nothing here touches the network: every [`CallDescriptor`] carries its own
//! encoded calldata and the ABI [`Function`] needed to decode the answer.

use crate::contracts::{YEARN_STRATEGY_ABI, YEARN_VAULT_ABI, YEARN_VAULT_V022_ABI, YEARN_VAULT_V030_ABI};
use crate::types::{CallKey, ManifestEntry, StrategiesAbi, StrategyMethod, VaultVersion};
use ethers::abi::{Abi, Function, Token};
use ethers::types::{Address, Bytes};
use log::{debug, warn};

/// A single encoded, addressed and named unit of work for the batch executor.
#[derive(Debug, Clone)]
pub struct CallDescriptor {
    /// Correlation name of the entity the call belongs to
    pub name: String,
    pub target: Address,
    pub method: StrategyMethod,
    pub call_data: Bytes,
    /// Output layout used to decode the returned bytes
    pub function: Function,
    pub vault_version: VaultVersion,
}

impl CallDescriptor {
    pub fn key(&self) -> CallKey {
        CallKey::new(self.name.clone(), self.method)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallBuildError {
    #[error("ABI unavailable: {0}")]
    Abi(String),
    #[error("method {method} not found in ABI: {source}")]
    MissingMethod {
        method: StrategyMethod,
        source: ethers::abi::Error,
    },
    #[error("failed to encode {method}: {source}")]
    Encode {
        method: StrategyMethod,
        source: ethers::abi::Error,
    },
}

fn abi_for(method: StrategyMethod, version: VaultVersion) -> Result<&'static Abi, CallBuildError> {
    let abi = if !method.targets_vault() {
        &*YEARN_STRATEGY_ABI
    } else if method == StrategyMethod::Strategies {
        match version.strategies_abi() {
            StrategiesAbi::V022 => &*YEARN_VAULT_V022_ABI,
            StrategiesAbi::V030 => &*YEARN_VAULT_V030_ABI,
            StrategiesAbi::Current => &*YEARN_VAULT_ABI,
        }
    } else {
        &*YEARN_VAULT_ABI
    };
    abi.as_ref().map_err(|e| CallBuildError::Abi(e.clone()))
}

/// Builds the descriptor for one method of one strategy.
///
/// Vault methods are sent to `vault` with `strategy` as argument; strategy
/// methods are sent to `strategy` without arguments.
pub fn build_call(
    name: &str,
    vault: Address,
    strategy: Address,
    version: VaultVersion,
    method: StrategyMethod,
) -> Result<CallDescriptor, CallBuildError> {
    let abi = abi_for(method, version)?;
    let function = abi
        .function(method.abi_name())
        .map_err(|source| CallBuildError::MissingMethod { method, source })?;

    let (target, args) = if method.targets_vault() {
        (vault, vec![Token::Address(strategy)])
    } else {
        (strategy, Vec::new())
    };

    let call_data = function
        .encode_input(&args)
        .map_err(|source| CallBuildError::Encode { method, source })?;

    Ok(CallDescriptor {
        name: name.to_string(),
        target,
        method,
        call_data: Bytes::from(call_data),
        function: function.clone(),
        vault_version: version,
    })
}

/// Builds the seven calls of one strategy. A method that cannot be encoded is
/// left out; its fields keep their defaults after decoding.
pub fn build_strategy_calls(
    name: &str,
    vault: Address,
    strategy: Address,
    version: VaultVersion,
) -> Vec<CallDescriptor> {
    StrategyMethod::ALL
        .iter()
        .filter_map(|&method| match build_call(name, vault, strategy, version, method) {
            Ok(call) => Some(call),
            Err(e) => {
                warn!("Skipping {} for strategy {}: {}", method, name, e);
                None
            }
        })
        .collect()
}

/// Builds every call of a pass, in manifest order.
pub fn build_manifest_calls(entries: &[ManifestEntry]) -> Vec<CallDescriptor> {
    let mut calls = Vec::with_capacity(entries.len() * StrategyMethod::ALL.len());
    for entry in entries {
        calls.extend(build_strategy_calls(
            &entry.display_name(),
            entry.vault,
            entry.strategy,
            entry.vault_version,
        ));
    }
    debug!("Built {} calls for {} strategies", calls.len(), entries.len());
    calls
}
