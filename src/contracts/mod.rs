// Contracts Module - read-only ABIs queried by the aggregation pass

pub mod multicall3;
pub mod yearn_strategy;
pub mod yearn_vault;

pub use multicall3::{aggregate3_function, MULTICALL3_ADDRESS};
pub use yearn_strategy::YEARN_STRATEGY_ABI;
pub use yearn_vault::{YEARN_VAULT_ABI, YEARN_VAULT_V022_ABI, YEARN_VAULT_V030_ABI};
