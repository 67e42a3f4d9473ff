use ethers::abi::{parse_abi, Abi};
use once_cell::sync::Lazy;

pub static YEARN_STRATEGY_ABI: Lazy<Result<Abi, String>> = Lazy::new(|| {
    parse_abi(&[
        "function estimatedTotalAssets() external view returns (uint256)",
        "function isActive() external view returns (bool)",
        "function keepCRV() external view returns (uint256)",
    ])
    .map_err(|e| e.to_string())
});
