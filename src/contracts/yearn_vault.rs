use ethers::abi::{parse_abi, Abi};
use once_cell::sync::Lazy;

// ═══════════════════════════════════════════════════════════════════════════
// YEARN VAULT ABIs
// ═══════════════════════════════════════════════════════════════════════════
//
// Only `strategies(address)` changes between vault releases:
// - 0.2.2        -> 8 fields, position 2 = debtLimit, position 3 = rateLimit
// - 0.3.0/0.3.1  -> 8 fields, position 2 = debtRatio, position 3 = rateLimit
// - 0.3.2+       -> 9 fields, rateLimit replaced by min/max debt per harvest
// ═══════════════════════════════════════════════════════════════════════════

const VAULT_COMMON: [&str; 3] = [
    "function creditAvailable(address strategy) external view returns (uint256)",
    "function debtOutstanding(address strategy) external view returns (uint256)",
    "function expectedReturn(address strategy) external view returns (uint256)",
];

const STRATEGIES_CURRENT: &str = "function strategies(address strategy) external view returns (uint256 performanceFee, uint256 activation, uint256 debtRatio, uint256 minDebtPerHarvest, uint256 maxDebtPerHarvest, uint256 lastReport, uint256 totalDebt, uint256 totalGain, uint256 totalLoss)";

const STRATEGIES_V030: &str = "function strategies(address strategy) external view returns (uint256 performanceFee, uint256 activation, uint256 debtRatio, uint256 rateLimit, uint256 lastReport, uint256 totalDebt, uint256 totalGain, uint256 totalLoss)";

const STRATEGIES_V022: &str = "function strategies(address strategy) external view returns (uint256 performanceFee, uint256 activation, uint256 debtLimit, uint256 rateLimit, uint256 lastReport, uint256 totalDebt, uint256 totalGain, uint256 totalLoss)";

fn vault_abi(strategies_signature: &str) -> Result<Abi, String> {
    let mut signatures = VAULT_COMMON.to_vec();
    signatures.push(strategies_signature);
    parse_abi(&signatures).map_err(|e| e.to_string())
}

pub static YEARN_VAULT_ABI: Lazy<Result<Abi, String>> = Lazy::new(|| vault_abi(STRATEGIES_CURRENT));
pub static YEARN_VAULT_V030_ABI: Lazy<Result<Abi, String>> = Lazy::new(|| vault_abi(STRATEGIES_V030));
pub static YEARN_VAULT_V022_ABI: Lazy<Result<Abi, String>> = Lazy::new(|| vault_abi(STRATEGIES_V022));
