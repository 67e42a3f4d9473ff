use ethers::abi::{Function, Param, ParamType, StateMutability};

/// Multicall3 is deployed at the same address on every supported network.
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

/// `aggregate3(Call3[] calls) payable returns (Result[] returnData)`
///
/// - `Call3`: `(address target, bool allowFailure, bytes callData)`
/// - `Result`: `(bool success, bytes returnData)`
#[allow(deprecated)]
pub fn aggregate3_function() -> Function {
    Function {
        name: "aggregate3".to_string(),
        inputs: vec![Param {
            name: "calls".to_string(),
            kind: ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::Address,
                ParamType::Bool,
                ParamType::Bytes,
            ]))),
            internal_type: None,
        }],
        outputs: vec![Param {
            name: "returnData".to_string(),
            kind: aggregate3_output(),
            internal_type: None,
        }],
        constant: None,
        state_mutability: StateMutability::Payable,
    }
}

pub fn aggregate3_output() -> ParamType {
    ParamType::Array(Box::new(ParamType::Tuple(vec![
        ParamType::Bool,
        ParamType::Bytes,
    ])))
}
