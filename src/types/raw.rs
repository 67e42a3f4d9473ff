use crate::types::conversions::word_to_i256;
use crate::types::strategy::StrategyMethod;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, I256, U256};
use std::collections::HashMap;

/// A decoded ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Uint(U256),
    Int(I256),
    Bool(bool),
    Address(Address),
    Bytes(Bytes),
    Text(String),
    /// Tuples, fixed arrays and dynamic arrays
    Tuple(Vec<RawValue>),
}

impl RawValue {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            RawValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RawValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Token> for RawValue {
    fn from(token: Token) -> Self {
        match token {
            Token::Uint(v) => RawValue::Uint(v),
            Token::Int(v) => RawValue::Int(word_to_i256(v)),
            Token::Bool(v) => RawValue::Bool(v),
            Token::Address(v) => RawValue::Address(v),
            Token::Bytes(v) | Token::FixedBytes(v) => RawValue::Bytes(Bytes::from(v)),
            Token::String(v) => RawValue::Text(v),
            Token::Tuple(items) | Token::Array(items) | Token::FixedArray(items) => {
                RawValue::Tuple(items.into_iter().map(RawValue::from).collect())
            }
        }
    }
}

/// Correlates a raw result with the entity and method that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub name: String,
    pub method: StrategyMethod,
}

impl CallKey {
    pub fn new(name: impl Into<String>, method: StrategyMethod) -> Self {
        Self {
            name: name.into(),
            method,
        }
    }
}

/// Merged output of every batch of a pass. A missing key means the call was
/// never executed or failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResults {
    values: HashMap<CallKey, Vec<RawValue>>,
}

impl RawResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: CallKey, values: Vec<RawValue>) {
        self.values.insert(key, values);
    }

    pub fn get(&self, name: &str, method: StrategyMethod) -> Option<&[RawValue]> {
        // CallKey owns its name, so build a probe key for the lookup
        self.values
            .get(&CallKey::new(name, method))
            .map(Vec::as_slice)
    }

    pub fn extend(&mut self, other: RawResults) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
