//! Typed contract call descriptors.
//!
//! A [`CallSpec`] names a contract function together with its parameter and
//! return types, so calldata can be encoded and return data decoded without
//! generating a binding for every contract the keeper touches.
//!
//! ```rust,ignore
//! use alloy::dyn_abi::DynSolType;
//! use keeper_chain::CallSpec;
//!
//! let life = CallSpec::view("lifeBatched")
//!     .param(DynSolType::Array(Box::new(DynSolType::Uint(256))))
//!     .returns(DynSolType::Array(Box::new(DynSolType::Uint(256))));
//! assert_eq!(life.signature(), "lifeBatched(uint256[])");
//! ```

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{keccak256, Bytes, Selector};

use crate::error::ChainError;

/// Whether a call may change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Read-only, executed with `eth_call`
    View,
    /// State-changing, sent as a signed transaction
    NonPayable,
}

/// Strongly-typed description of one contract function.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec {
    name: String,
    params: Vec<DynSolType>,
    returns: Vec<DynSolType>,
    mutability: Mutability,
}

impl CallSpec {
    /// Start describing a read-only function.
    pub fn view(name: impl Into<String>) -> Self {
        Self::new(name, Mutability::View)
    }

    /// Start describing a state-changing function.
    pub fn write(name: impl Into<String>) -> Self {
        Self::new(name, Mutability::NonPayable)
    }

    fn new(name: impl Into<String>, mutability: Mutability) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: Vec::new(),
            mutability,
        }
    }

    /// Append a parameter type.
    pub fn param(mut self, ty: DynSolType) -> Self {
        self.params.push(ty);
        self
    }

    /// Append a return type.
    pub fn returns(mut self, ty: DynSolType) -> Self {
        self.returns.push(ty);
        self
    }

    /// Append several return types at once.
    pub fn returns_all(mut self, types: impl IntoIterator<Item = DynSolType>) -> Self {
        self.returns.extend(types);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    pub fn is_view(&self) -> bool {
        self.mutability == Mutability::View
    }

    /// Canonical signature, e.g. `killBatched(uint256[],bytes[],address)`.
    pub fn signature(&self) -> String {
        let params: Vec<_> = self.params.iter().map(|ty| ty.sol_type_name()).collect();
        format!("{}({})", self.name, params.join(","))
    }

    /// First four bytes of the signature hash.
    pub fn selector(&self) -> Selector {
        Selector::from_slice(&keccak256(self.signature().as_bytes())[..4])
    }

    /// Encode selector + arguments.
    pub fn encode(&self, args: &[DynSolValue]) -> Result<Bytes, ChainError> {
        if args.len() != self.params.len() {
            return Err(ChainError::abi(
                self.signature(),
                format!("expected {} arguments, got {}", self.params.len(), args.len()),
            ));
        }

        for (position, (ty, value)) in self.params.iter().zip(args).enumerate() {
            if !ty.matches(value) {
                return Err(ChainError::abi(
                    self.signature(),
                    format!("argument {position} does not match {}", ty.sol_type_name()),
                ));
            }
        }

        let mut calldata = self.selector().to_vec();
        calldata.extend(DynSolValue::Tuple(args.to_vec()).abi_encode_params());
        Ok(Bytes::from(calldata))
    }

    /// Decode return data into one value per declared return type.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>, ChainError> {
        if self.returns.is_empty() {
            return Ok(Vec::new());
        }

        match DynSolType::Tuple(self.returns.clone()).abi_decode_params(data) {
            Ok(DynSolValue::Tuple(values)) => Ok(values),
            Ok(other) => Ok(vec![other]),
            Err(e) => Err(ChainError::abi(self.signature(), e)),
        }
    }
}

/// Read a `uint` return value at `position`.
pub fn expect_uint(
    values: &[DynSolValue],
    position: usize,
    function: &str,
) -> Result<alloy::primitives::U256, ChainError> {
    values
        .get(position)
        .and_then(|v| v.as_uint())
        .map(|(value, _)| value)
        .ok_or_else(|| ChainError::abi(function, format!("return {position} is not a uint")))
}

/// Read an `address` return value at `position`.
pub fn expect_address(
    values: &[DynSolValue],
    position: usize,
    function: &str,
) -> Result<alloy::primitives::Address, ChainError> {
    values
        .get(position)
        .and_then(|v| v.as_address())
        .ok_or_else(|| ChainError::abi(function, format!("return {position} is not an address")))
}

/// Read a `uint[]` return value at `position`.
pub fn expect_uint_array(
    values: &[DynSolValue],
    position: usize,
    function: &str,
) -> Result<Vec<alloy::primitives::U256>, ChainError> {
    let items = values
        .get(position)
        .and_then(|v| v.as_array())
        .ok_or_else(|| ChainError::abi(function, format!("return {position} is not an array")))?;

    items
        .iter()
        .map(|item| {
            item.as_uint()
                .map(|(value, _)| value)
                .ok_or_else(|| ChainError::abi(function, "array element is not a uint"))
        })
        .collect()
}
