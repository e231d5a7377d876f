//! Rodeo contract surface used by the keeper.
//!
//! Reads and writes are described with [`CallSpec`] values; events are
//! generated with `sol!` so their topics and payloads stay typed.
//!
//! | contract        | calls                                                   |
//! |-----------------|---------------------------------------------------------|
//! | Investor        | `nextPosition`                                          |
//! | InvestorHelper  | `peekPosition`, `peekPools`, `lifeBatched`, `killBatched` |
//! | Strategy        | `earn`                                                  |
//! | Oracle          | `lastTimestamp`, `update`                               |

pub mod events;

pub use events::{EarnEvent, IInvestor, IStrategy, InvestorEvent};

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, U256};

use crate::call::{expect_address, expect_uint, expect_uint_array, CallSpec};
use crate::error::ChainError;

fn uint() -> DynSolType {
    DynSolType::Uint(256)
}

fn uint_array() -> DynSolType {
    DynSolType::Array(Box::new(uint()))
}

/// Calls on the Investor contract.
pub mod investor {
    use super::*;

    /// `nextPosition() view returns (uint256)`
    pub fn next_position() -> CallSpec {
        CallSpec::view("nextPosition").returns(uint())
    }
}

/// Calls on the InvestorHelper contract.
pub mod helper {
    use super::*;

    /// `peekPosition(uint256) view returns (address, uint256 x8)`
    pub fn peek_position() -> CallSpec {
        CallSpec::view("peekPosition")
            .param(uint())
            .returns(DynSolType::Address)
            .returns_all(std::iter::repeat(uint()).take(8))
    }

    /// `peekPools(address[]) view returns (uint256[] x6)`
    pub fn peek_pools() -> CallSpec {
        CallSpec::view("peekPools")
            .param(DynSolType::Array(Box::new(DynSolType::Address)))
            .returns_all(std::iter::repeat(uint_array()).take(6))
    }

    /// `lifeBatched(uint256[]) view returns (uint256[])`
    pub fn life_batched() -> CallSpec {
        CallSpec::view("lifeBatched").param(uint_array()).returns(uint_array())
    }

    /// `killBatched(uint256[], bytes[], address)`
    pub fn kill_batched() -> CallSpec {
        CallSpec::write("killBatched")
            .param(uint_array())
            .param(DynSolType::Array(Box::new(DynSolType::Bytes)))
            .param(DynSolType::Address)
    }
}

/// Calls on a yield strategy.
pub mod strategy {
    use super::*;

    /// `earn()`
    pub fn earn() -> CallSpec {
        CallSpec::write("earn")
    }
}

/// Calls on a keeper-updated price oracle.
pub mod oracle {
    use super::*;

    /// `lastTimestamp() view returns (uint256)`
    pub fn last_timestamp() -> CallSpec {
        CallSpec::view("lastTimestamp").returns(uint())
    }

    /// `update()`
    pub fn update() -> CallSpec {
        CallSpec::write("update")
    }
}

/// Argument helpers.
pub fn uint_arg(value: impl Into<U256>) -> DynSolValue {
    DynSolValue::Uint(value.into(), 256)
}

pub fn uint_array_arg(values: impl IntoIterator<Item = U256>) -> DynSolValue {
    DynSolValue::Array(values.into_iter().map(|v| DynSolValue::Uint(v, 256)).collect())
}

pub fn address_array_arg(values: &[Address]) -> DynSolValue {
    DynSolValue::Array(values.iter().copied().map(DynSolValue::Address).collect())
}

/// Arguments for `killBatched`: empty payload per id, proceeds to `to`.
pub fn kill_batched_args(ids: &[U256], to: Address) -> Vec<DynSolValue> {
    vec![
        uint_array_arg(ids.iter().copied()),
        DynSolValue::Array(ids.iter().map(|_| DynSolValue::Bytes(Vec::new())).collect()),
        DynSolValue::Address(to),
    ]
}

/// Current state of one position as reported by `peekPosition`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PositionView {
    pub pool: Address,
    pub strategy: U256,
    pub shares: U256,
    pub borrow: U256,
    /// USD value of the shares, 18 decimals
    pub shares_value: U256,
    /// Borrowed amount in asset units
    pub borrow_value: U256,
    /// Health ratio, 1e18 = liquidation threshold
    pub life: U256,
    /// Deposited principal in asset units
    pub amount: U256,
    pub price: U256,
}

impl PositionView {
    pub fn from_values(values: &[DynSolValue]) -> Result<Self, ChainError> {
        const FN: &str = "peekPosition";
        Ok(Self {
            pool: expect_address(values, 0, FN)?,
            strategy: expect_uint(values, 1, FN)?,
            shares: expect_uint(values, 2, FN)?,
            borrow: expect_uint(values, 3, FN)?,
            shares_value: expect_uint(values, 4, FN)?,
            borrow_value: expect_uint(values, 5, FN)?,
            life: expect_uint(values, 6, FN)?,
            amount: expect_uint(values, 7, FN)?,
            price: expect_uint(values, 8, FN)?,
        })
    }
}

/// One pool's row from `peekPools`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolView {
    pub address: Address,
    pub index: U256,
    pub share: U256,
    pub supply: U256,
    pub borrow: U256,
    pub rate: U256,
    pub price: U256,
}

impl PoolView {
    /// Zip the six parallel arrays back into per-pool rows.
    pub fn from_values(pools: &[Address], values: &[DynSolValue]) -> Result<Vec<Self>, ChainError> {
        const FN: &str = "peekPools";
        let columns = (0..6)
            .map(|i| expect_uint_array(values, i, FN))
            .collect::<Result<Vec<_>, _>>()?;

        if columns.iter().any(|column| column.len() != pools.len()) {
            return Err(ChainError::abi(FN, "column length differs from pool count"));
        }

        Ok(pools
            .iter()
            .enumerate()
            .map(|(i, address)| PoolView {
                address: *address,
                index: columns[0][i],
                share: columns[1][i],
                supply: columns[2][i],
                borrow: columns[3][i],
                rate: columns[4][i],
                price: columns[5][i],
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signatures() {
        assert_eq!(investor::next_position().signature(), "nextPosition()");
        assert_eq!(helper::peek_position().signature(), "peekPosition(uint256)");
        assert_eq!(helper::peek_pools().signature(), "peekPools(address[])");
        assert_eq!(helper::life_batched().signature(), "lifeBatched(uint256[])");
        assert_eq!(
            helper::kill_batched().signature(),
            "killBatched(uint256[],bytes[],address)"
        );
        assert!(oracle::last_timestamp().is_view());
        assert!(!oracle::update().is_view());
        assert!(!strategy::earn().is_view());
    }

    #[test]
    fn test_kill_batched_args_encode() {
        let ids = [U256::from(3u64), U256::from(9u64)];
        let args = kill_batched_args(&ids, Address::repeat_byte(0xaa));
        let calldata = helper::kill_batched().encode(&args).unwrap();
        assert_eq!(&calldata[..4], helper::kill_batched().selector().as_slice());
    }

    #[test]
    fn test_position_view_decodes() {
        let spec = helper::peek_position();
        let mut values = vec![DynSolValue::Address(Address::repeat_byte(0x01))];
        values.extend((1..=8u64).map(|i| DynSolValue::Uint(U256::from(i), 256)));
        let encoded = DynSolValue::Tuple(values).abi_encode_params();

        let decoded = spec.decode_output(&encoded).unwrap();
        let view = PositionView::from_values(&decoded).unwrap();
        assert_eq!(view.pool, Address::repeat_byte(0x01));
        assert_eq!(view.strategy, U256::from(1u64));
        assert_eq!(view.life, U256::from(6u64));
        assert_eq!(view.price, U256::from(8u64));
    }

    #[test]
    fn test_pool_view_zips_columns() {
        let pools = [Address::repeat_byte(1), Address::repeat_byte(2)];
        let values: Vec<_> = (0..6u64)
            .map(|c| uint_array_arg([U256::from(c * 10), U256::from(c * 10 + 1)]))
            .collect();

        let rows = PoolView::from_values(&pools, &values).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].address, pools[1]);
        assert_eq!(rows[1].share, U256::from(11u64));
        assert_eq!(rows[0].price, U256::from(50u64));

        assert!(PoolView::from_values(&pools[..1], &values).is_err());
    }
}
