//! Investor and strategy events.

use alloy::primitives::{Address, B256, I256, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;
use std::collections::BTreeMap;

use crate::client::ChainLog;
use crate::error::ChainError;

sol! {
    interface IInvestor {
        event Edit(uint256 indexed id, int256 amount, int256 borrow, int256 shares, int256 borrowed);
        event Kill(uint256 indexed id, address indexed keeper, uint256 amount, uint256 borrow, uint256 fee);
    }

    interface IStrategy {
        event Earn(uint256 tvl, uint256 profit);
    }
}

/// A decoded position event from the Investor contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvestorEvent {
    Edit {
        id: U256,
        amount: I256,
        borrow: I256,
        shares: I256,
        borrowed: I256,
    },
    Kill {
        id: U256,
        keeper: Address,
        amount: U256,
        borrow: U256,
        fee: U256,
    },
}

impl InvestorEvent {
    /// Topic0 values to filter logs on.
    pub fn topics() -> Vec<B256> {
        vec![IInvestor::Edit::SIGNATURE_HASH, IInvestor::Kill::SIGNATURE_HASH]
    }

    pub fn decode(log: &ChainLog) -> Result<Self, ChainError> {
        let topic0 = log
            .data
            .topics()
            .first()
            .copied()
            .ok_or_else(|| ChainError::Decode("log without topics".to_string()))?;

        if topic0 == IInvestor::Edit::SIGNATURE_HASH {
            let e = IInvestor::Edit::decode_log_data(&log.data, true)
                .map_err(|e| ChainError::Decode(e.to_string()))?;
            Ok(InvestorEvent::Edit {
                id: e.id,
                amount: e.amount,
                borrow: e.borrow,
                shares: e.shares,
                borrowed: e.borrowed,
            })
        } else if topic0 == IInvestor::Kill::SIGNATURE_HASH {
            let e = IInvestor::Kill::decode_log_data(&log.data, true)
                .map_err(|e| ChainError::Decode(e.to_string()))?;
            Ok(InvestorEvent::Kill {
                id: e.id,
                keeper: e.keeper,
                amount: e.amount,
                borrow: e.borrow,
                fee: e.fee,
            })
        } else {
            Err(ChainError::Decode(format!("unknown investor topic {topic0}")))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InvestorEvent::Edit { .. } => "Edit",
            InvestorEvent::Kill { .. } => "Kill",
        }
    }

    pub fn position_id(&self) -> U256 {
        match self {
            InvestorEvent::Edit { id, .. } | InvestorEvent::Kill { id, .. } => *id,
        }
    }

    /// Named arguments as decimal strings, the shape persisted in `data`.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let pairs: Vec<(&str, String)> = match self {
            InvestorEvent::Edit {
                id,
                amount,
                borrow,
                shares,
                borrowed,
            } => vec![
                ("id", id.to_string()),
                ("amount", amount.to_string()),
                ("borrow", borrow.to_string()),
                ("shares", shares.to_string()),
                ("borrowed", borrowed.to_string()),
            ],
            InvestorEvent::Kill {
                id,
                keeper,
                amount,
                borrow,
                fee,
            } => vec![
                ("id", id.to_string()),
                ("keeper", keeper.to_string()),
                ("amount", amount.to_string()),
                ("borrow", borrow.to_string()),
                ("fee", fee.to_string()),
            ],
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

/// A strategy harvest report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarnEvent {
    pub tvl: U256,
    pub profit: U256,
}

impl EarnEvent {
    pub fn topics() -> Vec<B256> {
        vec![IStrategy::Earn::SIGNATURE_HASH]
    }

    pub fn decode(log: &ChainLog) -> Result<Self, ChainError> {
        let e = IStrategy::Earn::decode_log_data(&log.data, true)
            .map_err(|e| ChainError::Decode(e.to_string()))?;
        Ok(EarnEvent {
            tvl: e.tvl,
            profit: e.profit,
        })
    }
}
