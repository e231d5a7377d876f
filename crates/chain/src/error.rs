//! Typed failures surfaced by the chain layer.

use alloy::primitives::B256;
use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

/// Error returned by every [`crate::ChainClient`] operation.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The node answered with a JSON-RPC error (reverts land here).
    #[error("rpc error: {message}")]
    Rpc {
        message: String,
        /// Raw `data` member of the error payload, usually revert bytes
        data: Option<String>,
    },

    /// Connection-level failure (HTTP, serialization, timeouts).
    #[error("transport error: {0}")]
    Transport(String),

    /// Arguments or return data did not match the declared call shape.
    #[error("abi mismatch for {function}: {message}")]
    Abi { function: String, message: String },

    /// A log could not be decoded into a known event.
    #[error("log decode failed: {0}")]
    Decode(String),

    /// Transaction was mined with a failing status.
    #[error("transaction {0} reverted")]
    Reverted(B256),

    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("invalid chain configuration: {0}")]
    Config(String),
}

impl ChainError {
    /// Provider-supplied revert data, if the failure carried any.
    pub fn revert_data(&self) -> Option<&str> {
        match self {
            Self::Rpc { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn abi(function: impl Into<String>, message: impl ToString) -> Self {
        Self::Abi {
            function: function.into(),
            message: message.to_string(),
        }
    }
}

impl From<RpcError<TransportErrorKind>> for ChainError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => Self::Rpc {
                message: payload.message.to_string(),
                data: payload.data.map(|raw| raw.get().to_string()),
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_data_only_on_rpc_errors() {
        let err = ChainError::Rpc {
            message: "execution reverted".to_string(),
            data: Some("\"0x08c379a0\"".to_string()),
        };
        assert_eq!(err.revert_data(), Some("\"0x08c379a0\""));
        assert_eq!(err.to_string(), "rpc error: execution reverted");

        let err = ChainError::Reverted(B256::ZERO);
        assert!(err.revert_data().is_none());
    }
}
