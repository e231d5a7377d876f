//! Test doubles shared by the keeper's unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;

use keeper_chain::{CallSpec, ChainClient, ChainError, ChainLog, LogQuery, WriteOptions};

type Responder = Arc<dyn Fn(&[DynSolValue]) -> Result<Vec<DynSolValue>, ChainError> + Send + Sync>;

/// A call the fake received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub to: Address,
    pub function: String,
    pub args: Vec<DynSolValue>,
    pub options: Option<WriteOptions>,
}

impl RecordedCall {
    /// First argument decoded as `uint256[]`.
    pub fn uint_array_arg(&self) -> Vec<U256> {
        self.args
            .first()
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|i| i.as_uint().map(|(v, _)| v)).collect())
            .unwrap_or_default()
    }
}

/// Scriptable in-memory [`ChainClient`].
///
/// Reads are answered by responders registered per `(address, function)`;
/// writes succeed unless their ordinal or target was marked failing.
pub struct FakeChain {
    signer: Address,
    latest_block: Mutex<u64>,
    timestamps: Mutex<HashMap<u64, u64>>,
    logs: Mutex<Vec<ChainLog>>,
    responders: Mutex<HashMap<(Address, String), Responder>>,
    reads: Mutex<Vec<RecordedCall>>,
    writes: Mutex<Vec<RecordedCall>>,
    log_queries: Mutex<Vec<LogQuery>>,
    failing_writes: Mutex<Vec<usize>>,
    failing_targets: Mutex<Vec<Address>>,
    fail_logs: Mutex<bool>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            signer: Address::repeat_byte(0x5e),
            latest_block: Mutex::new(0),
            timestamps: Mutex::new(HashMap::new()),
            logs: Mutex::new(Vec::new()),
            responders: Mutex::new(HashMap::new()),
            reads: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            log_queries: Mutex::new(Vec::new()),
            failing_writes: Mutex::new(Vec::new()),
            failing_targets: Mutex::new(Vec::new()),
            fail_logs: Mutex::new(false),
        }
    }

    pub fn set_latest_block(&self, block: u64) {
        *self.latest_block.lock() = block;
    }

    pub fn set_block_timestamp(&self, block: u64, timestamp: u64) {
        self.timestamps.lock().insert(block, timestamp);
    }

    pub fn push_log(&self, log: ChainLog) {
        self.logs.lock().push(log);
    }

    pub fn fail_get_logs(&self, fail: bool) {
        *self.fail_logs.lock() = fail;
    }

    pub fn on_read<F>(&self, to: Address, function: &str, responder: F)
    where
        F: Fn(&[DynSolValue]) -> Result<Vec<DynSolValue>, ChainError> + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .insert((to, function.to_string()), Arc::new(responder));
    }

    /// Fail the `n`th write (0-based) with an RPC error.
    pub fn fail_write(&self, n: usize) {
        self.failing_writes.lock().push(n);
    }

    /// Fail every write sent to `to`.
    pub fn fail_writes_to(&self, to: Address) {
        self.failing_targets.lock().push(to);
    }

    pub fn reads(&self) -> Vec<RecordedCall> {
        self.reads.lock().clone()
    }

    pub fn reads_of(&self, function: &str) -> Vec<RecordedCall> {
        self.reads().into_iter().filter(|c| c.function == function).collect()
    }

    pub fn writes(&self) -> Vec<RecordedCall> {
        self.writes.lock().clone()
    }

    pub fn log_queries(&self) -> Vec<LogQuery> {
        self.log_queries.lock().clone()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        Ok(*self.latest_block.lock())
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        self.timestamps
            .lock()
            .get(&number)
            .copied()
            .ok_or(ChainError::BlockNotFound(number))
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ChainError> {
        self.log_queries.lock().push(query.clone());
        if *self.fail_logs.lock() {
            return Err(ChainError::Transport("connection reset".to_string()));
        }

        let mut logs: Vec<ChainLog> = self
            .logs
            .lock()
            .iter()
            .filter(|log| {
                query.addresses.contains(&log.address)
                    && log.block_number >= query.from_block
                    && log.block_number <= query.to_block
                    && log
                        .data
                        .topics()
                        .first()
                        .is_some_and(|t| query.topics.contains(t))
            })
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn read(
        &self,
        to: Address,
        call: &CallSpec,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ChainError> {
        call.encode(args)?;
        self.reads.lock().push(RecordedCall {
            to,
            function: call.name().to_string(),
            args: args.to_vec(),
            options: None,
        });

        let responder = self
            .responders
            .lock()
            .get(&(to, call.name().to_string()))
            .cloned();
        match responder {
            Some(responder) => responder(args),
            None => Err(ChainError::Rpc {
                message: format!("no responder for {} on {to}", call.name()),
                data: None,
            }),
        }
    }

    async fn write(
        &self,
        to: Address,
        call: &CallSpec,
        args: &[DynSolValue],
        options: WriteOptions,
    ) -> Result<B256, ChainError> {
        call.encode(args)?;
        let ordinal = {
            let mut writes = self.writes.lock();
            writes.push(RecordedCall {
                to,
                function: call.name().to_string(),
                args: args.to_vec(),
                options: Some(options),
            });
            writes.len() - 1
        };

        if self.failing_writes.lock().contains(&ordinal) || self.failing_targets.lock().contains(&to) {
            return Err(ChainError::Rpc {
                message: "execution reverted".to_string(),
                data: None,
            });
        }
        Ok(B256::with_last_byte(ordinal as u8 + 1))
    }
}

/// A chain whose RPC endpoint never answers.
pub struct UnreachableChain;

impl UnreachableChain {
    fn refused() -> ChainError {
        ChainError::Transport("error sending request: connection refused".to_string())
    }
}

#[async_trait]
impl ChainClient for UnreachableChain {
    fn signer_address(&self) -> Address {
        Address::repeat_byte(0x5e)
    }

    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        Err(Self::refused())
    }

    async fn block_timestamp(&self, _number: u64) -> Result<u64, ChainError> {
        Err(Self::refused())
    }

    async fn get_logs(&self, _query: &LogQuery) -> Result<Vec<ChainLog>, ChainError> {
        Err(Self::refused())
    }

    async fn read(
        &self,
        _to: Address,
        _call: &CallSpec,
        _args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ChainError> {
        Err(Self::refused())
    }

    async fn write(
        &self,
        _to: Address,
        _call: &CallSpec,
        _args: &[DynSolValue],
        _options: WriteOptions,
    ) -> Result<B256, ChainError> {
        Err(Self::refused())
    }
}

/// Single `uint256` return.
pub fn uint_return(value: u64) -> Vec<DynSolValue> {
    vec![DynSolValue::Uint(U256::from(value), 256)]
}

/// Argument `n` as a `uint256`.
pub fn uint_at(args: &[DynSolValue], n: usize) -> U256 {
    args.get(n)
        .and_then(|v| v.as_uint())
        .map(|(v, _)| v)
        .unwrap_or_default()
}
