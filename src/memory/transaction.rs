//! Transactions for the memory executor.
//!
//! Writes through a transaction land in a private view of the tables and are
//! logged. Commit replays the log against a copy of the live tables and swaps
//! it in, so either every write lands or none does.

use std::sync::{Arc, Mutex, RwLock};

use crate::executor::{ExecResult, ExecutorError, Transaction};

use super::table::{Tables, WriteOp};

pub(crate) struct MemoryTransaction {
    owner: Arc<RwLock<Tables>>,
    state: Mutex<TxState>,
}

struct TxState {
    view: Tables,
    log: Vec<WriteOp>,
    finished: bool,
}

impl MemoryTransaction {
    pub(crate) fn begin(owner: &Arc<RwLock<Tables>>) -> ExecResult<Self> {
        let view = owner
            .read()
            .map_err(|_| ExecutorError::LockPoisoned("begin"))?
            .clone();
        Ok(MemoryTransaction {
            owner: owner.clone(),
            state: Mutex::new(TxState {
                view,
                log: Vec::new(),
                finished: false,
            }),
        })
    }

    /// Resolve a handle issued by the executor owning `tables`.
    pub(crate) fn resolve<'a>(
        tx: &'a Transaction,
        tables: &Arc<RwLock<Tables>>,
    ) -> ExecResult<&'a MemoryTransaction> {
        tx.downcast_ref::<MemoryTransaction>()
            .filter(|mtx| Arc::ptr_eq(&mtx.owner, tables))
            .ok_or(ExecutorError::ForeignTransaction)
    }

    /// Apply `op` to the private view and log it. `op` is produced from the
    /// view so that replay stores the same rows the caller observed.
    pub(crate) fn write<F>(&self, build: F) -> ExecResult<u64>
    where
        F: FnOnce(&mut Tables) -> ExecResult<(u64, Option<WriteOp>)>,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ExecutorError::LockPoisoned("transaction write"))?;
        if state.finished {
            return Err(ExecutorError::TransactionClosed);
        }
        let (result, op) = build(&mut state.view)?;
        if let Some(op) = op {
            state.log.push(op);
        }
        Ok(result)
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> ExecResult<T> {
        let state = self
            .state
            .lock()
            .map_err(|_| ExecutorError::LockPoisoned("transaction read"))?;
        if state.finished {
            return Err(ExecutorError::TransactionClosed);
        }
        Ok(f(&state.view))
    }

    pub(crate) fn commit(&self) -> ExecResult<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ExecutorError::LockPoisoned("commit"))?;
        if state.finished {
            return Err(ExecutorError::TransactionClosed);
        }

        let mut live = self
            .owner
            .write()
            .map_err(|_| ExecutorError::LockPoisoned("commit"))?;
        let mut next = live.clone();
        for op in &state.log {
            op.apply(&mut next)?;
        }
        *live = next;

        state.finished = true;
        Ok(std::mem::take(&mut state.log).len())
    }

    pub(crate) fn rollback(&self) -> ExecResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ExecutorError::LockPoisoned("rollback"))?;
        if state.finished {
            return Err(ExecutorError::TransactionClosed);
        }
        state.finished = true;
        state.log.clear();
        state.view.clear();
        Ok(())
    }
}
