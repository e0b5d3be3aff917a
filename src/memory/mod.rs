//! MemoryDatabase - HashMap-backed executor for testing and development.

mod query;
mod table;
mod transaction;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::executor::{
    AddMode, Database, ExecResult, ExecutorError, QueryHandle, Transaction,
};
use crate::record::Record;
use crate::spec::DbSpec;

pub use query::MemoryQuery;
use table::{prepare_insert, table_mut, Tables, WriteOp};
use transaction::MemoryTransaction;

/// In-memory executor. Tables are created on first write.
///
/// Clone-friendly via Arc; clones share storage.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryDatabase {
    /// Create a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction. Pass the handle to persistence calls, then
    /// [`commit`](Self::commit) or [`rollback`](Self::rollback) it.
    pub fn begin(&self) -> ExecResult<Transaction> {
        Ok(Transaction::new(MemoryTransaction::begin(&self.tables)?))
    }

    /// Apply every write made through `tx` atomically. Returns the number of
    /// writes applied.
    pub fn commit(&self, tx: &Transaction) -> ExecResult<usize> {
        let applied = MemoryTransaction::resolve(tx, &self.tables)?.commit()?;
        tracing::debug!(applied, "memory transaction committed");
        Ok(applied)
    }

    pub fn rollback(&self, tx: &Transaction) -> ExecResult<()> {
        MemoryTransaction::resolve(tx, &self.tables)?.rollback()?;
        tracing::debug!("memory transaction rolled back");
        Ok(())
    }

    /// Number of rows currently committed to `table`.
    pub fn row_count(&self, table: &str) -> ExecResult<usize> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ExecutorError::LockPoisoned("row count"))?;
        Ok(tables.get(table).map(|t| t.len()).unwrap_or(0))
    }

    fn write<F>(&self, tx: Option<&Transaction>, build: F) -> ExecResult<u64>
    where
        F: FnOnce(&mut Tables) -> ExecResult<(u64, Option<WriteOp>)>,
    {
        match tx {
            Some(tx) => MemoryTransaction::resolve(tx, &self.tables)?.write(build),
            None => {
                let mut tables = self
                    .tables
                    .write()
                    .map_err(|_| ExecutorError::LockPoisoned("write"))?;
                build(&mut tables).map(|(result, _)| result)
            }
        }
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    #[tracing::instrument(skip(self, spec, record, tx), fields(table = spec.table()))]
    async fn insert(
        &self,
        spec: &DbSpec,
        record: Record,
        mode: AddMode,
        tx: Option<&Transaction>,
    ) -> ExecResult<u64> {
        let row = prepare_insert(spec, &record);
        self.write(tx, |tables| {
            let (id, stored) = table_mut(tables, spec).insert_row(spec, row, mode)?;
            let op = stored.map(|row| WriteOp::Insert {
                spec: spec.clone(),
                row,
                mode,
            });
            Ok((id, op))
        })
    }

    #[tracing::instrument(skip(self, spec, record, tx), fields(table = spec.table()))]
    async fn modify(
        &self,
        spec: &DbSpec,
        record: Record,
        tx: Option<&Transaction>,
    ) -> ExecResult<u64> {
        self.write(tx, |tables| {
            let affected = table_mut(tables, spec).modify(spec, &record)?;
            Ok((
                affected,
                Some(WriteOp::Modify {
                    spec: spec.clone(),
                    record,
                }),
            ))
        })
    }

    #[tracing::instrument(skip(self, spec, record, tx), fields(table = spec.table()))]
    async fn remove(
        &self,
        spec: &DbSpec,
        record: Record,
        tx: Option<&Transaction>,
    ) -> ExecResult<u64> {
        self.write(tx, |tables| {
            let affected = table_mut(tables, spec).remove(spec, &record)?;
            Ok((
                affected,
                Some(WriteOp::Remove {
                    spec: spec.clone(),
                    record,
                }),
            ))
        })
    }

    fn searcher(&self, tx: Option<&Transaction>) -> Box<dyn QueryHandle> {
        Box::new(MemoryQuery::new(self.tables.clone(), tx.cloned()))
    }
}
