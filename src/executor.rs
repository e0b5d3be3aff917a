//! Executor - the query-execution collaborator the mapping layer talks to.
//!
//! The mapping layer never builds SQL. It hands records and descriptors to a
//! [`Database`] and reads plain [`Record`]s back. Implementations own
//! dialects, pooling and statement building; [`crate::MemoryDatabase`] is the
//! in-process reference implementation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::filter::SortDirection;
use crate::record::Record;
use crate::spec::DbSpec;

/// Errors produced by an executor. The mapping layer surfaces these
/// unchanged.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("duplicate entry `{key}` in table `{table}`")]
    Duplicate { table: String, key: String },

    #[error("record is missing primary key column `{column}` for table `{table}`")]
    MissingKey { table: String, column: String },

    #[error("transaction handle does not belong to this executor")]
    ForeignTransaction,

    #[error("transaction already finished")]
    TransactionClosed,

    #[error("executor lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("executor error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type ExecResult<T> = std::result::Result<T, ExecutorError>;

/// How an insert treats an existing row with the same primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddMode {
    /// Fail with [`ExecutorError::Duplicate`].
    #[default]
    Normal,
    /// Replace the existing row.
    Strong,
    /// Keep the existing row and report success.
    Weak,
}

/// Opaque transaction handle, forwarded untouched to the executor that
/// issued it.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Transaction {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Transaction {
            inner: Arc::new(inner),
        }
    }

    /// Recover the executor-specific state behind the handle.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction").finish_non_exhaustive()
    }
}

/// A prepared write with a single `execute()`.
#[async_trait]
pub trait Performer: Send + Sync {
    /// Runs the write. Adders yield the generated identifier (0 when none
    /// was generated); modifiers and removers yield the affected row count.
    async fn execute(&self) -> ExecResult<u64>;
}

/// A mutable query under construction: table, columns, predicates, order
/// and pagination. Not meant to be shared between concurrent executions.
#[async_trait]
pub trait QueryHandle: Send + Sync {
    fn set_table(&mut self, table: &str);

    fn set_columns(&mut self, columns: &[String]);

    fn add_condition_kv(&mut self, column: &str, value: Value);

    fn add_order_rule(&mut self, column: &str, direction: SortDirection);

    /// 0-indexed page. Applied only when `page >= 0` and `length > 0`,
    /// otherwise pagination is cleared.
    fn set_page_info(&mut self, page: i64, length_per_page: i64);

    /// Applied only when `offset >= 0` and `length > 0`, otherwise
    /// pagination is cleared.
    fn set_limit_info(&mut self, offset: i64, length: i64);

    async fn query_list(&self) -> ExecResult<Vec<Record>>;

    /// Row count under the current predicates, ignoring pagination.
    async fn query_count(&self) -> ExecResult<u64>;

    async fn query_single(&self) -> ExecResult<Option<Record>>;
}

/// Low-level storage capability behind a [`DbSpec`].
#[async_trait]
pub trait Database: Send + Sync {
    /// Insert `record` into `spec.table()`, returning the generated id or 0.
    async fn insert(
        &self,
        spec: &DbSpec,
        record: Record,
        mode: AddMode,
        tx: Option<&Transaction>,
    ) -> ExecResult<u64>;

    /// Update the row located by the primary-key columns in `record`.
    async fn modify(&self, spec: &DbSpec, record: Record, tx: Option<&Transaction>)
        -> ExecResult<u64>;

    /// Delete the row located by the primary-key columns in `record`.
    async fn remove(&self, spec: &DbSpec, record: Record, tx: Option<&Transaction>)
        -> ExecResult<u64>;

    /// A fresh, unconfigured query handle.
    fn searcher(&self, tx: Option<&Transaction>) -> Box<dyn QueryHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(u32);

    #[test]
    fn transaction_downcasts_to_its_own_type_only() {
        let tx = Transaction::new(Marker(7));
        assert_eq!(tx.downcast_ref::<Marker>().map(|m| m.0), Some(7));
        assert!(tx.downcast_ref::<String>().is_none());

        let cloned = tx.clone();
        assert!(cloned.downcast_ref::<Marker>().is_some());
    }

    #[test]
    fn default_add_mode_is_normal() {
        assert_eq!(AddMode::default(), AddMode::Normal);
    }
}
