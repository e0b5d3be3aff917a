//! DbTools - binds a descriptor and an optional transaction to the executor.

use std::sync::Arc;

use async_trait::async_trait;

use crate::executor::{AddMode, ExecResult, Performer, QueryHandle, Transaction};
use crate::record::Record;
use crate::spec::DbSpec;

/// Factory for performers and query handles against one table.
#[derive(Debug, Clone)]
pub struct DbTools {
    spec: Arc<DbSpec>,
    tx: Option<Transaction>,
}

impl DbTools {
    pub fn new(spec: Arc<DbSpec>, tx: Option<&Transaction>) -> Self {
        DbTools {
            spec,
            tx: tx.cloned(),
        }
    }

    pub fn spec(&self) -> &DbSpec {
        &self.spec
    }

    pub fn make_adder(&self, record: Record) -> Adder {
        self.make_adder_with(record, AddMode::Normal)
    }

    pub fn make_adder_with(&self, record: Record, mode: AddMode) -> Adder {
        Adder {
            spec: self.spec.clone(),
            tx: self.tx.clone(),
            record,
            mode,
        }
    }

    pub fn make_modifier(&self, record: Record) -> Modifier {
        Modifier {
            spec: self.spec.clone(),
            tx: self.tx.clone(),
            record,
        }
    }

    pub fn make_remover(&self, record: Record) -> Remover {
        Remover {
            spec: self.spec.clone(),
            tx: self.tx.clone(),
            record,
        }
    }

    /// A query handle on this table with every column selected and one
    /// equality condition per entry of `params` (keyed by column).
    pub fn make_searcher(&self, params: &Record) -> Box<dyn QueryHandle> {
        let mut handle = self.spec.database().searcher(self.tx.as_ref());
        handle.set_table(self.spec.table());
        handle.set_columns(self.spec.columns());
        for (column, value) in params {
            handle.add_condition_kv(column, value.clone());
        }
        tracing::trace!(
            table = self.spec.table(),
            conditions = params.len(),
            "built searcher"
        );
        handle
    }
}

pub struct Adder {
    spec: Arc<DbSpec>,
    tx: Option<Transaction>,
    record: Record,
    mode: AddMode,
}

#[async_trait]
impl Performer for Adder {
    async fn execute(&self) -> ExecResult<u64> {
        self.spec
            .database()
            .insert(&self.spec, self.record.clone(), self.mode, self.tx.as_ref())
            .await
    }
}

pub struct Modifier {
    spec: Arc<DbSpec>,
    tx: Option<Transaction>,
    record: Record,
}

#[async_trait]
impl Performer for Modifier {
    async fn execute(&self) -> ExecResult<u64> {
        self.spec
            .database()
            .modify(&self.spec, self.record.clone(), self.tx.as_ref())
            .await
    }
}

pub struct Remover {
    spec: Arc<DbSpec>,
    tx: Option<Transaction>,
    record: Record,
}

#[async_trait]
impl Performer for Remover {
    async fn execute(&self) -> ExecResult<u64> {
        self.spec
            .database()
            .remove(&self.spec, self.record.clone(), self.tx.as_ref())
            .await
    }
}
