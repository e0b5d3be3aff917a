use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::executor::{ExecResult, ExecutorError, QueryHandle, Transaction};
use crate::filter::SortDirection;
use crate::record::Record;

use super::table::{Selection, Tables};
use super::transaction::MemoryTransaction;

/// Query handle produced by [`super::MemoryDatabase`].
pub struct MemoryQuery {
    tables: Arc<RwLock<Tables>>,
    tx: Option<Transaction>,
    table: String,
    selection: Selection,
}

impl MemoryQuery {
    pub(crate) fn new(tables: Arc<RwLock<Tables>>, tx: Option<Transaction>) -> Self {
        MemoryQuery {
            tables,
            tx,
            table: String::new(),
            selection: Selection::default(),
        }
    }

    fn run(&self, selection: &Selection) -> ExecResult<(Vec<Record>, u64)> {
        let select = |tables: &Tables| match tables.get(&self.table) {
            Some(table) => table.select(selection),
            None => (Vec::new(), 0),
        };

        match &self.tx {
            Some(tx) => MemoryTransaction::resolve(tx, &self.tables)?.read(select),
            None => {
                let tables = self
                    .tables
                    .read()
                    .map_err(|_| ExecutorError::LockPoisoned("query"))?;
                Ok(select(&*tables))
            }
        }
    }
}

#[async_trait]
impl QueryHandle for MemoryQuery {
    fn set_table(&mut self, table: &str) {
        self.table = table.to_string();
    }

    fn set_columns(&mut self, columns: &[String]) {
        self.selection.columns = columns.to_vec();
    }

    fn add_condition_kv(&mut self, column: &str, value: Value) {
        self.selection.conditions.push((column.to_string(), value));
    }

    fn add_order_rule(&mut self, column: &str, direction: SortDirection) {
        self.selection.order.push((column.to_string(), direction));
    }

    fn set_page_info(&mut self, page: i64, length_per_page: i64) {
        self.selection.limit = if page >= 0 && length_per_page > 0 {
            // An offset past the addressable range is an empty page.
            let offset = page
                .checked_mul(length_per_page)
                .map_or(usize::MAX, to_usize);
            Some((offset, to_usize(length_per_page)))
        } else {
            None
        };
    }

    fn set_limit_info(&mut self, offset: i64, length: i64) {
        self.selection.limit = if offset >= 0 && length > 0 {
            Some((to_usize(offset), to_usize(length)))
        } else {
            None
        };
    }

    #[tracing::instrument(level = "trace", skip(self), fields(table = %self.table))]
    async fn query_list(&self) -> ExecResult<Vec<Record>> {
        let (rows, _) = self.run(&self.selection)?;
        Ok(rows)
    }

    #[tracing::instrument(level = "trace", skip(self), fields(table = %self.table))]
    async fn query_count(&self) -> ExecResult<u64> {
        let unpaged = Selection {
            columns: Vec::new(),
            conditions: self.selection.conditions.clone(),
            order: Vec::new(),
            limit: None,
        };
        let (_, total) = self.run(&unpaged)?;
        Ok(total)
    }

    async fn query_single(&self) -> ExecResult<Option<Record>> {
        let mut first = self.selection.clone();
        let offset = first.limit.map(|(offset, _)| offset).unwrap_or(0);
        first.limit = Some((offset, 1));
        let (rows, _) = self.run(&first)?;
        Ok(rows.into_iter().next())
    }
}

fn to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
