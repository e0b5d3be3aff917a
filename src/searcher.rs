//! FeedSearcher - typed query builder over one feed's table.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{FeedError, FeedResult};
use crate::executor::{QueryHandle, Transaction};
use crate::feed::{single_key, Feed};
use crate::record::Record;
use crate::spec::DbSpec;
use crate::tools::DbTools;

/// One query result: a hydrated feed or its column-keyed record.
#[derive(Debug)]
pub enum FeedItem<M> {
    Feed(M),
    Record(Record),
}

impl<M> FeedItem<M> {
    pub fn into_feed(self) -> Option<M> {
        match self {
            FeedItem::Feed(feed) => Some(feed),
            FeedItem::Record(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            FeedItem::Record(record) => Some(record),
            FeedItem::Feed(_) => None,
        }
    }
}

/// Argument of [`FeedSearcher::check_exists`]: column-keyed params or a
/// single-key uid.
#[derive(Debug, Clone)]
pub enum Lookup {
    Params(Record),
    Uid(Value),
}

impl From<Record> for Lookup {
    fn from(params: Record) -> Self {
        Lookup::Params(params)
    }
}

impl From<Value> for Lookup {
    fn from(uid: Value) -> Self {
        Lookup::Uid(uid)
    }
}

impl From<&str> for Lookup {
    fn from(uid: &str) -> Self {
        Lookup::Uid(uid.into())
    }
}

impl From<String> for Lookup {
    fn from(uid: String) -> Self {
        Lookup::Uid(uid.into())
    }
}

impl From<i64> for Lookup {
    fn from(uid: i64) -> Self {
        Lookup::Uid(uid.into())
    }
}

impl From<u64> for Lookup {
    fn from(uid: u64) -> Self {
        Lookup::Uid(uid.into())
    }
}

/// Query builder bound to a feed type. Rows come back either as feeds or
/// as records re-encoded through the feed, so unmapped columns never leak.
/// Every query, the lookups included, runs inside the transaction it was
/// built with.
pub struct FeedSearcher<M> {
    spec: Arc<DbSpec>,
    tx: Option<Transaction>,
    handle: Box<dyn QueryHandle>,
    _marker: PhantomData<M>,
}

impl<M: Feed> FeedSearcher<M> {
    /// A searcher on `model`'s table selecting every column.
    pub fn new(model: &M, tx: Option<&Transaction>) -> FeedResult<Self> {
        let spec = model.db_spec()?;
        let handle = DbTools::new(spec.clone(), tx).make_searcher(&Record::new());
        Ok(Self {
            spec,
            tx: tx.cloned(),
            handle,
            _marker: PhantomData,
        })
    }

    /// The underlying query handle, for conditions and ordering.
    pub fn processor(&mut self) -> &mut dyn QueryHandle {
        self.handle.as_mut()
    }

    pub fn spec(&self) -> &DbSpec {
        &self.spec
    }

    pub async fn query_single(&mut self, ret_feed: bool) -> FeedResult<Option<FeedItem<M>>> {
        Ok(self.query_list(0, 1, ret_feed).await?.into_iter().next())
    }

    pub async fn query_all(&mut self, ret_feed: bool) -> FeedResult<Vec<FeedItem<M>>> {
        self.query_list(-1, 0, ret_feed).await
    }

    /// One page of results. A negative page fetches everything.
    pub async fn query_list(
        &mut self,
        page: i64,
        length_per_page: i64,
        ret_feed: bool,
    ) -> FeedResult<Vec<FeedItem<M>>> {
        self.handle.set_page_info(page, length_per_page);
        let rows = self.handle.query_list().await?;
        tracing::trace!(table = self.spec.table(), rows = rows.len(), "query_list");
        self.format_list(rows, ret_feed)
    }

    /// Hydrate each row through the feed, then keep it as a feed or encode
    /// it back to a record.
    pub fn format_list(
        &self,
        rows: Vec<Record>,
        ret_feed: bool,
    ) -> FeedResult<Vec<FeedItem<M>>> {
        rows.iter()
            .map(|row| {
                let feed = M::from_record(row)?;
                if ret_feed {
                    Ok(FeedItem::Feed(feed))
                } else {
                    feed.encode().map(FeedItem::Record)
                }
            })
            .collect()
    }

    /// Count of matching rows, ignoring pagination.
    pub async fn query_count(&self) -> FeedResult<u64> {
        Ok(self.handle.query_count().await?)
    }

    pub async fn query_one(&mut self) -> FeedResult<Option<M>> {
        Ok(self
            .query_list_with_limit_info(0, 1)
            .await?
            .into_iter()
            .next())
    }

    pub async fn query_list_with_page_info(
        &mut self,
        page: i64,
        length_per_page: i64,
    ) -> FeedResult<Vec<M>> {
        self.handle.set_page_info(page, length_per_page);
        self.fetch_feeds().await
    }

    pub async fn query_list_with_limit_info(
        &mut self,
        offset: i64,
        length: i64,
    ) -> FeedResult<Vec<M>> {
        self.handle.set_limit_info(offset, length);
        self.fetch_feeds().await
    }

    /// Every matching row as a feed, honoring any window already set on
    /// the processor.
    pub async fn query_all_feeds(&self) -> FeedResult<Vec<M>> {
        self.fetch_feeds().await
    }

    /// First row matching column-keyed `params`, independent of the
    /// conditions set on this searcher.
    pub async fn find_with_params(&self, params: &Record) -> FeedResult<Option<M>> {
        let handle = self.tools().make_searcher(params);
        match handle.query_single().await? {
            Some(row) => Ok(Some(M::from_record(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn prepare_with_params(&self, params: &Record) -> FeedResult<M> {
        self.find_with_params(params)
            .await?
            .ok_or(FeedError::NotFound {
                model: M::model_name(),
            })
    }

    pub async fn find_with_uid(&self, uid: impl Into<Value>) -> FeedResult<Option<M>> {
        let key = single_key(&self.spec, M::model_name())?;
        let mut params = Record::new();
        params.insert(key, uid.into());
        self.find_with_params(&params).await
    }

    pub async fn prepare_with_uid(&self, uid: impl Into<Value>) -> FeedResult<M> {
        self.find_with_uid(uid)
            .await?
            .ok_or(FeedError::NotFound {
                model: M::model_name(),
            })
    }

    /// True when at least one row matches the params, or the uid of a
    /// single-key table.
    pub async fn check_exists(&self, lookup: impl Into<Lookup>) -> FeedResult<bool> {
        let params = match lookup.into() {
            Lookup::Params(params) => params,
            Lookup::Uid(uid) => {
                let key = single_key(&self.spec, M::model_name())?;
                let mut params = Record::new();
                params.insert(key, uid);
                params
            }
        };
        let handle = self.tools().make_searcher(&params);
        Ok(handle.query_count().await? > 0)
    }

    fn tools(&self) -> DbTools {
        DbTools::new(self.spec.clone(), self.tx.as_ref())
    }

    async fn fetch_feeds(&self) -> FeedResult<Vec<M>> {
        self.handle
            .query_list()
            .await?
            .iter()
            .map(M::from_record)
            .collect()
    }
}
