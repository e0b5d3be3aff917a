use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{FeedError, FeedResult};
use crate::executor::{AddMode, Performer, Transaction};
use crate::record::{Change, DiffMap, Record};
use crate::spec::DbSpec;
use crate::tools::DbTools;

use super::{codec, key_record, single_key, Feed};

/// Async persistence for every [`Feed`].
///
/// Instance methods use the instance's descriptor. Lookups without an
/// instance (`find_one`, `find_with_uid`, `count`, ...) resolve it from
/// `Self::default()`, so models that should be looked up statically attach
/// their descriptor in `Default`.
#[async_trait]
pub trait FeedPersistence: Feed {
    /// Insert the encoded row. A generated single key is written back to
    /// the key property when that property was unset.
    async fn add_to_db(&mut self, tx: Option<&Transaction>) -> FeedResult<()>;

    /// Insert, replacing any row with the same key.
    async fn strong_add_to_db(&mut self, tx: Option<&Transaction>) -> FeedResult<()>;

    /// Insert, silently skipping a duplicate key.
    async fn weak_add_to_db(&mut self, tx: Option<&Transaction>) -> FeedResult<()>;

    /// Write the columns changed since `edit()` and leave editing mode.
    /// Returns the per-column diff; an empty diff issues no write.
    async fn update_to_db(&mut self, tx: Option<&Transaction>) -> FeedResult<DiffMap>;

    /// Apply a column-keyed patch while editing, then `update_to_db`.
    async fn update_with(&mut self, patch: &Record, tx: Option<&Transaction>)
        -> FeedResult<DiffMap>;

    async fn delete_from_db(&mut self, tx: Option<&Transaction>) -> FeedResult<()>;

    /// Overwrite properties from the stored row. False when no row matched.
    async fn reload_data_from_db(&mut self, tx: Option<&Transaction>) -> FeedResult<bool>;

    /// The stored row with this instance's primary key, as a new feed.
    async fn find_feed_in_db(&self, tx: Option<&Transaction>) -> FeedResult<Option<Self>>;

    async fn check_exists_in_db(&self, tx: Option<&Transaction>) -> FeedResult<bool>;

    /// First row matching column-keyed `params`.
    async fn find_one(params: &Record, tx: Option<&Transaction>) -> FeedResult<Option<Self>>;

    /// Like [`find_one`](Self::find_one) but a miss is
    /// [`FeedError::NotFound`].
    async fn prepare_one(params: &Record, tx: Option<&Transaction>) -> FeedResult<Self>;

    /// Lookup by the single primary key.
    async fn find_with_uid<V>(uid: V, tx: Option<&Transaction>) -> FeedResult<Option<Self>>
    where
        V: Into<Value> + Send;

    async fn prepare_with_uid<V>(uid: V, tx: Option<&Transaction>) -> FeedResult<Self>
    where
        V: Into<Value> + Send;

    async fn count(params: &Record, tx: Option<&Transaction>) -> FeedResult<u64>;
}

#[async_trait]
impl<M: Feed> FeedPersistence for M {
    async fn add_to_db(&mut self, tx: Option<&Transaction>) -> FeedResult<()> {
        add(self, AddMode::Normal, tx).await
    }

    async fn strong_add_to_db(&mut self, tx: Option<&Transaction>) -> FeedResult<()> {
        add(self, AddMode::Strong, tx).await
    }

    async fn weak_add_to_db(&mut self, tx: Option<&Transaction>) -> FeedResult<()> {
        add(self, AddMode::Weak, tx).await
    }

    async fn update_to_db(&mut self, tx: Option<&Transaction>) -> FeedResult<DiffMap> {
        let model = M::model_name();
        let Some(backup) = self.base().state().snapshot() else {
            return Err(FeedError::NotEditing { model });
        };
        let Some(spec) = self.base().persistence_spec(model, "update")? else {
            return Ok(DiffMap::new());
        };
        let data = self.encode()?;
        let (mut params, diff) = diff_records(backup, &data);

        if params.is_empty() {
            self.base_mut().take_snapshot();
            tracing::debug!(model, table = spec.table(), "nothing changed, skipping update");
            return Ok(diff);
        }

        params.extend(key_record(&spec, &data));
        DbTools::new(spec.clone(), tx)
            .make_modifier(params)
            .execute()
            .await?;
        let previous = self.base_mut().take_snapshot().unwrap_or_default();
        tracing::debug!(
            model,
            table = spec.table(),
            changed = diff.len(),
            "updated"
        );

        if self.base().config().reload_on_updated {
            self.reload_data_from_db(tx).await?;
        }
        if let Some(observer) = self.base().observer().cloned() {
            observer.on_update(&*self, &diff, &previous).await?;
        }
        Ok(diff)
    }

    async fn update_with(
        &mut self,
        patch: &Record,
        tx: Option<&Transaction>,
    ) -> FeedResult<DiffMap> {
        if !self.is_editing() {
            return Err(FeedError::NotEditing {
                model: M::model_name(),
            });
        }
        self.generate(patch)?;
        self.update_to_db(tx).await
    }

    async fn delete_from_db(&mut self, tx: Option<&Transaction>) -> FeedResult<()> {
        let model = M::model_name();
        let Some(spec) = self.base().persistence_spec(model, "delete")? else {
            return Ok(());
        };
        let keys = key_record(&spec, &self.encode()?);
        let removed = DbTools::new(spec.clone(), tx)
            .make_remover(keys)
            .execute()
            .await?;
        tracing::debug!(model, table = spec.table(), removed, "deleted");

        if let Some(observer) = self.base().observer().cloned() {
            observer.on_delete(&*self).await?;
        }
        Ok(())
    }

    async fn reload_data_from_db(&mut self, tx: Option<&Transaction>) -> FeedResult<bool> {
        match self.find_feed_in_db(tx).await? {
            Some(found) => {
                let record = found.encode()?;
                self.generate(&record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_feed_in_db(&self, tx: Option<&Transaction>) -> FeedResult<Option<Self>> {
        let Some(spec) = self.base().persistence_spec(M::model_name(), "find")? else {
            return Ok(None);
        };
        let keys = key_record(&spec, &self.encode()?);
        find_in(spec, &keys, tx).await
    }

    async fn check_exists_in_db(&self, tx: Option<&Transaction>) -> FeedResult<bool> {
        Ok(self.find_feed_in_db(tx).await?.is_some())
    }

    async fn find_one(params: &Record, tx: Option<&Transaction>) -> FeedResult<Option<Self>> {
        let Some(spec) = M::default()
            .base()
            .persistence_spec(M::model_name(), "find")?
        else {
            return Ok(None);
        };
        find_in(spec, params, tx).await
    }

    async fn prepare_one(params: &Record, tx: Option<&Transaction>) -> FeedResult<Self> {
        Self::find_one(params, tx)
            .await?
            .ok_or(FeedError::NotFound {
                model: M::model_name(),
            })
    }

    async fn find_with_uid<V>(uid: V, tx: Option<&Transaction>) -> FeedResult<Option<Self>>
    where
        V: Into<Value> + Send,
    {
        let model = M::model_name();
        let Some(spec) = M::default().base().persistence_spec(model, "find")? else {
            return Ok(None);
        };
        let key = single_key(&spec, model)?;
        let mut params = Record::new();
        params.insert(key, uid.into());
        find_in(spec, &params, tx).await
    }

    async fn prepare_with_uid<V>(uid: V, tx: Option<&Transaction>) -> FeedResult<Self>
    where
        V: Into<Value> + Send,
    {
        Self::find_with_uid(uid, tx)
            .await?
            .ok_or(FeedError::NotFound {
                model: M::model_name(),
            })
    }

    async fn count(params: &Record, tx: Option<&Transaction>) -> FeedResult<u64> {
        let Some(spec) = M::default()
            .base()
            .persistence_spec(M::model_name(), "count")?
        else {
            return Ok(0);
        };
        let handle = DbTools::new(spec, tx).make_searcher(params);
        Ok(handle.query_count().await?)
    }
}

async fn add<M: Feed>(feed: &mut M, mode: AddMode, tx: Option<&Transaction>) -> FeedResult<()> {
    let model = M::model_name();
    let Some(spec) = feed.base().persistence_spec(model, "add")? else {
        return Ok(());
    };
    let data = feed.encode()?;
    let last_insert_id = DbTools::new(spec.clone(), tx)
        .make_adder_with(data, mode)
        .execute()
        .await?;
    backfill_insert_id(feed, &spec, last_insert_id)?;
    tracing::debug!(model, table = spec.table(), ?mode, last_insert_id, "added");

    if feed.base().config().reload_on_added {
        feed.reload_data_from_db(tx).await?;
    }
    if let Some(observer) = feed.base().observer().cloned() {
        observer.on_add(&*feed).await?;
    }
    Ok(())
}

/// Write a generated id into the single key property if it is still unset.
fn backfill_insert_id<M: Feed>(feed: &mut M, spec: &DbSpec, id: u64) -> FeedResult<()> {
    if id == 0 {
        return Ok(());
    }
    let Some(key) = spec.primary_key() else {
        return Ok(());
    };
    let Some(property) = M::property_mapper().property_of(key) else {
        return Ok(());
    };
    let unset = codec::properties(feed)?
        .get(property)
        .map_or(true, Value::is_null);
    if unset {
        let mut record = Record::new();
        record.insert(key.to_string(), Value::from(id));
        feed.generate(&record)?;
    }
    Ok(())
}

async fn find_in<M: Feed>(
    spec: Arc<DbSpec>,
    params: &Record,
    tx: Option<&Transaction>,
) -> FeedResult<Option<M>> {
    let handle = DbTools::new(spec, tx).make_searcher(params);
    match handle.query_single().await? {
        Some(row) => Ok(Some(M::from_record(&row)?)),
        None => Ok(None),
    }
}

/// Columns whose value moved since the snapshot: the changed columns with
/// their new values, and the before/after diff.
fn diff_records(backup: &Record, current: &Record) -> (Record, DiffMap) {
    let mut params = Record::new();
    let mut diff = DiffMap::new();
    for (column, after) in current {
        let Some(before) = backup.get(column) else {
            continue;
        };
        if before != after {
            params.insert(column.clone(), after.clone());
            diff.insert(
                column.clone(),
                Change {
                    before: before.clone(),
                    after: after.clone(),
                },
            );
        }
    }
    (params, diff)
}
