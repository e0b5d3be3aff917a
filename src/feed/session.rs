use std::ops::{Deref, DerefMut};

use crate::error::FeedResult;
use crate::executor::Transaction;
use crate::record::DiffMap;

use super::{Feed, FeedPersistence};

/// Scoped edit on a feed. Derefs to the feed; [`commit`](Self::commit)
/// writes the changes, dropping it uncommitted cancels the edit.
pub struct Editing<'a, M: Feed> {
    feed: &'a mut M,
    armed: bool,
}

impl<'a, M: Feed> Editing<'a, M> {
    pub(crate) fn begin(feed: &'a mut M) -> FeedResult<Self> {
        feed.edit()?;
        Ok(Editing { feed, armed: true })
    }

    /// Run `update_to_db`. On error the feed stays in editing mode so the
    /// caller may retry through the feed itself.
    pub async fn commit(mut self, tx: Option<&Transaction>) -> FeedResult<DiffMap> {
        self.armed = false;
        self.feed.update_to_db(tx).await
    }

    pub fn key_changed(&self, column: &str) -> FeedResult<bool> {
        self.feed.check_key_changed(column)
    }
}

impl<M: Feed> Deref for Editing<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.feed
    }
}

impl<M: Feed> DerefMut for Editing<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.feed
    }
}

impl<M: Feed> Drop for Editing<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            self.feed.cancel_edit();
        }
    }
}
