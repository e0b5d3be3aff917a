use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, FeedResult};
use crate::observer::DbObserver;
use crate::record::Record;
use crate::spec::{DbProtocol, DbSpec};

/// What to do when a persistence call finds no storage descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Fail with [`FeedError::MissingDbSpec`].
    #[default]
    Strict,
    /// Skip the call and return an empty/default result.
    Permissive,
}

/// Per-instance persistence settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub strictness: Strictness,
    /// Re-read the row after a successful insert.
    pub reload_on_added: bool,
    /// Re-read the row after a successful update.
    pub reload_on_updated: bool,
}

/// Editing state of a feed. `Editing` carries the column-keyed snapshot
/// taken by `edit()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EditState {
    #[default]
    Clean,
    Editing(Record),
}

impl EditState {
    pub fn is_editing(&self) -> bool {
        matches!(self, EditState::Editing(_))
    }

    pub fn snapshot(&self) -> Option<&Record> {
        match self {
            EditState::Editing(snapshot) => Some(snapshot),
            EditState::Clean => None,
        }
    }
}

/// Persistence state embedded in every model: storage descriptor, edit
/// snapshot, observer and config.
#[derive(Clone, Default)]
pub struct FeedBase {
    spec: Option<Arc<DbSpec>>,
    state: EditState,
    observer: Option<Arc<dyn DbObserver>>,
    config: FeedConfig,
}

impl fmt::Debug for FeedBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedBase")
            .field("table", &self.spec.as_ref().map(|s| s.table().to_string()))
            .field("state", &self.state)
            .field("observer", &self.observer.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl FeedBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spec(mut self, spec: Arc<DbSpec>) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn with_protocol(mut self, protocol: &dyn DbProtocol) -> FeedResult<Self> {
        self.set_db_protocol(protocol)?;
        Ok(self)
    }

    pub fn with_observer(mut self, observer: Arc<dyn DbObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_config(mut self, config: FeedConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_db_protocol(&mut self, protocol: &dyn DbProtocol) -> FeedResult<()> {
        self.spec = Some(Arc::new(DbSpec::new(protocol)?));
        Ok(())
    }

    pub fn set_db_spec(&mut self, spec: Arc<DbSpec>) {
        self.spec = Some(spec);
    }

    /// Override parts of the current descriptor for this instance only.
    /// Returns false when there is no descriptor to update.
    pub fn update_db_spec(&mut self, update: impl FnOnce(&mut DbSpec)) -> bool {
        match self.spec.as_mut() {
            Some(spec) => {
                update(Arc::make_mut(spec));
                true
            }
            None => false,
        }
    }

    pub fn db_spec(&self) -> Option<&Arc<DbSpec>> {
        self.spec.as_ref()
    }

    pub fn set_observer(&mut self, observer: Option<Arc<dyn DbObserver>>) {
        self.observer = observer;
    }

    pub fn observer(&self) -> Option<&Arc<dyn DbObserver>> {
        self.observer.as_ref()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut FeedConfig {
        &mut self.config
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub(crate) fn begin_edit(&mut self, snapshot: Record) {
        self.state = EditState::Editing(snapshot);
    }

    /// Leave editing mode, returning the snapshot if there was one.
    pub(crate) fn take_snapshot(&mut self) -> Option<Record> {
        match std::mem::take(&mut self.state) {
            EditState::Editing(snapshot) => Some(snapshot),
            EditState::Clean => None,
        }
    }

    /// Descriptor for calls that cannot be skipped.
    pub(crate) fn require_spec(&self, model: &'static str) -> FeedResult<Arc<DbSpec>> {
        self.spec
            .clone()
            .ok_or(FeedError::MissingDbSpec { model })
    }

    /// Descriptor for persistence calls; `None` means permissive mode asked
    /// to skip the call.
    pub(crate) fn persistence_spec(
        &self,
        model: &'static str,
        operation: &'static str,
    ) -> FeedResult<Option<Arc<DbSpec>>> {
        match (&self.spec, self.config.strictness) {
            (Some(spec), _) => Ok(Some(spec.clone())),
            (None, Strictness::Strict) => Err(FeedError::MissingDbSpec { model }),
            (None, Strictness::Permissive) => {
                tracing::warn!(model, operation, "no db spec, skipping persistence");
                Ok(None)
            }
        }
    }
}
