use thiserror::Error;

use crate::executor::ExecutorError;

/// Errors raised by the mapping layer.
///
/// `NotEditing`, `MissingDbSpec`, `CompositeKey` and `NotFound` are contract
/// violations: they are returned before anything reaches the executor and
/// before any state on the feed is touched. See
/// [`FeedError::is_contract_violation`].
#[derive(Debug, Error)]
pub enum FeedError {
    /// `update_to_db` called without an edit snapshot.
    #[error("{model}: you must call edit() before update")]
    NotEditing { model: &'static str },

    /// A persistence or lookup method needed a storage descriptor.
    #[error("{model}: db spec must be set before touching the database")]
    MissingDbSpec { model: &'static str },

    /// A scalar uid was used against a composite primary key.
    #[error("{model}: primary key is not single (keys: {keys:?})")]
    CompositeKey {
        model: &'static str,
        keys: Vec<String>,
    },

    /// A `prepare*` lookup found nothing.
    #[error("{model}: object not found")]
    NotFound { model: &'static str },

    /// The storage descriptor is malformed.
    #[error("invalid db spec: {0}")]
    InvalidSpec(String),

    /// The attribute/column table is malformed.
    #[error("invalid property mapping: {0}")]
    Mapping(String),

    /// Encoding to or decoding from a record failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Raised by an observer hook after a successful write.
    #[error("observer error: {0}")]
    Observer(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl FeedError {
    /// True for programmer-contract violations, which callers are not
    /// expected to recover from.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            FeedError::NotEditing { .. }
                | FeedError::MissingDbSpec { .. }
                | FeedError::CompositeKey { .. }
                | FeedError::NotFound { .. }
        )
    }
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;
