extern crate self as feedbase_rust;

mod error;
mod executor;
mod feed;
mod filter;
mod mapper;
#[cfg(feature = "memory")]
mod memory;
mod observer;
mod record;
mod searcher;
mod spec;
mod tools;

pub use error::{FeedError, FeedResult};
pub use executor::{
    AddMode, Database, ExecResult, ExecutorError, Performer, QueryHandle, Transaction,
};
pub use feed::{
    EditState, Editing, Feed, FeedBase, FeedConfig, FeedObject, FeedPersistence, Strictness,
};
pub use filter::{
    FilterOptions, LimitInfo, SortDirection, SortRule, LENGTH, OFFSET, SORT_DIRECTION, SORT_KEY,
};
pub use mapper::PropertyMapper;
#[cfg(feature = "memory")]
pub use memory::{MemoryDatabase, MemoryQuery};
#[cfg(feature = "emitter")]
pub use observer::EmitterObserver;
pub use observer::{DbObserver, LogObserver};
pub use record::{is_truthy, value_to_string, Change, DiffMap, Record};
pub use searcher::{FeedItem, FeedSearcher, Lookup};
pub use spec::{DbProtocol, DbSpec, PrimaryKey};
pub use tools::{Adder, DbTools, Modifier, Remover};

// Derive macro for `Feed`, `#[derive(Feed)]`.
pub use feedbase_rust_macros::Feed;

#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
