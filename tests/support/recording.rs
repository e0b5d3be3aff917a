//! Executor wrapper that counts the writes reaching storage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use feedbase_rust::{
    AddMode, Database, DbSpec, ExecResult, MemoryDatabase, QueryHandle, Record, Transaction,
};

pub struct RecordingDatabase {
    inner: MemoryDatabase,
    inserts: AtomicUsize,
    modifies: AtomicUsize,
    removes: AtomicUsize,
    modified: Mutex<Vec<Record>>,
}

impl RecordingDatabase {
    pub fn new(inner: MemoryDatabase) -> Self {
        RecordingDatabase {
            inner,
            inserts: AtomicUsize::new(0),
            modifies: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            modified: Mutex::new(Vec::new()),
        }
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn modifies(&self) -> usize {
        self.modifies.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.inserts() + self.modifies() + self.removes()
    }

    /// The record passed to the latest modify call.
    pub fn last_modified(&self) -> Option<Record> {
        self.modified.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Database for RecordingDatabase {
    async fn insert(
        &self,
        spec: &DbSpec,
        record: Record,
        mode: AddMode,
        tx: Option<&Transaction>,
    ) -> ExecResult<u64> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(spec, record, mode, tx).await
    }

    async fn modify(
        &self,
        spec: &DbSpec,
        record: Record,
        tx: Option<&Transaction>,
    ) -> ExecResult<u64> {
        self.modifies.fetch_add(1, Ordering::SeqCst);
        self.modified.lock().unwrap().push(record.clone());
        self.inner.modify(spec, record, tx).await
    }

    async fn remove(
        &self,
        spec: &DbSpec,
        record: Record,
        tx: Option<&Transaction>,
    ) -> ExecResult<u64> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(spec, record, tx).await
    }

    fn searcher(&self, tx: Option<&Transaction>) -> Box<dyn QueryHandle> {
        self.inner.searcher(tx)
    }
}
