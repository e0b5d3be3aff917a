//! Shared fixtures for the integration tests.
#![allow(dead_code)]

pub mod demo;
pub mod recording;

use std::sync::Arc;

use feedbase_rust::MemoryDatabase;

use recording::RecordingDatabase;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh storage for the current test thread. Demo models constructed on
/// this thread resolve their descriptors against it.
pub fn setup() -> (MemoryDatabase, Arc<RecordingDatabase>) {
    init_tracing();
    let memory = MemoryDatabase::new();
    let recording = Arc::new(RecordingDatabase::new(memory.clone()));
    demo::install(recording.clone()).unwrap();
    (memory, recording)
}
