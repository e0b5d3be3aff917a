//! Post-write hooks.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{FeedError, FeedResult};
use crate::feed::FeedObject;
use crate::record::{DiffMap, Record};

/// Notified after each successful add, update or delete. Every hook
/// defaults to a no-op. An error from a hook is returned to the caller,
/// but the write has already happened.
#[async_trait]
pub trait DbObserver: Send + Sync {
    async fn on_add(&self, _feed: &dyn FeedObject) -> FeedResult<()> {
        Ok(())
    }

    /// `changed` is the update's diff, `old_data` the snapshot taken by
    /// `edit()`.
    async fn on_update(
        &self,
        _feed: &dyn FeedObject,
        _changed: &DiffMap,
        _old_data: &Record,
    ) -> FeedResult<()> {
        Ok(())
    }

    async fn on_delete(&self, _feed: &dyn FeedObject) -> FeedResult<()> {
        Ok(())
    }
}

/// Logs each write through `tracing`, or into a shared buffer.
#[derive(Default)]
pub struct LogObserver {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogObserver {
    pub fn new() -> Self {
        LogObserver { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogObserver {
            buffer: Some(buffer),
        }
    }

    fn write(&self, line: String) -> FeedResult<()> {
        match &self.buffer {
            Some(buffer) => buffer
                .lock()
                .map_err(|_| FeedError::Observer("log observer buffer poisoned".into()))?
                .push(line),
            None => tracing::info!("{}", line),
        }
        Ok(())
    }
}

fn uid_of(feed: &dyn FeedObject) -> String {
    feed.feed_uid().unwrap_or_else(|_| "?".to_string())
}

#[async_trait]
impl DbObserver for LogObserver {
    async fn on_add(&self, feed: &dyn FeedObject) -> FeedResult<()> {
        self.write(format!("[ADD] {} {}", feed.feed_name(), uid_of(feed)))
    }

    async fn on_update(
        &self,
        feed: &dyn FeedObject,
        changed: &DiffMap,
        _old_data: &Record,
    ) -> FeedResult<()> {
        let columns = changed.keys().cloned().collect::<Vec<_>>().join(",");
        self.write(format!(
            "[UPDATE] {} {} {}",
            feed.feed_name(),
            uid_of(feed),
            columns
        ))
    }

    async fn on_delete(&self, feed: &dyn FeedObject) -> FeedResult<()> {
        self.write(format!("[DELETE] {} {}", feed.feed_name(), uid_of(feed)))
    }
}

#[cfg(feature = "emitter")]
pub use emitter::EmitterObserver;

#[cfg(feature = "emitter")]
mod emitter {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use event_emitter_rs::EventEmitter;

    use super::{uid_of, DbObserver};
    use crate::error::{FeedError, FeedResult};
    use crate::feed::FeedObject;
    use crate::record::{DiffMap, Record};

    /// Re-emits writes on an in-process [`EventEmitter`] as
    /// `<Model>:added`, `<Model>:updated` and `<Model>:deleted`, with a JSON
    /// string payload.
    pub struct EmitterObserver {
        emitter: Mutex<EventEmitter>,
    }

    impl Default for EmitterObserver {
        fn default() -> Self {
            Self::new(EventEmitter::new())
        }
    }

    impl EmitterObserver {
        pub fn new(emitter: EventEmitter) -> Self {
            EmitterObserver {
                emitter: Mutex::new(emitter),
            }
        }

        /// Subscribe to an event. Returns the listener id.
        pub fn on<F>(&self, event: &str, listener: F) -> FeedResult<String>
        where
            F: Fn(String) + Send + Sync + 'static,
        {
            Ok(self.lock()?.on(event, listener))
        }

        fn lock(&self) -> FeedResult<std::sync::MutexGuard<'_, EventEmitter>> {
            self.emitter
                .lock()
                .map_err(|_| FeedError::Observer("event emitter poisoned".into()))
        }

        fn emit(
            &self,
            feed: &dyn FeedObject,
            action: &str,
            payload: serde_json::Value,
        ) -> FeedResult<()> {
            let event = format!("{}:{}", feed.feed_name(), action);
            self.lock()?.emit(&event, payload.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl DbObserver for EmitterObserver {
        async fn on_add(&self, feed: &dyn FeedObject) -> FeedResult<()> {
            let record = feed.feed_record()?;
            self.emit(feed, "added", serde_json::Value::Object(record))
        }

        async fn on_update(
            &self,
            feed: &dyn FeedObject,
            changed: &DiffMap,
            _old_data: &Record,
        ) -> FeedResult<()> {
            let payload = serde_json::json!({
                "uid": uid_of(feed),
                "changed": changed,
            });
            self.emit(feed, "updated", payload)
        }

        async fn on_delete(&self, feed: &dyn FeedObject) -> FeedResult<()> {
            let record = feed.feed_record()?;
            self.emit(feed, "deleted", serde_json::Value::Object(record))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Change;
    use serde_json::json;

    struct Stub;

    impl FeedObject for Stub {
        fn feed_name(&self) -> &'static str {
            "Stub"
        }

        fn feed_record(&self) -> FeedResult<Record> {
            let mut record = Record::new();
            record.insert("id".into(), json!(9));
            Ok(record)
        }

        fn feed_uid(&self) -> FeedResult<String> {
            Ok("9".into())
        }

        fn feed_summary(&self) -> String {
            "Stub 9".into()
        }
    }

    struct Silent;

    impl DbObserver for Silent {}

    #[tokio::test]
    async fn default_hooks_do_nothing() {
        let silent = Silent;
        silent.on_add(&Stub).await.unwrap();
        silent
            .on_update(&Stub, &DiffMap::new(), &Record::new())
            .await
            .unwrap();
        silent.on_delete(&Stub).await.unwrap();
    }

    #[tokio::test]
    async fn log_observer_to_buffer() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let observer = LogObserver::with_buffer(buffer.clone());

        let mut diff = DiffMap::new();
        diff.insert(
            "key1".into(),
            Change {
                before: json!("a"),
                after: json!("b"),
            },
        );
        observer.on_add(&Stub).await.unwrap();
        observer.on_update(&Stub, &diff, &Record::new()).await.unwrap();
        observer.on_delete(&Stub).await.unwrap();

        let logs = buffer.lock().unwrap();
        assert_eq!(
            *logs,
            vec![
                "[ADD] Stub 9".to_string(),
                "[UPDATE] Stub 9 key1".to_string(),
                "[DELETE] Stub 9".to_string(),
            ]
        );
    }

    #[cfg(feature = "emitter")]
    #[tokio::test]
    async fn emitter_observer_forwards_events() {
        use std::sync::mpsc;
        use std::time::Duration;

        let observer = EmitterObserver::default();
        let (tx, rx) = mpsc::channel();
        observer
            .on("Stub:added", move |payload: String| {
                tx.send(payload).unwrap();
            })
            .unwrap();

        observer.on_add(&Stub).await.unwrap();
        let payload = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("Stub:added listener never fired");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value, json!({ "id": 9 }));
    }
}
