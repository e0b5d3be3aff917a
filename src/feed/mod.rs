//! The `Feed` trait: a model bound to one table row.

mod base;
mod codec;
mod persistence;
mod session;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FeedError, FeedResult};
use crate::executor::{QueryHandle, Transaction};
use crate::filter::FilterOptions;
use crate::mapper::PropertyMapper;
use crate::record::{is_truthy, value_to_string, Record};
use crate::searcher::FeedSearcher;
use crate::spec::DbSpec;
use crate::tools::DbTools;

pub use base::{EditState, FeedBase, FeedConfig, Strictness};
pub use persistence::FeedPersistence;
pub use session::Editing;

/// A persistable model.
///
/// Implement it with `#[derive(Feed)]`; the derive supplies the property
/// mapper and the accessors for the embedded [`FeedBase`]. Everything else
/// is provided. Async persistence lives on [`FeedPersistence`], which every
/// `Feed` gets for free.
pub trait Feed: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    fn property_mapper() -> &'static PropertyMapper;

    fn base(&self) -> &FeedBase;

    fn base_mut(&mut self) -> &mut FeedBase;

    /// Swap every mapped field with the one in `decoded`, leaving unmapped
    /// fields on both sides alone.
    #[doc(hidden)]
    fn take_mapped(&mut self, decoded: &mut Self);

    fn model_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Column-keyed record of every mapped property. Unset properties
    /// encode as null.
    fn encode(&self) -> FeedResult<Record> {
        codec::encode(self)
    }

    /// Overlay mapped columns from `record` onto this instance.
    fn generate(&mut self, record: &Record) -> FeedResult<()> {
        codec::generate(self, record)
    }

    /// A fresh instance hydrated from a storage row.
    fn from_record(record: &Record) -> FeedResult<Self> {
        let mut feed = Self::default();
        feed.generate(record)?;
        Ok(feed)
    }

    /// All serialized properties, keyed by attribute name.
    fn pure_model(&self) -> FeedResult<Value> {
        codec::properties(self).map(Value::Object)
    }

    fn describe(&self) -> String {
        let body = self
            .pure_model()
            .and_then(|model| Ok(serde_json::to_string_pretty(&model)?));
        match body {
            Ok(body) => format!("{}: {}", Self::model_name(), body),
            Err(err) => format!("{}: <{}>", Self::model_name(), err),
        }
    }

    fn db_spec(&self) -> FeedResult<Arc<DbSpec>> {
        self.base().require_spec(Self::model_name())
    }

    /// Primary key values joined with commas, in key order.
    fn uid_str(&self) -> FeedResult<String> {
        let spec = self.db_spec()?;
        let data = self.encode()?;
        Ok(spec
            .primary_keys()
            .iter()
            .map(|key| data.get(key).map(value_to_string).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(","))
    }

    /// Snapshot the current encoded state and enter editing mode. Calling
    /// it again replaces the snapshot.
    fn edit(&mut self) -> FeedResult<()> {
        let snapshot = self.encode()?;
        self.base_mut().begin_edit(snapshot);
        Ok(())
    }

    /// Leave editing mode without writing. Property values are not rolled
    /// back; the discarded snapshot is returned.
    fn cancel_edit(&mut self) -> Option<Record> {
        self.base_mut().take_snapshot()
    }

    fn is_editing(&self) -> bool {
        self.base().state().is_editing()
    }

    /// Begin editing and get a guard that cancels the edit unless it is
    /// committed.
    fn edit_session(&mut self) -> FeedResult<Editing<'_, Self>> {
        Editing::begin(self)
    }

    /// True when editing, `column` is mapped, its snapshot value is truthy
    /// and the current value differs from it.
    fn check_key_changed(&self, column: &str) -> FeedResult<bool> {
        let Some(snapshot) = self.base().state().snapshot() else {
            return Ok(false);
        };
        if !Self::property_mapper().has_column(column) {
            return Ok(false);
        }
        let before = snapshot.get(column).unwrap_or(&Value::Null);
        if !is_truthy(before) {
            return Ok(false);
        }
        let current = self.encode()?;
        Ok(current.get(column).unwrap_or(&Value::Null) != before)
    }

    /// Keep only the entries of `params` whose key is a mapped property.
    fn clean_filter_params(&self, params: &Record) -> Record {
        let mapper = Self::property_mapper();
        params
            .iter()
            .filter(|(property, _)| mapper.has_property(property))
            .map(|(property, value)| (property.clone(), value.clone()))
            .collect()
    }

    /// A searcher pre-configured from filter options: sort rule, equality
    /// filters on mapped properties, and the offset/length window. Queries
    /// run inside `tx` when one is given.
    fn searcher(
        &self,
        options: &FilterOptions,
        tx: Option<&Transaction>,
    ) -> FeedResult<FeedSearcher<Self>> {
        let mapper = Self::property_mapper();
        let mut searcher = FeedSearcher::new(self, tx)?;
        let processor = searcher.processor();

        let rule = options.sort_rule();
        if let Some(column) = mapper.column_of(&rule.sort_key) {
            processor.add_order_rule(column, rule.direction);
        }
        for (column, value) in options.equality_filters(mapper) {
            processor.add_condition_kv(&column, value);
        }
        let limit = options.limit_info();
        if limit.is_active() {
            processor.set_limit_info(limit.offset, limit.length);
        }
        Ok(searcher)
    }

    /// A raw query handle on this model's table filtered by column-keyed
    /// `params`.
    fn db_searcher(
        params: &Record,
        tx: Option<&Transaction>,
    ) -> FeedResult<Box<dyn QueryHandle>> {
        let spec = Self::default().db_spec()?;
        Ok(DbTools::new(spec, tx).make_searcher(params))
    }
}

/// Object-safe view of a feed, handed to observers.
pub trait FeedObject: Send + Sync {
    fn feed_name(&self) -> &'static str;

    fn feed_record(&self) -> FeedResult<Record>;

    fn feed_uid(&self) -> FeedResult<String>;

    fn feed_summary(&self) -> String;
}

impl<M: Feed> FeedObject for M {
    fn feed_name(&self) -> &'static str {
        M::model_name()
    }

    fn feed_record(&self) -> FeedResult<Record> {
        self.encode()
    }

    fn feed_uid(&self) -> FeedResult<String> {
        self.uid_str()
    }

    fn feed_summary(&self) -> String {
        self.describe()
    }
}

/// Column-keyed record of the primary key values in `data`.
pub(crate) fn key_record(spec: &DbSpec, data: &Record) -> Record {
    spec.primary_keys()
        .iter()
        .map(|key| (key.clone(), data.get(key).cloned().unwrap_or(Value::Null)))
        .collect()
}

pub(crate) fn single_key(spec: &DbSpec, model: &'static str) -> FeedResult<String> {
    spec.primary_key()
        .map(str::to_string)
        .ok_or_else(|| FeedError::CompositeKey {
            model,
            keys: spec.primary_keys().to_vec(),
        })
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::MemoryDatabase;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize, crate::Feed)]
    struct Article {
        #[serde(skip)]
        base: FeedBase,
        id: Option<u64>,
        #[feed(column = "title_text")]
        title: String,
        views: i64,
        #[feed(skip)]
        scratch: String,
        #[serde(skip)]
        cache: Vec<u8>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, crate::Feed)]
    #[serde(rename_all = "camelCase")]
    struct Profile {
        #[serde(skip)]
        base: FeedBase,
        user_id: Option<u64>,
        display_name: String,
        #[serde(rename = "nick")]
        nick_name: String,
    }

    fn spec() -> Arc<DbSpec> {
        Arc::new(
            DbSpec::for_table(
                Arc::new(MemoryDatabase::new()),
                "article",
                "id",
                ["id", "title_text", "views"],
            )
            .unwrap(),
        )
    }

    fn article() -> Article {
        Article {
            base: FeedBase::new().with_spec(spec()),
            id: Some(7),
            title: "hello".into(),
            views: 3,
            scratch: "local".into(),
            cache: vec![1, 2, 3],
        }
    }

    #[test]
    fn derive_maps_renamed_and_skips_fields() {
        let mapper = Article::property_mapper();
        assert_eq!(mapper.column_of("title"), Some("title_text"));
        assert_eq!(mapper.column_of("views"), Some("views"));
        assert!(!mapper.has_property("scratch"));
        assert!(!mapper.has_property("base"));
        assert_eq!(Article::model_name(), "Article");
    }

    #[test]
    fn encode_uses_columns() {
        let record = article().encode().unwrap();
        assert_eq!(record.get("id"), Some(&json!(7)));
        assert_eq!(record.get("title_text"), Some(&json!("hello")));
        assert_eq!(record.get("views"), Some(&json!(3)));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn generate_overlays_known_columns_and_keeps_base() {
        let mut feed = article();
        let mut record = Record::new();
        record.insert("title_text".into(), json!("changed"));
        record.insert("unknown".into(), json!(1));
        feed.generate(&record).unwrap();

        assert_eq!(feed.title, "changed");
        assert_eq!(feed.views, 3);
        assert_eq!(feed.id, Some(7));
        assert!(feed.base().db_spec().is_some());
    }

    #[test]
    fn generate_leaves_unmapped_fields_alone() {
        let mut feed = article();
        feed.scratch = "edited".into();
        let mut record = Record::new();
        record.insert("views".into(), json!(9));
        feed.generate(&record).unwrap();

        assert_eq!(feed.views, 9);
        assert_eq!(feed.cache, vec![1, 2, 3]);
        assert_eq!(feed.scratch, "edited");
    }

    #[test]
    fn rename_all_models_encode_and_decode_by_column() {
        let mapper = Profile::property_mapper();
        assert_eq!(mapper.column_of("userId"), Some("user_id"));
        assert_eq!(mapper.column_of("displayName"), Some("display_name"));
        assert_eq!(mapper.column_of("nick"), Some("nick_name"));

        let profile = Profile {
            user_id: Some(3),
            display_name: "bob".into(),
            nick_name: "b".into(),
            ..Profile::default()
        };
        let record = profile.encode().unwrap();
        assert_eq!(record.get("user_id"), Some(&json!(3)));
        assert_eq!(record.get("display_name"), Some(&json!("bob")));
        assert_eq!(record.get("nick_name"), Some(&json!("b")));

        let decoded = Profile::from_record(&record).unwrap();
        assert_eq!(decoded.user_id, Some(3));
        assert_eq!(decoded.display_name, "bob");
        assert_eq!(decoded.nick_name, "b");
    }

    #[test]
    fn generate_with_wrong_type_fails() {
        let mut feed = article();
        let mut record = Record::new();
        record.insert("views".into(), json!("many"));
        assert!(matches!(feed.generate(&record), Err(FeedError::Codec(_))));
    }

    #[test]
    fn uid_and_describe() {
        let feed = article();
        assert_eq!(feed.uid_str().unwrap(), "7");
        assert!(feed.describe().starts_with("Article: {"));

        let bare = Article::default();
        assert!(matches!(bare.uid_str(), Err(FeedError::MissingDbSpec { .. })));
    }

    #[test]
    fn key_changed_needs_truthy_snapshot() {
        let mut feed = article();
        assert!(!feed.check_key_changed("title_text").unwrap());

        feed.edit().unwrap();
        feed.title = "new".into();
        assert!(feed.check_key_changed("title_text").unwrap());
        assert!(!feed.check_key_changed("views").unwrap());
        assert!(!feed.check_key_changed("unknown").unwrap());

        let mut zero = article();
        zero.views = 0;
        zero.edit().unwrap();
        zero.views = 5;
        assert!(!zero.check_key_changed("views").unwrap());
    }

    #[test]
    fn cancel_edit_keeps_values() {
        let mut feed = article();
        feed.edit().unwrap();
        feed.title = "draft".into();
        let snapshot = feed.cancel_edit().unwrap();
        assert_eq!(snapshot.get("title_text"), Some(&json!("hello")));
        assert_eq!(feed.title, "draft");
        assert!(!feed.is_editing());
    }

    #[test]
    fn clean_filter_params_keeps_mapped_properties() {
        let mut params = Record::new();
        params.insert("title".into(), json!("x"));
        params.insert("title_text".into(), json!("y"));
        params.insert("_sortKey".into(), json!("views"));
        let cleaned = article().clean_filter_params(&params);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.get("title"), Some(&json!("x")));
    }
}
