mod support;

use feedbase_rust::{
    Feed, FeedError, FeedItem, FeedPersistence, FilterOptions, Record, SortDirection,
};
use serde_json::json;
use support::demo::DemoTable;
use support::setup;

async fn seed() -> Vec<DemoTable> {
    let rows = [
        ("alpha", 3),
        ("beta", 1),
        ("gamma", 2),
        ("alpha", 5),
        ("delta", 4),
        ("epsilon", 0),
    ];
    let mut feeds = Vec::new();
    for (key1, key2) in rows {
        let mut feed = DemoTable::new(key1, key2);
        feed.add_to_db(None).await.unwrap();
        feeds.push(feed);
    }
    feeds
}

fn key2s(feeds: &[DemoTable]) -> Vec<i64> {
    feeds.iter().map(|f| f.key2).collect()
}

#[tokio::test]
async fn equality_filter_on_mapped_property() {
    let (_, _db) = setup();
    seed().await;

    let options = FilterOptions::new().filter("key1", "alpha");
    let searcher = DemoTable::default().searcher(&options, None).unwrap();
    assert_eq!(searcher.query_count().await.unwrap(), 2);
}

#[tokio::test]
async fn falsy_filters_match_omitting_them() {
    let (_, _db) = setup();
    seed().await;

    let all = DemoTable::default()
        .searcher(&FilterOptions::new(), None)
        .unwrap()
        .query_count()
        .await
        .unwrap();

    for options in [
        FilterOptions::new().filter("key2", 0),
        FilterOptions::new().filter("key1", ""),
        FilterOptions::new().filter("key1", serde_json::Value::Null),
    ] {
        let count = DemoTable::default()
            .searcher(&options, None)
            .unwrap()
            .query_count()
            .await
            .unwrap();
        assert_eq!(count, all);
    }
    assert_eq!(all, 6);
}

#[tokio::test]
async fn unmapped_and_malformed_filter_keys_are_ignored() {
    let (_, _db) = setup();
    seed().await;

    // `create_time` is a column, not a property; `key-1` is not an identifier.
    let options = FilterOptions::new()
        .filter("create_time", "1999-01-01")
        .filter("key-1", "alpha")
        .filter("missing", "x");
    let searcher = DemoTable::default().searcher(&options, None).unwrap();
    assert_eq!(searcher.query_count().await.unwrap(), 6);
}

#[tokio::test]
async fn sort_and_window_from_filter_options() {
    let (_, _db) = setup();
    seed().await;

    let options = FilterOptions::new()
        .sort_by("key2", "descending")
        .offset(1)
        .length(3);
    let searcher = DemoTable::default().searcher(&options, None).unwrap();
    let feeds = searcher.query_all_feeds().await.unwrap();
    assert_eq!(key2s(&feeds), vec![4, 3, 2]);

    // Pagination never narrows the count.
    assert_eq!(searcher.query_count().await.unwrap(), 6);
}

#[tokio::test]
async fn zero_length_means_no_limit() {
    let (_, _db) = setup();
    seed().await;

    let options = FilterOptions::new()
        .sort_by("key2", "whatever")
        .offset(2)
        .length(0);
    let feeds = DemoTable::default()
        .searcher(&options, None)
        .unwrap()
        .query_all_feeds()
        .await
        .unwrap();
    assert_eq!(key2s(&feeds), vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn unknown_sort_key_is_ignored() {
    let (_, _db) = setup();
    seed().await;

    let options = FilterOptions::new().sort_by("nope", "DESC");
    let feeds = DemoTable::default()
        .searcher(&options, None)
        .unwrap()
        .query_all_feeds()
        .await
        .unwrap();
    assert_eq!(feeds.len(), 6);
    assert_eq!(feeds[0].key1, "alpha");
}

#[tokio::test]
async fn page_info_bounds_results() {
    let (_, _db) = setup();
    seed().await;

    let mut searcher = DemoTable::default().searcher(&FilterOptions::new(), None).unwrap();
    searcher
        .processor()
        .add_order_rule("key2", SortDirection::Asc);

    let page = searcher.query_list_with_page_info(1, 4).await.unwrap();
    assert_eq!(key2s(&page), vec![4, 5]);

    for n in 1..=4 {
        let page = searcher.query_list_with_page_info(0, n).await.unwrap();
        assert!(page.len() <= n as usize);
    }

    let everything = searcher.query_list_with_page_info(-1, 2).await.unwrap();
    assert_eq!(everything.len(), 6);

    let beyond = searcher
        .query_list_with_page_info(i64::MAX / 2, 4)
        .await
        .unwrap();
    assert!(beyond.is_empty());

    let window = searcher.query_list_with_limit_info(2, 2).await.unwrap();
    assert_eq!(key2s(&window), vec![2, 3]);
}

#[tokio::test]
async fn query_list_returns_feeds_or_records() {
    let (_, _db) = setup();
    seed().await;

    let mut searcher = DemoTable::default().searcher(&FilterOptions::new(), None).unwrap();
    searcher
        .processor()
        .add_order_rule("key2", SortDirection::Desc);

    let feeds = searcher.query_list(0, 2, true).await.unwrap();
    assert_eq!(feeds.len(), 2);
    assert!(matches!(&feeds[0], FeedItem::Feed(feed) if feed.key2 == 5));

    let records = searcher.query_all(false).await.unwrap();
    assert_eq!(records.len(), 6);
    let first = records.into_iter().next().unwrap().into_record().unwrap();
    assert_eq!(first.get("key2"), Some(&json!(5)));
    assert_eq!(first.get("create_time"), Some(&json!("2024-01-01")));
    assert!(first.get("note").is_none());

    let single = searcher.query_single(true).await.unwrap().unwrap();
    assert_eq!(single.into_feed().map(|f| f.key2), Some(5));

    let one = searcher.query_one().await.unwrap().unwrap();
    assert_eq!(one.key2, 5);
}

#[tokio::test]
async fn materialized_rows_round_trip() {
    let (_, _db) = setup();
    seed().await;

    let searcher = DemoTable::default().searcher(&FilterOptions::new(), None).unwrap();
    let raw = DemoTable::db_searcher(&Record::new(), None).unwrap();
    let rows = raw.query_list().await.unwrap();

    let items = searcher.format_list(rows.clone(), false).unwrap();
    for (row, item) in rows.iter().zip(items) {
        assert_eq!(item.into_record().as_ref(), Some(row));
    }
}

#[tokio::test]
async fn lookups_by_uid_and_params() {
    let (_, _db) = setup();
    let feeds = seed().await;
    let uid = feeds[2].uid.unwrap();

    let searcher = DemoTable::default().searcher(&FilterOptions::new(), None).unwrap();
    let found = searcher.find_with_uid(uid).await.unwrap().unwrap();
    assert_eq!(found.key1, "gamma");
    assert!(searcher.find_with_uid(999u64).await.unwrap().is_none());

    let err = searcher.prepare_with_uid(999u64).await.unwrap_err();
    assert!(matches!(err, FeedError::NotFound { model: "DemoTable" }));

    let mut params = Record::new();
    params.insert("key1".into(), json!("delta"));
    let found = searcher.prepare_with_params(&params).await.unwrap();
    assert_eq!(found.key2, 4);

    assert!(searcher.check_exists(uid).await.unwrap());
    assert!(!searcher.check_exists(999u64).await.unwrap());
    assert!(searcher.check_exists(params).await.unwrap());
}

#[tokio::test]
async fn static_helpers() {
    let (_, _db) = setup();
    seed().await;

    let mut params = Record::new();
    params.insert("key1".into(), json!("alpha"));
    assert_eq!(DemoTable::count(&params, None).await.unwrap(), 2);
    assert_eq!(DemoTable::count(&Record::new(), None).await.unwrap(), 6);

    let first = DemoTable::find_one(&params, None).await.unwrap().unwrap();
    assert_eq!(first.key1, "alpha");

    params.insert("key1".into(), json!("zeta"));
    assert!(DemoTable::find_one(&params, None).await.unwrap().is_none());
    let err = DemoTable::prepare_one(&params, None).await.unwrap_err();
    assert!(err.is_contract_violation());

    let handle = DemoTable::db_searcher(&params, None).unwrap();
    assert_eq!(handle.query_count().await.unwrap(), 0);
}
