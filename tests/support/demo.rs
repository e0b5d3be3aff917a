//! Demo models: `DemoTable` with a generated single key, `Membership` with
//! a composite key.

use std::cell::RefCell;
use std::sync::Arc;

use feedbase_rust::{
    Database, DbProtocol, DbSpec, Feed, FeedBase, FeedResult, PrimaryKey,
};
use serde::{Deserialize, Serialize};

thread_local! {
    static SPECS: RefCell<Specs> = RefCell::new(Specs::default());
}

#[derive(Default, Clone)]
struct Specs {
    demo: Option<Arc<DbSpec>>,
    membership: Option<Arc<DbSpec>>,
}

pub fn install(database: Arc<dyn Database>) -> FeedResult<()> {
    let demo = DbSpec::new(&DemoTableProtocol {
        database: database.clone(),
    })?;
    let membership = DbSpec::for_table(
        database,
        "membership",
        ["org_id", "member_id"],
        ["org_id", "member_id", "role"],
    )?
    .with_modifiable_columns(["role"]);

    SPECS.with(|specs| {
        *specs.borrow_mut() = Specs {
            demo: Some(Arc::new(demo)),
            membership: Some(Arc::new(membership)),
        }
    });
    Ok(())
}

pub fn uninstall() {
    SPECS.with(|specs| *specs.borrow_mut() = Specs::default());
}

fn base_with(pick: impl FnOnce(&Specs) -> Option<Arc<DbSpec>>) -> FeedBase {
    match SPECS.with(|specs| pick(&specs.borrow())) {
        Some(spec) => FeedBase::new().with_spec(spec),
        None => FeedBase::new(),
    }
}

struct DemoTableProtocol {
    database: Arc<dyn Database>,
}

impl DbProtocol for DemoTableProtocol {
    fn database(&self) -> Arc<dyn Database> {
        self.database.clone()
    }

    fn table(&self) -> String {
        "demo_table".to_string()
    }

    fn primary_key(&self) -> PrimaryKey {
        "uid".into()
    }

    fn cols(&self) -> Vec<String> {
        ["uid", "key1", "key2", "create_time"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn modifiable_cols(&self) -> Vec<String> {
        vec!["key1".to_string(), "key2".to_string()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Feed)]
pub struct DemoTable {
    #[serde(skip)]
    pub base: FeedBase,
    pub uid: Option<u64>,
    pub key1: String,
    pub key2: i64,
    #[feed(column = "create_time")]
    pub created_at: Option<String>,
    #[feed(skip)]
    pub note: String,
    #[serde(skip)]
    pub cache: Vec<u32>,
}

impl Default for DemoTable {
    fn default() -> Self {
        DemoTable {
            base: base_with(|specs| specs.demo.clone()),
            uid: None,
            key1: String::new(),
            key2: 0,
            created_at: None,
            note: String::new(),
            cache: Vec::new(),
        }
    }
}

impl DemoTable {
    pub fn new(key1: &str, key2: i64) -> Self {
        DemoTable {
            key1: key1.to_string(),
            key2,
            created_at: Some("2024-01-01".to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Feed)]
pub struct Membership {
    #[serde(skip)]
    #[feed(base)]
    pub state: FeedBase,
    pub org_id: String,
    pub member_id: String,
    pub role: String,
}

impl Default for Membership {
    fn default() -> Self {
        Membership {
            state: base_with(|specs| specs.membership.clone()),
            org_id: String::new(),
            member_id: String::new(),
            role: String::new(),
        }
    }
}

impl Membership {
    pub fn new(org_id: &str, member_id: &str, role: &str) -> Self {
        Membership {
            org_id: org_id.to_string(),
            member_id: member_id.to_string(),
            role: role.to_string(),
            ..Self::default()
        }
    }
}
