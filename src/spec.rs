//! Storage descriptors.
//!
//! A [`DbProtocol`] is what a model author writes; a [`DbSpec`] is the
//! normalized, validated form the mapping layer works with. Legacy key
//! shapes (a single column name or a list of names) are folded into one
//! ordered key list by [`PrimaryKey`].

use std::fmt;
use std::sync::Arc;

use crate::error::{FeedError, FeedResult};
use crate::executor::Database;

/// A primary key declaration in either of its historical shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// Key columns in declaration order.
    pub fn columns(&self) -> Vec<String> {
        match self {
            PrimaryKey::Single(key) => vec![key.clone()],
            PrimaryKey::Composite(keys) => keys.clone(),
        }
    }
}

impl From<&str> for PrimaryKey {
    fn from(key: &str) -> Self {
        PrimaryKey::Single(key.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(key: String) -> Self {
        PrimaryKey::Single(key)
    }
}

impl From<Vec<String>> for PrimaryKey {
    fn from(keys: Vec<String>) -> Self {
        PrimaryKey::Composite(keys)
    }
}

impl From<Vec<&str>> for PrimaryKey {
    fn from(keys: Vec<&str>) -> Self {
        PrimaryKey::Composite(keys.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PrimaryKey {
    fn from(keys: [&str; N]) -> Self {
        PrimaryKey::Composite(keys.iter().map(|k| k.to_string()).collect())
    }
}

/// Table metadata supplied by a model author.
pub trait DbProtocol: Send + Sync {
    fn database(&self) -> Arc<dyn Database>;

    fn table(&self) -> String;

    fn primary_key(&self) -> PrimaryKey;

    fn cols(&self) -> Vec<String>;

    fn insertable_cols(&self) -> Vec<String> {
        self.cols()
    }

    fn modifiable_cols(&self) -> Vec<String> {
        self.cols()
    }
}

/// Normalized storage descriptor.
#[derive(Clone)]
pub struct DbSpec {
    database: Arc<dyn Database>,
    table: String,
    primary_keys: Vec<String>,
    columns: Vec<String>,
    insertable_columns: Vec<String>,
    modifiable_columns: Vec<String>,
}

impl fmt::Debug for DbSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSpec")
            .field("table", &self.table)
            .field("primary_keys", &self.primary_keys)
            .field("columns", &self.columns)
            .field("insertable_columns", &self.insertable_columns)
            .field("modifiable_columns", &self.modifiable_columns)
            .finish()
    }
}

impl DbSpec {
    pub fn new(protocol: &dyn DbProtocol) -> FeedResult<Self> {
        let spec = DbSpec {
            database: protocol.database(),
            table: protocol.table(),
            primary_keys: protocol.primary_key().columns(),
            columns: protocol.cols(),
            insertable_columns: protocol.insertable_cols(),
            modifiable_columns: protocol.modifiable_cols(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Build a descriptor directly; every column is insertable and
    /// modifiable until narrowed with the `with_*` setters.
    pub fn for_table<K, I, S>(
        database: Arc<dyn Database>,
        table: impl Into<String>,
        primary_key: K,
        columns: I,
    ) -> FeedResult<Self>
    where
        K: Into<PrimaryKey>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let spec = DbSpec {
            database,
            table: table.into(),
            primary_keys: primary_key.into().columns(),
            insertable_columns: columns.clone(),
            modifiable_columns: columns.clone(),
            columns,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_insertable_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insertable_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_modifiable_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modifiable_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_table(&mut self, table: impl Into<String>) {
        self.table = table.into();
    }

    pub fn set_database(&mut self, database: Arc<dyn Database>) {
        self.database = database;
    }

    fn validate(&self) -> FeedResult<()> {
        if self.table.is_empty() {
            return Err(FeedError::InvalidSpec("table name is empty".into()));
        }
        if self.primary_keys.is_empty() {
            return Err(FeedError::InvalidSpec(format!(
                "table `{}` declares no primary key",
                self.table
            )));
        }
        for key in &self.primary_keys {
            if !self.columns.contains(key) {
                return Err(FeedError::InvalidSpec(format!(
                    "primary key `{}` is not a column of `{}`",
                    key, self.table
                )));
            }
        }
        Ok(())
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Key columns in declaration order.
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    /// The key column when the key is single, `None` when composite.
    pub fn primary_key(&self) -> Option<&str> {
        match self.primary_keys.as_slice() {
            [key] => Some(key.as_str()),
            _ => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.primary_keys.len() > 1
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn insertable_columns(&self) -> &[String] {
        &self.insertable_columns
    }

    pub fn modifiable_columns(&self) -> &[String] {
        &self.modifiable_columns
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|k| k == column)
    }
}
