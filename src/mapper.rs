//! Attribute ↔ column table.

use std::collections::HashMap;

use crate::error::{FeedError, FeedResult};

/// Bidirectional, injective mapping between model attributes and storage
/// columns. Built once per model type and queried by direct lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMapper {
    // Declaration order, used wherever iteration order must be stable.
    pairs: Vec<(String, String)>,
    to_column: HashMap<String, String>,
    to_property: HashMap<String, String>,
}

impl PropertyMapper {
    /// Build a mapper from `(property, column)` pairs.
    ///
    /// # Panics
    ///
    /// Panics when a property or column appears twice. Use
    /// [`PropertyMapper::try_new`] to get an error instead.
    pub fn new<I, P, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        match Self::try_new(pairs) {
            Ok(mapper) => mapper,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_new<I, P, C>(pairs: I) -> FeedResult<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let mut mapper = PropertyMapper {
            pairs: Vec::new(),
            to_column: HashMap::new(),
            to_property: HashMap::new(),
        };

        for (property, column) in pairs {
            let property = property.into();
            let column = column.into();
            if mapper.to_column.contains_key(&property) {
                return Err(FeedError::Mapping(format!(
                    "property `{}` is mapped twice",
                    property
                )));
            }
            if let Some(existing) = mapper.to_property.get(&column) {
                return Err(FeedError::Mapping(format!(
                    "column `{}` is claimed by both `{}` and `{}`",
                    column, existing, property
                )));
            }
            mapper.to_column.insert(property.clone(), column.clone());
            mapper.to_property.insert(column.clone(), property.clone());
            mapper.pairs.push((property, column));
        }

        Ok(mapper)
    }

    pub fn column_of(&self, property: &str) -> Option<&str> {
        self.to_column.get(property).map(String::as_str)
    }

    pub fn property_of(&self, column: &str) -> Option<&str> {
        self.to_property.get(column).map(String::as_str)
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.to_column.contains_key(property)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.to_property.contains_key(column)
    }

    /// `(property, column)` pairs in declaration order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, c)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
