//! serde-backed encode/decode between a model and a column-keyed record.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{FeedError, FeedResult};
use crate::record::Record;

use super::Feed;

/// The model's properties keyed by attribute name.
pub(crate) fn properties<M: Serialize>(model: &M) -> FeedResult<Map<String, Value>> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(map),
        other => Err(FeedError::Mapping(format!(
            "model must serialize to an object, got `{}`",
            other
        ))),
    }
}

pub(crate) fn encode<M: Feed>(model: &M) -> FeedResult<Record> {
    let properties = properties(model)?;
    Ok(M::property_mapper()
        .pairs()
        .map(|(property, column)| {
            (
                column.to_string(),
                properties.get(property).cloned().unwrap_or(Value::Null),
            )
        })
        .collect())
}

/// Overlay the mapped columns of `record` onto `model`. Columns that are
/// not mapped, properties absent from `record` and every unmapped field
/// (the `FeedBase` included) are left alone.
pub(crate) fn generate<M: Feed>(model: &mut M, record: &Record) -> FeedResult<()> {
    let mapper = M::property_mapper();
    let mut properties = properties(model)?;
    let mut touched = false;
    for (column, value) in record {
        if let Some(property) = mapper.property_of(column) {
            properties.insert(property.to_string(), value.clone());
            touched = true;
        }
    }
    if !touched {
        return Ok(());
    }

    let mut decoded: M = serde_json::from_value(Value::Object(properties))?;
    model.take_mapped(&mut decoded);
    Ok(())
}
