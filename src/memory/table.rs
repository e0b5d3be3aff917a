//! Row storage shared by the live tables and transaction views.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

use crate::executor::{AddMode, ExecResult, ExecutorError};
use crate::filter::SortDirection;
use crate::record::{value_to_string, Record};
use crate::spec::DbSpec;

pub(crate) type Tables = HashMap<String, MemoryTable>;

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryTable {
    rows: Vec<Record>,
    last_id: u64,
}

/// A write as it was applied, replayable against another set of tables.
#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Insert {
        spec: DbSpec,
        row: Record,
        mode: AddMode,
    },
    Modify {
        spec: DbSpec,
        record: Record,
    },
    Remove {
        spec: DbSpec,
        record: Record,
    },
}

impl WriteOp {
    pub(crate) fn apply(&self, tables: &mut Tables) -> ExecResult<u64> {
        match self {
            WriteOp::Insert { spec, row, mode } => {
                table_mut(tables, spec).insert_row(spec, row.clone(), *mode).map(|(id, _)| id)
            }
            WriteOp::Modify { spec, record } => table_mut(tables, spec).modify(spec, record),
            WriteOp::Remove { spec, record } => table_mut(tables, spec).remove(spec, record),
        }
    }
}

pub(crate) fn table_mut<'a>(tables: &'a mut Tables, spec: &DbSpec) -> &'a mut MemoryTable {
    tables.entry(spec.table().to_string()).or_default()
}

/// Keep insertable columns, fill every other declared column with `null`.
pub(crate) fn prepare_insert(spec: &DbSpec, record: &Record) -> Record {
    let mut row = Record::new();
    for column in spec.columns() {
        row.insert(column.clone(), Value::Null);
    }
    for column in spec.insertable_columns() {
        if let Some(value) = record.get(column) {
            row.insert(column.clone(), value.clone());
        }
    }
    row
}

impl MemoryTable {
    /// Insert a prepared row. Returns the generated id (0 when none) and the
    /// row as stored, or `None` when a weak insert was ignored.
    pub(crate) fn insert_row(
        &mut self,
        spec: &DbSpec,
        mut row: Record,
        mode: AddMode,
    ) -> ExecResult<(u64, Option<Record>)> {
        let mut generated = 0;
        if let Some(key) = spec.primary_key() {
            match row.get(key) {
                None | Some(Value::Null) => {
                    self.last_id += 1;
                    generated = self.last_id;
                    row.insert(key.to_string(), Value::from(generated));
                }
                Some(value) => {
                    if let Some(explicit) = value.as_u64() {
                        self.last_id = self.last_id.max(explicit);
                    }
                }
            }
        }

        let keys = key_values(spec, &row)?;
        if let Some(index) = self.position_of(&keys) {
            match mode {
                AddMode::Normal => {
                    return Err(ExecutorError::Duplicate {
                        table: spec.table().to_string(),
                        key: keys
                            .iter()
                            .map(|(_, v)| value_to_string(v))
                            .collect::<Vec<_>>()
                            .join(","),
                    })
                }
                AddMode::Weak => return Ok((0, None)),
                AddMode::Strong => {
                    self.rows[index] = row.clone();
                    return Ok((generated, Some(row)));
                }
            }
        }

        self.rows.push(row.clone());
        Ok((generated, Some(row)))
    }

    pub(crate) fn modify(&mut self, spec: &DbSpec, record: &Record) -> ExecResult<u64> {
        let keys = key_values(spec, record)?;
        let mut affected = 0;
        for row in self.rows.iter_mut().filter(|row| matches_keys(row, &keys)) {
            for column in spec.modifiable_columns() {
                if spec.is_primary_key(column) {
                    continue;
                }
                if let Some(value) = record.get(column) {
                    row.insert(column.clone(), value.clone());
                }
            }
            affected += 1;
        }
        Ok(affected)
    }

    pub(crate) fn remove(&mut self, spec: &DbSpec, record: &Record) -> ExecResult<u64> {
        let keys = key_values(spec, record)?;
        let before = self.rows.len();
        self.rows.retain(|row| !matches_keys(row, &keys));
        Ok((before - self.rows.len()) as u64)
    }

    pub(crate) fn select(&self, query: &Selection) -> (Vec<Record>, u64) {
        let mut rows: Vec<&Record> = self
            .rows
            .iter()
            .filter(|row| {
                query
                    .conditions
                    .iter()
                    .all(|(column, value)| row.get(column).is_some_and(|v| loose_eq(v, value)))
            })
            .collect();
        let total = rows.len() as u64;

        if !query.order.is_empty() {
            rows.sort_by(|a, b| {
                for (column, direction) in &query.order {
                    let null = Value::Null;
                    let ordering = compare_values(
                        a.get(column).unwrap_or(&null),
                        b.get(column).unwrap_or(&null),
                    );
                    let ordering = match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let (skip, take) = query.limit.unwrap_or((0, usize::MAX));
        let projected = rows
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| {
                if query.columns.is_empty() {
                    return row.clone();
                }
                query
                    .columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();

        (projected, total)
    }

    fn position_of(&self, keys: &[(String, Value)]) -> Option<usize> {
        self.rows.iter().position(|row| matches_keys(row, keys))
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }
}

/// The query shape the memory executor evaluates.
#[derive(Debug, Clone, Default)]
pub(crate) struct Selection {
    pub(crate) columns: Vec<String>,
    pub(crate) conditions: Vec<(String, Value)>,
    pub(crate) order: Vec<(String, SortDirection)>,
    pub(crate) limit: Option<(usize, usize)>,
}

fn key_values(spec: &DbSpec, record: &Record) -> ExecResult<Vec<(String, Value)>> {
    spec.primary_keys()
        .iter()
        .map(|key| match record.get(key) {
            Some(value) if !value.is_null() => Ok((key.clone(), value.clone())),
            _ => Err(ExecutorError::MissingKey {
                table: spec.table().to_string(),
                column: key.clone(),
            }),
        })
        .collect()
}

fn matches_keys(row: &Record, keys: &[(String, Value)]) -> bool {
    keys.iter()
        .all(|(column, value)| row.get(column).is_some_and(|v| loose_eq(v, value)))
}

/// SQL-ish equality: numbers compare numerically, and a numeric string
/// equals the number it spells.
fn loose_eq(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        (a, b) => a == b,
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}
