//! Record store backed by a realtime-database JSON export.
//!
//! The export is one object with a key per table. A table is either an
//! object keyed by id or a list whose positions are the ids (deleted rows
//! show up as `null`).

use super::{scalar_to_string, EntityKind, RawRecord, RecordStore};
use insight_core::{AppError, AppResult};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default)]
struct Table {
    entries: Vec<(String, Value)>,
    /// key field value -> position in `entries`
    by_key: HashMap<String, usize>,
}

impl Table {
    fn from_value(entity: EntityKind, value: &Value) -> AppResult<Self> {
        let entries: Vec<(String, Value)> = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.is_null())
                .map(|(idx, item)| (idx.to_string(), item.clone()))
                .collect(),
            Value::Object(map) => map
                .iter()
                .filter(|(_, item)| !item.is_null())
                .map(|(key, item)| (key.clone(), item.clone()))
                .collect(),
            other => {
                return Err(AppError::Records(format!(
                    "Table {} is neither a list nor an object: {}",
                    entity.table(),
                    type_name(other)
                )))
            }
        };

        let mut by_key = HashMap::new();
        if let Some(field) = entity.key_field() {
            for (pos, (id, item)) in entries.iter().enumerate() {
                let key = item
                    .get(field)
                    .and_then(scalar_to_string)
                    .unwrap_or_else(|| id.clone());
                by_key.entry(key).or_insert(pos);
            }
        }

        Ok(Self { entries, by_key })
    }
}

/// Read-only store over an exported JSON snapshot.
#[derive(Debug)]
pub struct JsonRecordStore {
    source: String,
    tables: HashMap<EntityKind, Table>,
}

impl JsonRecordStore {
    /// Load an export from disk.
    pub fn open(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Records(format!("Failed to read record export {:?}: {}", path, e))
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|e| {
            AppError::Records(format!("Failed to parse record export {:?}: {}", path, e))
        })?;

        Self::from_value(path.display().to_string(), &value)
    }

    /// Build a store from an already parsed export.
    pub fn from_value(source: impl Into<String>, export: &Value) -> AppResult<Self> {
        let root = export.as_object().ok_or_else(|| {
            AppError::Records("Record export must be a JSON object of tables".to_string())
        })?;

        let mut tables = HashMap::new();
        for entity in EntityKind::ALL {
            let table = match root.get(entity.table()) {
                Some(value) => Table::from_value(entity, value)?,
                None => {
                    tracing::debug!("Record export has no {} table", entity.table());
                    Table::default()
                }
            };
            tables.insert(entity, table);
        }

        let source = source.into();
        tracing::info!(
            source = %source,
            feedback_logs = tables
                .get(&EntityKind::FeedbackLog)
                .map(|t| t.entries.len())
                .unwrap_or(0),
            "Loaded record export"
        );

        Ok(Self { source, tables })
    }

    /// A store with no tables, for workspaces without an export yet.
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tables: HashMap::new(),
        }
    }
}

#[async_trait::async_trait]
impl RecordStore for JsonRecordStore {
    fn name(&self) -> &str {
        &self.source
    }

    async fn fetch_all(&self, entity: EntityKind) -> AppResult<Vec<(String, Value)>> {
        Ok(self
            .tables
            .get(&entity)
            .map(|table| table.entries.clone())
            .unwrap_or_default())
    }

    async fn find_by_key(&self, entity: EntityKind, key: &str) -> AppResult<Option<RawRecord>> {
        if entity.key_field().is_none() {
            return Err(AppError::Records(format!(
                "{} does not support key lookups",
                entity.table()
            )));
        }

        let Some(table) = self.tables.get(&entity) else {
            return Ok(None);
        };

        let found = table
            .by_key
            .get(key)
            .and_then(|pos| table.entries.get(*pos))
            .map(|(_, value)| value);

        match found {
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(other) => Err(AppError::Records(format!(
                "{} '{}' is {}, expected an object",
                entity.table(),
                key,
                type_name(other)
            ))),
            None => Ok(None),
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
