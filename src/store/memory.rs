use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::store::{row_matches, Store, Table};

/// In-memory store. Backing implementation for tests and for embedders
/// that bring no external database.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Table, Vec<Value>>>> {
        self.tables
            .lock()
            .map_err(|e| Error::Persistence(format!("store lock poisoned: {e}")))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, table: Table, row: Value) -> Result<Value> {
        if !row.is_object() && !row.is_array() {
            return Err(Error::Persistence(format!(
                "insert into {} expects an object or array of objects",
                table.name()
            )));
        }
        let mut tables = self.lock()?;
        let rows = tables.entry(table).or_default();
        match &row {
            Value::Array(batch) => rows.extend(batch.iter().cloned()),
            single => rows.push(single.clone()),
        }
        Ok(row)
    }

    async fn select(&self, table: Table, filters: Value) -> Result<Vec<Value>> {
        let tables = self.lock()?;
        Ok(tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| row_matches(r, &filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, table: Table, patch: Value, filters: Value) -> Result<Vec<Value>> {
        let patch_map = patch
            .as_object()
            .ok_or_else(|| Error::Persistence("update patch must be an object".to_string()))?;

        let mut tables = self.lock()?;
        let rows = tables.entry(table).or_default();
        let mut touched = Vec::new();
        for row in rows.iter_mut() {
            if row_matches(row, &filters) {
                if let Some(obj) = row.as_object_mut() {
                    for (k, v) in patch_map {
                        obj.insert(k.clone(), v.clone());
                    }
                }
                touched.push(row.clone());
            }
        }
        Ok(touched)
    }

    async fn delete(&self, table: Table, filters: Value) -> Result<Vec<Value>> {
        let mut tables = self.lock()?;
        let rows = tables.entry(table).or_default();
        let mut removed = Vec::new();
        rows.retain(|row| {
            if row_matches(row, &filters) {
                removed.push(row.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn upsert(&self, table: Table, row: Value, conflict_key: &str) -> Result<Value> {
        let key_value = row.get(conflict_key).cloned().ok_or_else(|| {
            Error::Persistence(format!(
                "upsert into {} requires field {}",
                table.name(),
                conflict_key
            ))
        })?;

        let mut tables = self.lock()?;
        let rows = tables.entry(table).or_default();
        if let Some(existing) = rows
            .iter_mut()
            .find(|r| r.get(conflict_key) == Some(&key_value))
        {
            *existing = row.clone();
        } else {
            rows.push(row.clone());
        }
        Ok(row)
    }
}
