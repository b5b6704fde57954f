// ABOUTME: Named table collection with a JSON schema snapshot save hook

use crate::error::ScmError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

use super::column::Column;
use super::table::{Table, MAX_SHARD_SIZE};

pub struct Database {
    pub name: String,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

#[derive(Serialize)]
struct TableSnapshot {
    name: String,
    columns: Vec<Column>,
    shard_rows: Vec<usize>,
}

#[derive(Serialize)]
struct SchemaSnapshot {
    database: String,
    tables: Vec<TableSnapshot>,
}

impl Database {
    pub fn new(name: &str) -> Arc<Database> {
        Arc::new(Database {
            name: name.to_string(),
            tables: RwLock::new(HashMap::new()),
        })
    }

    pub fn create_table(self: &Arc<Self>, name: &str) -> Result<Arc<Table>, ScmError> {
        let table = {
            let mut tables = self.tables.write().expect("db lock");
            if tables.contains_key(name) {
                return Err(ScmError::SchemaViolation(format!(
                    "table {name} already exists in database {}",
                    self.name
                )));
            }
            let table = Table::new(name, Arc::downgrade(self), MAX_SHARD_SIZE);
            tables.insert(name.to_string(), table.clone());
            table
        };
        self.save();
        Ok(table)
    }

    pub fn drop_table(&self, name: &str) -> Result<(), ScmError> {
        let removed = self.tables.write().expect("db lock").remove(name);
        match removed {
            Some(_) => {
                self.save();
                Ok(())
            }
            None => Err(ScmError::NotFound(format!(
                "table {name} in database {}",
                self.name
            ))),
        }
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().expect("db lock").get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().expect("db lock").keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot the schema as JSON into the configured data directory.
    /// Without a directory this is a no-op; failures are logged, never
    /// propagated into the write path.
    pub fn save(&self) {
        let Some(dir) = super::save_dir() else {
            return;
        };
        let tables = {
            let tables = self.tables.read().expect("db lock");
            tables
                .values()
                .map(|t| TableSnapshot {
                    name: t.name.clone(),
                    columns: t.columns_snapshot(),
                    shard_rows: t.shards_snapshot().iter().map(|s| s.count()).collect(),
                })
                .collect()
        };
        let snapshot = SchemaSnapshot {
            database: self.name.clone(),
            tables,
        };
        let path = dir.join(format!("{}.json", self.name));
        let result = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!("saving schema of {} failed: {e}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_create_and_drop_table() {
        let db = Database::new("testdb");
        let t = db.create_table("users").unwrap();
        assert_eq!(t.name, "users");
        assert!(db.get_table("users").is_some());
        assert!(matches!(
            db.create_table("users"),
            Err(ScmError::SchemaViolation(_))
        ));
        db.drop_table("users").unwrap();
        assert!(db.get_table("users").is_none());
        assert!(matches!(
            db.drop_table("users"),
            Err(ScmError::NotFound(_))
        ));
    }

    #[test]
    #[serial]
    fn test_save_writes_schema_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        super::super::set_save_dir(Some(dir.path().to_path_buf()));

        let db = Database::new("snapdb");
        let t = db.create_table("events").unwrap();
        t.create_column("id", "number", vec![], "").unwrap();

        let path = dir.path().join("snapdb.json");
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["database"], "snapdb");
        assert_eq!(json["tables"][0]["name"], "events");
        assert_eq!(json["tables"][0]["columns"][0]["name"], "id");

        super::super::set_save_dir(None);
    }
}
