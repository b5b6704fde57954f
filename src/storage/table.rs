// ABOUTME: Table: ordered shard list with tail routing and background rebuilds

use crate::error::ScmError;
use crate::value::Value;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::{error, info};

use super::column::Column;
use super::database::Database;
use super::shard::Shard;
use super::Dataset;

/// Shard row capacity; bounded shards keep a parallel full-table scan
/// responsive.
pub const MAX_SHARD_SIZE: usize = 65536;

pub struct Table {
    pub name: String,
    columns: RwLock<Vec<Column>>,
    shards: RwLock<Vec<Arc<Shard>>>,
    /// taken for column changes and tail rotation; plain appends only use
    /// the tail shard's own lock
    schema_lock: Mutex<()>,
    shard_capacity: usize,
    database: Weak<Database>,
}

impl Table {
    pub(super) fn new(name: &str, database: Weak<Database>, shard_capacity: usize) -> Arc<Table> {
        Arc::new(Table {
            name: name.to_string(),
            columns: RwLock::new(Vec::new()),
            shards: RwLock::new(vec![Shard::new([])]),
            schema_lock: Mutex::new(()),
            shard_capacity,
            database,
        })
    }

    /// Standalone table with a custom shard capacity, detached from any
    /// database; schema changes skip the save hook.
    pub fn with_shard_capacity(name: &str, shard_capacity: usize) -> Arc<Table> {
        Table::new(name, Weak::new(), shard_capacity)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .read()
            .expect("table lock")
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Consistent snapshot of the shard list
    pub fn shards_snapshot(&self) -> Vec<Arc<Shard>> {
        self.shards.read().expect("table lock").clone()
    }

    /// Total row count across all shards
    pub fn count(&self) -> usize {
        self.shards_snapshot().iter().map(|s| s.count()).sum()
    }

    fn tail_shard(&self) -> Arc<Shard> {
        let shards = self.shards.read().expect("table lock");
        shards[shards.len() - 1].clone()
    }

    /// Append one row to the tail shard, rotating to a fresh shard when the
    /// tail is full. The full shard is frozen, rebuilt in the background
    /// and its slot replaced atomically when the sealed version is ready.
    pub fn insert(self: &Arc<Self>, row: &Dataset) {
        loop {
            let tail = self.tail_shard();
            if tail.count() >= self.shard_capacity {
                self.rotate_tail();
                continue;
            }
            if tail.try_insert(row) {
                return;
            }
            // tail was frozen for rebuild under our feet; retry on the new one
        }
    }

    pub fn insert_all(self: &Arc<Self>, rows: &[Dataset]) {
        for row in rows {
            self.insert(row);
        }
    }

    fn rotate_tail(self: &Arc<Self>) {
        let _guard = self.schema_lock.lock().expect("schema lock");
        // re-check under the lock to avoid double rotation
        let (tail, index) = {
            let shards = self.shards.read().expect("table lock");
            (shards[shards.len() - 1].clone(), shards.len() - 1)
        };
        if tail.count() < self.shard_capacity || tail.is_sealed() {
            return;
        }
        tail.freeze();

        // rebuild the full shard in the background; the worker publishes
        // its replacement into the slot and persists the schema. A failed
        // rebuild leaves the open shard in place, all data still readable.
        let table = self.clone();
        let full = tail.clone();
        std::thread::spawn(move || {
            let sealed =
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| full.rebuild())) {
                    Ok(sealed) => sealed,
                    Err(_) => {
                        error!("rebuild of shard {index} in table {} failed", table.name);
                        return;
                    }
                };
            {
                let mut shards = table.shards.write().expect("table lock");
                if let Some(slot) = shards.get_mut(index) {
                    if Arc::ptr_eq(slot, &full) {
                        *slot = sealed;
                    }
                }
            }
            table.save();
            info!("sealed shard {index} of table {}", table.name);
        });

        let fresh = Shard::new(self.column_names());
        self.shards.write().expect("table lock").push(fresh);
        info!("started new shard for table {}", self.name);
        self.save();
    }

    /// Synchronously seal every populated open shard and leave a fresh open
    /// tail; used by the script-level rebuild operation and maintenance.
    pub fn seal_now(self: &Arc<Self>) {
        let _guard = self.schema_lock.lock().expect("schema lock");
        let snapshot = self.shards_snapshot();
        for (index, shard) in snapshot.iter().enumerate() {
            if shard.is_sealed() || shard.count() == 0 {
                continue;
            }
            shard.freeze();
            let sealed = shard.rebuild();
            let mut shards = self.shards.write().expect("table lock");
            if let Some(slot) = shards.get_mut(index) {
                if Arc::ptr_eq(slot, shard) {
                    *slot = sealed;
                }
            }
        }
        let tail_sealed = {
            let shards = self.shards.read().expect("table lock");
            shards[shards.len() - 1].is_sealed()
        };
        if tail_sealed {
            let fresh = Shard::new(self.column_names());
            self.shards.write().expect("table lock").push(fresh);
        }
        self.save();
    }

    /// Append a column definition and backfill a nil column of matching
    /// length into every shard
    pub fn create_column(
        &self,
        name: &str,
        typ: &str,
        typdimensions: Vec<usize>,
        extrainfo: &str,
    ) -> Result<(), ScmError> {
        let _guard = self.schema_lock.lock().expect("schema lock");
        {
            let mut columns = self.columns.write().expect("table lock");
            if columns.iter().any(|c| c.name == name) {
                return Err(ScmError::SchemaViolation(format!(
                    "column {name} already exists in table {}",
                    self.name
                )));
            }
            columns.push(Column {
                name: name.to_string(),
                typ: typ.to_string(),
                typdimensions,
                extrainfo: extrainfo.to_string(),
            });
        }
        for shard in self.shards_snapshot() {
            shard.add_column(name);
        }
        self.save();
        Ok(())
    }

    /// Column metadata as a value, for script-level introspection
    pub fn show_columns(&self) -> Value {
        let columns = self.columns.read().expect("table lock");
        Value::List(columns.iter().map(|c| c.show()).collect())
    }

    pub(super) fn columns_snapshot(&self) -> Vec<Column> {
        self.columns.read().expect("table lock").clone()
    }

    /// Fan a predicate scan out across all shards; the visitor receives
    /// per-shard row indices
    pub fn scan(&self, column: &str, predicate: &Value, visitor: &Value) -> Result<(), ScmError> {
        if !self
            .columns
            .read()
            .expect("table lock")
            .iter()
            .any(|c| c.name == column)
        {
            return Err(ScmError::NotFound(format!(
                "column {column} in table {}",
                self.name
            )));
        }
        for shard in self.shards_snapshot() {
            shard.scan(column, predicate, visitor)?;
        }
        Ok(())
    }

    fn save(&self) {
        if let Some(db) = self.database.upgrade() {
            db.save();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn row(n: f64) -> Dataset {
        let mut d = Dataset::new();
        d.push("n", Value::Number(n));
        d
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_rotation_produces_expected_shard_sizes() {
        let table = Table::with_shard_capacity("t", 4);
        table.create_column("n", "number", vec![], "").unwrap();
        for i in 0..10 {
            table.insert(&row(f64::from(i)));
        }
        let sizes: Vec<usize> = table.shards_snapshot().iter().map(|s| s.count()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(table.count(), 10);

        // the first two shards seal in the background
        wait_for(|| {
            table
                .shards_snapshot()
                .iter()
                .take(2)
                .all(|s| s.is_sealed())
        });
        let shards = table.shards_snapshot();
        assert!(!shards[2].is_sealed());
        // data survives sealing
        assert_eq!(shards[0].get_value("n", 3), Some(Value::Number(3.0)));
        assert_eq!(shards[2].get_value("n", 1), Some(Value::Number(9.0)));
    }

    #[test]
    fn test_concurrent_inserts_lose_nothing() {
        let table = Table::with_shard_capacity("t", 64);
        table.create_column("n", "number", vec![], "").unwrap();
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        table.insert(&row(f64::from(t * 1000 + i)));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().expect("insert thread");
        }
        assert_eq!(table.count(), 8 * 500);
    }

    #[test]
    fn test_seal_now_leaves_open_tail() {
        let table = Table::with_shard_capacity("t", 100);
        table.create_column("n", "number", vec![], "").unwrap();
        for i in 0..5 {
            table.insert(&row(f64::from(i)));
        }
        table.seal_now();
        let shards = table.shards_snapshot();
        assert!(shards[0].is_sealed());
        assert!(!shards[shards.len() - 1].is_sealed());
        assert_eq!(table.count(), 5);
        // inserts continue on the fresh tail
        table.insert(&row(99.0));
        assert_eq!(table.count(), 6);
    }

    #[test]
    fn test_create_column_backfills_existing_shards() {
        let table = Table::with_shard_capacity("t", 4);
        table.create_column("a", "number", vec![], "").unwrap();
        for i in 0..6 {
            table.insert(&row_with("a", f64::from(i)));
        }
        table.create_column("b", "string", vec![], "").unwrap();
        for shard in table.shards_snapshot() {
            if shard.count() > 0 {
                assert_eq!(shard.get_value("b", 0), Some(Value::Nil));
            }
        }
        assert!(matches!(
            table.create_column("b", "string", vec![], ""),
            Err(ScmError::SchemaViolation(_))
        ));
    }

    fn row_with(name: &str, n: f64) -> Dataset {
        let mut d = Dataset::new();
        d.push(name, Value::Number(n));
        d
    }

    #[test]
    fn test_scan_unknown_column() {
        let table = Table::with_shard_capacity("t", 4);
        let f = Value::Native(crate::value::NativeFn::new(|_| Ok(Value::Bool(true))));
        assert!(matches!(
            table.scan("ghost", &f, &f),
            Err(ScmError::NotFound(_))
        ));
    }
}
