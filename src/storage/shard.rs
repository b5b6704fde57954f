// ABOUTME: Two-phase shard: open append buffers, rebuilt into sealed compressed columns

use crate::error::ScmError;
use crate::eval;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use super::store::{self, ColumnStorage};
use super::Dataset;

enum ShardColumn {
    /// open append buffer
    Buffer(Vec<Value>),
    /// compressed storage built by a rebuild
    Built(Box<dyn ColumnStorage>),
}

/// A bounded row container holding one storage per column. Open shards take
/// appends under their column lock; a rebuild snapshots the columns and
/// produces a new sealed shard that replaces this one in the table's shard
/// list. Sealed shards are read-only.
pub struct Shard {
    columns: RwLock<HashMap<String, ShardColumn>>,
    rows: AtomicUsize,
    sealed: bool,
    /// set at tail rotation so stragglers never append to a shard whose
    /// rebuild has been scheduled
    frozen: AtomicBool,
}

impl Shard {
    pub fn new(column_names: impl IntoIterator<Item = String>) -> Arc<Shard> {
        let columns = column_names
            .into_iter()
            .map(|name| (name, ShardColumn::Buffer(Vec::new())))
            .collect();
        Arc::new(Shard {
            columns: RwLock::new(columns),
            rows: AtomicUsize::new(0),
            sealed: false,
            frozen: AtomicBool::new(false),
        })
    }

    pub fn count(&self) -> usize {
        self.rows.load(Ordering::Acquire)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Append one row: known columns by name, unmapped columns get nil.
    /// Returns false when the shard no longer accepts writes (sealed or
    /// frozen for rebuild); the caller retries against the new tail.
    pub fn try_insert(&self, row: &Dataset) -> bool {
        if self.sealed {
            return false;
        }
        let mut columns = self.columns.write().expect("shard lock");
        if self.frozen.load(Ordering::Acquire) {
            return false;
        }
        for (name, column) in columns.iter_mut() {
            if let ShardColumn::Buffer(values) = column {
                values.push(row.get(name).cloned().unwrap_or(Value::Nil));
            }
        }
        self.rows.fetch_add(1, Ordering::Release);
        true
    }

    /// Install a nil-filled append buffer for a new schema column
    pub fn add_column(&self, name: &str) {
        let n = self.count();
        let mut columns = self.columns.write().expect("shard lock");
        columns
            .entry(name.to_string())
            .or_insert_with(|| ShardColumn::Buffer(vec![Value::Nil; n]));
    }

    pub fn get_value(&self, column: &str, i: usize) -> Option<Value> {
        if i >= self.count() {
            return None;
        }
        let columns = self.columns.read().expect("shard lock");
        match columns.get(column)? {
            ShardColumn::Buffer(values) => Some(values.get(i).cloned().unwrap_or(Value::Nil)),
            ShardColumn::Built(storage) => Some(storage.get_value(i)),
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.read().expect("shard lock").contains_key(column)
    }

    /// Visit the indices of all rows where the predicate holds on the
    /// column value
    pub fn scan(&self, column: &str, predicate: &Value, visitor: &Value) -> Result<(), ScmError> {
        if !self.has_column(column) {
            return Err(ScmError::NotFound(format!("column {column}")));
        }
        for i in 0..self.count() {
            let value = self.get_value(column, i).unwrap_or(Value::Nil);
            if eval::apply(predicate, &[value])?.is_truthy() {
                eval::apply(visitor, &[Value::Number(i as f64)])?;
            }
        }
        Ok(())
    }

    /// Single-pass construction of the sealed equivalent of this shard.
    /// Runs off the write path; the caller publishes the result into the
    /// table's shard list.
    pub fn rebuild(&self) -> Arc<Shard> {
        let n = self.count();
        let snapshot: Vec<(String, Vec<Value>)> = {
            let columns = self.columns.read().expect("shard lock");
            columns
                .iter()
                .map(|(name, column)| {
                    let values = match column {
                        ShardColumn::Buffer(values) => values[..n.min(values.len())].to_vec(),
                        ShardColumn::Built(storage) => (0..n).map(|i| storage.get_value(i)).collect(),
                    };
                    (name.clone(), values)
                })
                .collect()
        };
        let built = snapshot
            .into_iter()
            .map(|(name, values)| (name, ShardColumn::Built(store::compress(&values))))
            .collect();
        Arc::new(Shard {
            columns: RwLock::new(built),
            rows: AtomicUsize::new(n),
            sealed: true,
            frozen: AtomicBool::new(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NativeFn;
    use std::sync::Mutex;

    fn row(pairs: &[(&str, Value)]) -> Dataset {
        let mut d = Dataset::new();
        for (name, value) in pairs {
            d.push(name, value.clone());
        }
        d
    }

    #[test]
    fn test_insert_and_read() {
        let shard = Shard::new(["id".to_string(), "name".to_string()]);
        assert!(shard.try_insert(&row(&[
            ("id", Value::Number(1.0)),
            ("name", Value::string("a"))
        ])));
        assert!(shard.try_insert(&row(&[("id", Value::Number(2.0))])));

        assert_eq!(shard.count(), 2);
        assert_eq!(shard.get_value("id", 0), Some(Value::Number(1.0)));
        // unmapped column received nil
        assert_eq!(shard.get_value("name", 1), Some(Value::Nil));
        // unknown rows and columns
        assert_eq!(shard.get_value("id", 2), None);
        assert_eq!(shard.get_value("nope", 0), None);
    }

    #[test]
    fn test_row_count_equals_column_lengths() {
        let shard = Shard::new(["a".to_string(), "b".to_string()]);
        for i in 0..10 {
            shard.try_insert(&row(&[("a", Value::Number(f64::from(i)))]));
        }
        let columns = shard.columns.read().unwrap();
        for column in columns.values() {
            match column {
                ShardColumn::Buffer(values) => assert_eq!(values.len(), shard.count()),
                ShardColumn::Built(_) => panic!("open shard has buffers"),
            }
        }
    }

    #[test]
    fn test_frozen_shard_rejects_inserts() {
        let shard = Shard::new(["a".to_string()]);
        shard.freeze();
        assert!(!shard.try_insert(&row(&[("a", Value::Number(1.0))])));
        assert_eq!(shard.count(), 0);
    }

    #[test]
    fn test_rebuild_seals_and_preserves_values() {
        let shard = Shard::new(["id".to_string(), "tag".to_string()]);
        for i in 0..50 {
            shard.try_insert(&row(&[
                ("id", Value::Number(f64::from(i))),
                ("tag", Value::string(if i % 2 == 0 { "even" } else { "odd" })),
            ]));
        }
        let sealed = shard.rebuild();
        assert!(sealed.is_sealed());
        assert_eq!(sealed.count(), 50);
        for i in 0..50 {
            assert_eq!(
                sealed.get_value("id", i),
                Some(Value::Number(i as f64)),
            );
        }
        assert_eq!(sealed.get_value("tag", 1), Some(Value::string("odd")));
        // sealed shards reject writes
        assert!(!sealed.try_insert(&row(&[("id", Value::Number(99.0))])));
    }

    #[test]
    fn test_sealed_reads_are_stable() {
        let shard = Shard::new(["v".to_string()]);
        for i in 0..20 {
            shard.try_insert(&row(&[("v", Value::Number(f64::from(i * 7)))]));
        }
        let sealed = shard.rebuild();
        let first: Vec<_> = (0..20).map(|i| sealed.get_value("v", i)).collect();
        let second: Vec<_> = (0..20).map(|i| sealed.get_value("v", i)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_add_column_backfills_nil() {
        let shard = Shard::new(["a".to_string()]);
        for _ in 0..3 {
            shard.try_insert(&row(&[("a", Value::Number(1.0))]));
        }
        shard.add_column("b");
        assert_eq!(shard.get_value("b", 2), Some(Value::Nil));
    }

    #[test]
    fn test_scan_visits_matching_rows() {
        let shard = Shard::new(["n".to_string()]);
        for i in 0..10 {
            shard.try_insert(&row(&[("n", Value::Number(f64::from(i)))]));
        }
        let predicate = Value::Native(NativeFn::new(|args| {
            Ok(Value::Bool(matches!(args[0].stripped(), Value::Number(n) if *n >= 7.0)))
        }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let visitor = Value::Native(NativeFn::new(move |args| {
            sink.lock().expect("sink").push(args[0].clone());
            Ok(Value::Nil)
        }));
        shard.scan("n", &predicate, &visitor).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Value::Number(7.0),
                Value::Number(8.0),
                Value::Number(9.0)
            ]
        );
    }

    #[test]
    fn test_scan_unknown_column() {
        let shard = Shard::new(["a".to_string()]);
        let f = Value::Native(NativeFn::new(|_| Ok(Value::Bool(true))));
        assert!(matches!(
            shard.scan("missing", &f, &f),
            Err(ScmError::NotFound(_))
        ));
    }
}
