// ABOUTME: Column storage lifecycle trait and the rebuild-time compression negotiation

use crate::value::Value;

use super::store_values::StorageValues;

/// Upper bound on compression proposals per column; the surviving kind after
/// the last round is built as-is.
pub const MAX_PROPOSAL_ROUNDS: usize = 2;

/// One concrete column representation. Rebuild drives the lifecycle in this
/// exact order: prepare, scan every row, propose_compression (restarting
/// from prepare when a different kind is proposed), init, build every row,
/// finish.
pub trait ColumnStorage: Send + Sync {
    /// Initialize scan state
    fn prepare(&mut self);

    /// Learn metadata about row i without storing data
    fn scan(&mut self, i: usize, value: &Value);

    /// A better-fitting kind to replace this one, or None to keep it
    fn propose_compression(&self) -> Option<Box<dyn ColumnStorage>>;

    /// Allocate final capacity for n rows
    fn init(&mut self, n: usize);

    /// Write row i
    fn build(&mut self, i: usize, value: &Value);

    /// Release scratch state
    fn finish(&mut self);

    /// Value at row i
    fn get_value(&self, i: usize) -> Value;
}

/// Build the best-fitting storage for a column snapshot. Starts from the
/// raw value vector and follows at most [MAX_PROPOSAL_ROUNDS] proposals.
pub fn compress(values: &[Value]) -> Box<dyn ColumnStorage> {
    let mut storage: Box<dyn ColumnStorage> = Box::<StorageValues>::default();
    let mut proposals = 0;
    loop {
        storage.prepare();
        for (i, value) in values.iter().enumerate() {
            storage.scan(i, value);
        }
        if proposals >= MAX_PROPOSAL_ROUNDS {
            break;
        }
        match storage.propose_compression() {
            Some(next) => {
                storage = next;
                proposals += 1;
            }
            None => break,
        }
    }
    storage.init(values.len());
    for (i, value) in values.iter().enumerate() {
        storage.build(i, value);
    }
    storage.finish();
    storage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_round_trips_mixed_values() {
        let values = vec![
            Value::Number(1.5),
            Value::string("x"),
            Value::Nil,
            Value::Bool(true),
        ];
        let storage = compress(&values);
        for (i, v) in values.iter().enumerate() {
            assert_eq!(&storage.get_value(i), v);
        }
    }

    #[test]
    fn test_compress_integers_and_strings() {
        let ints: Vec<Value> = (0..100).map(|i| Value::Number(f64::from(i * 3))).collect();
        let storage = compress(&ints);
        assert_eq!(storage.get_value(99), Value::Number(297.0));

        let strings: Vec<Value> = (0..10)
            .map(|i| Value::string(if i % 2 == 0 { "even" } else { "odd" }))
            .collect();
        let storage = compress(&strings);
        assert_eq!(storage.get_value(0), Value::string("even"));
        assert_eq!(storage.get_value(1), Value::string("odd"));
    }

    #[test]
    fn test_compress_empty_column() {
        let storage = compress(&[]);
        assert_eq!(storage.get_value(0), Value::Nil);
    }
}
