// ABOUTME: Dictionary-encoded string column: packed byte buffer plus offset columns

use crate::value::Value;
use std::collections::HashMap;

use super::store::ColumnStorage;
use super::store_int::StorageInt;

/// Each distinct string is written once into a packed dictionary buffer;
/// rows store start/end offsets in two bit-packed integer columns. The scan
/// deduplicates through a reverse map from string to offset.
#[derive(Default)]
pub struct StorageString {
    dictionary: String,
    starts: StorageInt,
    ends: StorageInt,
    // scan scratch
    builder: String,
    reverse: HashMap<String, u64>,
}

/// Non-strings never arrive through rebuild (a column containing them stays
/// a raw vector); mapped to the empty string to keep the kind total.
fn as_text(value: &Value) -> &str {
    match value.stripped() {
        Value::Str(s) => s,
        _ => "",
    }
}

impl StorageString {
    /// Packed dictionary size in bytes
    pub fn dictionary_len(&self) -> usize {
        self.dictionary.len()
    }
}

impl ColumnStorage for StorageString {
    fn prepare(&mut self) {
        self.starts.prepare();
        self.ends.prepare();
        self.builder.clear();
        self.reverse = HashMap::new();
    }

    fn scan(&mut self, i: usize, value: &Value) {
        let text = as_text(value);
        let start = match self.reverse.get(text) {
            Some(start) => *start,
            None => {
                let start = self.builder.len() as u64;
                self.builder.push_str(text);
                self.reverse.insert(text.to_string(), start);
                start
            }
        };
        self.starts.scan(i, &Value::Number(start as f64));
        self.ends
            .scan(i, &Value::Number((start + text.len() as u64) as f64));
    }

    fn propose_compression(&self) -> Option<Box<dyn ColumnStorage>> {
        // one pass of compression only
        None
    }

    fn init(&mut self, n: usize) {
        self.dictionary = std::mem::take(&mut self.builder);
        self.starts.init(n);
        self.ends.init(n);
    }

    fn build(&mut self, i: usize, value: &Value) {
        let text = as_text(value);
        let start = self.reverse.get(text).copied().unwrap_or(0);
        self.starts.build(i, &Value::Number(start as f64));
        self.ends
            .build(i, &Value::Number((start + text.len() as u64) as f64));
    }

    fn finish(&mut self) {
        self.reverse = HashMap::new();
        self.starts.finish();
        self.ends.finish();
    }

    fn get_value(&self, i: usize) -> Value {
        let start = self.starts.get_u64(i) as usize;
        let end = self.ends.get_u64(i) as usize;
        match self.dictionary.get(start..end) {
            Some(slice) => Value::string(slice),
            None => Value::Nil,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(values: &[&str]) -> StorageString {
        let column: Vec<Value> = values.iter().map(|s| Value::string(*s)).collect();
        let mut s = StorageString::default();
        s.prepare();
        for (i, v) in column.iter().enumerate() {
            s.scan(i, v);
        }
        s.init(column.len());
        for (i, v) in column.iter().enumerate() {
            s.build(i, v);
        }
        s.finish();
        s
    }

    #[test]
    fn test_round_trip() {
        let values = ["red", "green", "blue", "green", "red"];
        let s = build(&values);
        for (i, v) in values.iter().enumerate() {
            assert_eq!(s.get_value(i), Value::string(*v));
        }
    }

    #[test]
    fn test_dictionary_stores_each_distinct_string_once() {
        // 1000 rows, 3 distinct values
        let values: Vec<&str> = (0..1000)
            .map(|i| match i % 3 {
                0 => "alpha",
                1 => "beta",
                _ => "gamma",
            })
            .collect();
        let s = build(&values);
        assert_eq!(
            s.dictionary_len(),
            "alpha".len() + "beta".len() + "gamma".len()
        );
        assert_eq!(s.get_value(999), Value::string("alpha"));
    }

    #[test]
    fn test_empty_strings() {
        let s = build(&["", "x", ""]);
        assert_eq!(s.get_value(0), Value::string(""));
        assert_eq!(s.get_value(1), Value::string("x"));
        assert_eq!(s.get_value(2), Value::string(""));
    }

    #[test]
    fn test_scratch_state_released_after_finish() {
        let s = build(&["a", "b"]);
        assert!(s.reverse.is_empty());
        assert!(s.builder.is_empty());
    }
}
