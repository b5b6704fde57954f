// ABOUTME: Raw value-vector column storage, the starting point of every rebuild

use crate::value::Value;

use super::store::ColumnStorage;
use super::store_int::StorageInt;
use super::store_string::StorageString;

/// Direct storage of values. Its scan learns the value domain and proposes
/// an integer or string storage when the whole column fits one; columns with
/// nils or mixed kinds stay raw, so nulls never reach the compressed kinds.
#[derive(Default)]
pub struct StorageValues {
    values: Vec<Value>,
    scanned: usize,
    all_int: bool,
    all_string: bool,
}

pub(super) fn as_packed_int(value: &Value) -> Option<i64> {
    match value.stripped() {
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e15 => Some(*n as i64),
        _ => None,
    }
}

impl ColumnStorage for StorageValues {
    fn prepare(&mut self) {
        self.scanned = 0;
        self.all_int = true;
        self.all_string = true;
    }

    fn scan(&mut self, _i: usize, value: &Value) {
        self.scanned += 1;
        match value.stripped() {
            Value::Number(_) => {
                self.all_string = false;
                if as_packed_int(value).is_none() {
                    self.all_int = false;
                }
            }
            Value::Str(_) => self.all_int = false,
            _ => {
                self.all_int = false;
                self.all_string = false;
            }
        }
    }

    fn propose_compression(&self) -> Option<Box<dyn ColumnStorage>> {
        if self.scanned == 0 {
            return None;
        }
        if self.all_int {
            return Some(Box::<StorageInt>::default());
        }
        if self.all_string {
            return Some(Box::<StorageString>::default());
        }
        None
    }

    fn init(&mut self, n: usize) {
        self.values = vec![Value::Nil; n];
    }

    fn build(&mut self, i: usize, value: &Value) {
        if let Some(slot) = self.values.get_mut(i) {
            *slot = value.stripped().clone();
        }
    }

    fn finish(&mut self) {
        self.scanned = 0;
    }

    fn get_value(&self, i: usize) -> Value {
        self.values.get(i).cloned().unwrap_or(Value::Nil)
    }
}
