// ABOUTME: Column metadata: name, declared type, dimensions and extra attributes

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Schema entry for one table column. Dimensions carry parameters such as
/// DECIMAL(10,3) precision/scale or VARCHAR(5) length; extrainfo carries
/// flags like NOT NULL or AUTO_INCREMENT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub typ: String,
    pub typdimensions: Vec<usize>,
    pub extrainfo: String,
}

impl Column {
    /// Render the metadata as an assoc list for script-level introspection
    pub fn show(&self) -> Value {
        let dims = self
            .typdimensions
            .iter()
            .map(|d| Value::Number(*d as f64))
            .collect();
        Value::List(vec![
            Value::string("name"),
            Value::string(self.name.as_str()),
            Value::string("type"),
            Value::string(self.typ.as_str()),
            Value::string("dimensions"),
            Value::List(dims),
        ])
    }
}
