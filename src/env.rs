// ABOUTME: Environment module for lexical scopes shared across request threads

use crate::value::{Symbol, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A lexical scope frame. The root environment is shared by every request
/// thread, so bindings sit behind a RwLock; writes only happen during
/// bootstrap and `define`, reads dominate.
#[derive(Debug)]
pub struct Environment {
    bindings: RwLock<HashMap<Symbol, Value>>,
    outer: Option<Arc<Environment>>,
    /// When set, `define` hoists new bindings to the root environment.
    /// Used by the bootstrap/IO env so library scripts register globally.
    hoist_defines: bool,
}

impl Environment {
    /// Creates a new root environment with no parent
    pub fn new() -> Arc<Self> {
        Arc::new(Environment {
            bindings: RwLock::new(HashMap::new()),
            outer: None,
            hoist_defines: false,
        })
    }

    /// Creates a new child environment with a parent
    pub fn with_parent(parent: Arc<Environment>) -> Arc<Self> {
        Arc::new(Environment {
            bindings: RwLock::new(HashMap::new()),
            outer: Some(parent),
            hoist_defines: false,
        })
    }

    /// Child environment whose top-level defines land in the root
    pub fn hoisting(parent: Arc<Environment>) -> Arc<Self> {
        Arc::new(Environment {
            bindings: RwLock::new(HashMap::new()),
            outer: Some(parent),
            hoist_defines: true,
        })
    }

    pub fn outer(&self) -> Option<&Arc<Environment>> {
        self.outer.as_ref()
    }

    /// Looks up a symbol here and in parent scopes
    pub fn get(&self, name: &Symbol) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.bindings.read().expect("env lock").get(name) {
                return Some(value.clone());
            }
            match &env.outer {
                Some(parent) => env = parent,
                None => return None,
            }
        }
    }

    /// Binds a name in this scope, or in the root when this scope hoists
    pub fn define(&self, name: Symbol, value: Value) {
        let mut target = self;
        if self.hoist_defines {
            while let Some(parent) = &target.outer {
                target = parent;
            }
        }
        target.bindings.write().expect("env lock").insert(name, value);
    }

    /// Binds a name in this scope regardless of the hoist flag; used by the
    /// host to install __DIR__/import/load into a bootstrap env
    pub fn define_local(&self, name: Symbol, value: Value) {
        self.bindings.write().expect("env lock").insert(name, value);
    }

    /// Snapshot of the bindings introduced by this scope alone,
    /// used by the serializer's begin/define prelude
    pub fn local_bindings(&self) -> Vec<(Symbol, Value)> {
        let mut entries: Vec<_> = self
            .bindings
            .read()
            .expect("env lock")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        entries
    }
}
