// ABOUTME: Typed native declarations: registration, reverse lookup and the form validator

use crate::env::Environment;
use crate::error::ScmError;
use crate::value::{NativeFn, Symbol, Value};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

/// Type strings: any | nil | string | number | bool | func | list | symbol,
/// combined with `|` for unions. The sentinel `returntype` propagates from a
/// parameter to the declared return type.
#[derive(Debug, Clone)]
pub struct DeclarationParameter {
    pub name: &'static str,
    pub typ: &'static str,
    pub desc: &'static str,
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: &'static str,
    pub desc: &'static str,
    pub min_params: usize,
    pub max_params: usize,
    pub params: Vec<DeclarationParameter>,
    pub returns: &'static str,
}

pub fn param(
    name: &'static str,
    typ: &'static str,
    desc: &'static str,
) -> DeclarationParameter {
    DeclarationParameter { name, typ, desc }
}

#[derive(Debug)]
pub struct Entry {
    pub decl: Declaration,
    pub native_id: u32,
}

#[derive(Default)]
struct Registry {
    /// declaration order; entries starting with '#' are section titles
    titles: Vec<String>,
    by_name: HashMap<String, Arc<Entry>>,
    by_id: HashMap<u32, Arc<Entry>>,
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::default()));

/// Start a new section in the help listing
pub fn declare_title(title: &str) {
    let tagged = format!("#{title}");
    let mut reg = REGISTRY.write().expect("registry lock");
    if !reg.titles.contains(&tagged) {
        reg.titles.push(tagged);
    }
}

/// Register a native: inserts the callable into the designated environment
/// under the declared name (locally, so an IO child env keeps its bindings
/// out of the root) and indexes the declaration by name and native id.
/// Re-declaring a name replaces the previous entry (idempotent bootstrap).
pub fn declare(
    env: &Arc<Environment>,
    decl: Declaration,
    f: impl Fn(&[Value]) -> Result<Value, ScmError> + Send + Sync + 'static,
) {
    let native = NativeFn::new(f);
    let entry = Arc::new(Entry {
        native_id: native.id(),
        decl,
    });
    env.define_local(Symbol::new(entry.decl.name), Value::Native(native));

    let mut reg = REGISTRY.write().expect("registry lock");
    if let Some(old) = reg.by_name.insert(entry.decl.name.to_string(), entry.clone()) {
        reg.by_id.remove(&old.native_id);
    } else {
        reg.titles.push(entry.decl.name.to_string());
    }
    reg.by_id.insert(entry.native_id, entry);
}

pub fn lookup(name: &str) -> Option<Arc<Entry>> {
    REGISTRY.read().expect("registry lock").by_name.get(name).cloned()
}

pub fn lookup_id(id: u32) -> Option<Arc<Entry>> {
    REGISTRY.read().expect("registry lock").by_id.get(&id).cloned()
}

/// Name of a registered native, for the serializer's reverse lookup
pub fn native_name(id: u32) -> Option<String> {
    lookup_id(id).map(|e| e.decl.name.to_string())
}

/// Declaration order snapshot for the help listing
pub fn titles() -> Vec<String> {
    REGISTRY.read().expect("registry lock").titles.clone()
}

/// A given type satisfies a requirement when any of its union members
/// matches any required member; `any` is graceful in both directions.
pub fn types_match(given: &str, required: &str) -> bool {
    if given == "any" || required == "any" {
        return true;
    }
    required
        .split('|')
        .any(|r| given.split('|').any(|g| r == g))
}

pub fn types_merge(given: &str, newtype: &str) -> String {
    if given.is_empty() {
        return newtype.to_string();
    }
    if types_match(given, newtype) {
        return given.to_string();
    }
    if types_match(newtype, given) {
        return newtype.to_string();
    }
    format!("{given}|{newtype}")
}

fn validation_error(location: &str, message: String) -> ScmError {
    ScmError::ValidationError {
        location: if location.is_empty() {
            "?".to_string()
        } else {
            location.to_string()
        },
        message,
    }
}

/// Walk a form before evaluation and reject bad arity or argument types
/// wherever the head resolves to a declared native. Returns the computed
/// result type (at least "any").
pub fn validate(val: &Value, require: &str) -> Result<String, ScmError> {
    let location = val.source_location().unwrap_or_default();
    match val.stripped() {
        Value::Nil => Ok("nil".to_string()),
        Value::Str(_) => Ok("string".to_string()),
        Value::Number(_) => Ok("number".to_string()),
        Value::Bool(_) => Ok("bool".to_string()),
        Value::Proc(_) | Value::Native(_) => Ok("func".to_string()),
        Value::List(v) if !v.is_empty() => {
            let head_symbol = match v[0].stripped() {
                Value::Symbol(s) => Some(s.as_str()),
                _ => None,
            };
            // quoted data is not a call
            if head_symbol == Some("quote") {
                return Ok("any".to_string());
            }
            let def = match v[0].stripped() {
                Value::Symbol(s) => lookup(s.as_str()),
                Value::Native(f) => lookup_id(f.id()),
                _ => None,
            };
            if let Some(def) = &def {
                let argc = v.len() - 1;
                if argc < def.decl.min_params {
                    return Err(validation_error(
                        &location,
                        format!(
                            "function {} expects at least {} parameters",
                            def.decl.name, def.decl.min_params
                        ),
                    ));
                }
                if argc > def.decl.max_params {
                    return Err(validation_error(
                        &location,
                        format!(
                            "function {} expects at most {} parameters",
                            def.decl.name, def.decl.max_params
                        ),
                    ));
                }
            }

            let mut returntype = String::new();
            for i in 1..v.len() {
                // a lambda's parameter list is not an expression
                if i == 1 && head_symbol == Some("lambda") {
                    continue;
                }
                let mut subrequired = "any".to_string();
                let mut is_returntype = false;
                if let Some(def) = &def {
                    if !def.decl.params.is_empty() {
                        let j = (i - 1).min(def.decl.params.len() - 1);
                        subrequired = def.decl.params[j].typ.to_string();
                        if subrequired == "returntype" {
                            subrequired = require.to_string();
                            is_returntype = true;
                        }
                    }
                }
                let typ = validate(&v[i], &subrequired)?;
                if !types_match(&typ, &subrequired) {
                    let name = def.as_ref().map(|d| d.decl.name).unwrap_or("?");
                    return Err(validation_error(
                        &location,
                        format!(
                            "function {name} expects parameter {i} to be {subrequired}, but found value of type {typ}"
                        ),
                    ));
                }
                if is_returntype {
                    returntype = types_merge(&returntype, &typ);
                }
            }

            if let Some(def) = def {
                if def.decl.returns == "returntype" {
                    if returntype.is_empty() {
                        return Err(validation_error(
                            &location,
                            "return returntype without returntype parameters".to_string(),
                        ));
                    }
                    return Ok(returntype);
                }
                return Ok(def.decl.returns.to_string());
            }
            Ok("any".to_string())
        }
        _ => Ok("any".to_string()),
    }
}
