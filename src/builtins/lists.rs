//! List operations: cons, car, cdr, list
//!
//! - `cons`: prepend an item to a list (a non-list tail becomes a pair)
//! - `car`: first element
//! - `cdr`: all but the first element; one element leaves the empty list
//! - `list`: collect the arguments

use crate::declare::{declare, declare_title, param, Declaration};
use crate::env::Environment;
use crate::error::{ScmError, ARITY_ONE, ARITY_TWO};
use crate::value::Value;
use std::sync::Arc;

pub fn builtin_cons(args: &[Value]) -> Result<Value, ScmError> {
    if args.len() != 2 {
        return Err(ScmError::arity_error("cons", ARITY_TWO, args.len()));
    }
    let mut result = vec![args[0].clone()];
    match args[1].stripped() {
        Value::List(items) => result.extend(items.iter().cloned()),
        other => result.push(other.clone()),
    }
    Ok(Value::List(result))
}

pub fn builtin_car(args: &[Value]) -> Result<Value, ScmError> {
    if args.len() != 1 {
        return Err(ScmError::arity_error("car", ARITY_ONE, args.len()));
    }
    match args[0].as_list("car", 1)? {
        [] => Err(ScmError::runtime_error("car", "empty list")),
        items => Ok(items[0].clone()),
    }
}

pub fn builtin_cdr(args: &[Value]) -> Result<Value, ScmError> {
    if args.len() != 1 {
        return Err(ScmError::arity_error("cdr", ARITY_ONE, args.len()));
    }
    match args[0].as_list("cdr", 1)? {
        [] => Err(ScmError::runtime_error("cdr", "empty list")),
        items => Ok(Value::List(items[1..].to_vec())),
    }
}

pub fn builtin_list(args: &[Value]) -> Result<Value, ScmError> {
    Ok(Value::List(args.to_vec()))
}

/// Register all list builtins in the environment
pub fn register(env: &Arc<Environment>) {
    declare_title("Lists");
    declare(
        env,
        Declaration {
            name: "cons",
            desc: "Prepends an item to a list, constructing a new list.\nA non-list tail yields a two-element list.",
            min_params: 2,
            max_params: 2,
            params: vec![
                param("car", "any", "item to prepend"),
                param("cdr", "any", "list tail"),
            ],
            returns: "list",
        },
        builtin_cons,
    );
    declare(
        env,
        Declaration {
            name: "car",
            desc: "First element of a list; an error on the empty list.",
            min_params: 1,
            max_params: 1,
            params: vec![param("l", "list", "list to take the head of")],
            returns: "any",
        },
        builtin_car,
    );
    declare(
        env,
        Declaration {
            name: "cdr",
            desc: "All elements but the first; one element leaves the empty list.",
            min_params: 1,
            max_params: 1,
            params: vec![param("l", "list", "list to take the tail of")],
            returns: "list",
        },
        builtin_cdr,
    );
    declare(
        env,
        Declaration {
            name: "list",
            desc: "Collects the arguments into a list.",
            min_params: 0,
            max_params: usize::MAX,
            params: vec![param("item", "any", "list element")],
            returns: "list",
        },
        builtin_list,
    );
}
