//! String operations: concat, symbol
//!
//! `concat` stringifies and joins all arguments; `symbol` turns a string
//! into an identifier.

use crate::declare::{declare, declare_title, param, Declaration};
use crate::env::Environment;
use crate::error::{ScmError, ARITY_ONE};
use crate::value::{Symbol, Value};
use std::sync::Arc;

pub fn builtin_concat(args: &[Value]) -> Result<Value, ScmError> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.to_string());
    }
    Ok(Value::string(out))
}

pub fn builtin_symbol(args: &[Value]) -> Result<Value, ScmError> {
    if args.len() != 1 {
        return Err(ScmError::arity_error("symbol", ARITY_ONE, args.len()));
    }
    let name = args[0].as_str("symbol", 1)?;
    Ok(Value::Symbol(Symbol::new(name)))
}

/// Register all string builtins in the environment
pub fn register(env: &Arc<Environment>) {
    declare_title("Strings");
    declare(
        env,
        Declaration {
            name: "concat",
            desc: "Stringifies all arguments and joins them.",
            min_params: 0,
            max_params: usize::MAX,
            params: vec![param("part", "any", "value to append")],
            returns: "string",
        },
        builtin_concat,
    );
    declare(
        env,
        Declaration {
            name: "symbol",
            desc: "Coerces a string into a symbol.",
            min_params: 1,
            max_params: 1,
            params: vec![param("name", "string", "symbol name")],
            returns: "symbol",
        },
        builtin_symbol,
    );
}
