//! Comparison operations: <=, <, >, >=, equal?
//!
//! The ordering operators compare numbers; equal? uses structural deep
//! equality over any two values.

use crate::declare::{declare, declare_title, param, Declaration};
use crate::env::Environment;
use crate::error::{ScmError, ARITY_TWO};
use crate::value::Value;
use std::sync::Arc;

fn compare(
    name: &'static str,
    args: &[Value],
    op: impl Fn(f64, f64) -> bool,
) -> Result<Value, ScmError> {
    if args.len() != 2 {
        return Err(ScmError::arity_error(name, ARITY_TWO, args.len()));
    }
    let a = args[0].as_number(name, 1)?;
    let b = args[1].as_number(name, 2)?;
    Ok(Value::Bool(op(a, b)))
}

pub fn builtin_le(args: &[Value]) -> Result<Value, ScmError> {
    compare("<=", args, |a, b| a <= b)
}

pub fn builtin_lt(args: &[Value]) -> Result<Value, ScmError> {
    compare("<", args, |a, b| a < b)
}

pub fn builtin_gt(args: &[Value]) -> Result<Value, ScmError> {
    compare(">", args, |a, b| a > b)
}

pub fn builtin_ge(args: &[Value]) -> Result<Value, ScmError> {
    compare(">=", args, |a, b| a >= b)
}

pub fn builtin_equal(args: &[Value]) -> Result<Value, ScmError> {
    if args.len() != 2 {
        return Err(ScmError::arity_error("equal?", ARITY_TWO, args.len()));
    }
    Ok(Value::Bool(args[0] == args[1]))
}

/// Register all comparison builtins in the environment
pub fn register(env: &Arc<Environment>) {
    declare_title("Comparison");
    let ordering = |name: &'static str, desc: &'static str| Declaration {
        name,
        desc,
        min_params: 2,
        max_params: 2,
        params: vec![
            param("a", "number", "left operand"),
            param("b", "number", "right operand"),
        ],
        returns: "bool",
    };
    declare(env, ordering("<=", "True when a is not greater than b."), builtin_le);
    declare(env, ordering("<", "True when a is less than b."), builtin_lt);
    declare(env, ordering(">", "True when a is greater than b."), builtin_gt);
    declare(env, ordering(">=", "True when a is not less than b."), builtin_ge);
    declare(
        env,
        Declaration {
            name: "equal?",
            desc: "Structural deep equality between two values.",
            min_params: 2,
            max_params: 2,
            params: vec![
                param("a", "any", "left operand"),
                param("b", "any", "right operand"),
            ],
            returns: "bool",
        },
        builtin_equal,
    );
}
