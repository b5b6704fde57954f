//! # Built-in Functions Module
//!
//! Sandbox-safe primitives registered in the root environment, organized by
//! category:
//!
//! - **[arithmetic]**: +, -, *, / - Numeric operations
//! - **[comparison]**: <=, <, >, >=, equal? - Value comparisons
//! - **[lists]**: cons, car, cdr, list - List manipulation
//! - **[strings]**: concat, symbol - String building and coercion
//!
//! The literals `true` and `false` are plain root bindings. I/O primitives
//! (print, import, load, serve) live in [io] and are registered only into a
//! child environment of the root, so the root stays pure and shareable.
//!
//! Every function is registered through the declaration registry, which
//! feeds the static validator and the help system.

use crate::declare::{declare, declare_title, param, Declaration};
use crate::env::Environment;
use crate::help;
use crate::value::{Symbol, Value};
use std::sync::Arc;

pub mod arithmetic;
pub mod comparison;
pub mod io;
pub mod lists;
pub mod strings;

/// Register all sandbox-safe built-in functions in the environment
pub fn register_builtins(env: &Arc<Environment>) {
    arithmetic::register(env);
    comparison::register(env);
    lists::register(env);
    strings::register(env);

    env.define(Symbol::new("true"), Value::Bool(true));
    env.define(Symbol::new("false"), Value::Bool(false));

    declare_title("Help");
    declare(
        env,
        Declaration {
            name: "help",
            desc: "Without argument: list all declared functions grouped by title.\nWith a name or function: describe its parameters and arity.",
            min_params: 0,
            max_params: 1,
            params: vec![param(
                "target",
                "func|string|symbol",
                "function name or function value to describe",
            )],
            returns: "string",
        },
        |args| match args {
            [] => Ok(Value::string(help::overview())),
            [target] => Ok(Value::string(help::describe(target)?)),
            more => Err(crate::error::ScmError::arity_error("help", "0-1", more.len())),
        },
    );
}
