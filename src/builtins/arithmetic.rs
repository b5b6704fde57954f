//! Arithmetic operations: +, -, *, /
//!
//! All fold left over their arguments and fail loudly when an operand is
//! not a number.

use crate::declare::{declare, declare_title, param, Declaration};
use crate::env::Environment;
use crate::error::{ScmError, ARITY_AT_LEAST_ONE};
use crate::value::Value;
use std::sync::Arc;

fn fold(
    name: &'static str,
    args: &[Value],
    op: impl Fn(f64, f64) -> Result<f64, ScmError>,
) -> Result<Value, ScmError> {
    if args.is_empty() {
        return Err(ScmError::arity_error(name, ARITY_AT_LEAST_ONE, 0));
    }
    let mut acc = args[0].as_number(name, 1)?;
    for (i, arg) in args[1..].iter().enumerate() {
        acc = op(acc, arg.as_number(name, i + 2)?)?;
    }
    Ok(Value::Number(acc))
}

pub fn builtin_add(args: &[Value]) -> Result<Value, ScmError> {
    fold("+", args, |a, b| Ok(a + b))
}

pub fn builtin_sub(args: &[Value]) -> Result<Value, ScmError> {
    fold("-", args, |a, b| Ok(a - b))
}

pub fn builtin_mul(args: &[Value]) -> Result<Value, ScmError> {
    fold("*", args, |a, b| Ok(a * b))
}

pub fn builtin_div(args: &[Value]) -> Result<Value, ScmError> {
    fold("/", args, |a, b| {
        if b == 0.0 {
            Err(ScmError::runtime_error("/", "division by zero"))
        } else {
            Ok(a / b)
        }
    })
}

/// Register all arithmetic builtins in the environment
pub fn register(env: &Arc<Environment>) {
    declare_title("Arithmetic");
    declare(
        env,
        Declaration {
            name: "+",
            desc: "Adds all arguments to the first.",
            min_params: 1,
            max_params: usize::MAX,
            params: vec![param("summand", "number", "value to add")],
            returns: "number",
        },
        builtin_add,
    );
    declare(
        env,
        Declaration {
            name: "-",
            desc: "Subtracts all further arguments from the first.",
            min_params: 1,
            max_params: usize::MAX,
            params: vec![param("subtrahend", "number", "value to subtract")],
            returns: "number",
        },
        builtin_sub,
    );
    declare(
        env,
        Declaration {
            name: "*",
            desc: "Multiplies the first argument with all further ones.",
            min_params: 1,
            max_params: usize::MAX,
            params: vec![param("factor", "number", "value to multiply")],
            returns: "number",
        },
        builtin_mul,
    );
    declare(
        env,
        Declaration {
            name: "/",
            desc: "Divides the first argument by all further ones.\nDivision by zero is an error.",
            min_params: 1,
            max_params: usize::MAX,
            params: vec![param("divisor", "number", "value to divide by")],
            returns: "number",
        },
        builtin_div,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(ns: &[f64]) -> Vec<Value> {
        ns.iter().map(|n| Value::Number(*n)).collect()
    }

    #[test]
    fn test_add() {
        assert_eq!(
            builtin_add(&nums(&[1.0, 2.0, 3.0])).unwrap(),
            Value::Number(6.0)
        );
        assert_eq!(builtin_add(&nums(&[10.0])).unwrap(), Value::Number(10.0));
    }

    #[test]
    fn test_add_commutes() {
        let ab = builtin_add(&nums(&[2.5, 4.0])).unwrap();
        let ba = builtin_add(&nums(&[4.0, 2.5])).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_sub_and_mul() {
        assert_eq!(
            builtin_sub(&nums(&[10.0, 3.0, 2.0])).unwrap(),
            Value::Number(5.0)
        );
        assert_eq!(
            builtin_mul(&nums(&[2.0, 3.0, 4.0])).unwrap(),
            Value::Number(24.0)
        );
    }

    #[test]
    fn test_div() {
        assert_eq!(
            builtin_div(&nums(&[20.0, 4.0])).unwrap(),
            Value::Number(5.0)
        );
        assert!(matches!(
            builtin_div(&nums(&[1.0, 0.0])),
            Err(ScmError::RuntimeError { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_fails_loudly() {
        let args = vec![Value::Number(1.0), Value::string("x")];
        assert!(matches!(
            builtin_add(&args),
            Err(ScmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_args_rejected() {
        assert!(matches!(builtin_add(&[]), Err(ScmError::ArityError { .. })));
    }
}
