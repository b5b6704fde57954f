// ABOUTME: Tree-walking evaluator with tail call optimization

use crate::env::Environment;
use crate::error::{ScmError, ARITY_TWO, ARITY_TWO_OR_THREE};
use crate::value::{Proc, Value};
use std::sync::Arc;

/// Main evaluation function. Tail positions of `if`, `begin`, `eval` and
/// closure application rebind (expression, environment) and loop instead of
/// growing the host stack.
pub fn eval(expr: Value, env: Arc<Environment>) -> Result<Value, ScmError> {
    let mut expr = expr;
    let mut env = env;
    loop {
        expr = expr.unwrap_sourced();
        match expr {
            // Self-evaluating values
            v @ (Value::Number(_)
            | Value::Bool(_)
            | Value::Str(_)
            | Value::Nil
            | Value::Native(_)
            | Value::Proc(_)) => return Ok(v),

            Value::Symbol(name) => {
                if name.as_str() == "nil" {
                    return Ok(Value::Nil);
                }
                // unbound symbols evaluate to themselves, so quoted list
                // literals yield their symbols
                return Ok(env.get(&name).unwrap_or(Value::Symbol(name)));
            }

            Value::List(items) => {
                if items.is_empty() {
                    return Ok(Value::Nil);
                }
                let head = match items[0].stripped() {
                    Value::Symbol(s) => Some(s.as_str().to_string()),
                    _ => None,
                };
                match head.as_deref() {
                    Some("quote") => {
                        if items.len() != 2 {
                            return Err(ScmError::arity_error("quote", ARITY_TWO, items.len() - 1));
                        }
                        return Ok(items[1].clone());
                    }
                    Some("eval") => {
                        if items.len() != 2 {
                            return Err(ScmError::arity_error("eval", ARITY_TWO, items.len() - 1));
                        }
                        // evaluate the argument, then tail-evaluate the result
                        expr = eval(items[1].clone(), env.clone())?;
                    }
                    Some("if") => {
                        if items.len() < 3 || items.len() > 4 {
                            return Err(ScmError::arity_error("if", ARITY_TWO_OR_THREE, items.len() - 1));
                        }
                        let condition = eval(items[1].clone(), env.clone())?;
                        if condition.is_truthy() {
                            expr = items[2].clone();
                        } else if items.len() > 3 {
                            expr = items[3].clone();
                        } else {
                            return Ok(Value::Nil);
                        }
                    }
                    Some("define") | Some("set") | Some("def") => {
                        // set only works in the innermost env; a hoisting env
                        // routes the binding to the root
                        if items.len() != 3 {
                            return Err(ScmError::arity_error("define", ARITY_TWO, items.len() - 1));
                        }
                        let name = match items[1].stripped() {
                            Value::Symbol(s) => s.clone(),
                            other => {
                                return Err(ScmError::type_error("define", "symbol", other, 1))
                            }
                        };
                        let value = eval(items[2].clone(), env.clone())?;
                        env.define(name, value);
                        return Ok(Value::ok());
                    }
                    Some("lambda") => {
                        if items.len() != 3 {
                            return Err(ScmError::arity_error("lambda", ARITY_TWO, items.len() - 1));
                        }
                        let params = items[1].clone().unwrap_sourced();
                        check_param_spec(&params)?;
                        return Ok(Value::Proc(Arc::new(Proc {
                            params,
                            body: items[2].clone(),
                            env,
                        })));
                    }
                    Some("begin") => {
                        if items.len() == 1 {
                            return Ok(Value::Nil);
                        }
                        // own environment for the block, last form is tailed
                        let child = Environment::with_parent(env);
                        for item in &items[1..items.len() - 1] {
                            eval(item.clone(), child.clone())?;
                        }
                        expr = items[items.len() - 1].clone();
                        env = child;
                    }
                    _ => {
                        // application: arguments strictly left to right,
                        // then the head
                        let mut args = Vec::with_capacity(items.len() - 1);
                        for arg in &items[1..] {
                            args.push(eval(arg.clone(), env.clone())?);
                        }
                        let func = eval(items[0].clone(), env.clone())?;
                        match func {
                            Value::Native(f) => return f.call(&args),
                            Value::Proc(p) => {
                                env = bind_params(&p, args)?;
                                expr = p.body.clone();
                            }
                            other => {
                                return Err(ScmError::NotCallable(other.type_name().to_string()))
                            }
                        }
                    }
                }
            }

            Value::Sourced(_) => unreachable!("source info is unwrapped at loop entry"),
        }
    }
}

/// Non-TCO re-entry used by host callbacks (request handlers, scan
/// visitors, load callbacks)
pub fn apply(func: &Value, args: &[Value]) -> Result<Value, ScmError> {
    match func.stripped() {
        Value::Native(f) => f.call(args),
        Value::Proc(p) => {
            let env = bind_params(p, args.to_vec())?;
            eval(p.body.clone(), env)
        }
        other => Err(ScmError::NotCallable(other.type_name().to_string())),
    }
}

/// Evaluate a sequence of forms, returning the last result (nil when empty)
pub fn eval_all(forms: Vec<Value>, env: Arc<Environment>) -> Result<Value, ScmError> {
    let mut result = Value::Nil;
    for form in forms {
        result = eval(form, env.clone())?;
    }
    Ok(result)
}

fn check_param_spec(params: &Value) -> Result<(), ScmError> {
    match params.stripped() {
        Value::Symbol(_) => Ok(()),
        Value::List(items) => {
            for item in items {
                if !matches!(item.stripped(), Value::Symbol(_)) {
                    return Err(ScmError::runtime_error(
                        "lambda",
                        "parameters must be symbols",
                    ));
                }
            }
            Ok(())
        }
        other => Err(ScmError::type_error("lambda", "list|symbol", other, 1)),
    }
}

/// Bind arguments in a fresh child of the closure's captured env.
/// A list spec binds positionally (missing arguments are an arity error,
/// extra arguments are ignored); a symbol spec collects all arguments.
fn bind_params(p: &Proc, args: Vec<Value>) -> Result<Arc<Environment>, ScmError> {
    let env = Environment::with_parent(p.env.clone());
    match p.params.stripped() {
        Value::List(params) => {
            if args.len() < params.len() {
                return Err(ScmError::arity_error(
                    "lambda",
                    params.len().to_string(),
                    args.len(),
                ));
            }
            for (param, arg) in params.iter().zip(args) {
                match param.stripped() {
                    Value::Symbol(s) => env.define(s.clone(), arg),
                    other => return Err(ScmError::type_error("lambda", "symbol", other, 1)),
                }
            }
        }
        Value::Symbol(s) => env.define(s.clone(), Value::List(args)),
        other => return Err(ScmError::type_error("lambda", "list|symbol", other, 1)),
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read;

    fn root() -> Arc<Environment> {
        let env = Environment::new();
        crate::builtins::register_builtins(&env);
        env
    }

    fn run(env: &Arc<Environment>, src: &str) -> Result<Value, ScmError> {
        eval(read(src).unwrap(), env.clone())
    }

    #[test]
    fn test_self_evaluating() {
        let env = root();
        assert_eq!(run(&env, "42").unwrap(), Value::Number(42.0));
        assert_eq!(run(&env, "\"hi\"").unwrap(), Value::string("hi"));
        assert_eq!(run(&env, "true").unwrap(), Value::Bool(true));
        assert_eq!(run(&env, "nil").unwrap(), Value::Nil);
    }

    #[test]
    fn test_unbound_symbol_self_evaluates() {
        let env = root();
        assert_eq!(run(&env, "no-such").unwrap(), Value::symbol("no-such"));
    }

    #[test]
    fn test_quoted_list_literal_yields_symbols() {
        let env = root();
        let v = run(&env, "'(a b c)").unwrap();
        assert_eq!(
            v,
            Value::List(vec![
                Value::symbol("a"),
                Value::symbol("b"),
                Value::symbol("c")
            ])
        );
    }

    #[test]
    fn test_define_returns_ok_and_binds() {
        let env = root();
        assert_eq!(run(&env, "(define x 42)").unwrap(), Value::ok());
        assert_eq!(run(&env, "x").unwrap(), Value::Number(42.0));
        assert_eq!(run(&env, "(set y 1)").unwrap(), Value::ok());
        assert_eq!(run(&env, "(def z 2)").unwrap(), Value::ok());
        assert_eq!(run(&env, "(+ y z)").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_quote() {
        let env = root();
        assert_eq!(run(&env, "(quote x)").unwrap(), Value::symbol("x"));
        let v = run(&env, "(quote (a b))").unwrap();
        assert_eq!(
            v,
            Value::List(vec![Value::symbol("a"), Value::symbol("b")])
        );
    }

    #[test]
    fn test_eval_double_evaluation() {
        let env = root();
        run(&env, "(define x 5)").unwrap();
        // (quote x) evaluates to the symbol x; eval then evaluates that
        assert_eq!(run(&env, "(eval (quote x))").unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_if_branches_and_truthiness() {
        let env = root();
        assert_eq!(run(&env, "(if true 1 2)").unwrap(), Value::Number(1.0));
        assert_eq!(run(&env, "(if false 1 2)").unwrap(), Value::Number(2.0));
        assert_eq!(run(&env, "(if 0 1 2)").unwrap(), Value::Number(2.0));
        assert_eq!(run(&env, "(if \"\" 1 2)").unwrap(), Value::Number(2.0));
        // the empty list is true
        assert_eq!(run(&env, "(if (list) 1 2)").unwrap(), Value::Number(1.0));
        assert_eq!(run(&env, "(if false 1)").unwrap(), Value::Nil);
    }

    #[test]
    fn test_begin_child_env_and_result() {
        let env = root();
        let v = run(&env, "(begin (define a 1) (define b 2) (+ a b))").unwrap();
        assert_eq!(v, Value::Number(3.0));
        // begin introduced its own scope; a is unbound outside it
        assert_eq!(run(&env, "a").unwrap(), Value::symbol("a"));
    }

    #[test]
    fn test_lambda_application() {
        let env = root();
        assert_eq!(
            run(&env, "((lambda (x y) (+ x y)) 10 20)").unwrap(),
            Value::Number(30.0)
        );
    }

    #[test]
    fn test_variadic_lambda_collects_args() {
        let env = root();
        let v = run(&env, "((lambda z z) 1 2 3)").unwrap();
        assert_eq!(
            v,
            Value::List(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ])
        );
    }

    #[test]
    fn test_closure_capture() {
        let env = root();
        run(&env, "(define add (lambda (x) (lambda (y) (+ x y))))").unwrap();
        run(&env, "(define add3 (add 3))").unwrap();
        assert_eq!(run(&env, "(add3 4)").unwrap(), Value::Number(7.0));
    }

    #[test]
    fn test_arity_underflow() {
        let env = root();
        assert!(matches!(
            run(&env, "((lambda (x y) x) 1)"),
            Err(ScmError::ArityError { .. })
        ));
    }

    #[test]
    fn test_not_callable() {
        let env = root();
        assert!(matches!(
            run(&env, "(42 1)"),
            Err(ScmError::NotCallable(_))
        ));
    }

    #[test]
    fn test_tail_recursion_deep() {
        let env = root();
        run(
            &env,
            "(define loop (lambda (n) (if (equal? n 0) \"done\" (loop (- n 1)))))",
        )
        .unwrap();
        assert_eq!(run(&env, "(loop 100000)").unwrap(), Value::string("done"));
    }

    #[test]
    fn test_tail_call_through_begin() {
        let env = root();
        run(
            &env,
            "(define down (lambda (n) (if (<= n 0) 0 (begin (down (- n 1))))))",
        )
        .unwrap();
        assert_eq!(run(&env, "(down 50000)").unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_apply_reentry() {
        let env = root();
        run(&env, "(define twice (lambda (x) (* x 2)))").unwrap();
        let f = run(&env, "twice").unwrap();
        assert_eq!(
            apply(&f, &[Value::Number(21.0)]).unwrap(),
            Value::Number(42.0)
        );
    }
}
