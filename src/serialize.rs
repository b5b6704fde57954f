// ABOUTME: Render values back to re-readable source, embedding captured environments

use crate::declare;
use crate::env::Environment;
use crate::value::Value;
use std::sync::Arc;

/// Render a value against an environment. When `env` differs from `root`,
/// the output is wrapped in `(begin (define k v) … VALUE)` covering the
/// bindings introduced along the scope chain, so the result re-evaluates to
/// an equivalent value under the root.
pub fn serialize(value: &Value, env: &Arc<Environment>, root: &Arc<Environment>) -> String {
    let mut out = String::new();
    write_value(&mut out, value, env, root);
    out
}

fn write_value(out: &mut String, value: &Value, env: &Arc<Environment>, root: &Arc<Environment>) {
    if !Arc::ptr_eq(env, root) {
        let outer = env
            .outer()
            .cloned()
            .unwrap_or_else(|| root.clone());
        out.push_str("(begin ");
        for (name, bound) in env.local_bindings() {
            out.push_str("(define ");
            out.push_str(name.as_str());
            out.push(' ');
            write_value(out, &bound, &outer, root);
            out.push_str(") ");
        }
        write_value(out, value, &outer, root);
        out.push(')');
        return;
    }

    match value.stripped() {
        Value::List(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i != 0 {
                    out.push(' ');
                }
                write_value(out, item, env, root);
            }
            out.push(')');
        }
        native @ Value::Native(f) => {
            // reverse the environment chain for the binding name, then the
            // declaration registry
            let mut scope = Some(env.clone());
            while let Some(current) = scope {
                for (name, bound) in current.local_bindings() {
                    if &bound == native {
                        out.push_str(name.as_str());
                        return;
                    }
                }
                scope = current.outer().cloned();
            }
            match declare::native_name(f.id()) {
                Some(name) => out.push_str(&name),
                None => out.push_str("[unserializable native func]"),
            }
        }
        Value::Proc(p) => {
            out.push_str("(lambda ");
            write_value(out, &p.params, root, root);
            out.push(' ');
            write_value(out, &p.body, &p.env, root);
            out.push(')');
        }
        Value::Symbol(s) => out.push_str(s.as_str()),
        Value::Str(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\r' => out.push_str("\\r"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Nil => out.push_str("nil"),
        number @ Value::Number(_) => {
            // Display already renders integral doubles without a fraction
            out.push_str(&number.to_string());
        }
        Value::Sourced(_) => unreachable!("stripped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::eval;
    use crate::parser::read;
    use serial_test::serial;

    fn root() -> Arc<Environment> {
        let env = Environment::new();
        crate::builtins::register_builtins(&env);
        env
    }

    #[test]
    #[serial]
    fn test_form_round_trip() {
        let env = root();
        let form = read("(+ 1 2)").unwrap();
        assert_eq!(serialize(&form, &env, &env), "(+ 1 2)");
        let back = read(&serialize(&form, &env, &env)).unwrap();
        assert_eq!(form, back);
    }

    #[test]
    #[serial]
    fn test_string_escapes() {
        let env = root();
        let v = Value::string("a\"b\\c\nd");
        let text = serialize(&v, &env, &env);
        assert_eq!(text, "\"a\\\"b\\\\c\\nd\"");
        assert_eq!(read(&text).unwrap(), v);
    }

    #[test]
    #[serial]
    fn test_native_renders_by_reverse_lookup() {
        let env = root();
        let plus = eval(read("+").unwrap(), env.clone()).unwrap();
        assert_eq!(serialize(&plus, &env, &env), "+");
    }

    #[test]
    #[serial]
    fn test_closure_renders_as_lambda() {
        let env = root();
        let f = eval(read("(lambda (x) (+ x 1))").unwrap(), env.clone()).unwrap();
        assert_eq!(serialize(&f, &env, &env), "(lambda (x) (+ x 1))");
    }

    #[test]
    #[serial]
    fn test_closure_captured_env_becomes_begin_prelude() {
        let env = root();
        // capture n = 3 inside a begin scope
        let f = eval(
            read("(begin (define n 3) (lambda (x) (+ x n)))").unwrap(),
            env.clone(),
        )
        .unwrap();
        let text = serialize(&f, &env, &env);
        assert!(text.starts_with("(lambda (x) (begin (define n 3)"), "got: {text}");

        // the rendering must re-ingest to an equivalent closure
        let again = eval(read(&text).unwrap(), env.clone()).unwrap();
        let applied = crate::eval::apply(&again, &[Value::Number(4.0)]).unwrap();
        assert_eq!(applied, Value::Number(7.0));
    }

    #[test]
    #[serial]
    fn test_value_round_trip_structural() {
        let env = root();
        let v = eval(read("'(a 1 \"two\")").unwrap(), env.clone()).unwrap();
        let back = read(&serialize(&v, &env, &env)).unwrap();
        // the rendering of an evaluated list re-reads as a list form; its
        // elements are structurally identical
        let items = back.as_list("test", 1).unwrap();
        let original = v.as_list("test", 1).unwrap();
        assert_eq!(items.len(), original.len());
        assert_eq!(items[1], original[1]);
        assert_eq!(items[2], original[2]);
    }
}
