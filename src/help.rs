// ABOUTME: Help output built from the declaration registry

use crate::declare;
use crate::error::ScmError;
use crate::value::Value;
use std::fmt::Write;

fn arity_bound(n: usize) -> String {
    if n == usize::MAX {
        "n".to_string()
    } else {
        n.to_string()
    }
}

/// Listing of every declared function, grouped under the declared titles
pub fn overview() -> String {
    let mut out = String::new();
    out.push_str("Available functions:\n");
    for title in declare::titles() {
        if let Some(name) = title.strip_prefix('#') {
            let _ = write!(out, "\n-- {name} --\n");
        } else if let Some(entry) = declare::lookup(&title) {
            let first_line = entry.decl.desc.lines().next().unwrap_or("");
            let _ = writeln!(out, "  {title}: {first_line}");
        }
    }
    out.push_str("\nget further information by typing (help \"functionname\")\n");
    out
}

/// Detail text for one declaration, addressed by name or function identity
pub fn describe(target: &Value) -> Result<String, ScmError> {
    let entry = match target.stripped() {
        Value::Str(name) => declare::lookup(name),
        Value::Symbol(name) => declare::lookup(name.as_str()),
        Value::Native(f) => declare::lookup_id(f.id()),
        _ => None,
    }
    .ok_or_else(|| ScmError::NotFound(format!("help target {target}")))?;

    let decl = &entry.decl;
    let mut out = String::new();
    let _ = writeln!(out, "Help for: {}", decl.name);
    out.push_str("===\n\n");
    out.push_str(decl.desc);
    out.push_str("\n\n");
    let _ = writeln!(
        out,
        "Allowed number of parameters: {} - {}",
        arity_bound(decl.min_params),
        arity_bound(decl.max_params)
    );
    out.push('\n');
    for p in &decl.params {
        let _ = writeln!(out, " - {} ({}): {}", p.name, p.typ, p.desc);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_overview_groups_by_title() {
        let env = Environment::new();
        crate::builtins::register_builtins(&env);
        let text = overview();
        assert!(text.contains("-- Arithmetic --"));
        assert!(text.contains("  +:"));
    }

    #[test]
    #[serial]
    fn test_describe_by_name_and_identity() {
        let env = Environment::new();
        crate::builtins::register_builtins(&env);

        let by_name = describe(&Value::string("cons")).unwrap();
        assert!(by_name.contains("Help for: cons"));

        let native = env.get(&crate::value::Symbol::new("cons")).unwrap();
        let by_identity = describe(&native).unwrap();
        assert!(by_identity.contains("Help for: cons"));
    }

    #[test]
    #[serial]
    fn test_describe_unknown_target() {
        let env = Environment::new();
        crate::builtins::register_builtins(&env);
        assert!(matches!(
            describe(&Value::string("no-such-fn")),
            Err(ScmError::NotFound(_))
        ));
    }
}
