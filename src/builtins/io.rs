//! I/O primitives: print, import, load, serve
//!
//! These are deliberately kept out of the root environment: the host
//! registers them in a hoisting child env that scripts opt into, so the
//! root stays pure and shareable across request threads.

use crate::declare::{declare, declare_title, param, Declaration};
use crate::env::Environment;
use crate::error::{ScmError, ARITY_ONE, ARITY_ONE_TO_THREE, ARITY_TWO};
use crate::eval;
use crate::parser;
use crate::value::{NativeFn, Symbol, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::error;

/// Register the I/O primitives into `io_env`, which must be a (hoisting)
/// child of the root. `base` is the directory import/load paths are
/// relative to.
pub fn register(io_env: &Arc<Environment>, base: &Path) {
    declare_title("Input/Output");
    declare(
        io_env,
        Declaration {
            name: "print",
            desc: "Prints all arguments to stdout followed by a newline.",
            min_params: 0,
            max_params: usize::MAX,
            params: vec![param("text", "any", "value to print")],
            returns: "string",
        },
        |args| {
            let line: String = args.iter().map(|a| a.to_string()).collect();
            println!("{line}");
            Ok(Value::ok())
        },
    );

    let import = import_native(io_env, base);
    declare(
        io_env,
        Declaration {
            name: "import",
            desc: "Reads a script relative to the current directory and evaluates\nall of its forms; top-level defines land in the root environment.\nReturns the value of the last form.",
            min_params: 1,
            max_params: 1,
            params: vec![param("path", "string", "script path")],
            returns: "any",
        },
        move |args| import.call(args),
    );

    let load = load_native(base);
    declare(
        io_env,
        Declaration {
            name: "load",
            desc: "Reads a data file. Without callback: returns the whole file as a\nstring. With callback: hands the whole file to the callback on a\nbackground task. With callback and single-byte delimiter: invokes\nthe callback synchronously once per delimited chunk.",
            min_params: 1,
            max_params: 3,
            params: vec![
                param("path", "string", "file path"),
                param("callback", "func", "chunk consumer"),
                param("delimiter", "string", "single-byte chunk delimiter"),
            ],
            returns: "string",
        },
        move |args| load.call(args),
    );

    declare(
        io_env,
        Declaration {
            name: "serve",
            desc: "Starts an HTTP server on the given port. The handler is called\nwith a request assoc list and a response assoc list per request;\nhandler failures answer 500 without terminating the process.",
            min_params: 2,
            max_params: 2,
            params: vec![
                param("port", "number|string", "TCP port to listen on"),
                param("handler", "func", "lambda (req res)"),
            ],
            returns: "string",
        },
        |args| {
            if args.len() != 2 {
                return Err(ScmError::arity_error("serve", ARITY_TWO, args.len()));
            }
            let port = match args[0].stripped() {
                Value::Number(n) => *n as u16,
                Value::Str(s) => s
                    .parse::<u16>()
                    .map_err(|e| ScmError::host_fault("serve port", e))?,
                other => return Err(ScmError::type_error("serve", "number|string", other, 1)),
            };
            crate::http::serve(port, args[1].clone())
        },
    );
}

/// Build the import native rooted at `base`; nested imports are re-rooted
/// at the directory of the importing file
fn import_native(io_env: &Arc<Environment>, base: &Path) -> NativeFn {
    let io_env = io_env.clone();
    let base = base.to_path_buf();
    NativeFn::new(move |args| do_import(&io_env, &base, args))
}

fn do_import(io_env: &Arc<Environment>, base: &Path, args: &[Value]) -> Result<Value, ScmError> {
    if args.len() != 1 {
        return Err(ScmError::arity_error("import", ARITY_ONE, args.len()));
    }
    let rel = args[0].as_str("import", 1)?;
    let filename = base.join(rel);
    let wd = filename
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| base.to_path_buf());
    let source = std::fs::read_to_string(&filename)
        .map_err(|e| ScmError::host_fault(&filename.display().to_string(), e))?;

    // script scope: child of the IO env carrying its own location and
    // re-rooted import/load; defines hoist to the root
    let script_env = Environment::hoisting(io_env.clone());
    script_env.define_local(
        Symbol::new("__DIR__"),
        Value::string(wd.display().to_string()),
    );
    script_env.define_local(
        Symbol::new("__FILE__"),
        Value::string(filename.display().to_string()),
    );
    script_env.define_local(
        Symbol::new("import"),
        Value::Native(import_native(io_env, &wd)),
    );
    script_env.define_local(Symbol::new("load"), Value::Native(load_native(&wd)));

    let forms = parser::read_all(&source, &filename.display().to_string())?;
    for form in &forms {
        crate::declare::validate(form, "any")?;
    }
    eval::eval_all(forms, script_env)
}

fn load_native(base: &Path) -> NativeFn {
    let base = base.to_path_buf();
    NativeFn::new(move |args| do_load(&base, args))
}

fn do_load(base: &Path, args: &[Value]) -> Result<Value, ScmError> {
    if args.is_empty() || args.len() > 3 {
        return Err(ScmError::arity_error("load", ARITY_ONE_TO_THREE, args.len()));
    }
    let rel = args[0].as_str("load", 1)?;
    let filename = base.join(rel);
    let context = filename.display().to_string();

    if args.len() == 3 {
        // per-chunk mode: synchronous callback per delimited chunk
        let delimiter = args[2].as_str("load", 3)?;
        if delimiter.len() != 1 {
            return Err(ScmError::runtime_error(
                "load",
                "delimiter must be 1 byte long",
            ));
        }
        let file = File::open(&filename).map_err(|e| ScmError::host_fault(&context, e))?;
        let mut reader = BufReader::new(file);
        let delim = delimiter.as_bytes()[0];
        let mut chunk = Vec::new();
        loop {
            chunk.clear();
            let n = reader
                .read_until(delim, &mut chunk)
                .map_err(|e| ScmError::host_fault(&context, e))?;
            if n == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&chunk).into_owned();
            eval::apply(&args[1], &[Value::string(text)])?;
        }
        return Ok(Value::ok());
    }

    let contents =
        std::fs::read_to_string(&filename).map_err(|e| ScmError::host_fault(&context, e))?;
    if args.len() == 2 {
        // whole-file mode with callback runs concurrently
        let callback = args[1].clone();
        std::thread::spawn(move || {
            if let Err(e) = eval::apply(&callback, &[Value::string(contents)]) {
                error!("load callback failed: {e}");
            }
        });
        return Ok(Value::ok());
    }
    Ok(Value::string(contents))
}
