mod builtins;
mod config;
mod declare;
mod env;
mod error;
mod eval;
mod help;
mod http;
mod parser;
mod serialize;
mod storage;
mod value;

use clap::Parser;
use config::{VERSION, WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use env::Environment;
use error::ScmError;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use value::Value;

/// In-memory column-shard database with a Scheme scripting core
#[derive(Parser, Debug)]
#[command(name = "memcell")]
#[command(version = VERSION)]
#[command(about = "In-memory column-shard database scripted in Scheme")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Directory schema snapshots are written to
    #[arg(long = "data-dir", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Bootstrap script imported before the REPL starts
    #[arg(long = "lib", value_name = "FILE", default_value = "lib/main.scm")]
    bootstrap: PathBuf,

    /// Skip the bootstrap import
    #[arg(long = "no-lib")]
    no_bootstrap: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();
    storage::set_save_dir(args.data_dir.clone());

    // pure root: sandbox-safe primitives plus the storage operations
    let root = Environment::new();
    builtins::register_builtins(&root);
    storage::register(&root);

    // I/O primitives live in a child env; script defines hoist to the root
    let cwd = std::env::current_dir()?;
    let io_env = Environment::hoisting(root.clone());
    builtins::io::register(&io_env, &cwd);
    storage::register_io(&io_env, &cwd);

    if !args.no_bootstrap && args.bootstrap.exists() {
        let form = Value::List(vec![
            Value::symbol("import"),
            Value::string(args.bootstrap.display().to_string()),
        ]);
        if let Err(e) = eval::eval(form, io_env.clone()) {
            warn!("bootstrap import failed: {e}");
        }
    }

    if let Some(script) = args.script {
        run_script(&script, &io_env)?;
        return Ok(());
    }

    println!("{WELCOME_MESSAGE}");
    println!("{WELCOME_SUBTITLE}");
    println!("{WELCOME_FOOTER}");
    repl(&root, &io_env)
}

/// Execute a script file, validating every form before evaluation
fn run_script(path: &PathBuf, env: &Arc<Environment>) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let forms = parser::read_all(&source, &path.display().to_string())?;
    for form in &forms {
        declare::validate(form, "any")?;
    }
    eval::eval_all(forms, env.clone())?;
    Ok(())
}

/// Read a line, evaluate against the shared environments, serialize and
/// print prefixed with ==>. Errors are reported at form boundary and the
/// loop continues.
fn repl(
    root: &Arc<Environment>,
    io_env: &Arc<Environment>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl = DefaultEditor::with_config(config)?;
    let history_file = ".memcell_history";
    let _ = rl.load_history(history_file);

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match eval_line(&line, io_env) {
                    Ok(value) => {
                        println!("==> {}", serialize::serialize(&value, root, root));
                    }
                    Err(e) => println!("error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("readline error: {e}");
                break;
            }
        }
    }
    let _ = rl.save_history(history_file);
    Ok(())
}

fn eval_line(line: &str, env: &Arc<Environment>) -> Result<Value, ScmError> {
    let form = parser::read(line)?;
    declare::validate(&form, "any")?;
    eval::eval(form, env.clone())
}
