// ABOUTME: Storage engine: database registry, datasets and script-level bindings

pub mod column;
pub mod csv;
pub mod database;
pub mod shard;
pub mod store;
pub mod store_int;
pub mod store_string;
pub mod store_values;
pub mod table;

pub use column::Column;
pub use database::Database;
pub use shard::Shard;
pub use table::{Table, MAX_SHARD_SIZE};

use crate::declare::{declare, declare_title, param, Declaration};
use crate::env::Environment;
use crate::error::ScmError;
use crate::value::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, RwLock};

/// Ordered (column-name, value) pairs representing one row
#[derive(Debug, Clone, Default)]
pub struct Dataset(Vec<(String, Value)>);

impl Dataset {
    pub fn new() -> Dataset {
        Dataset::default()
    }

    pub fn push(&mut self, name: &str, value: Value) {
        self.0.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Build a dataset from a flat (key value key value …) assoc list
    pub fn from_assoc(value: &Value) -> Result<Dataset, ScmError> {
        let items = value.as_list("insert", 1)?;
        let mut dataset = Dataset::new();
        for pair in items.chunks(2) {
            let name = pair[0].to_string();
            let value = pair.get(1).cloned().unwrap_or(Value::Nil);
            dataset.push(&name, value.unwrap_sourced());
        }
        Ok(dataset)
    }
}

// ============================================================================
// Process-wide database registry and schema snapshot directory
// ============================================================================

static DATABASES: LazyLock<RwLock<HashMap<String, Arc<Database>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

static SAVE_DIR: LazyLock<RwLock<Option<PathBuf>>> = LazyLock::new(|| RwLock::new(None));

/// Directory schema snapshots are written to; None disables saving
pub fn set_save_dir(dir: Option<PathBuf>) {
    *SAVE_DIR.write().expect("save dir lock") = dir;
}

pub(crate) fn save_dir() -> Option<PathBuf> {
    SAVE_DIR.read().expect("save dir lock").clone()
}

pub fn get_database(name: &str) -> Option<Arc<Database>> {
    DATABASES.read().expect("db registry lock").get(name).cloned()
}

pub fn create_database(name: &str) -> Result<Arc<Database>, ScmError> {
    let mut databases = DATABASES.write().expect("db registry lock");
    if databases.contains_key(name) {
        return Err(ScmError::SchemaViolation(format!(
            "database {name} already exists"
        )));
    }
    let db = Database::new(name);
    databases.insert(name.to_string(), db.clone());
    drop(databases);
    db.save();
    Ok(db)
}

pub fn drop_database(name: &str) -> Result<(), ScmError> {
    DATABASES
        .write()
        .expect("db registry lock")
        .remove(name)
        .map(|_| ())
        .ok_or_else(|| ScmError::NotFound(format!("database {name}")))
}

pub fn database_names() -> Vec<String> {
    let mut names: Vec<String> = DATABASES
        .read()
        .expect("db registry lock")
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

fn database_of(schema: &str) -> Result<Arc<Database>, ScmError> {
    get_database(schema)
        .ok_or_else(|| ScmError::SchemaViolation(format!("database {schema} does not exist")))
}

fn table_of(schema: &str, table: &str) -> Result<Arc<Table>, ScmError> {
    database_of(schema)?.get_table(table).ok_or_else(|| {
        ScmError::SchemaViolation(format!("table {table} does not exist in database {schema}"))
    })
}

// ============================================================================
// Script bindings
// ============================================================================

/// Register the storage operations in the environment
pub fn register(env: &Arc<Environment>) {
    declare_title("Storage");
    declare(
        env,
        Declaration {
            name: "createdatabase",
            desc: "Creates a database.",
            min_params: 1,
            max_params: 1,
            params: vec![param("schema", "string", "database name")],
            returns: "string",
        },
        |args| {
            if args.len() != 1 {
                return Err(ScmError::arity_error("createdatabase", "1", args.len()));
            }
            create_database(args[0].as_str("createdatabase", 1)?)?;
            Ok(Value::ok())
        },
    );
    declare(
        env,
        Declaration {
            name: "dropdatabase",
            desc: "Removes a database and all of its tables.",
            min_params: 1,
            max_params: 1,
            params: vec![param("schema", "string", "database name")],
            returns: "string",
        },
        |args| {
            if args.len() != 1 {
                return Err(ScmError::arity_error("dropdatabase", "1", args.len()));
            }
            drop_database(args[0].as_str("dropdatabase", 1)?)?;
            Ok(Value::ok())
        },
    );
    declare(
        env,
        Declaration {
            name: "createtable",
            desc: "Creates a table in a database.",
            min_params: 2,
            max_params: 2,
            params: vec![
                param("schema", "string", "database name"),
                param("table", "string", "table name"),
            ],
            returns: "string",
        },
        |args| {
            if args.len() != 2 {
                return Err(ScmError::arity_error("createtable", "2", args.len()));
            }
            let schema = args[0].as_str("createtable", 1)?;
            let table = args[1].as_str("createtable", 2)?;
            database_of(schema)?.create_table(table)?;
            Ok(Value::ok())
        },
    );
    declare(
        env,
        Declaration {
            name: "droptable",
            desc: "Removes a table from a database.",
            min_params: 2,
            max_params: 2,
            params: vec![
                param("schema", "string", "database name"),
                param("table", "string", "table name"),
            ],
            returns: "string",
        },
        |args| {
            if args.len() != 2 {
                return Err(ScmError::arity_error("droptable", "2", args.len()));
            }
            let schema = args[0].as_str("droptable", 1)?;
            database_of(schema)?.drop_table(args[1].as_str("droptable", 2)?)?;
            Ok(Value::ok())
        },
    );
    declare(
        env,
        Declaration {
            name: "createcolumn",
            desc: "Adds a column to a table. Existing rows read nil in the new\ncolumn. Dimensions parameterize the type, e.g. (10 3) for\ndecimal precision and scale.",
            min_params: 4,
            max_params: 6,
            params: vec![
                param("schema", "string", "database name"),
                param("table", "string", "table name"),
                param("name", "string", "column name"),
                param("type", "string", "column type"),
                param("dimensions", "list", "type dimensions"),
                param("extrainfo", "string", "extra attributes"),
            ],
            returns: "string",
        },
        |args| {
            if args.len() < 4 || args.len() > 6 {
                return Err(ScmError::arity_error("createcolumn", "4-6", args.len()));
            }
            let table = table_of(
                args[0].as_str("createcolumn", 1)?,
                args[1].as_str("createcolumn", 2)?,
            )?;
            let name = args[2].as_str("createcolumn", 3)?;
            let typ = args[3].as_str("createcolumn", 4)?;
            let mut dims = Vec::new();
            if let Some(list) = args.get(4) {
                for (i, d) in list.as_list("createcolumn", 5)?.iter().enumerate() {
                    dims.push(d.as_number("createcolumn", 5 + i)? as usize);
                }
            }
            let extra = match args.get(5) {
                Some(v) => v.as_str("createcolumn", 6)?,
                None => "",
            };
            table.create_column(name, typ, dims, extra)?;
            Ok(Value::ok())
        },
    );
    declare(
        env,
        Declaration {
            name: "show",
            desc: "Introspection: without arguments lists databases, with a schema\nlists its tables, with schema and table lists the column\nmetadata.",
            min_params: 0,
            max_params: 2,
            params: vec![
                param("schema", "string", "database name"),
                param("table", "string", "table name"),
            ],
            returns: "list",
        },
        |args| match args {
            [] => Ok(Value::List(
                database_names().into_iter().map(Value::string).collect(),
            )),
            [schema] => {
                let db = database_of(schema.as_str("show", 1)?)?;
                Ok(Value::List(
                    db.table_names().into_iter().map(Value::string).collect(),
                ))
            }
            [schema, table] => {
                let t = table_of(schema.as_str("show", 1)?, table.as_str("show", 2)?)?;
                Ok(t.show_columns())
            }
            more => Err(ScmError::arity_error("show", "0-2", more.len())),
        },
    );
    declare(
        env,
        Declaration {
            name: "insert",
            desc: "Appends one row, given as a flat assoc list of column name and\nvalue pairs. Unmapped columns receive nil.",
            min_params: 3,
            max_params: 3,
            params: vec![
                param("schema", "string", "database name"),
                param("table", "string", "table name"),
                param("dataset", "list", "row as (column value …) pairs"),
            ],
            returns: "string",
        },
        |args| {
            if args.len() != 3 {
                return Err(ScmError::arity_error("insert", "3", args.len()));
            }
            let table = table_of(args[0].as_str("insert", 1)?, args[1].as_str("insert", 2)?)?;
            let row = Dataset::from_assoc(&args[2])?;
            table.insert(&row);
            Ok(Value::ok())
        },
    );
    declare(
        env,
        Declaration {
            name: "scan",
            desc: "Iterates rows where the predicate holds on the column value,\ncalling the visitor with per-shard row indices.",
            min_params: 5,
            max_params: 5,
            params: vec![
                param("schema", "string", "database name"),
                param("table", "string", "table name"),
                param("column", "string", "column to filter on"),
                param("predicate", "func", "lambda (value) -> bool"),
                param("visitor", "func", "lambda (row-index)"),
            ],
            returns: "string",
        },
        |args| {
            if args.len() != 5 {
                return Err(ScmError::arity_error("scan", "5", args.len()));
            }
            let table = table_of(args[0].as_str("scan", 1)?, args[1].as_str("scan", 2)?)?;
            table.scan(args[2].as_str("scan", 3)?, &args[3], &args[4])?;
            Ok(Value::ok())
        },
    );
    declare(
        env,
        Declaration {
            name: "count",
            desc: "Total number of rows in a table, summed over its shards.",
            min_params: 2,
            max_params: 2,
            params: vec![
                param("schema", "string", "database name"),
                param("table", "string", "table name"),
            ],
            returns: "number",
        },
        |args| {
            if args.len() != 2 {
                return Err(ScmError::arity_error("count", "2", args.len()));
            }
            let table = table_of(args[0].as_str("count", 1)?, args[1].as_str("count", 2)?)?;
            Ok(Value::Number(table.count() as f64))
        },
    );
    declare(
        env,
        Declaration {
            name: "rebuild",
            desc: "Synchronously compresses every populated open shard of a table,\nleaving a fresh writable tail.",
            min_params: 2,
            max_params: 2,
            params: vec![
                param("schema", "string", "database name"),
                param("table", "string", "table name"),
            ],
            returns: "string",
        },
        |args| {
            if args.len() != 2 {
                return Err(ScmError::arity_error("rebuild", "2", args.len()));
            }
            let table = table_of(args[0].as_str("rebuild", 1)?, args[1].as_str("rebuild", 2)?)?;
            table.seal_now();
            Ok(Value::ok())
        },
    );
}

/// Register the storage operations that touch the filesystem; these belong
/// in the IO child env, next to load and import.
pub fn register_io(env: &Arc<Environment>, base: &Path) {
    let base = base.to_path_buf();
    declare(
        env,
        Declaration {
            name: "loadCSV",
            desc: "Streams a delimited text file into a table: one row per line,\nfields mapped to the schema columns in order, numeric-looking\nfields coerced to numbers, empty lines skipped.",
            min_params: 4,
            max_params: 4,
            params: vec![
                param("schema", "string", "database name"),
                param("table", "string", "table name"),
                param("filename", "string", "file to read"),
                param("delimiter", "string", "single-byte field separator"),
            ],
            returns: "string",
        },
        move |args| {
            if args.len() != 4 {
                return Err(ScmError::arity_error("loadCSV", "4", args.len()));
            }
            let table = table_of(args[0].as_str("loadCSV", 1)?, args[1].as_str("loadCSV", 2)?)?;
            let filename = base.join(args[2].as_str("loadCSV", 3)?);
            csv::load_csv(&table, &filename, args[3].as_str("loadCSV", 4)?)?;
            Ok(Value::ok())
        },
    );
}
