// ABOUTME: Version and banner constants for the host binary

pub const VERSION: &str = "0.4.0";
pub const WELCOME_MESSAGE: &str = "memcell v0.4";
pub const WELCOME_SUBTITLE: &str = "In-memory column-shard database with a Scheme scripting core";
pub const WELCOME_FOOTER: &str = "Type (help) for available functions, Ctrl-D to exit.";
