//! velt-script
//!
//! The console scripting language for the velt engine: a single-pass
//! compiler to compact bytecode, a stack VM with a result register, and
//! a symbol registry unifying variables, aliases and native commands
//! under one ident record.
//!
//! The host registers its variables and commands into a [`Console`] at
//! startup and feeds it source chunks (configs, key bindings, console
//! input). Scripts never error at runtime: unknown names, missing
//! arguments and bad coercions all degrade to defined defaults.

pub mod bytecode;
pub mod cfg;
pub mod error;
pub mod ident;
pub mod lexer;
pub mod registry;
pub mod scope;
pub mod value;
pub mod vm;

mod builtins;
mod compiler;
mod sched;

pub use cfg::{escape_id, escape_string};
pub use error::ScriptError;
pub use ident::{ChangeFn, IdentFlags, IdentId, MAX_ARGS};
pub use lexer::unescape_string;
pub use value::{IdentRef, Value};
pub use vm::Console;
