//! Bind a plain settings struct to command-line flags, environment variables,
//! and a named config file. Define a struct, fill in defaults, and go.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Settings {
//!     host: String,
//!     port: u16,
//!     verbose: bool,
//! }
//!
//! let defaults = Settings { host: "localhost".into(), port: 6000, verbose: false };
//! let mut settings = Flagfig::new(defaults, std::env::args_os())?;
//! println!("{}:{}", settings.host, settings.port);
//! ```
//!
//! That single call registers `--host`, `--port` and `--verbose`, reads
//! `HOST`, `PORT` and `VERBOSE` from the environment, loads the profile named
//! by `--config` when one is given, and writes the merged values back into
//! the struct.
//!
//! # The struct is the schema
//!
//! The field names (after serde renames) are the keys for every source. The
//! values the struct holds when it is bound are the defaults, and `--help`
//! shows them. No separate registry exists.
//!
//! Supported field types:
//!
//! | Rust type | Flag value | Env value |
//! |-----------|------------|-----------|
//! | `String` | `--a=text` | `A=text` |
//! | `i8`..`i32`, `u8`..`u32` | `--b=-5` | `B=-5` |
//! | `i64`, `u64`, `isize`, `usize` | `--b64=...` | `B64=...` |
//! | `f32`, `f64` | `--c=0.5` | `C=0.5` |
//! | `bool` | `--f`, `--f=false` | `F=1`, `F=false` |
//! | `Vec<String>` | `--d=x,y` | `D="x y"` |
//! | `Vec<i32>` and other integer lists | `--e=1,2` | `E="1 2"` |
//! | `Vec<bool>` | `--g=t,f` | `G="t f"` |
//!
//! Values travel as signed 64-bit integers, so an unsigned field holding more
//! than `i64::MAX` fails to load. Nested structs, `Option` fields, `i128` and
//! `u128`, and lists of floats are rejected when the loader is built. Keys
//! `config`, `config-dirs` and `help` are reserved. Fields marked
//! `#[serde(skip)]` are not bound and keep their value across loads.
//!
//! # Precedence
//!
//! ```text
//! Current struct value      the defaults, or the result of the last merge
//!        ↑ overridden by
//! Config file               --config=<profile>
//!        ↑ overridden by
//! Environment               [PREFIX_]KEY
//!        ↑ overridden by
//! Flags                     only flags present on the command line
//! ```
//!
//! Every source is sparse: a field no source sets keeps its current value.
//! A flag left at its default never shadows the environment.
//!
//! # Config files
//!
//! `--config=dev` (or `CONFIG=dev`) looks for `dev.json` and then `dev.toml`
//! in each search directory. The built-in directories are the program's own
//! directory and the working directory, each followed by its `config`,
//! `configs` and `cfg` subdirectories. `--config-dirs=a,b` (or
//! `CONFIG_DIRS=a,b`, or [`FlagfigBuilder::search_dirs`]) replaces that list.
//!
//! Nested objects map to dotted keys, so `{"apis": {"search": "..."}}` binds a
//! field renamed to `apis.search`. Key matching ignores case.
//!
//! # Reloading
//!
//! [`Loader::reload`] re-reads the environment on every call. The config file
//! is watched, and a change is picked up by the next reload; nothing happens
//! in the background. A failed reload leaves the settings untouched.
//! [`Loader::close`] stops the watch.
//!
//! # Logging
//!
//! The crate logs through [`tracing`]. Install any subscriber to see which
//! file was loaded and where each value came from.

pub mod error;
pub mod types;

mod builder;
mod coerce;
mod env;
mod file;
mod flags;
mod loader;
mod merge;
mod schema;
mod watch;

#[cfg(test)]
mod fixtures;

pub use builder::{Flagfig, FlagfigBuilder};
pub use error::{ErrorKind, FlagfigError};
pub use loader::Loader;
pub use schema::{RESERVED_KEYS, Schema};
pub use types::{FieldDescriptor, SemanticType};
