//! Command-line flag binding.
//!
//! Every schema key becomes a `--<key>` long flag on a `clap::Command` built
//! at runtime, next to the two reserved flags `--config` and `--config-dirs`.
//! The record's current values are shown as defaults in `--help` but are not
//! registered with clap: only flags the user actually passed end up in the
//! snapshot, so an untouched flag never shadows the environment.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use toml::{Table, Value};
use tracing::debug;

use crate::coerce::{RawValue, parse_bool};
use crate::error::FlagfigError;
use crate::merge::Source;
use crate::schema::Schema;
use crate::types::{FieldDescriptor, SemanticType};

pub const CONFIG_FLAG: &str = "config";
pub const CONFIG_DIRS_FLAG: &str = "config-dirs";
/// Id of the hidden positional argument. Contains whitespace, which no
/// schema key may, so it cannot collide with a field flag.
const POSITIONAL: &str = "positional args";

/// Values parsed from the argument list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagSnapshot {
    /// Explicitly passed schema flags, typed by their semantic type.
    values: BTreeMap<String, Value>,
    pub profile: Option<String>,
    pub config_dirs: Option<Vec<PathBuf>>,
    pub positional: Vec<String>,
}

impl FlagSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

impl Source for FlagSnapshot {
    fn name(&self) -> &'static str {
        "flags"
    }

    fn lookup(&self, field: &FieldDescriptor) -> Option<RawValue> {
        self.get(&field.key).cloned().map(RawValue::Node)
    }
}

/// Parse `args` (program path first) against the schema.
///
/// `defaults` holds the record's pre-load values and `search_dirs` the
/// built-in config directories; both only feed the help text.
pub fn parse<I, A>(
    schema: &Schema,
    defaults: &Table,
    search_dirs: &[PathBuf],
    args: I,
) -> Result<FlagSnapshot, FlagfigError>
where
    I: IntoIterator<Item = A>,
    A: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let program = args
        .first()
        .and_then(|p| Path::new(p).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string());

    let matches = command(program, schema, defaults, search_dirs).try_get_matches_from(args)?;
    Ok(snapshot(schema, &matches))
}

/// Build the `clap::Command` for a schema.
pub fn command(
    program: String,
    schema: &Schema,
    defaults: &Table,
    search_dirs: &[PathBuf],
) -> Command {
    let dirs_help = format!(
        "Configuration directories search paths [default: {}]",
        search_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    );

    let mut cmd = Command::new(program)
        .disable_version_flag(true)
        .arg(
            Arg::new(CONFIG_FLAG)
                .long(CONFIG_FLAG)
                .value_name("PROFILE")
                .help("Configuration name"),
        )
        .arg(
            Arg::new(CONFIG_DIRS_FLAG)
                .long(CONFIG_DIRS_FLAG)
                .value_name("DIRS")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .help(dirs_help),
        )
        .arg(
            Arg::new(POSITIONAL)
                .num_args(1..)
                .action(ArgAction::Append)
                .hide(true),
        );

    for field in schema.fields() {
        cmd = cmd.arg(field_arg(field, defaults.get(&field.key)));
    }
    cmd
}

fn field_arg(field: &FieldDescriptor, default: Option<&Value>) -> Arg {
    let arg = Arg::new(field.key.clone())
        .long(field.key.clone())
        .help(help_text(field, default));

    match field.kind {
        SemanticType::String => arg.action(ArgAction::Set),
        SemanticType::Int | SemanticType::Int64 => arg
            .action(ArgAction::Set)
            .allow_negative_numbers(true)
            .value_parser(value_parser!(i64)),
        SemanticType::Float64 => arg
            .action(ArgAction::Set)
            .allow_negative_numbers(true)
            .value_parser(value_parser!(f64)),
        SemanticType::Bool => arg
            .action(ArgAction::Set)
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(bool_flag),
        SemanticType::StringList => arg.action(ArgAction::Append).value_delimiter(','),
        SemanticType::IntList => arg
            .action(ArgAction::Append)
            .value_delimiter(',')
            .allow_negative_numbers(true)
            .value_parser(value_parser!(i64)),
        SemanticType::BoolList => arg
            .action(ArgAction::Append)
            .value_delimiter(',')
            .value_parser(bool_flag),
    }
}

fn help_text(field: &FieldDescriptor, default: Option<&Value>) -> String {
    let desc = field.description.as_deref().unwrap_or_default();
    match default.map(render_default) {
        Some(d) if !d.is_empty() && desc.is_empty() => format!("[default: {d}]"),
        Some(d) if !d.is_empty() => format!("{desc} [default: {d}]"),
        _ => desc.to_string(),
    }
}

fn render_default(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_default)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn bool_flag(s: &str) -> Result<bool, String> {
    parse_bool(s).ok_or_else(|| format!("'{s}' is not a boolean"))
}

fn snapshot(schema: &Schema, matches: &ArgMatches) -> FlagSnapshot {
    let mut values = BTreeMap::new();
    for field in schema.fields() {
        let key = field.key.as_str();
        let value = match field.kind {
            SemanticType::String => matches.get_one::<String>(key).cloned().map(Value::String),
            SemanticType::Int | SemanticType::Int64 => {
                matches.get_one::<i64>(key).copied().map(Value::Integer)
            }
            SemanticType::Float64 => matches.get_one::<f64>(key).copied().map(Value::Float),
            SemanticType::Bool => matches.get_one::<bool>(key).copied().map(Value::Boolean),
            SemanticType::StringList => matches
                .get_many::<String>(key)
                .map(|vals| Value::Array(vals.cloned().map(Value::String).collect())),
            SemanticType::IntList => matches
                .get_many::<i64>(key)
                .map(|vals| Value::Array(vals.copied().map(Value::Integer).collect())),
            SemanticType::BoolList => matches
                .get_many::<bool>(key)
                .map(|vals| Value::Array(vals.copied().map(Value::Boolean).collect())),
        };
        if let Some(value) = value {
            debug!(key, "flag set on command line");
            values.insert(field.key.clone(), value);
        }
    }

    FlagSnapshot {
        values,
        profile: matches.get_one::<String>(CONFIG_FLAG).cloned(),
        config_dirs: matches
            .get_many::<PathBuf>(CONFIG_DIRS_FLAG)
            .map(|dirs| dirs.cloned().collect()),
        positional: matches
            .get_many::<String>(POSITIONAL)
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default(),
    }
}
