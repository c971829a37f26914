//! Config file discovery and loading.
//!
//! # Discovery
//!
//! A profile name `dev` is looked up as `dev.json`, then `dev.toml`, in each
//! search directory in order. The first file found wins. The built-in
//! directories are, in order:
//!
//! - the directory of the running program, then its `config`, `configs` and
//!   `cfg` subdirectories;
//! - the current working directory, then the same three subdirectories.
//!
//! Directories given by the user replace this list entirely.
//!
//! # Snapshot
//!
//! The parsed file is flattened into dotted keys (`{"apis": {"search": ..}}`
//! becomes `apis.search`), lowercased so that lookups ignore case. Arrays are
//! kept whole as leaf values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::{debug, info, warn};

use crate::coerce::RawValue;
use crate::error::FlagfigError;
use crate::merge::Source;
use crate::types::FieldDescriptor;
use crate::watch::FileWatch;

/// Conventional config subdirectory names searched under each base directory.
pub const CONFIG_SUBDIRS: [&str; 3] = ["config", "configs", "cfg"];

/// File extensions tried for a profile, in order.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Built-in search directories for a program path (usually `argv[0]`).
pub fn default_search_dirs(program: &Path) -> Vec<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let program_dir = match program.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Some(cwd.join(parent)),
        Some(_) => Some(cwd.clone()),
        None => {
            warn!(program = %program.display(), "can't find the program directory, using current working directory");
            None
        }
    };

    let mut dirs = Vec::new();
    for base in program_dir.into_iter().chain(std::iter::once(cwd)) {
        if dirs.contains(&base) {
            continue;
        }
        dirs.push(base.clone());
        for sub in CONFIG_SUBDIRS {
            dirs.push(base.join(sub));
        }
    }
    dirs
}

/// Find the file for `profile` in `dirs`.
pub fn find_profile(profile: &str, dirs: &[PathBuf]) -> Result<PathBuf, FlagfigError> {
    for dir in dirs {
        for ext in SUPPORTED_EXTENSIONS {
            let path = dir.join(format!("{profile}.{ext}"));
            if path.is_file() {
                return Ok(path);
            }
        }
    }
    Err(FlagfigError::ProfileNotFound {
        profile: profile.to_string(),
        dirs: dirs.to_vec(),
    })
}

/// Read and parse a config file into a table, choosing the parser by
/// extension.
pub fn read_table(path: &Path) -> Result<Table, FlagfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| FlagfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_table(path, &content)
}

fn parse_table(path: &Path, content: &str) -> Result<Table, FlagfigError> {
    let parse_error = |reason: String| FlagfigError::ParseError {
        path: path.to_path_buf(),
        reason,
    };

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            let json: serde_json::Value =
                serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;
            match json_to_toml(json) {
                Some(Value::Table(table)) => Ok(table),
                _ => Err(parse_error("top level must be an object".into())),
            }
        }
        Some("toml") => toml::from_str(content).map_err(|e: toml::de::Error| parse_error(e.to_string())),
        other => Err(parse_error(format!(
            "unsupported extension {}",
            other.unwrap_or("(none)")
        ))),
    }
}

/// Convert JSON into TOML values. `null`s have no TOML counterpart: object
/// members set to `null` are dropped, which makes them behave like absent keys.
fn json_to_toml(json: serde_json::Value) -> Option<Value> {
    use serde_json::Value as Json;

    match json {
        Json::Null => None,
        Json::Bool(b) => Some(Value::Boolean(b)),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float)),
        Json::String(s) => Some(Value::String(s)),
        // A null list element keeps its slot as an empty string, which every
        // list coercion turns into the element's zero value.
        Json::Array(items) => Some(Value::Array(
            items
                .into_iter()
                .map(|item| json_to_toml(item).unwrap_or_else(|| Value::String(String::new())))
                .collect(),
        )),
        Json::Object(map) => Some(Value::Table(
            map.into_iter()
                .filter_map(|(k, v)| json_to_toml(v).map(|v| (k, v)))
                .collect(),
        )),
    }
}

/// Flatten nested tables into dotted, lowercased keys.
pub fn flatten_table(table: &Table) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(table, "", &mut out);
    out
}

fn flatten_into(table: &Table, prefix: &str, out: &mut BTreeMap<String, Value>) {
    for (key, value) in table {
        let dotted = if prefix.is_empty() {
            key.to_lowercase()
        } else {
            format!("{prefix}.{}", key.to_lowercase())
        };
        match value {
            Value::Table(sub) => flatten_into(sub, &dotted, out),
            leaf => {
                out.insert(dotted, leaf.clone());
            }
        }
    }
}

/// The loaded config file plus the passive watch that tracks its changes.
pub struct FileSource {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
    watch: Option<FileWatch>,
    seen_generation: u64,
}

impl FileSource {
    /// Resolve `profile` in `dirs`, load it, and optionally start watching it.
    pub fn open(profile: &str, dirs: &[PathBuf], watch: bool) -> Result<Self, FlagfigError> {
        debug!(?dirs, profile, "searching for config file");
        let path = find_profile(profile, dirs)?;
        let path = std::fs::canonicalize(&path).unwrap_or(path);
        let entries = flatten_table(&read_table(&path)?);
        info!(path = %path.display(), "config file loaded");

        let watch = if watch {
            match FileWatch::start(&path) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "config file watch unavailable");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            path,
            entries,
            watch,
            seen_generation: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the watcher saw a change that has not been loaded yet.
    pub fn is_stale(&self) -> bool {
        self.watch
            .as_ref()
            .is_some_and(|w| w.generation() != self.seen_generation)
    }

    /// Re-read the file if the watcher reported a change. On failure the
    /// previous snapshot stays and the change remains pending.
    pub fn refresh(&mut self) -> Result<bool, FlagfigError> {
        let Some(generation) = self.watch.as_ref().map(FileWatch::generation) else {
            return Ok(false);
        };
        if generation == self.seen_generation {
            return Ok(false);
        }
        self.entries = flatten_table(&read_table(&self.path)?);
        self.seen_generation = generation;
        info!(path = %self.path.display(), generation, "config file reloaded");
        Ok(true)
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Stop watching. Later reloads keep using the last loaded snapshot.
    pub fn unwatch(&mut self) {
        if self.watch.take().is_some() {
            debug!(path = %self.path.display(), "config file watch released");
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(&key.to_lowercase())
    }
}

impl Source for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn lookup(&self, field: &FieldDescriptor) -> Option<RawValue> {
        self.get(&field.key).cloned().map(RawValue::Node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::TEST_JSON;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_dirs_cover_program_and_cwd() {
        let dir = TempDir::new().unwrap();
        let program = dir.path().join("bin").join("app");
        let dirs = default_search_dirs(&program);
        let cwd = std::env::current_dir().unwrap();

        assert_eq!(dirs[0], dir.path().join("bin"));
        assert_eq!(dirs[1], dir.path().join("bin").join("config"));
        assert_eq!(dirs[2], dir.path().join("bin").join("configs"));
        assert_eq!(dirs[3], dir.path().join("bin").join("cfg"));
        assert_eq!(dirs[4], cwd);
        assert_eq!(dirs[7], cwd.join("cfg"));
        assert_eq!(dirs.len(), 8);
    }

    #[test]
    fn bare_program_name_resolves_to_cwd_once() {
        let dirs = default_search_dirs(Path::new("app"));
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(dirs.len(), 4);
        assert_eq!(dirs[0], cwd);
        assert_eq!(dirs[1], cwd.join("config"));
    }

    #[test]
    fn find_first_dir_wins() {
        let low = TempDir::new().unwrap();
        let high = TempDir::new().unwrap();
        fs::write(high.path().join("dev.json"), "{}").unwrap();
        fs::write(low.path().join("dev.json"), "{}").unwrap();

        let dirs = vec![high.path().to_path_buf(), low.path().to_path_buf()];
        assert_eq!(find_profile("dev", &dirs).unwrap(), high.path().join("dev.json"));
    }

    #[test]
    fn json_tried_before_toml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dev.toml"), "a = 1\n").unwrap();
        fs::write(dir.path().join("dev.json"), "{}").unwrap();
        let found = find_profile("dev", &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(found.extension().unwrap(), "json");
    }

    #[test]
    fn missing_profile_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = find_profile("nope", &[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, FlagfigError::ProfileNotFound { ref profile, .. } if profile == "nope"));
    }

    #[test]
    fn directory_named_like_profile_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("dev.json")).unwrap();
        assert!(find_profile("dev", &[dir.path().to_path_buf()]).is_err());
    }

    #[test]
    fn json_file_parses_and_flattens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.json");
        fs::write(&path, TEST_JSON).unwrap();

        let entries = flatten_table(&read_table(&path).unwrap());
        assert_eq!(entries["a"], Value::String("from json".into()));
        assert_eq!(entries["b64"], Value::Integer(1_000_000_000_000_000));
        assert_eq!(entries["c"], Value::Float(0.001));
        assert_eq!(
            entries["e"],
            Value::Array(vec![10.into(), 20.into(), 30.into()])
        );
    }

    #[test]
    fn nested_objects_become_dotted_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dev.json");
        fs::write(&path, r#"{"Host": "h", "apis": {"search": "s", "empty": null}}"#).unwrap();

        let entries = flatten_table(&read_table(&path).unwrap());
        assert_eq!(entries["host"], Value::String("h".into()));
        assert_eq!(entries["apis.search"], Value::String("s".into()));
        assert!(!entries.contains_key("apis.empty"));
    }

    #[test]
    fn null_list_elements_keep_their_position() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dev.json");
        fs::write(&path, r#"{"e": [1, null, 3]}"#).unwrap();

        let entries = flatten_table(&read_table(&path).unwrap());
        assert_eq!(
            entries["e"],
            Value::Array(vec![1.into(), Value::String(String::new()), 3.into()])
        );
    }

    #[test]
    fn toml_sections_become_dotted_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dev.toml");
        fs::write(&path, "port = 1\n[apis]\nsearch = \"s\"\n").unwrap();

        let entries = flatten_table(&read_table(&path).unwrap());
        assert_eq!(entries["port"], Value::Integer(1));
        assert_eq!(entries["apis.search"], Value::String("s".into()));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_table(&path), Err(FlagfigError::ParseError { .. })));
    }

    #[test]
    fn json_array_at_top_level_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(read_table(&path), Err(FlagfigError::ParseError { .. })));
    }

    #[test]
    fn source_lookup_ignores_key_case() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dev.json"), r#"{"APIS": {"Search": "s"}}"#).unwrap();

        let source = FileSource::open("dev", &[dir.path().to_path_buf()], false).unwrap();
        assert_eq!(source.get("apis.search"), Some(&Value::String("s".into())));
        assert_eq!(source.get("APIS.SEARCH"), Some(&Value::String("s".into())));
        assert!(!source.is_watching());
        assert!(!source.is_stale());
    }

    #[test]
    fn unwatched_source_never_refreshes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dev.json");
        fs::write(&path, r#"{"a": "one"}"#).unwrap();

        let mut source = FileSource::open("dev", &[dir.path().to_path_buf()], false).unwrap();
        fs::write(&path, r#"{"a": "two"}"#).unwrap();
        assert!(!source.refresh().unwrap());
        assert_eq!(source.get("a"), Some(&Value::String("one".into())));
    }
}
