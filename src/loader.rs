use std::ops::Deref;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::env::{EnvBinder, EnvSnapshot};
use crate::error::FlagfigError;
use crate::file::FileSource;
use crate::flags::FlagSnapshot;
use crate::merge::{self, Source};
use crate::schema::Schema;

/// A settings struct bound to its sources.
///
/// Created by [`Flagfig::new`](crate::Flagfig::new) or
/// [`FlagfigBuilder::build`](crate::FlagfigBuilder::build), which also run the
/// first merge. Dereferences to the settings.
///
/// Flags are parsed once. The environment is re-read on every
/// [`reload`](Self::reload), and the config file is re-read when its watcher
/// has seen a change.
pub struct Loader<T> {
    pub(crate) settings: T,
    pub(crate) schema: Schema,
    pub(crate) flags: FlagSnapshot,
    pub(crate) env: EnvBinder,
    pub(crate) profile: Option<String>,
    pub(crate) file: Option<FileSource>,
}

impl<T> Loader<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Merge flags, environment and config file into the settings again.
    ///
    /// Each field takes the first value found, in the order flags, environment,
    /// config file. A field no source sets keeps its current value. On error
    /// the settings are left exactly as they were.
    pub fn reload(&mut self) -> Result<(), FlagfigError> {
        if let Some(file) = self.file.as_mut() {
            file.refresh()?;
        }
        let env = self.env.snapshot();
        self.merge(&env)?;
        info!("settings reloaded");
        Ok(())
    }

    pub(crate) fn merge(&mut self, env: &EnvSnapshot) -> Result<(), FlagfigError> {
        let mut sources: Vec<&dyn Source> = vec![&self.flags, env];
        if let Some(file) = &self.file {
            sources.push(file);
        }
        merge::apply(&self.schema, &sources, &mut self.settings)
    }
}

impl<T> Loader<T> {
    /// Stop watching the config file. Later reloads still merge flags,
    /// environment and the last loaded file contents.
    pub fn close(&mut self) {
        if let Some(file) = self.file.as_mut() {
            file.unwatch();
        }
        debug!("loader closed");
    }

    pub fn settings(&self) -> &T {
        &self.settings
    }

    pub fn into_inner(self) -> T {
        self.settings
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The profile name given by `--config` or `CONFIG`, if any.
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// The resolved config file, if a profile was given.
    pub fn config_file(&self) -> Option<&Path> {
        self.file.as_ref().map(FileSource::path)
    }

    /// Whether the config file changed since it was last loaded.
    pub fn is_stale(&self) -> bool {
        self.file.as_ref().is_some_and(FileSource::is_stale)
    }

    pub fn is_watching(&self) -> bool {
        self.file.as_ref().is_some_and(FileSource::is_watching)
    }

    /// Arguments that were not flags.
    pub fn positional(&self) -> &[String] {
        &self.flags.positional
    }
}

impl<T> Deref for Loader<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use crate::Flagfig;
    use crate::error::ErrorKind;
    use crate::fixtures::test::TestConfig;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    /// Swap in new file contents atomically, so a reload never sees a
    /// half-written file.
    fn replace(path: &Path, content: &str) {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content).unwrap();
        fs::rename(&tmp, path).unwrap();
    }

    fn profile_dir(name: &str, content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = fs::canonicalize(dir.path()).unwrap().join(name);
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn reload_without_changes_is_idempotent() {
        let (dir, _) = profile_dir("dev.json", r#"{"a": "file", "e": [4, 5]}"#);
        let mut loader = Flagfig::builder(TestConfig::defaults())
            .args(["prog", "--config=dev", "--b=7"])
            .search_dirs(vec![dir.path().to_path_buf()])
            .env_vars(vec![("C".into(), "2.5".into())])
            .build()
            .unwrap();
        let first = loader.settings().clone();

        loader.reload().unwrap();
        loader.reload().unwrap();

        assert_eq!(*loader.settings(), first);
        assert_eq!(first.a, "file");
        assert_eq!(first.b, 7);
        assert_eq!(first.c, 2.5);
        assert_eq!(first.e, vec![4, 5]);
    }

    #[test]
    fn reload_picks_up_process_environment() {
        // Unique prefix so no other test reads these variables.
        let prefix = "FLAGFIG_RELOAD_TEST";
        let mut loader = Flagfig::builder(TestConfig::defaults())
            .args(["prog", "--a=imaflag"])
            .env_prefix(prefix)
            .build()
            .unwrap();
        assert_eq!(loader.b, 123);

        // SAFETY: these variables are private to this test and std serializes
        // its own environment access.
        unsafe {
            std::env::set_var("FLAGFIG_RELOAD_TEST_B", "999");
            std::env::set_var("FLAGFIG_RELOAD_TEST_E", "1 2 3");
            std::env::set_var("FLAGFIG_RELOAD_TEST_A", "from env");
        }
        let result = loader.reload();
        unsafe {
            std::env::remove_var("FLAGFIG_RELOAD_TEST_B");
            std::env::remove_var("FLAGFIG_RELOAD_TEST_E");
            std::env::remove_var("FLAGFIG_RELOAD_TEST_A");
        }
        result.unwrap();

        assert_eq!(loader.a, "imaflag");
        assert_eq!(loader.b, 999);
        assert_eq!(loader.e, vec![1, 2, 3]);

        // Unsetting does not revert.
        loader.reload().unwrap();
        assert_eq!(loader.b, 999);
    }

    #[test]
    fn file_change_is_picked_up_on_reload() {
        let (dir, path) = profile_dir("dev.json", r#"{"a": "before", "b": 1}"#);
        let mut loader = Flagfig::builder(TestConfig::defaults())
            .args(["prog", "--config=dev"])
            .search_dirs(vec![dir.path().to_path_buf()])
            .env_vars(vec![])
            .build()
            .unwrap();
        assert_eq!(loader.a, "before");
        assert!(loader.is_watching());

        replace(&path, r#"{"a": "after", "b": 2}"#);
        assert!(wait_for(|| loader.is_stale()));

        loader.reload().unwrap();
        assert_eq!(loader.a, "after");
        assert_eq!(loader.b, 2);
    }

    #[test]
    fn broken_file_on_reload_keeps_settings() {
        let (dir, path) = profile_dir("dev.json", r#"{"a": "good"}"#);
        let mut loader = Flagfig::builder(TestConfig::defaults())
            .args(["prog", "--config=dev"])
            .search_dirs(vec![dir.path().to_path_buf()])
            .env_vars(vec![])
            .build()
            .unwrap();

        replace(&path, "{ broken");
        assert!(wait_for(|| loader.is_stale()));

        let err = loader.reload().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigFile);
        assert_eq!(loader.a, "good");
    }

    #[test]
    fn close_stops_watching() {
        let (dir, path) = profile_dir("dev.json", r#"{"a": "before"}"#);
        let mut loader = Flagfig::builder(TestConfig::defaults())
            .args(["prog", "--config=dev"])
            .search_dirs(vec![dir.path().to_path_buf()])
            .env_vars(vec![])
            .build()
            .unwrap();

        loader.close();
        assert!(!loader.is_watching());

        fs::write(&path, r#"{"a": "after"}"#).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        loader.reload().unwrap();
        assert_eq!(loader.a, "before");
        assert!(!loader.is_stale());
    }

    #[test]
    fn close_without_file_is_noop() {
        let mut loader = Flagfig::builder(TestConfig::defaults())
            .args(["prog"])
            .env_vars(vec![])
            .build()
            .unwrap();
        loader.close();
        loader.close();
        assert_eq!(loader.into_inner(), TestConfig::defaults());
    }

    #[test]
    fn accessors_report_bindings() {
        let mut loader = Flagfig::builder(TestConfig::defaults())
            .args(["prog", "input.txt", "--f"])
            .env_vars(vec![])
            .watch(false)
            .build()
            .unwrap();

        assert_eq!(loader.positional(), ["input.txt"]);
        assert_eq!(loader.schema().fields().len(), 7);
        assert!(loader.f);
        assert!(!loader.is_watching());
        loader.reload().unwrap();
        assert!(loader.f);
    }
}
