use std::ffi::OsString;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::env::{EnvBinder, EnvProvider, EnvSnapshot};
use crate::error::FlagfigError;
use crate::file::{self, FileSource};
use crate::flags::{self, CONFIG_DIRS_FLAG, CONFIG_FLAG, FlagSnapshot};
use crate::loader::Loader;
use crate::merge;
use crate::schema::Schema;

/// Entry point for binding a settings struct.
pub struct Flagfig;

impl Flagfig {
    pub fn builder<T>(settings: T) -> FlagfigBuilder<T>
    where
        T: Serialize + DeserializeOwned,
    {
        FlagfigBuilder::new(settings)
    }

    /// Bind `settings` to `args` (program path first), the process
    /// environment, and the config profile named by `--config`.
    ///
    /// The values already in `settings` are the defaults.
    pub fn new<T, I, A>(settings: T, args: I) -> Result<Loader<T>, FlagfigError>
    where
        T: Serialize + DeserializeOwned,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self::builder(settings).args(args).build()
    }
}

/// Builder for a [`Loader`].
pub struct FlagfigBuilder<T> {
    settings: T,
    args: Option<Vec<OsString>>,
    descriptions: Vec<(String, String)>,
    env_prefix: Option<String>,
    env_enabled: bool,
    env_vars: Option<Vec<(String, String)>>,
    search_dirs: Option<Vec<PathBuf>>,
    watch: bool,
}

impl<T> FlagfigBuilder<T>
where
    T: Serialize + DeserializeOwned,
{
    fn new(settings: T) -> Self {
        Self {
            settings,
            args: None,
            descriptions: Vec::new(),
            env_prefix: None,
            env_enabled: true,
            env_vars: None,
            search_dirs: None,
            watch: true,
        }
    }

    /// Set the argument list, program path first (default: the process
    /// arguments).
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Attach help text to a field, shown by `--help`.
    pub fn describe(mut self, key: &str, description: &str) -> Self {
        self.descriptions
            .push((key.to_string(), description.to_string()));
        self
    }

    /// Read `{PREFIX}_{KEY}` instead of `{KEY}` from the environment.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Disable environment variable loading entirely.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Use a fixed set of variables instead of the process environment.
    pub fn env_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env_vars = Some(vars.into_iter().collect());
        self
    }

    /// Replace the built-in config search directories. `--config-dirs` still
    /// takes precedence.
    pub fn search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = Some(dirs);
        self
    }

    /// Enable or disable watching the config file (default: `true`).
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    fn effective_args(&self) -> Vec<OsString> {
        match &self.args {
            Some(args) => args.clone(),
            None => std::env::args_os().collect(),
        }
    }

    /// The program path used to derive the built-in search directories.
    fn effective_program(args: &[OsString]) -> PathBuf {
        match args.first() {
            Some(program) => PathBuf::from(program),
            None => std::env::current_exe().unwrap_or_default(),
        }
    }

    fn effective_env(&self) -> EnvBinder {
        let provider = if !self.env_enabled {
            EnvProvider::Disabled
        } else if let Some(vars) = &self.env_vars {
            EnvProvider::Fixed(vars.clone())
        } else {
            EnvProvider::Process
        };
        EnvBinder::new(self.env_prefix.clone(), provider)
    }

    /// Extract the schema, bind every source, and run the first merge.
    pub fn build(self) -> Result<Loader<T>, FlagfigError> {
        let mut schema = Schema::of::<T>()?;
        for (key, description) in &self.descriptions {
            schema.describe(key, description)?;
        }

        let defaults = merge::to_table(&self.settings)?;
        let args = self.effective_args();
        let builtin_dirs = match &self.search_dirs {
            Some(dirs) => dirs.clone(),
            None => file::default_search_dirs(&Self::effective_program(&args)),
        };
        let flags = flags::parse(&schema, &defaults, &builtin_dirs, args)?;

        let env = self.effective_env();
        let env_now = env.snapshot();

        let profile = profile(&flags, &env_now);
        let file = match &profile {
            Some(profile) => {
                let dirs = config_dirs(&flags, &env_now).unwrap_or(builtin_dirs);
                Some(FileSource::open(profile, &dirs, self.watch)?)
            }
            None => {
                info!(
                    "No configuration name has been specified, so no configuration file will be loaded. Using flags and environment variables."
                );
                None
            }
        };

        debug!(fields = schema.fields().len(), "sources bound");
        let mut loader = Loader {
            settings: self.settings,
            schema,
            flags,
            env,
            profile,
            file,
        };
        loader.merge(&env_now)?;
        Ok(loader)
    }
}

/// The profile named by `--config`, or by the `CONFIG` variable when the flag
/// is absent. Empty means no profile.
fn profile(flags: &FlagSnapshot, env: &EnvSnapshot) -> Option<String> {
    flags
        .profile
        .clone()
        .or_else(|| env.get(CONFIG_FLAG).map(str::to_string))
        .filter(|p| !p.is_empty())
}

/// Search directories from `--config-dirs`, or from the comma separated
/// `CONFIG_DIRS` variable.
fn config_dirs(flags: &FlagSnapshot, env: &EnvSnapshot) -> Option<Vec<PathBuf>> {
    flags.config_dirs.clone().or_else(|| {
        env.get(CONFIG_DIRS_FLAG).map(|dirs| {
            dirs.split(',')
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect()
        })
    })
}
