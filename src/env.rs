use tracing::debug;

use crate::coerce::RawValue;
use crate::merge::Source;
use crate::types::FieldDescriptor;

/// Where environment variables come from.
#[derive(Debug, Clone)]
pub enum EnvProvider {
    /// The live process environment, re-read on every merge.
    Process,
    /// A fixed set of variables. Used by tests and embedders.
    Fixed(Vec<(String, String)>),
    Disabled,
}

/// Maps settings keys to environment variables.
///
/// Key `apis.search` with prefix `MYAPP` reads `MYAPP_APIS_SEARCH`. `.` and `-`
/// become `_`, and names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct EnvBinder {
    prefix: Option<String>,
    provider: EnvProvider,
}

impl EnvBinder {
    pub fn new(prefix: Option<String>, provider: EnvProvider) -> Self {
        Self { prefix, provider }
    }

    /// Capture the current variables. Sources are queried against a snapshot
    /// so one merge sees one consistent environment.
    pub fn snapshot(&self) -> EnvSnapshot {
        let vars = match &self.provider {
            EnvProvider::Process => std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
            EnvProvider::Fixed(vars) => vars.clone(),
            EnvProvider::Disabled => Vec::new(),
        };
        EnvSnapshot {
            prefix: self.prefix.clone(),
            vars,
        }
    }
}

/// One read of the environment.
#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    prefix: Option<String>,
    vars: Vec<(String, String)>,
}

impl EnvSnapshot {
    /// Look up the variable bound to `key`. Empty values count as unset.
    ///
    /// An exact uppercase name wins over other spellings of the same name.
    pub fn get(&self, key: &str) -> Option<&str> {
        let name = env_var_name(self.prefix.as_deref(), key);
        let set = |(_, v): &&(String, String)| !v.is_empty();
        self.vars
            .iter()
            .filter(set)
            .find(|(k, _)| *k == name)
            .or_else(|| {
                self.vars
                    .iter()
                    .filter(set)
                    .find(|(k, _)| k.eq_ignore_ascii_case(&name))
            })
            .map(|(_, v)| v.as_str())
    }
}

impl Source for EnvSnapshot {
    fn name(&self) -> &'static str {
        "env"
    }

    fn lookup(&self, field: &FieldDescriptor) -> Option<RawValue> {
        let value = self.get(&field.key)?;
        debug!(key = %field.key, "value found in environment");
        Some(RawValue::Text(value.to_string()))
    }
}

/// Build the environment variable name for a settings key.
pub fn env_var_name(prefix: Option<&str>, key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    match prefix {
        Some(p) if !p.is_empty() => format!("{}_{stem}", p.to_ascii_uppercase()),
        _ => stem,
    }
}
