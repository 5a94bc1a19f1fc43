//! Process settings.
//!
//! Settings come from two places: the process environment and an optional
//! `.env` style file next to the binary. Both are merged once into an
//! [`EnvSource`] at startup and every later lookup goes through that value,
//! so the rest of the program never touches the ambient environment.

use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Immutable snapshot of the environment, seeded from a `KEY=VALUE` file.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Read `path` (if it exists) and layer the process environment on top.
    ///
    /// A process variable only shadows the file when it is non-empty.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let mut vars = read_env_file(path.as_ref());
        for (key, value) in std::env::vars() {
            if !value.is_empty() {
                vars.insert(key, value);
            }
        }
        Self { vars }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value for `key`, treating an empty value as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }
}

/// Each line is parsed on its own, so a malformed line (an unterminated
/// quote included) only drops itself. Values follow dotenv rules: `$NAME`
/// expands in unquoted and double-quoted values, ` #` starts a comment in
/// unquoted values, and single-quoted values are taken literally.
fn read_env_file(path: &Path) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return vars,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path.display(), e);
            return vars;
        }
    };

    for (number, line) in contents.lines().enumerate() {
        match dotenvy::from_read_iter(line.as_bytes()).next() {
            Some(Ok((key, value))) => {
                vars.insert(key, value);
            }
            Some(Err(e)) => eprintln!(
                "Skipping malformed line {} in {}: {}",
                number + 1,
                path.display(),
                e
            ),
            None => {}
        }
    }

    vars
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port for the health/metrics listener. Disabled when unset.
    #[serde(default)]
    pub ops_port: Option<u16>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4173
}

impl Config {
    pub fn load(env: &EnvSource) -> Result<Self, AppError> {
        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .source(Some(env.vars().clone())),
            )
            .set_override_option("host", env.get("HOST"))?
            .set_override_option("port", env.get("PORT"))?
            .set_override_option("ops_port", env.get("OPS_PORT"))?
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
