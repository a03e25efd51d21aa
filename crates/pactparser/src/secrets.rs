//! API key resolution.
//!
//! A key may be given inline in the config file, as a path to a file holding
//! it (Docker secrets), or as the name of an environment variable. Sources
//! are tried in that order; the first one that is configured wins, and a
//! configured source that cannot be read is an error rather than a reason to
//! fall through.

use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set an inline key, a key file, or an environment variable)")]
    NoSourceProvided,

    #[error("Failed to read API key from file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file '{0}' is empty")]
    EmptyFile(PathBuf),

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Where to look for a secret. Empty strings count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn is_configured(&self) -> bool {
        [self.direct, self.file, self.env_var]
            .iter()
            .any(|s| non_empty(*s).is_some())
    }

    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(value) = non_empty(self.direct) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(raw) = non_empty(self.file) {
            let path = expand_home(raw);
            let content = std::fs::read_to_string(&path).map_err(|source| SecretError::FileRead {
                path: path.clone(),
                source,
            })?;
            let key = content.trim();
            if key.is_empty() {
                return Err(SecretError::EmptyFile(path));
            }
            return Ok(SecretString::from(key.to_string()));
        }

        if let Some(name) = non_empty(self.env_var) {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Expands a leading `~` or `~/` to the home directory. `~user` is not
/// supported.
fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => Some(""),
        Some(rest) if rest.starts_with('/') => Some(&rest[1..]),
        _ => None,
    };

    match (rest, dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
