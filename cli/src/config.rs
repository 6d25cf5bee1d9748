use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;

use shapescript::parser::{ErrorKind, ParseError};

pub const CONFIG_FILE: &str = "shapescript.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Treat any remaining warning as a failure.
    pub deny_warnings: bool,
    /// Diagnostic codes (e.g. `unrecognized-statement`) hidden from output.
    pub allow: Vec<String>,
}

impl Config {
    /// Load from `explicit`, or from `shapescript.toml` in the current
    /// directory. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Config, String> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE), false),
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == IoErrorKind::NotFound && !required => {
                debug!("no {} found, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(err) => return Err(format!("cannot read '{}': {}", path.display(), err)),
        };

        let config: Config = toml::from_str(&contents)
            .map_err(|e| format!("invalid config '{}': {}", path.display(), e))?;
        debug!("loaded {}", path.display());

        for code in &config.diagnostics.allow {
            if ErrorKind::from_code(code).is_none() {
                warn!("{}: unknown diagnostic code `{}` in allow list", path.display(), code);
            }
        }
        Ok(config)
    }

    /// Whether a diagnostic survives the allow list. Fatal errors always do.
    pub fn reports(&self, diagnostic: &ParseError) -> bool {
        diagnostic.is_fatal()
            || !self
                .diagnostics
                .allow
                .iter()
                .any(|code| code == diagnostic.kind.code())
    }
}
