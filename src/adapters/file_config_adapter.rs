//! INI file configuration adapter.
//!
//! Recognised sections: `[store]` (`path`, `pool_size`), `[log]` (`filter`) and
//! `[fund]` (`default_type`). Unknown keys are ignored.

use configparser::ini::Ini;
use std::path::Path;
use tracing::warn;

use crate::domain::error::FundbookError;
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FundbookError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| FundbookError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, FundbookError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| FundbookError::ConfigParse {
                file: "<inline>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    /// Blank values count as unset, so `path =` falls back like a missing key.
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        let Some(raw) = self.get_string(section, key) else {
            return default;
        };
        raw.parse().unwrap_or_else(|_| {
            warn!(section, key, value = %raw, default, "not an integer, using default");
            default
        })
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        let Some(raw) = self.get_string(section, key) else {
            return default;
        };
        Self::parse_bool(&raw).unwrap_or_else(|| {
            warn!(section, key, value = %raw, default, "not a boolean, using default");
            default
        })
    }
}
