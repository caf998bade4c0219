//! INI file configuration adapter.
//!
//! Dotted keys map onto INI sections: `risk.max_position_allocation` reads
//! `max_position_allocation` from the `[risk]` section.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    fn split(key: &str) -> Option<(&str, &str)> {
        key.split_once('.')
            .filter(|(section, name)| !section.is_empty() && !name.is_empty())
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, key: &str) -> Option<String> {
        let (section, name) = Self::split(key)?;
        self.config
            .get(section, name)
            .filter(|v| !v.trim().is_empty())
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_string(key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}
