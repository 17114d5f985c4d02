//! Reading `config.ini` into a [`ConfigFile`].
//!
//! The single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use super::settings::ConfigFile;

/// Errors from reading or writing the config file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid value for {section}.{key} = '{value}': {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Load `path`, falling back to defaults when the file is absent.
pub(super) fn load(path: &Path) -> Result<ConfigFile, ConfigFileError> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let ini = Ini::load_from_file(path).map_err(|source| ConfigFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_ini(&ini)
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [coordinator] section
    if let Some(section) = ini.section(Some("coordinator")) {
        if let Some(v) = section.get("default_timeout_ms") {
            let v = v.trim();
            config.coordinator.default_timeout_ms = match v {
                "" | "none" | "0" => None,
                _ => Some(parse_number(
                    "coordinator",
                    "default_timeout_ms",
                    v,
                    "must be a positive integer (milliseconds), 0 or 'none' to disable",
                )?),
            };
        }
        if let Some(v) = section.get("failure_history") {
            config.coordinator.failure_history = parse_number(
                "coordinator",
                "failure_history",
                v,
                "must be a non-negative integer",
            )?;
        }
        if let Some(v) = section.get("stall_threshold_secs") {
            config.coordinator.stall_threshold_secs = parse_positive(
                "coordinator",
                "stall_threshold_secs",
                v,
                "must be a positive integer (seconds)",
            )?;
        }
        if let Some(v) = section.get("watchdog_interval_secs") {
            config.coordinator.watchdog_interval_secs = parse_positive(
                "coordinator",
                "watchdog_interval_secs",
                v,
                "must be a positive integer (seconds)",
            )?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        })
}

fn parse_positive(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<u64, ConfigFileError> {
    match parse_number::<u64>(section, key, value, reason)? {
        0 => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }),
        n => Ok(n),
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).expect("valid ini");
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_coordinator_section() {
        let config = parse(
            "[coordinator]\n\
             default_timeout_ms = 2500\n\
             failure_history = 10\n\
             stall_threshold_secs = 45\n\
             watchdog_interval_secs = 5\n",
        )
        .unwrap();

        assert_eq!(config.coordinator.default_timeout_ms, Some(2500));
        assert_eq!(config.coordinator.failure_history, 10);
        assert_eq!(config.coordinator.stall_threshold_secs, 45);
        assert_eq!(config.coordinator.watchdog_interval_secs, 5);
    }

    #[test]
    fn test_default_timeout_can_be_disabled() {
        for value in ["none", "0", ""] {
            let config = parse(&format!("[coordinator]\ndefault_timeout_ms = {}\n", value)).unwrap();
            assert_eq!(config.coordinator.default_timeout_ms, None, "value {:?}", value);
        }
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let err = parse("[coordinator]\ndefault_timeout_ms = soon\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "coordinator");
                assert_eq!(key, "default_timeout_ms");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_stall_threshold_rejected() {
        assert!(parse("[coordinator]\nstall_threshold_secs = 0\n").is_err());
    }

    #[test]
    fn test_logging_section() {
        let config = parse("[logging]\ndirectory = /var/log/confirmer\nfile = app.log\n").unwrap();
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/confirmer"));
        assert_eq!(config.logging.file, "app.log");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_invalid_file_value_names_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[coordinator]\nfailure_history = many\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("coordinator.failure_history"));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[coordinator\nfailure_history = 3\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigFileError::Read { .. }));
        assert!(err.to_string().contains("config.ini"));
    }
}
