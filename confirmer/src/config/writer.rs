//! Writing a [`ConfigFile`] as commented INI.

use std::fs;
use std::path::Path;

use super::parser::ConfigFileError;
use super::settings::ConfigFile;

/// Write `config` to `path`, creating parent directories.
pub(super) fn save(config: &ConfigFile, path: &Path) -> Result<(), ConfigFileError> {
    let write_error = |source| ConfigFileError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, to_config_string(config)).map_err(write_error)
}

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let default_timeout_ms = config
        .coordinator
        .default_timeout_ms
        .map(|ms| ms.to_string())
        .unwrap_or_else(|| "none".to_string());

    format!(
        r#"[coordinator]
; Timeout in milliseconds for confirmations submitted without their own.
; Use 'none' (or 0) to let such confirmations wait indefinitely.
default_timeout_ms = {}
; Number of failures without a failure handler kept for diagnostics
failure_history = {}
; Seconds a confirmation may stay in flight before the watchdog warns
stall_threshold_secs = {}
; Seconds between watchdog checks
watchdog_interval_secs = {}

[logging]
; Directory for log files (cleared at session start)
directory = {}
; Log file name
file = {}
"#,
        default_timeout_ms,
        config.coordinator.failure_history,
        config.coordinator.stall_threshold_secs,
        config.coordinator.watchdog_interval_secs,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::{load, parse_ini};
    use ini::Ini;

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.coordinator.default_timeout_ms = Some(750);
        config.coordinator.failure_history = 3;

        let content = to_config_string(&config);
        let ini = Ini::load_from_str(&content).expect("valid ini");

        assert_eq!(parse_ini(&ini).unwrap(), config);
    }

    #[test]
    fn test_disabled_timeout_written_as_none() {
        let content = to_config_string(&ConfigFile::default());
        assert!(content.contains("default_timeout_ms = none"));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");
        let mut config = ConfigFile::default();
        config.logging.file = "other.log".to_string();

        save(&config, &path).unwrap();

        assert_eq!(load(&path).unwrap(), config);
    }
}
