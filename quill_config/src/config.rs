use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use quill_fs::{BackupConfig, Charset, LoadConfig, SaveConfig};

use crate::error::{ConfigError, ConfigResult};
use crate::settings::{BackupSettings, EditorSettings, IoSettings};

/// Main configuration structure for quill
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Editor behavior settings
    pub editor: EditorSettings,
    /// Backup rotation settings
    pub backup: BackupSettings,
    /// Loader and saver tuning
    pub io: IoSettings,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from TOML string
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = self.to_toml_string()?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Export configuration as TOML string
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get configuration file search paths
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // User-specific config
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(&home).join(".quill").join("config.toml"));
            paths.push(PathBuf::from(&home).join(".config").join("quill").join("config.toml"));
        }

        // System-wide config
        paths.push(PathBuf::from("/etc/quill/config.toml"));

        // Current directory
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join(".quill.toml"));
            paths.push(current_dir.join("quill.toml"));
        }

        paths
    }

    /// Load configuration with automatic path discovery
    pub fn load() -> ConfigResult<Self> {
        Self::load_with_paths(&Self::config_paths())
    }

    /// Load the first existing file of `paths`, or the defaults if none exists
    pub fn load_with_paths(paths: &[PathBuf]) -> ConfigResult<Self> {
        for path in paths {
            if path.exists() {
                info!(path = %path.display(), "loading configuration");
                return Self::from_file(path);
            }
        }

        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Create a new configuration file with default settings
    pub fn create_default_config(path: &Path) -> ConfigResult<()> {
        Self::default().save_to_file(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.charset()?;
        if self.editor.font.size <= 0.0 {
            return Err(ConfigError::Validation(
                "Font size must be greater than 0".to_string(),
            ));
        }

        let extension = &self.backup.extension;
        if extension.is_empty() || extension.contains(['/', '\\', '.']) {
            return Err(ConfigError::Validation(format!(
                "Backup extension must be a non-empty name without dots or separators, got {extension:?}"
            )));
        }

        if self.io.read_chunk_size == 0 {
            return Err(ConfigError::Validation(
                "Read chunk size must be greater than 0".to_string(),
            ));
        }
        if self.io.progress_steps == 0 {
            return Err(ConfigError::Validation(
                "Progress steps must be greater than 0".to_string(),
            ));
        }
        if self.io.write_buffer_size == 0 {
            return Err(ConfigError::Validation(
                "Write buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Default charset for opening and saving files
    pub fn charset(&self) -> ConfigResult<Charset> {
        Ok(Charset::resolve(&self.editor.charset)?)
    }

    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            use_mmap: self.io.use_mmap,
            chunk_size: self.io.read_chunk_size,
            max_file_size: self.io.max_file_size,
            progress_steps: self.io.progress_steps as u64,
        }
    }

    pub fn save_config(&self) -> SaveConfig {
        SaveConfig {
            split_threshold: self.io.split_threshold,
            progress_steps: self.io.progress_steps,
            buffer_size: self.io.write_buffer_size,
            sync: self.io.sync_on_save,
            line_ending: self.editor.line_ending.line_ending(),
            ..SaveConfig::default()
        }
    }

    pub fn backup_config(&self) -> BackupConfig {
        BackupConfig {
            enabled: self.backup.enabled,
            daily_only: self.backup.daily_only,
            max_backups: self.backup.max_files,
            extension: self.backup.extension.clone(),
        }
    }
}

/// Configuration builder for creating custom configurations
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn editor<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut EditorSettings),
    {
        f(&mut self.config.editor);
        self
    }

    pub fn backup<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut BackupSettings),
    {
        f(&mut self.config.backup);
        self
    }

    pub fn io<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut IoSettings),
    {
        f(&mut self.config.io);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LineEndingSetting;
    use quill_fs::LineEnding;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.charset().unwrap().name(), "UTF-8");
        assert_eq!(config.backup.max_files, 5);
        assert_eq!(config.io.progress_steps, 20);
        assert_eq!(config.io.split_threshold, 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [editor]
            charset = "windows-1251"
            line_ending = "crlf"

            [backup]
            daily_only = true
            "#,
        )
        .unwrap();
        assert_eq!(config.charset().unwrap().name(), "windows-1251");
        assert!(config.backup.daily_only);
        assert!(config.backup.enabled);
        assert_eq!(config.io, IoSettings::default());
        assert_eq!(config.save_config().line_ending, Some(LineEnding::Crlf));
    }

    #[test]
    fn test_unknown_charset_rejected() {
        let err = Config::from_toml_str("[editor]\ncharset = \"no-such-charset\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Charset(_)));
    }

    #[test]
    fn test_bad_backup_extension_rejected() {
        let config = ConfigBuilder::new()
            .backup(|b| b.extension = "../x".to_string())
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("[editor\ncharset = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("quill.toml");
        let config = ConfigBuilder::new()
            .editor(|e| {
                e.text_wrap = true;
                e.line_ending = LineEndingSetting::Lf;
            })
            .io(|io| io.use_mmap = false)
            .build();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_with_paths_picks_first_existing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("present.toml");
        std::fs::write(&present, "[backup]\nmax_files = 2\n").unwrap();

        let config = Config::load_with_paths(&[missing.clone(), present]).unwrap();
        assert_eq!(config.backup_config().max_backups, 2);

        let defaults = Config::load_with_paths(&[missing]).unwrap();
        assert_eq!(defaults, Config::default());
    }

    #[test]
    fn test_conversions() {
        let config = ConfigBuilder::new()
            .io(|io| {
                io.read_chunk_size = 4096;
                io.max_file_size = 1024;
            })
            .backup(|b| {
                b.enabled = false;
                b.extension = "old".to_string();
            })
            .build();
        let load = config.load_config();
        assert_eq!(load.chunk_size, 4096);
        assert_eq!(load.max_file_size, 1024);
        let backup = config.backup_config();
        assert!(!backup.enabled);
        assert_eq!(backup.extension, "old");
        assert_eq!(config.save_config().line_ending, None);
    }
}
