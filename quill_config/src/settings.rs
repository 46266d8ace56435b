use serde::{Deserialize, Serialize};

use quill_fs::LineEnding;

/// Editor behavior settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Charset used to open and save files unless overridden
    pub charset: String,
    /// Line ending applied on save
    pub line_ending: LineEndingSetting,
    /// Wrap long lines in the text surface
    pub text_wrap: bool,
    pub font: FontSettings,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            charset: "UTF-8".to_string(),
            line_ending: LineEndingSetting::Keep,
            text_wrap: false,
            font: FontSettings::default(),
        }
    }
}

/// Line ending written by a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEndingSetting {
    /// Write the text exactly as loaded
    #[default]
    Keep,
    Crlf,
    Lf,
}

impl LineEndingSetting {
    pub fn line_ending(self) -> Option<LineEnding> {
        match self {
            Self::Keep => None,
            Self::Crlf => Some(LineEnding::Crlf),
            Self::Lf => Some(LineEnding::Lf),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    pub family: String,
    pub size: f32,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            family: "Monospaced".to_string(),
            size: 12.0,
        }
    }
}

/// Backup rotation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Rotate backups before every save
    pub enabled: bool,
    /// Rotate at most once per day
    pub daily_only: bool,
    /// Number of backup files kept
    pub max_files: usize,
    /// Backup file extension, without the dot
    pub extension: String,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_only: false,
            max_files: 5,
            extension: "bak".to_string(),
        }
    }
}

/// Loader and saver tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSettings {
    /// Map files into memory when loading
    pub use_mmap: bool,
    /// Buffer size when a file is read instead of mapped
    pub read_chunk_size: usize,
    /// Largest file that will be opened, in bytes
    pub max_file_size: u64,
    /// Progress updates per load or save
    pub progress_steps: usize,
    /// Texts shorter than this are saved in a single write
    pub split_threshold: usize,
    pub write_buffer_size: usize,
    /// fsync after saving
    pub sync_on_save: bool,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            use_mmap: true,
            read_chunk_size: 64 * 1024,
            max_file_size: i32::MAX as u64,
            progress_steps: 20,
            split_threshold: 10,
            write_buffer_size: 64 * 1024,
            sync_on_save: true,
        }
    }
}
