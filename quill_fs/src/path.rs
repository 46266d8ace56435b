//! Path decomposition for an editor file handle.

use std::path::{Path, PathBuf};

/// A file path together with its directory, file name and extension.
///
/// The derived parts are computed once when the path is assigned and again on
/// every [`FileHandle::set_path`]. A handle without a path stands for a new
/// buffer that has never been saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHandle {
    path: Option<PathBuf>,
    directory: String,
    name: String,
    extension: String,
}

impl FileHandle {
    pub fn new(path: Option<PathBuf>) -> Self {
        let mut handle = FileHandle::default();
        handle.set_path(path);
        handle
    }

    /// Handle for a buffer that has never been saved.
    pub fn untitled() -> Self {
        FileHandle::default()
    }

    pub fn set_path(&mut self, path: Option<PathBuf>) {
        let (directory, name, extension) = match &path {
            Some(p) => split_path(p),
            None => (String::new(), String::new(), String::new()),
        };
        self.path = path;
        self.directory = directory;
        self.name = name;
        self.extension = extension;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File extension without the dot; empty when there is none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        file_stem(&self.name)
    }

    pub fn display(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

fn split_path(path: &Path) -> (String, String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    let directory = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = file_extension(&name).to_string();
    (directory, name, extension)
}

/// Extension of a file name.
///
/// Empty when the name has no dot, starts with its only dot (`.profile`), or
/// ends with a dot (`notes.`).
pub fn file_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => &name[pos + 1..],
        _ => "",
    }
}

/// File name with the extension (as defined by [`file_extension`]) removed.
pub fn file_stem(name: &str) -> &str {
    let ext = file_extension(name);
    if ext.is_empty() {
        name
    } else {
        &name[..name.len() - ext.len() - 1]
    }
}
