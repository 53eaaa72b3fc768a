use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::domain::{AppError, Tool};
use crate::utils::install_dir;

/// Finds the external executables a download needs.
///
/// The install directory wins over the search path so a bundled or
/// self-updated downloader is preferred to a system-wide one.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    install_dir: PathBuf,
    /// `None` searches the process `PATH`.
    search_path: Option<OsString>,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::new(install_dir())
    }
}

impl ToolLocator {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            search_path: None,
        }
    }

    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Fixed location of `tool` inside the install directory, whether or not it exists
    pub fn bundled_path(&self, tool: Tool) -> PathBuf {
        self.install_dir.join(tool.file_name())
    }

    pub fn locate(&self, tool: Tool) -> Result<PathBuf, AppError> {
        let bundled = self.bundled_path(tool);
        if bundled.is_file() {
            tracing::debug!(tool = %tool, path = %bundled.display(), "using bundled executable");
            return Ok(bundled);
        }

        let found = match &self.search_path {
            Some(paths) => which::which_in(tool.program(), Some(paths), &self.install_dir),
            None => which::which(tool.program()),
        };

        match found {
            Ok(path) => {
                tracing::debug!(tool = %tool, path = %path.display(), "using executable from PATH");
                Ok(path)
            }
            Err(_) => Err(AppError::ExecutableNotFound(tool)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_tool_preferred() {
        let install = tempfile::tempdir().unwrap();
        std::fs::write(install.path().join(Tool::Transcoder.file_name()), b"").unwrap();

        let locator = ToolLocator::new(install.path()).with_search_path("");
        assert_eq!(
            locator.locate(Tool::Transcoder).unwrap(),
            install.path().join(Tool::Transcoder.file_name())
        );
    }

    #[test]
    fn test_missing_tool() {
        let install = tempfile::tempdir().unwrap();
        let empty = tempfile::tempdir().unwrap();

        let locator = ToolLocator::new(install.path()).with_search_path(empty.path());
        let err = locator.locate(Tool::Downloader).unwrap_err();
        assert!(matches!(err, AppError::ExecutableNotFound(Tool::Downloader)));
        assert!(err.to_string().starts_with(&Tool::Downloader.file_name()));
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_fallback() {
        use std::os::unix::fs::PermissionsExt;

        let install = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let ffmpeg = bin.path().join("ffmpeg");
        std::fs::write(&ffmpeg, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

        let locator = ToolLocator::new(install.path()).with_search_path(bin.path());
        assert_eq!(locator.locate(Tool::Transcoder).unwrap(), ffmpeg);
    }
}
