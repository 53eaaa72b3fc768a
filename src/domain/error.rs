use std::fmt;

use thiserror::Error;

/// External executables the download job depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Downloader,
    Transcoder,
}

impl Tool {
    /// Bare program name, without any platform extension.
    pub fn program(self) -> &'static str {
        match self {
            Tool::Downloader => "spotdl",
            Tool::Transcoder => "ffmpeg",
        }
    }

    /// File name as it appears on disk for the host platform.
    pub fn file_name(self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.program())
        } else {
            self.program().to_string()
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("No URL provided")]
    InvalidInput,

    #[error("{0} not found. Make sure it's in the same directory as the application or on PATH.")]
    ExecutableNotFound(Tool),

    #[error("Download failed with return code {0}.")]
    ProcessFailure(i32),

    #[error("Download process terminated without an exit code.")]
    ProcessTerminated,

    #[error("Process error: {0}")]
    Process(String),

    #[error("Could not create download directory: {0}")]
    Filesystem(String),

    #[error("A download is already running")]
    JobAlreadyRunning,

    #[error("Download cancelled.")]
    Cancelled,
}
