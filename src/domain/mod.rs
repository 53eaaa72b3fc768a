pub mod error;
pub mod model;
pub mod version;

pub use error::{AppError, Tool};
pub use model::{
    AudioFormat, Bitrate, DownloadEvent, DownloadOutcome, DownloadRequest, TrackProgress,
    UpdatePhase,
};
pub use version::VersionTag;
