pub mod asset_policy;
pub mod download_coordinator;
pub mod progress;
pub mod tools;
pub mod update_job;

pub use asset_policy::AssetPolicy;
pub use download_coordinator::{DownloadCoordinator, DownloadHandle};
pub use progress::ProgressTracker;
pub use tools::ToolLocator;
pub use update_job::{UpdateError, UpdateEvent, UpdateHandle, UpdateOutcome, Updater};
