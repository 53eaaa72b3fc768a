//! Download-and-update core for a spotdl front-end.
//!
//! [`DownloadCoordinator`] runs the external downloader and turns its output
//! into progress events; [`Updater`] keeps the bundled downloader binary
//! current. Both hand events to the caller over a channel and always finish
//! with a terminal event.

pub mod api;
pub mod application;
pub mod domain;
pub mod storage;
pub mod utils;

pub use application::{DownloadCoordinator, Updater};
