use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use bytes::BytesMut;
use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::{
    api::{ApiClient, ApiError},
    application::{asset_policy::AssetPolicy, tools::ToolLocator},
    domain::{Tool, UpdatePhase, VersionTag},
};

const CHUNK_SIZE: usize = 64 * 1024;

/// Why an update run stopped early. None of these reach the user.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("no bundled downloader at {0}")]
    BinaryMissing(PathBuf),

    #[error("could not read local version: {0}")]
    LocalVersion(String),

    #[error("release feed has no tag")]
    MissingTag,

    #[error("no release asset matches this platform")]
    NoMatchingAsset,

    #[error(transparent)]
    Transport(#[from] ApiError),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] io::Error),
}

/// How an update run ended. Every variant leaves a usable downloader behind.
#[derive(Debug)]
pub enum UpdateOutcome {
    Replaced {
        previous: VersionTag,
        installed: VersionTag,
    },
    UpToDate {
        local: VersionTag,
        remote: VersionTag,
    },
    /// Best-effort update gave up; the existing binary is untouched.
    Continue(UpdateError),
}

#[derive(Debug)]
pub enum UpdateEvent {
    Phase(UpdatePhase),
    Status(String),
    /// Download size is known; percentages follow. Not sent for an asset of
    /// unknown length, which downloads without any progress events.
    ProgressStarted,
    Progress(u8),
    /// Always the last event of a run.
    Finished(UpdateOutcome),
}

pub struct UpdateHandle {
    events: UnboundedReceiver<UpdateEvent>,
    task: JoinHandle<()>,
}

impl UpdateHandle {
    pub async fn next_event(&mut self) -> Option<UpdateEvent> {
        self.events.recv().await
    }

    /// Drain the remaining events, handing each to `on_event`, and return the outcome.
    pub async fn wait(mut self, mut on_event: impl FnMut(&UpdateEvent)) -> Option<UpdateOutcome> {
        let mut outcome = None;
        while let Some(event) = self.events.recv().await {
            on_event(&event);
            if let UpdateEvent::Finished(done) = event {
                outcome = Some(done);
            }
        }
        let _ = self.task.await;
        outcome
    }
}

/// Keeps the bundled downloader in step with the latest upstream release.
#[derive(Clone)]
pub struct Updater {
    client: ApiClient,
    tools: ToolLocator,
    policy: AssetPolicy,
}

impl Updater {
    pub fn new(client: ApiClient, tools: ToolLocator, policy: AssetPolicy) -> Self {
        Self {
            client,
            tools,
            policy,
        }
    }

    pub fn start_update(&self) -> UpdateHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let updater = self.clone();

        let task = tokio::spawn(async move {
            let outcome = updater.run(&tx).await;
            let _ = tx.send(UpdateEvent::Finished(outcome));
        });

        UpdateHandle { events: rx, task }
    }

    /// Runs the whole update pipeline. Never fails; see [`UpdateOutcome::Continue`].
    pub async fn run(&self, tx: &UnboundedSender<UpdateEvent>) -> UpdateOutcome {
        let _ = tx.send(UpdateEvent::Phase(UpdatePhase::Idle));
        let _ = tx.send(UpdateEvent::Status(format!(
            "Checking for {} updates...",
            Tool::Downloader.program()
        )));

        let outcome = match self.try_update(tx).await {
            Ok(outcome) => {
                match &outcome {
                    UpdateOutcome::Replaced { previous, installed } => {
                        tracing::info!(%previous, %installed, "downloader updated")
                    }
                    UpdateOutcome::UpToDate { local, .. } => {
                        tracing::info!(version = %local, "downloader is up to date")
                    }
                    UpdateOutcome::Continue(_) => {}
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "update skipped");
                UpdateOutcome::Continue(e)
            }
        };

        let _ = tx.send(UpdateEvent::Phase(UpdatePhase::Done));
        outcome
    }

    async fn try_update(
        &self,
        tx: &UnboundedSender<UpdateEvent>,
    ) -> Result<UpdateOutcome, UpdateError> {
        let binary = self.tools.bundled_path(Tool::Downloader);
        if !binary.is_file() {
            return Err(UpdateError::BinaryMissing(binary));
        }

        let _ = tx.send(UpdateEvent::Phase(UpdatePhase::ResolvingLocalVersion));
        let local = local_version(&binary).await?;
        tracing::debug!(version = %local, "local downloader version");

        let _ = tx.send(UpdateEvent::Phase(UpdatePhase::QueryingRemote));
        let release = self.client.latest_release().await?;
        let remote = VersionTag::from_release_tag(&release.tag_name);
        if remote.is_empty() {
            return Err(UpdateError::MissingTag);
        }

        if remote <= local {
            let _ = tx.send(UpdateEvent::Phase(UpdatePhase::UpToDate));
            return Ok(UpdateOutcome::UpToDate { local, remote });
        }

        let asset = self
            .policy
            .select(&release.assets, remote.as_str())
            .ok_or(UpdateError::NoMatchingAsset)?;
        tracing::info!(asset = %asset.name, %local, %remote, "downloading downloader update");

        let _ = tx.send(UpdateEvent::Phase(UpdatePhase::Downloading));
        let _ = tx.send(UpdateEvent::Status(format!("Downloading {} update...", Tool::Downloader.program())));
        let temp = temp_path(&binary);
        if let Err(e) = self.download_to(&asset.download_url, &temp, tx).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        let _ = tx.send(UpdateEvent::Phase(UpdatePhase::Replacing));
        replace_binary(&temp, &binary, |from, to| std::fs::rename(from, to))?;

        Ok(UpdateOutcome::Replaced {
            previous: local,
            installed: remote,
        })
    }

    /// Stream `url` into `dest` in fixed-size chunks, reporting progress per chunk.
    async fn download_to(
        &self,
        url: &str,
        dest: &Path,
        tx: &UnboundedSender<UpdateEvent>,
    ) -> Result<(), UpdateError> {
        let (total, stream) = self.client.download_asset_stream(url).await?;
        let mut stream = std::pin::pin!(stream);
        let mut file = tokio::fs::File::create(dest).await?;

        if total.is_some() {
            let _ = tx.send(UpdateEvent::ProgressStarted);
        }

        let mut buffer = BytesMut::with_capacity(CHUNK_SIZE);
        let mut downloaded: u64 = 0;

        while let Some(bytes) = stream.next().await {
            buffer.extend_from_slice(&bytes?);
            while buffer.len() >= CHUNK_SIZE {
                let chunk = buffer.split_to(CHUNK_SIZE);
                file.write_all(&chunk).await?;
                downloaded += chunk.len() as u64;
                report_progress(tx, downloaded, total);
            }
        }
        if !buffer.is_empty() {
            file.write_all(&buffer).await?;
            downloaded += buffer.len() as u64;
            report_progress(tx, downloaded, total);
        }

        file.sync_all().await?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(dest, std::fs::Permissions::from_mode(0o755)).await?;
        }

        tracing::debug!(bytes = downloaded, path = %dest.display(), "update downloaded");
        Ok(())
    }
}

fn report_progress(tx: &UnboundedSender<UpdateEvent>, downloaded: u64, total: Option<u64>) {
    if let Some(total) = total.filter(|total| *total > 0) {
        let pct = (downloaded * 100 / total).min(100) as u8;
        let _ = tx.send(UpdateEvent::Progress(pct));
    }
}

/// `<binary> --version`, last whitespace-separated token of the output
async fn local_version(binary: &Path) -> Result<VersionTag, UpdateError> {
    let mut command = Command::new(binary);
    command
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(windows)]
    {
        command.creation_flags(0x0800_0000);
    }

    let output = command
        .output()
        .await
        .map_err(|e| UpdateError::LocalVersion(e.to_string()))?;
    if !output.status.success() {
        return Err(UpdateError::LocalVersion(format!(
            "exited with {}",
            output.status
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    text.split_whitespace()
        .last()
        .map(VersionTag::parse)
        .ok_or_else(|| UpdateError::LocalVersion("empty version output".to_string()))
}

/// `<binary>.new`, next to the live binary
pub fn temp_path(binary: &Path) -> PathBuf {
    let mut name = binary.as_os_str().to_owned();
    name.push(".new");
    PathBuf::from(name)
}

/// Move `temp` onto `target` with `primary`; if that fails, remove `target`
/// (ignoring errors) and rename again.
pub fn replace_binary<F>(temp: &Path, target: &Path, primary: F) -> io::Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    match primary(temp, target) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(error = %e, "atomic replace failed, removing old binary first");
            if target.exists() {
                let _ = std::fs::remove_file(target);
            }
            if temp.exists() {
                std::fs::rename(temp, target)?;
            }
            Ok(())
        }
    }
}
