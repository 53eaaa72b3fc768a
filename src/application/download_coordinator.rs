use std::ffi::OsString;
use std::io::{self, BufRead};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    application::{progress::ProgressTracker, tools::ToolLocator},
    domain::{AppError, AudioFormat, DownloadEvent, DownloadOutcome, DownloadRequest, Tool},
};

/// Starts download jobs, one at a time.
#[derive(Clone)]
pub struct DownloadCoordinator {
    tools: ToolLocator,
    busy: Arc<AtomicBool>,
}

/// Control-side end of a running download job
pub struct DownloadHandle {
    events: UnboundedReceiver<DownloadEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DownloadHandle {
    /// Next event in the order the downloader produced it. `None` after `Finished`.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Ask the job to kill the downloader; the job still reports an outcome.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain the remaining events, handing each to `on_event`, and return the outcome.
    pub async fn wait(mut self, mut on_event: impl FnMut(&DownloadEvent)) -> DownloadOutcome {
        let mut outcome = None;
        while let Some(event) = self.events.recv().await {
            on_event(&event);
            if let DownloadEvent::Finished(done) = event {
                outcome = Some(done);
            }
        }
        let _ = self.task.await;

        outcome.unwrap_or_else(|| {
            DownloadOutcome::failed("Download worker stopped unexpectedly".to_string(), String::new())
        })
    }
}

/// Releases the single job slot when the worker is done, even on panic.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DownloadCoordinator {
    pub fn new(tools: ToolLocator) -> Self {
        Self {
            tools,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validate the request, make sure the output directory exists and run the
    /// job on a background task.
    pub fn start_download(&self, request: DownloadRequest) -> Result<DownloadHandle, AppError> {
        if request.source_url.trim().is_empty() {
            return Err(AppError::InvalidInput);
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::JobAlreadyRunning);
        }
        let slot = SlotGuard(self.busy.clone());

        if !request.output_directory.exists() {
            std::fs::create_dir_all(&request.output_directory)
                .map_err(|e| AppError::Filesystem(e.to_string()))?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let job = DownloadJob {
            tools: self.tools.clone(),
            request,
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(async move {
            let outcome = job.run(&tx).await;
            drop(slot);
            let _ = tx.send(DownloadEvent::Finished(outcome));
        });

        Ok(DownloadHandle {
            events: rx,
            cancel,
            task,
        })
    }
}

struct DownloadJob {
    tools: ToolLocator,
    request: DownloadRequest,
    cancel: CancellationToken,
}

impl DownloadJob {
    /// Never fails: every error becomes a failed outcome.
    async fn run(&self, tx: &UnboundedSender<DownloadEvent>) -> DownloadOutcome {
        let url = self.request.source_url.clone();
        tracing::info!(
            url = %url,
            format = %self.request.audio_format,
            bitrate = %self.request.bitrate,
            dir = %self.request.output_directory.display(),
            "starting download"
        );

        match self.execute(tx).await {
            Ok(summary) => {
                tracing::info!(url = %url, "download finished");
                DownloadOutcome::succeeded(summary)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "download failed");
                DownloadOutcome::failed(e.to_string(), url)
            }
        }
    }

    async fn execute(&self, tx: &UnboundedSender<DownloadEvent>) -> Result<String, AppError> {
        let downloader = self.tools.locate(Tool::Downloader)?;
        let transcoder = self.tools.locate(Tool::Transcoder)?;
        let args = build_download_args(&self.request, &transcoder);

        // stdout and stderr share one pipe so lines arrive in the order they were written.
        let (reader, writer) = io::pipe().map_err(start_error)?;
        let stderr_writer = writer.try_clone().map_err(start_error)?;

        let mut command = Command::new(&downloader);
        command
            .args(&args)
            .current_dir(&self.request.output_directory)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW
            command.creation_flags(0x0800_0000);
        }

        tracing::debug!(program = %downloader.display(), ?args, "spawning downloader");
        let mut child = command.spawn().map_err(start_error)?;
        // Our copies of the write end must go, or the reader never sees EOF.
        drop(command);

        let mut lines = spawn_output_reader(reader).map_err(start_error)?;
        let mut tracker = ProgressTracker::new();

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(AppError::Cancelled);
                }
                next = lines.recv() => next,
            };

            match next {
                Some(Ok(line)) => forward_line(&mut tracker, &line, tx),
                Some(Err(e)) => return Err(AppError::Process(e.to_string())),
                None => break,
            }
        }

        let status = tokio::select! {
            _ = self.cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(AppError::Cancelled);
            }
            status = child.wait() => status.map_err(|e| AppError::Process(e.to_string()))?,
        };

        match status.code() {
            Some(0) => Ok(tracker.summary(&self.request.source_url)),
            Some(code) => Err(AppError::ProcessFailure(code)),
            None => Err(AppError::ProcessTerminated),
        }
    }
}

fn start_error(e: io::Error) -> AppError {
    AppError::Process(format!("Failed to start {}: {}", Tool::Downloader, e))
}

/// Drain the merged output pipe on its own thread. The channel closes at EOF.
fn spawn_output_reader(reader: io::PipeReader) -> io::Result<UnboundedReceiver<io::Result<String>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("spotdl-output".to_string())
        .spawn(move || {
            let result = read_output_lines(io::BufReader::new(reader), |line| {
                tx.send(Ok(line)).is_ok()
            });
            if let Err(e) = result {
                let _ = tx.send(Err(e));
            }
        })?;
    Ok(rx)
}

/// Split `reader` into lines, treating `\n`, `\r` and `\r\n` alike so that
/// carriage-return progress redraws count as separate lines. Empty lines are
/// skipped. Stops early once `on_line` returns `false`.
fn read_output_lines<R: BufRead>(
    mut reader: R,
    mut on_line: impl FnMut(String) -> bool,
) -> io::Result<()> {
    let mut line = Vec::new();
    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            break;
        }

        let consumed = buf.len();
        for &byte in buf {
            if byte == b'\n' || byte == b'\r' {
                if !line.is_empty() {
                    if !on_line(String::from_utf8_lossy(&line).into_owned()) {
                        return Ok(());
                    }
                    line.clear();
                }
            } else {
                line.push(byte);
            }
        }
        reader.consume(consumed);
    }

    if !line.is_empty() {
        on_line(String::from_utf8_lossy(&line).into_owned());
    }
    Ok(())
}

fn forward_line(tracker: &mut ProgressTracker, line: &str, tx: &UnboundedSender<DownloadEvent>) {
    let signal = tracker.observe(line);

    match signal.console {
        Some(console) => {
            tracing::debug!(target: "spotdl", "{}", console);
            let _ = tx.send(DownloadEvent::Console(console));
        }
        None => tracing::trace!(target: "spotdl", "{}", line),
    }

    if let Some(progress) = signal.progress {
        let _ = tx.send(DownloadEvent::Progress(progress));
    }
}

/// `download <url> --bitrate <b> --ffmpeg <path> [--output-format <f>] [--user-auth]`
pub fn build_download_args(request: &DownloadRequest, transcoder: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "download".into(),
        request.source_url.as_str().into(),
        "--bitrate".into(),
        request.bitrate.as_str().into(),
        "--ffmpeg".into(),
        transcoder.as_os_str().to_owned(),
    ];

    if request.audio_format != AudioFormat::default() {
        args.push("--output-format".into());
        args.push(request.audio_format.as_str().into());
    }

    if request.use_auth {
        args.push("--user-auth".into());
    }

    args
}
