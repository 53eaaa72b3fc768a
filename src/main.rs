use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use spotdl_runner::{
    api::{ApiClient, ApiConfig},
    application::{AssetPolicy, DownloadCoordinator, ToolLocator, UpdateEvent, Updater},
    domain::{AudioFormat, Bitrate, DownloadEvent, DownloadRequest},
    storage::{HistoryEntry, HistoryStore, SettingsStore},
    utils,
};

#[derive(Parser)]
#[command(name = "spotdl-runner", version, about = "Download music through spotDL")]
struct Cli {
    /// Directory holding the bundled spotdl and ffmpeg executables
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,

    /// Directory for settings.json and download_history.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Do not check for a newer spotdl before running
    #[arg(long, global = true)]
    skip_update: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a track, album, playlist or artist ("saved" for liked songs)
    Download {
        url: String,

        /// Output directory, defaults to the saved download location
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, default_value_t = AudioFormat::default())]
        format: AudioFormat,

        #[arg(short, long, default_value_t = Bitrate::default())]
        bitrate: Bitrate,

        /// Skip Spotify user authentication
        #[arg(long)]
        no_auth: bool,
    },
    /// Update the bundled spotdl executable
    Update,
    /// Show recent downloads
    History {
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let tools = ToolLocator::new(cli.install_dir.unwrap_or_else(utils::install_dir));
    let data_dir = cli.data_dir.unwrap_or_else(utils::app_data_dir);

    match cli.command {
        Command::Update => {
            run_update(&tools).await;
            Ok(ExitCode::SUCCESS)
        }
        Command::History { clear } => {
            let mut history = HistoryStore::load(&data_dir);
            if clear {
                history.clear().context("clearing history")?;
                println!("History cleared.");
            } else if history.entries().is_empty() {
                println!("No downloads yet.");
            } else {
                for entry in history.entries() {
                    println!("{}", entry);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Download {
            url,
            output,
            format,
            bitrate,
            no_auth,
        } => {
            if !cli.skip_update {
                run_update(&tools).await;
            }

            let mut settings = SettingsStore::load(&data_dir);
            let output_directory = match output {
                Some(dir) => {
                    if let Err(e) = settings.set_download_location(&dir) {
                        tracing::warn!(error = %e, "could not save download location");
                    }
                    dir
                }
                None => settings.download_location().to_path_buf(),
            };

            let request = DownloadRequest {
                source_url: url,
                output_directory,
                audio_format: format,
                bitrate,
                use_auth: !no_auth,
            };
            run_download(tools, request, &data_dir).await
        }
    }
}

/// Best effort: whatever happens, the caller carries on.
async fn run_update(tools: &ToolLocator) {
    let client = match ApiClient::new(ApiConfig::default()) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "update check unavailable");
            return;
        }
    };

    let updater = Updater::new(client, tools.clone(), AssetPolicy::default());
    updater
        .start_update()
        .wait(|event| match event {
            UpdateEvent::Status(status) => eprintln!("{}", status),
            UpdateEvent::Progress(pct) => eprint!("\r{:>3}%", pct),
            UpdateEvent::Phase(phase) => tracing::debug!(?phase, "update phase"),
            UpdateEvent::ProgressStarted | UpdateEvent::Finished(_) => {}
        })
        .await;
}

async fn run_download(
    tools: ToolLocator,
    request: DownloadRequest,
    data_dir: &std::path::Path,
) -> anyhow::Result<ExitCode> {
    let coordinator = DownloadCoordinator::new(tools);
    let handle = match coordinator.start_download(request.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = handle
        .wait(|event| match event {
            DownloadEvent::Console(line) => println!("{}", line),
            DownloadEvent::Progress(progress) => println!(
                "[{:>3}%] Downloading {}/{}",
                progress.percent(),
                progress.current,
                progress.total
            ),
            DownloadEvent::Finished(_) => {}
        })
        .await;

    let mut history = HistoryStore::load(data_dir);
    if let Err(e) = history.add(HistoryEntry::from_outcome(&outcome, &request)) {
        tracing::warn!(error = %e, "could not save history");
    }

    if outcome.success {
        println!("{} {}", outcome.message, outcome.content_summary);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("An error occurred while downloading: {}", outcome.message);
        Ok(ExitCode::FAILURE)
    }
}
