mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use incoming_uploader::{
    PauseMode, SessionSnapshot, UploadObserver, UploadState, Uploader, UploaderConfig,
    UploaderHandle,
};

use config::CliConfig;

/// Upload a file to an Incoming!! server.
///
/// While running, type `pause`, `unpause`, `toggle` or `cancel [reason]`
/// followed by Enter to control the upload.
#[derive(Debug, Parser)]
#[command(name = "incoming-upload", version)]
struct Args {
    /// Upload id issued by the server.
    upload_id: String,

    /// File to upload.
    file: PathBuf,

    /// Configuration file (default: ~/.config/incoming/upload.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upload server host and optional port.
    #[arg(long)]
    host: Option<String>,

    /// Connect with wss:// instead of ws://.
    #[arg(long)]
    secure: bool,

    /// Delay before reconnecting after a dropped connection.
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Start paused; type `unpause` to begin.
    #[arg(long)]
    paused: bool,

    /// Write the effective configuration back to the config file.
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply(&self, cfg: &mut UploaderConfig) {
        if let Some(host) = &self.host {
            cfg.server_host = host.clone();
        }
        if self.secure {
            cfg.secure = true;
        }
        if let Some(ms) = self.retry_delay_ms {
            cfg.retry_delay_ms = ms;
        }
    }
}

/// A line typed on stdin.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Pause(PauseMode),
    Cancel(String),
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    if word.eq_ignore_ascii_case("cancel") {
        let reason = rest.trim();
        let reason = if reason.is_empty() { "user abort" } else { reason };
        return Ok(Command::Cancel(reason.to_string()));
    }
    word.parse::<PauseMode>()
        .map(Command::Pause)
        .map_err(|e| e.to_string())
}

/// Logs progress in whole-percent steps and the final outcome.
#[derive(Debug, Default)]
struct ProgressLog {
    last_percent: Option<u64>,
    last_state: Option<UploadState>,
}

impl UploadObserver for ProgressLog {
    fn on_progress(&mut self, s: &SessionSnapshot) {
        let percent = (s.fraction_acknowledged() * 100.0) as u64;
        if self.last_percent == Some(percent) && self.last_state == Some(s.state) {
            return;
        }
        self.last_percent = Some(percent);
        self.last_state = Some(s.state);
        info!(
            "{percent:>3}% {}/{} bytes acknowledged ({})",
            s.bytes_acknowledged,
            s.total_bytes,
            s.status_text()
        );
    }

    fn on_finished(&mut self, s: &SessionSnapshot) {
        info!(bytes = s.total_bytes, "upload finished");
    }

    fn on_cancelled(&mut self, s: &SessionSnapshot) {
        warn!(
            reason = s.cancel_reason.as_deref().unwrap_or("unknown"),
            acknowledged = s.bytes_acknowledged,
            "upload cancelled"
        );
    }

    fn on_error(&mut self, s: &SessionSnapshot) {
        if let Some(e) = &s.error {
            error!(code = e.code, "upload error: {}", e.message);
        }
    }
}

async fn read_commands(handle: UploaderHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let result = match parse_command(&line) {
            Ok(Command::Pause(mode)) => handle.pause(mode).await,
            Ok(Command::Cancel(reason)) => handle.cancel(reason).await,
            Err(e) => {
                warn!("{e}; expected pause, unpause, toggle or cancel [reason]");
                continue;
            }
        };
        if result.is_err() {
            break;
        }
    }
}

async fn cancel_on_ctrl_c(handle: UploaderHandle) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    if handle.snapshot().can_cancel {
        warn!("interrupted, cancelling upload (Ctrl-C again to quit)");
        let _ = handle.cancel("user abort").await;
    } else {
        warn!("upload cannot be cancelled right now; Ctrl-C again to quit");
    }
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted again, exiting");
        std::process::exit(130);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,incoming=debug")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = CliConfig::load(args.config.clone())?;
    args.apply(&mut cfg.uploader);
    if args.save_config {
        cfg.save()?;
        info!(path = %cfg.path().display(), "configuration saved");
    }

    info!(
        url = %cfg.uploader.endpoint_url(),
        file = %args.file.display(),
        id = %args.upload_id,
        "starting upload"
    );
    let handle = Uploader::new(cfg.uploader.clone())
        .upload_file(args.upload_id.clone(), &args.file, ProgressLog::default())
        .await?;

    if args.paused {
        handle.pause(PauseMode::Pause).await?;
        info!("paused; type `unpause` to begin");
    }
    handle.start().await?;

    tokio::spawn(read_commands(handle.clone()));
    tokio::spawn(cancel_on_ctrl_c(handle.clone()));

    let done = handle.wait().await;
    if done.state == UploadState::Finished {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pause_commands() {
        assert_eq!(parse_command("pause"), Ok(Command::Pause(PauseMode::Pause)));
        assert_eq!(
            parse_command("  unpause "),
            Ok(Command::Pause(PauseMode::Unpause))
        );
        assert_eq!(parse_command("toggle"), Ok(Command::Pause(PauseMode::Toggle)));
        assert!(parse_command("resume please").is_err());
    }

    #[test]
    fn parses_cancel_with_and_without_reason() {
        assert_eq!(
            parse_command("cancel"),
            Ok(Command::Cancel("user abort".into()))
        );
        assert_eq!(
            parse_command("cancel wrong file"),
            Ok(Command::Cancel("wrong file".into()))
        );
    }

    #[test]
    fn command_line_overrides_config() {
        let args = Args::parse_from([
            "incoming-upload",
            "--host",
            "10.0.0.5:4000",
            "--secure",
            "--retry-delay-ms",
            "500",
            "abc123",
            "movie.mkv",
        ]);
        let mut cfg = UploaderConfig::default();
        args.apply(&mut cfg);
        assert_eq!(cfg.endpoint_url(), "wss://10.0.0.5:4000/frontend/upload_ws");
        assert_eq!(cfg.retry_delay_ms, 500);
        assert_eq!(args.upload_id, "abc123");
        assert_eq!(args.file, PathBuf::from("movie.mkv"));
    }

    #[test]
    fn unset_flags_keep_config() {
        let args = Args::parse_from(["incoming-upload", "id", "f"]);
        let mut cfg = UploaderConfig {
            secure: true,
            ..UploaderConfig::for_host("example.org")
        };
        args.apply(&mut cfg);
        assert!(cfg.secure);
        assert_eq!(cfg.server_host, "example.org");
    }
}
