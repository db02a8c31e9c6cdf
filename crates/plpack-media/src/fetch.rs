//! Per-item media fetch and conversion using yt-dlp.
//!
//! Each selected playlist item is fetched by its own yt-dlp invocation,
//! writing into an index-keyed file inside the job's directory. Progress
//! lines from the child's stdout are parsed into [`FetchProgress`] events;
//! cancellation kills the child at the next scheduling point.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use plpack_models::{DownloadOptions, MediaFormat, Quality};

use crate::error::{MediaError, MediaResult};
use crate::progress::{FetchProgress, ProgressSender};

/// Sentinel prefix for machine-readable progress lines.
const PROGRESS_PREFIX: &str = "plpack-dl:";

/// Socket timeout handed to yt-dlp; bounds how long a stalled connection
/// can delay cancellation.
const SOCKET_TIMEOUT_SECS: u32 = 15;

/// Default wall-clock ceiling for one item fetch.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(900);

/// Cooperative cancellation flag shared between a job and its workers.
///
/// Wraps a [`CancellationToken`] so eviction can cancel a whole job while
/// a single item (e.g. on timeout) can be cancelled through a child flag
/// without touching its siblings.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    token: CancellationToken,
}

impl CancelFlag {
    /// Create a new, uncancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a child flag: cancelled when either it or its parent is.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check the flag without blocking.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the flag is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Everything a fetcher needs to produce one item's file.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Reference to the source media (a watch URL for yt-dlp)
    pub source_ref: String,
    /// Format and quality fixed at job creation
    pub options: DownloadOptions,
    /// Job-owned directory the output file must land in
    pub dest_dir: PathBuf,
    /// Extension-less output name, derived from the item index
    pub file_stem: String,
}

/// The fetch/convert collaborator invoked once per item.
///
/// Implementations must emit progress through the provided sender, honor
/// the cancellation flag at their natural reporting points, and resolve to
/// the path of the produced file.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: ProgressSender,
        cancel: CancelFlag,
    ) -> MediaResult<PathBuf>;
}

/// Production fetcher shelling out to yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    /// Wall-clock ceiling for a single fetch; the child is killed on expiry
    timeout: Duration,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Override the per-fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_args(request: &FetchRequest, output_template: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--socket-timeout".into(),
            SOCKET_TIMEOUT_SECS.to_string(),
            "--retries".into(),
            "2".into(),
            "--progress-template".into(),
            format!("download:{}%(progress._percent_str)s", PROGRESS_PREFIX),
            "-f".into(),
            format_selector(request.options).into(),
        ];

        if request.options.format == MediaFormat::Mp3 {
            // Audio extraction runs as a yt-dlp postprocessor and replaces
            // the downloaded source file.
            args.extend([
                "-x".into(),
                "--audio-format".into(),
                "mp3".into(),
                "--audio-quality".into(),
                "192K".into(),
            ]);
        }

        args.extend([
            "-o".into(),
            output_template.to_string(),
            request.source_ref.clone(),
        ]);
        args
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: ProgressSender,
        cancel: CancelFlag,
    ) -> MediaResult<PathBuf> {
        which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

        tokio::fs::create_dir_all(&request.dest_dir).await?;

        let output_template = request
            .dest_dir
            .join(format!("{}.%(ext)s", request.file_stem))
            .to_string_lossy()
            .to_string();
        let args = Self::build_args(request, &output_template);

        debug!(
            source = request.source_ref.as_str(),
            "Running yt-dlp {}",
            args.join(" ")
        );

        let mut child = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Progress lines arrive on stdout; parse until the pipe closes.
        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::download_failed("yt-dlp stdout not captured")
        })?;
        let progress_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parse_progress_line(&line) {
                    progress.send(event);
                }
            }
        });

        // Keep the stderr tail for error classification.
        let stderr = child.stderr.take().ok_or_else(|| {
            MediaError::download_failed("yt-dlp stderr not captured")
        })?;
        let stderr_task = tokio::spawn(async move {
            let mut tail = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    tail = line;
                }
            }
            tail
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                info!(source = request.source_ref.as_str(), "Fetch cancelled, killing yt-dlp");
                let _ = child.kill().await;
                return Err(MediaError::Cancelled);
            }
            _ = tokio::time::sleep(self.timeout) => {
                warn!(
                    source = request.source_ref.as_str(),
                    timeout_secs = self.timeout.as_secs(),
                    "Fetch timed out, killing yt-dlp"
                );
                let _ = child.kill().await;
                return Err(MediaError::Timeout(self.timeout.as_secs()));
            }
        };

        let _ = progress_task.await;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            debug!("yt-dlp stderr tail: {}", stderr_tail);
            let message = if stderr_tail.is_empty() {
                format!("yt-dlp exited with {}", status)
            } else {
                stderr_tail
            };
            return Err(MediaError::download_failed(message));
        }

        let output = locate_output(
            &request.dest_dir,
            &request.file_stem,
            request.options.format.extension(),
        )
        .await?;

        let size = tokio::fs::metadata(&output).await?.len();
        info!(
            output = %output.display(),
            size_mb = size as f64 / (1024.0 * 1024.0),
            "Fetched item successfully"
        );

        Ok(output)
    }
}

/// Map (format, quality) to a yt-dlp format selector.
///
/// MP4 prefers progressive single-file streams so no stray audio track is
/// left next to the output; MP3 always starts from the best audio.
fn format_selector(options: DownloadOptions) -> &'static str {
    match (options.format, options.quality) {
        (MediaFormat::Mp3, _) => "bestaudio/best",
        (MediaFormat::Mp4, Quality::High) => "best[ext=mp4]/best",
        (MediaFormat::Mp4, Quality::Medium) => {
            "best[height<=720][ext=mp4]/best[ext=mp4]/best"
        }
        (MediaFormat::Mp4, Quality::Low) => "worst[ext=mp4]/worst",
    }
}

/// Parse one stdout line into a progress event.
fn parse_progress_line(line: &str) -> Option<FetchProgress> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        let percent: f64 = rest.trim().trim_end_matches('%').trim().parse().ok()?;
        return Some(FetchProgress::Downloading {
            percent: percent.clamp(0.0, 100.0) as u8,
        });
    }

    // Postprocessor banner marks the start of audio extraction.
    if line.starts_with("[ExtractAudio]") {
        return Some(FetchProgress::Converting);
    }

    None
}

/// Find the file yt-dlp produced for `file_stem`.
///
/// The expected extension is tried first; a directory scan covers sources
/// where yt-dlp had to fall back to another container.
async fn locate_output(dir: &Path, file_stem: &str, extension: &str) -> MediaResult<PathBuf> {
    let expected = dir.join(format!("{}.{}", file_stem, extension));
    if tokio::fs::try_exists(&expected).await? {
        return Ok(expected);
    }

    let prefix = format!("{}.", file_stem);
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && !name.ends_with(".part") {
            return Ok(entry.path());
        }
    }

    Err(MediaError::OutputMissing(dir.to_path_buf()))
}
