//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{FfmpegProgress, ProgressParser};

/// Number of stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for single-output FFmpeg commands.
///
/// Arguments are emitted in a fixed order: preamble, primary input, overlay
/// inputs, filter graph, stream maps, output arguments, output path.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Primary input (path or URL)
    input: String,
    /// Output file path
    output: PathBuf,
    /// Seek position in seconds (before -i)
    seek: Option<f64>,
    /// Input duration in seconds (before -i)
    duration: Option<f64>,
    /// Additional image/video inputs, indexed from 1
    overlay_inputs: Vec<PathBuf>,
    /// Filter graph
    filter_complex: Option<String>,
    /// Stream maps
    maps: Vec<String>,
    /// Output arguments (codec, quality, container flags)
    output_args: Vec<String>,
    /// Encoder threads
    threads: u32,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.into(),
            output: output.as_ref().to_path_buf(),
            seek: None,
            duration: None,
            overlay_inputs: Vec::new(),
            filter_complex: None,
            maps: Vec::new(),
            output_args: Vec::new(),
            threads: 2,
            log_level: "error".to_string(),
        }
    }

    /// Set seek position (before input).
    pub fn seek(mut self, seconds: f64) -> Self {
        self.seek = Some(seconds);
        self
    }

    /// Set input duration.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Add an overlay input. Returns the builder; the input index is
    /// `1 + number of overlays added before it`.
    pub fn overlay_input(mut self, path: impl AsRef<Path>) -> Self {
        self.overlay_inputs.push(path.as_ref().to_path_buf());
        self
    }

    /// Set filter complex.
    pub fn filter_complex(mut self, filter: impl Into<String>) -> Self {
        self.filter_complex = Some(filter.into());
        self
    }

    /// Add a stream map.
    pub fn map(mut self, stream: impl Into<String>) -> Self {
        self.maps.push(stream.into());
        self
    }

    /// Add output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set encoder thread count.
    pub fn threads(mut self, threads: u32) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
            // Progress blocks on stdout; stderr stays free for diagnostics
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-threads".to_string(),
            self.threads.to_string(),
        ];

        if let Some(seek) = self.seek {
            args.push("-ss".to_string());
            args.push(format!("{:.3}", seek));
        }
        if let Some(duration) = self.duration {
            args.push("-t".to_string());
            args.push(format!("{:.3}", duration));
        }
        args.push("-i".to_string());
        args.push(self.input.clone());

        for overlay in &self.overlay_inputs {
            args.push("-i".to_string());
            args.push(overlay.to_string_lossy().to_string());
        }

        if let Some(ref graph) = self.filter_complex {
            args.push("-filter_complex".to_string());
            args.push(graph.clone());
        }

        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and a hard timeout.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Program name or path
    program: String,
    /// Wall-clock limit
    timeout: Option<Duration>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner for `ffmpeg` on PATH.
    pub fn new() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            timeout: None,
        }
    }

    /// Use a different program (name on PATH or explicit path).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    ///
    /// On timeout the process is killed and [`MediaError::Timeout`] returned.
    /// A non-zero exit carries the last stderr lines.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let program = which::which(&self.program)
            .map_err(|_| MediaError::FfmpegNotFound(self.program.clone()))?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.program, args.join(" "));

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;

        let progress_handle = tokio::spawn(async move {
            let mut parser = ProgressParser::new();
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(progress) = parser.feed(&line) {
                    progress_callback(progress);
                }
            }
        });

        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let stderr_handle = tokio::spawn(collect_tail(stderr, Arc::clone(&tail)));

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!("FFmpeg timed out after {:?}, killing process", limit);
                    let _ = child.kill().await;
                    // Grandchildren may still hold the pipes open
                    progress_handle.abort();
                    stderr_handle.abort();
                    return Err(MediaError::Timeout(limit));
                }
            },
            None => child.wait().await,
        }?;

        let _ = progress_handle.await;
        let _ = stderr_handle.await;

        if status.success() {
            Ok(())
        } else {
            let stderr = tail
                .lock()
                .map(|lines| lines.iter().cloned().collect::<Vec<_>>().join("\n"))
                .unwrap_or_default();
            Err(MediaError::ffmpeg_failed(
                format!("FFmpeg exited with {}", status),
                (!stderr.is_empty()).then_some(stderr),
                status.code(),
            ))
        }
    }
}

async fn collect_tail<R>(reader: R, tail: Arc<Mutex<VecDeque<String>>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Ok(mut tail) = tail.lock() {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
}

/// Check if a program (ffmpeg, ffprobe) is available.
pub fn check_program(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::FfmpegNotFound(program.to_string()))
}
