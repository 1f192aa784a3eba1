//! FFmpeg progress parsing for `-progress pipe:1` output.
//!
//! FFmpeg writes blocks of `key=value` lines, each block terminated by a
//! `progress=continue` or `progress=end` line. [`ProgressParser`] accumulates
//! a block and yields a snapshot at every terminator.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percentage of a clip of `duration_secs` encoded so far.
    pub fn percentage(&self, duration_secs: f64) -> f64 {
        if duration_secs <= 0.0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / 1000.0 / duration_secs) * 100.0).clamp(0.0, 100.0)
    }
}

/// Incremental parser over progress lines.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns a snapshot when the line closes a block.
    pub fn feed(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key {
            // Despite its name, out_time_ms is reported in microseconds.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.current.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    self.current.fps = fps;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.current.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.current.is_complete = true;
                }
                return Some(self.current.clone());
            }
            _ => {}
        }
        None
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + 'static>;
