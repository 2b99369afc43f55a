//! Per-chunk log file with an in-place progress bar.
//!
//! The log is append-only structured text, one line per message:
//!
//! ```text
//! [14:03:22.158][info] Extracting features
//! ```
//!
//! The progress bar is a fixed two-line ASCII ruler written into the same
//! file; `*` tick characters are spliced at a fixed anchor offset as
//! progress advances, so log lines written after the ruler stay intact
//! below it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use gridflow_core::{Chunk, CoreError, LogLevel};

/// Ruler header line.
const PROGRESS_HEADER: &str = "0%   10   20   30   40   50   60   70   80   90   100%";
/// 51-character tick rule under the header.
const PROGRESS_RULE: &str = "|----|----|----|----|----|----|----|----|----|----|";
/// A full bar is 51 stars, one per rule character.
const PROGRESS_TICKS: f64 = 51.0;

/// State of one progress bar, scoped to one log-file lifetime.
struct ProgressState {
    end: f64,
    ticks_written: usize,
    /// Byte offset in the file at which tick characters are spliced.
    /// Fixed once when the ruler is written; every splice inserts at this
    /// same absolute position, so stars accumulate contiguously.
    anchor: usize,
}

/// Structured logger and progress writer for one chunk's log file.
///
/// Creating the logger truncates the log file.
pub struct ChunkLogger {
    path: PathBuf,
    level: LogLevel,
    progress: Option<ProgressState>,
}

impl ChunkLogger {
    /// Create a logger writing to `path`, filtering below `min_level`
    /// (`None` logs everything). Truncates any existing file.
    pub fn new(path: PathBuf, min_level: Option<LogLevel>) -> Result<Self, CoreError> {
        fs::write(&path, "")?;
        Ok(Self {
            path,
            level: min_level.unwrap_or(LogLevel::Trace),
            progress: None,
        })
    }

    /// Logger for a chunk's log file at the chunk's verbosity.
    pub fn for_chunk(chunk: &dyn Chunk) -> Result<Self, CoreError> {
        Self::new(chunk.log_file(), chunk.verbosity())
    }

    /// Append one `[HH:MM:SS.mmm][level] message` line.
    ///
    /// Messages below the configured level are dropped.
    pub fn log(&self, level: LogLevel, message: &str) -> Result<(), CoreError> {
        if level < self.level {
            return Ok(());
        }
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let line = format!("[{timestamp}][{level}] {message}\n");
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    pub fn debug(&self, message: &str) -> Result<(), CoreError> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> Result<(), CoreError> {
        self.log(LogLevel::Info, message)
    }

    pub fn warning(&self, message: &str) -> Result<(), CoreError> {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&self, message: &str) -> Result<(), CoreError> {
        self.log(LogLevel::Error, message)
    }

    /// Write the progress ruler, optionally preceded by `message`, and
    /// record the splice anchor. Resets any previous bar state.
    pub fn make_progress_bar(&mut self, end: f64, message: Option<&str>) -> Result<(), CoreError> {
        if end <= 0.0 {
            return Err(CoreError::InvalidState(
                "progress bar end must be positive".into(),
            ));
        }

        let mut block = String::new();
        if let Some(message) = message {
            block.push_str(message);
            block.push('\n');
        }
        block.push_str(PROGRESS_HEADER);
        block.push('\n');
        block.push_str(PROGRESS_RULE);
        block.push_str("\n\n");

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(block.as_bytes())?;
        drop(file);

        // Ticks are spliced at the last newline of the current content,
        // so interleaved log writes after this point land below the bar.
        let content = fs::read_to_string(&self.path)?;
        let anchor = content.rfind('\n').unwrap_or(content.len());

        self.progress = Some(ProgressState {
            end,
            ticks_written: 0,
            anchor,
        });
        Ok(())
    }

    /// Advance the bar to `value` in `[0, end]`.
    ///
    /// Monotonic and idempotent: a value that does not increase the tick
    /// count is a no-op. Otherwise the delta of `*` characters is spliced
    /// at the anchor and the file rewritten from the start.
    pub fn update_progress_bar(&mut self, value: f64) -> Result<(), CoreError> {
        let progress = self.progress.as_mut().ok_or_else(|| {
            CoreError::InvalidState("update_progress_bar called before make_progress_bar".into())
        })?;

        let ticks = ((value / progress.end) * PROGRESS_TICKS).round().max(0.0) as usize;
        if ticks <= progress.ticks_written {
            return Ok(());
        }
        let delta = ticks - progress.ticks_written;

        let mut content = fs::read_to_string(&self.path)?;
        content.insert_str(progress.anchor, &"*".repeat(delta));
        fs::write(&self.path, content)?;

        progress.ticks_written = ticks;
        Ok(())
    }

    /// Ticks currently drawn, if a bar is active.
    pub fn progress_ticks(&self) -> Option<usize> {
        self.progress.as_ref().map(|p| p.ticks_written)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}
