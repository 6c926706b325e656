//! Stage timing and progress display helpers.

use std::time::{Duration, Instant};

/// Width of the console progress bar in cells.
pub const BAR_WIDTH: usize = 20;

/// Render a progress bar such as `[████░░░░] 2/4`.
pub fn progress_bar(current: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 { width } else { (current.min(total) * width) / total };
    format!("[{}{}] {current}/{total}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Format a duration as `42s` or `3m7s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m{}s", secs / 60, secs % 60)
    }
}

/// Tracks per-stage durations to estimate the remaining time.
#[derive(Debug, Clone)]
pub struct StageTimer {
    started: Instant,
    stage_started: Instant,
    completed: Vec<Duration>,
}

impl Default for StageTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTimer {
    /// Start a timer now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self { started: now, stage_started: now, completed: Vec::new() }
    }

    /// Record the end of a stage and start timing the next one.
    pub fn stage_complete(&mut self) {
        self.completed.push(self.stage_started.elapsed());
        self.stage_started = Instant::now();
    }

    /// Mark the start of a stage without recording the gap as stage time.
    pub fn stage_start(&mut self) {
        self.stage_started = Instant::now();
    }

    /// Durations of completed stages.
    pub fn completed(&self) -> &[Duration] {
        &self.completed
    }

    /// Total wall time since the timer started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Average duration of completed stages.
    pub fn average(&self) -> Option<Duration> {
        let n = u32::try_from(self.completed.len()).ok().filter(|n| *n > 0)?;
        Some(self.completed.iter().sum::<Duration>() / n)
    }

    /// Estimated time for `remaining` more stages.
    pub fn estimate_remaining(&self, remaining: usize) -> Option<Duration> {
        let avg = self.average()?;
        Some(avg * u32::try_from(remaining).unwrap_or(u32::MAX))
    }

    /// Human-readable ETA for the remaining stages.
    pub fn eta(&self, remaining: usize) -> String {
        self.estimate_remaining(remaining)
            .map_or_else(|| "estimating...".to_string(), format_duration)
    }
}
