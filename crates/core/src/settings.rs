use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Persistent configuration. Every field has a working default so a
/// missing or partial settings file never blocks startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Substring the target window's title must contain.
    pub window_title: String,
    /// Image name of the process that must own the window.
    pub process_name: String,
    /// Geometry cache refresh period.
    pub cache_period_ms: u64,
    /// Exact frame width that border refinement snaps to. Tuned per game
    /// build; do not expect one value to fit every resolution.
    pub border_target_width: i32,
    /// Letterbox border color sampled during refinement.
    pub border_color: [u8; 3],
    /// Per-session run time budget in seconds.
    pub max_run_time_secs: u64,
    /// Validated-click attempts before giving up.
    pub click_retries: u32,
    /// Backoff between click attempts.
    pub retry_backoff_ms: u64,
    /// Poll interval for wait loops and cancellation checks.
    pub poll_interval_ms: u64,
    /// Settle time after a successful click.
    pub post_click_delay_ms: u64,
    /// Duration of a tweened pointer move.
    pub move_duration_ms: u64,
    /// Frame database location.
    pub frame_db: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_title: "WidgetInc".into(),
            process_name: "WidgetInc.exe".into(),
            cache_period_ms: 1000,
            border_target_width: 2054,
            border_color: [12, 10, 16],
            max_run_time_secs: 300,
            click_retries: 3,
            retry_backoff_ms: 100,
            poll_interval_ms: 200,
            post_click_delay_ms: 50,
            move_duration_ms: 100,
            frame_db: PathBuf::from("frames.json"),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }
}
