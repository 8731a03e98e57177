use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::buttons::{ButtonClassifier, ButtonSpec};
use crate::logger;
use crate::platform::Platform;
use crate::settings::Settings;

/// Pacing for pointer actions. Explicit construction state, never
/// process-wide globals.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub click_retries: u32,
    pub retry_backoff: Duration,
    pub poll_interval: Duration,
    pub post_click_delay: Duration,
    pub move_duration: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            click_retries: 3,
            retry_backoff: Duration::from_millis(100),
            poll_interval: Duration::from_millis(200),
            post_click_delay: Duration::from_millis(50),
            move_duration: Duration::from_millis(100),
        }
    }
}

impl ExecutorConfig {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            click_retries: s.click_retries,
            retry_backoff: Duration::from_millis(s.retry_backoff_ms),
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            post_click_delay: Duration::from_millis(s.post_click_delay_ms),
            move_duration: Duration::from_millis(s.move_duration_ms),
        }
    }
}

/// Validated pointer actions shared by every routine.
pub struct ActionExecutor {
    platform: Arc<dyn Platform>,
    classifier: ButtonClassifier,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(
        platform: Arc<dyn Platform>,
        classifier: ButtonClassifier,
        config: ExecutorConfig,
    ) -> Self {
        logger::register_prefix("exec", logger::COLOR_GRAY);
        Self { platform, classifier, config }
    }

    pub fn classifier(&self) -> &ButtonClassifier {
        &self.classifier
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Click once the button shows an active state. False means it never
    /// did within the configured attempts; the caller decides what that
    /// implies.
    pub fn click(&self, spec: &ButtonSpec) -> bool {
        self.click_with(spec, self.config.click_retries, false)
    }

    pub fn click_with(&self, spec: &ButtonSpec, retries: u32, skip_validation: bool) -> bool {
        let attempts = retries.max(1);
        for attempt in 0..attempts {
            if skip_validation || self.classifier.is_active(spec) {
                self.platform.pointer_click(spec.x, spec.y);
                thread::sleep(self.config.post_click_delay);
                return true;
            }
            if attempt + 1 < attempts {
                thread::sleep(self.config.retry_backoff);
            }
        }
        logger::warn_p(
            "exec",
            &format!(
                "button at ({}, {}) not clickable after {} attempts",
                spec.x, spec.y, attempts
            ),
        );
        false
    }

    /// Poll until `condition` goes false or `keep_going` cancels. True
    /// means the wait completed on its own. Cancellation is observed
    /// within one poll interval.
    pub fn wait_while(
        &self,
        mut condition: impl FnMut() -> bool,
        keep_going: impl Fn() -> bool,
    ) -> bool {
        while condition() {
            if !keep_going() {
                return false;
            }
            thread::sleep(self.config.poll_interval);
        }
        true
    }

    pub fn press(&self, x: i32, y: i32) {
        self.platform.pointer_press(x, y);
    }

    /// Interpolated drag between two known points over `move_duration`.
    pub fn drag(&self, from: (i32, i32), to: (i32, i32)) {
        const STEPS: i32 = 10;
        for i in 1..=STEPS {
            let x = from.0 + (to.0 - from.0) * i / STEPS;
            let y = from.1 + (to.1 - from.1) * i / STEPS;
            self.platform.pointer_move(x, y);
            thread::sleep(self.config.move_duration / STEPS as u32);
        }
    }

    /// Unconditional pointer-button release. Idempotent; every session
    /// exit path goes through here.
    pub fn release_pointer(&self) {
        self.platform.pointer_release();
    }

    /// Press at `(x, y)`, run `body`, release no matter how `body` exits.
    pub fn hold_at<R>(&self, x: i32, y: i32, body: impl FnOnce() -> R) -> R {
        self.platform.pointer_press(x, y);
        let _guard = ReleaseGuard { platform: self.platform.as_ref() };
        body()
    }
}

struct ReleaseGuard<'a> {
    platform: &'a dyn Platform,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.platform.pointer_release();
    }
}
