use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::logger;
use crate::platform::Platform;
use crate::settings::Settings;
use crate::types::*;

/// How far the unrefined width may sit from the configured target width
/// for border refinement to be worth attempting.
const REFINE_TOLERANCE: i32 = 5;

/// Fully-computed geometry for one observed window state. Immutable once
/// published; consumers hold the Arc and read without locking.
#[derive(Debug, Clone, Serialize)]
pub struct WindowGeometry {
    pub id: WindowId,
    pub title: String,
    pub window: Rect,
    pub client: Rect,
    pub frame: FrameArea,
    pub pixel_size: f64,
    pub overlay: OverlayAnchor,
    pub refined: bool,
    pub refinement_failed: bool,
}

impl WindowGeometry {
    /// Background-grid coordinates -> absolute screen point, targeting the
    /// center of the addressed cell.
    pub fn grid_to_screen(&self, gx: f64, gy: f64) -> (i32, i32) {
        (
            self.frame.x + ((gx + 0.5) * self.pixel_size) as i32,
            self.frame.y + ((gy + 0.5) * self.pixel_size) as i32,
        )
    }
}

/// Tunables the cache reads from [`Settings`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub window_title: String,
    pub process_name: String,
    pub period: Duration,
    pub border_target_width: i32,
    pub border_color: Rgb,
    /// Where to drop the JSON geometry dump; None disables dumping.
    pub dump_dir: Option<PathBuf>,
}

impl CacheConfig {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            window_title: s.window_title.clone(),
            process_name: s.process_name.clone(),
            period: Duration::from_millis(s.cache_period_ms),
            border_target_width: s.border_target_width,
            border_color: Rgb::from(s.border_color),
            dump_dir: Some(PathBuf::from("logs/cache")),
        }
    }
}

/// Tracks the target window and serves coordinate conversions off the
/// last fully-computed snapshot. `refresh` is driven by a background
/// loop; consumers only ever read.
pub struct GeometryCache {
    platform: Arc<dyn Platform>,
    config: CacheConfig,
    current: Mutex<Option<Arc<WindowGeometry>>>,
    events: Mutex<Option<mpsc::Sender<GeometryEvent>>>,
}

impl GeometryCache {
    pub fn new(platform: Arc<dyn Platform>, config: CacheConfig) -> Self {
        logger::register_prefix("cache", logger::COLOR_BLUE);
        Self {
            platform,
            config,
            current: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    /// Subscribe to window found/lost transitions.
    pub fn set_event_sender(&self, tx: mpsc::Sender<GeometryEvent>) {
        *self.events.lock().unwrap() = Some(tx);
    }

    /// Poll the OS once and republish the snapshot if anything changed.
    pub fn refresh(&self) {
        let found = self
            .platform
            .find_window(&self.config.window_title, &self.config.process_name);

        let Some(window) = found else {
            let had = self.current.lock().unwrap().take();
            if had.is_some() {
                logger::warn_p("cache", "target window lost; geometry cleared");
                self.emit(GeometryEvent::Lost);
            }
            return;
        };

        let (unchanged, was_present) = {
            let cur = self.current.lock().unwrap();
            let was = cur.is_some();
            let same = cur.as_ref().map_or(false, |g| {
                g.id == window.id && g.window == window.window && g.client == window.client
            });
            (same, was)
        };
        if unchanged {
            return;
        }

        let geometry = self.compute(&window);
        *self.current.lock().unwrap() = Some(Arc::new(geometry.clone()));

        if was_present {
            logger::info_p(
                "cache",
                &format!(
                    "window geometry changed; frame area now {}x{} at ({}, {})",
                    geometry.frame.w, geometry.frame.h, geometry.frame.x, geometry.frame.y
                ),
            );
        } else {
            logger::info_p(
                "cache",
                &format!(
                    "target window found: \"{}\" ({}x{} client)",
                    geometry.title, geometry.client.w, geometry.client.h
                ),
            );
            self.emit(GeometryEvent::Found {
                id: geometry.id,
                title: geometry.title.clone(),
            });
        }
        self.dump(&geometry);
    }

    /// Last published snapshot, if the window is currently known.
    pub fn geometry(&self) -> Option<Arc<WindowGeometry>> {
        self.current.lock().unwrap().clone()
    }

    pub fn frame_area(&self) -> Option<FrameArea> {
        self.geometry().map(|g| g.frame)
    }

    pub fn percent_to_screen(&self, px: f64, py: f64) -> (i32, i32) {
        match self.frame_area() {
            Some(f) => f.at_percent(px, py),
            None => {
                self.warn_no_area();
                (0, 0)
            }
        }
    }

    pub fn screen_to_percent(&self, x: i32, y: i32) -> (f64, f64) {
        match self.frame_area() {
            Some(f) => f.percent_of(x, y),
            None => {
                self.warn_no_area();
                (0.0, 0.0)
            }
        }
    }

    pub fn frame_to_screen(&self, rx: i32, ry: i32) -> (i32, i32) {
        match self.frame_area() {
            Some(f) => f.to_screen(rx, ry),
            None => {
                self.warn_no_area();
                (0, 0)
            }
        }
    }

    pub fn screen_to_frame(&self, x: i32, y: i32) -> (i32, i32) {
        match self.frame_area() {
            Some(f) => f.to_relative(x, y),
            None => {
                self.warn_no_area();
                (0, 0)
            }
        }
    }

    pub fn grid_to_screen(&self, gx: f64, gy: f64) -> (i32, i32) {
        match self.geometry() {
            Some(g) => g.grid_to_screen(gx, gy),
            None => {
                self.warn_no_area();
                (0, 0)
            }
        }
    }

    fn warn_no_area(&self) {
        logger::warn_p("cache", "conversion requested without a frame area");
    }

    fn compute(&self, window: &TargetWindow) -> WindowGeometry {
        let unrefined = FrameArea::from_client(&window.client);
        let (frame, refined, refinement_failed) = self.refine(unrefined);
        WindowGeometry {
            id: window.id,
            title: window.title.clone(),
            window: window.window,
            client: window.client,
            frame,
            pixel_size: frame.pixel_size(),
            overlay: overlay_anchor(&window.client, &frame),
            refined,
            refinement_failed,
        }
    }

    /// Correct the letterboxed area to the exact configured width by
    /// probing for the border color just left of the candidate edge at
    /// mid-height. Runs only when the unrefined width is already close to
    /// the target; a miss keeps the unrefined area and is remembered in
    /// the snapshot, so it is not retried until the window moves again.
    fn refine(&self, area: FrameArea) -> (FrameArea, bool, bool) {
        let target = self.config.border_target_width;
        if (area.w - target).abs() > REFINE_TOLERANCE {
            return (area, false, false);
        }
        let validation_y = area.y + area.h / 2;
        for shift in 0..=2 {
            let left = area.x + shift;
            match self.platform.sample_pixel(left - 1, validation_y) {
                Some(c) if c == self.config.border_color => {
                    let refined = FrameArea { x: left, y: area.y, w: target, h: area.h };
                    logger::info_p(
                        "cache",
                        &format!("border refined: left edge {} -> {}, width {}", area.x, left, target),
                    );
                    return (refined, true, false);
                }
                Some(_) => continue,
                None => break,
            }
        }
        logger::warn_p("cache", "border refinement found no border; keeping unrefined area");
        (area, false, true)
    }

    fn emit(&self, event: GeometryEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            tx.send(event).ok();
        }
    }

    fn dump(&self, geometry: &WindowGeometry) {
        let Some(dir) = &self.config.dump_dir else {
            return;
        };
        let payload = serde_json::json!({
            "captured_at": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            "geometry": geometry,
        });
        let result = std::fs::create_dir_all(dir).and_then(|_| {
            std::fs::write(
                dir.join("geometry.json"),
                serde_json::to_string_pretty(&payload).unwrap_or_default(),
            )
        });
        if let Err(e) = result {
            logger::warn_p("cache", &format!("failed to write geometry dump: {}", e));
        }
    }
}

fn overlay_anchor(client: &Rect, frame: &FrameArea) -> OverlayAnchor {
    let offset_y = (client.w / 80).max(32);
    OverlayAnchor {
        x: frame.x + frame.w + 3,
        y: client.y + offset_y,
        available_height: client.h - offset_y - 100,
    }
}

/// Periodic refresh driver. Refreshes immediately, then on every period
/// boundary; wakes every 100ms so shutdown stays prompt.
pub fn run_refresh_loop(cache: Arc<GeometryCache>, stop: Arc<AtomicBool>) {
    cache.refresh();
    let mut last = Instant::now();
    while !stop.load(Ordering::Acquire) {
        if last.elapsed() >= cache.config.period {
            cache.refresh();
            last = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod tests;
