pub mod stub;

#[cfg(target_os = "windows")]
pub mod win32;

use crate::logger;
use crate::types::*;

/// OS capabilities the automation core runs against. One instance is
/// shared by the cache refresh loop, every session thread and the
/// emergency monitor, so every method must be safe from any thread.
pub trait Platform: Send + Sync {
    /// Current geometry of the target window, matched by title substring
    /// and owning-process image name. None when the window is gone or the
    /// OS query fails.
    fn find_window(&self, title: &str, process: &str) -> Option<TargetWindow>;

    /// Color of the screen pixel at (x, y). None when sampling fails.
    fn sample_pixel(&self, x: i32, y: i32) -> Option<Rgb>;

    fn pointer_move(&self, x: i32, y: i32);
    fn pointer_press(&self, x: i32, y: i32);
    /// Idempotent; releasing an un-pressed button is a no-op.
    fn pointer_release(&self);
    /// Press and release at (x, y) in one gesture.
    fn pointer_click(&self, x: i32, y: i32);

    /// True while the emergency abort input (secondary pointer button or
    /// the space key) is held down.
    fn abort_pressed(&self) -> bool;
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool) -> Box<dyn Platform> {
    if force_stub {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        return Box::new(stub::StubPlatform::new());
    }
    #[cfg(target_os = "windows")]
    {
        logger::register_prefix("win32", logger::COLOR_GRAY);
        return Box::new(win32::Win32Platform::new());
    }
    #[cfg(not(target_os = "windows"))]
    {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        return Box::new(stub::StubPlatform::new());
    }
}
