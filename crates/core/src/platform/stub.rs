use std::collections::HashMap;
use std::sync::Mutex;

use super::Platform;
use crate::logger;
use crate::types::*;

/// Pointer activity recorded by the stub, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOp {
    Move(i32, i32),
    Press(i32, i32),
    Release,
    Click(i32, i32),
}

struct StubState {
    window: Option<TargetWindow>,
    pixels: HashMap<(i32, i32), Rgb>,
    click_transitions: HashMap<(i32, i32), Rgb>,
    background: Rgb,
    fail_samples: bool,
    abort: bool,
    ops: Vec<PointerOp>,
}

/// Scripted platform for tests and non-Windows hosts. Window geometry,
/// pixel colors and the abort input are all settable; pointer activity
/// is recorded for assertions.
pub struct StubPlatform {
    state: Mutex<StubState>,
}

impl StubPlatform {
    /// Stub with a canned 1920x1080 window at the origin.
    pub fn new() -> Self {
        Self::with_client(Rect::new(0, 0, 1920, 1080))
    }

    /// Stub with no window present.
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(StubState {
                window: None,
                pixels: HashMap::new(),
                click_transitions: HashMap::new(),
                background: Rgb::new(0, 0, 0),
                fail_samples: false,
                abort: false,
                ops: Vec::new(),
            }),
        }
    }

    /// Stub whose window and client rectangles both equal `client`.
    pub fn with_client(client: Rect) -> Self {
        let stub = Self::empty();
        stub.set_client(client);
        stub
    }

    pub fn set_window(&self, window: Option<TargetWindow>) {
        self.state.lock().unwrap().window = window;
    }

    pub fn set_client(&self, client: Rect) {
        self.set_window(Some(TargetWindow {
            id: 30001,
            title: "WidgetInc".into(),
            window: client,
            client,
        }));
    }

    pub fn set_pixel(&self, x: i32, y: i32, color: Rgb) {
        self.state.lock().unwrap().pixels.insert((x, y), color);
    }

    /// Script what a click at `(x, y)` changes the pixel there into, the
    /// way a real button dims after being pressed.
    pub fn set_click_transition(&self, x: i32, y: i32, color: Rgb) {
        self.state.lock().unwrap().click_transitions.insert((x, y), color);
    }

    /// Color returned for every coordinate without a scripted pixel.
    pub fn set_background(&self, color: Rgb) {
        self.state.lock().unwrap().background = color;
    }

    /// Make every subsequent sample fail, as a lost screen context would.
    pub fn set_sample_failure(&self, on: bool) {
        self.state.lock().unwrap().fail_samples = on;
    }

    pub fn set_abort(&self, on: bool) {
        self.state.lock().unwrap().abort = on;
    }

    pub fn ops(&self) -> Vec<PointerOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.lock().unwrap().ops.clear();
    }

    pub fn release_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter(|op| matches!(op, PointerOp::Release))
            .count()
    }

    pub fn click_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter(|op| matches!(op, PointerOp::Click(_, _)))
            .count()
    }
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for StubPlatform {
    fn find_window(&self, title: &str, _process: &str) -> Option<TargetWindow> {
        let state = self.state.lock().unwrap();
        match &state.window {
            Some(w) if w.title.contains(title) => Some(w.clone()),
            _ => None,
        }
    }

    fn sample_pixel(&self, x: i32, y: i32) -> Option<Rgb> {
        let state = self.state.lock().unwrap();
        if state.fail_samples {
            return None;
        }
        Some(state.pixels.get(&(x, y)).copied().unwrap_or(state.background))
    }

    fn pointer_move(&self, x: i32, y: i32) {
        self.state.lock().unwrap().ops.push(PointerOp::Move(x, y));
    }

    fn pointer_press(&self, x: i32, y: i32) {
        logger::info_p("stub", &format!("pointer_press({}, {})", x, y));
        self.state.lock().unwrap().ops.push(PointerOp::Press(x, y));
    }

    fn pointer_release(&self) {
        self.state.lock().unwrap().ops.push(PointerOp::Release);
    }

    fn pointer_click(&self, x: i32, y: i32) {
        logger::info_p("stub", &format!("pointer_click({}, {})", x, y));
        let mut state = self.state.lock().unwrap();
        state.ops.push(PointerOp::Click(x, y));
        if let Some(color) = state.click_transitions.get(&(x, y)).copied() {
            state.pixels.insert((x, y), color);
        }
    }

    fn abort_pressed(&self) -> bool {
        self.state.lock().unwrap().abort
    }
}
