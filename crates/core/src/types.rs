use serde::Serialize;

/// Window identifier (HWND on Windows)
pub type WindowId = u64;

/// Identifier of one application screen, e.g. "3.2"
pub type FrameId = String;

/// Background grid the frame database stores button coordinates in.
pub const GRID_W: i32 = 192;
pub const GRID_H: i32 = 128;

/// One sampled screen pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(v: [u8; 3]) -> Self {
        Self { r: v[0], g: v[1], b: v[2] }
    }
}

/// Axis-aligned integer box in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// The 3:2 sub-region of the client area that all automation
/// coordinates are relative to. Derived from the client rectangle by
/// letterboxing, optionally corrected by border refinement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameArea {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl FrameArea {
    /// Fit a 3:2 box inside `client`. Wider clients keep full height and
    /// center horizontally; taller clients keep full width and center
    /// vertically; an exact 3:2 client is used as-is.
    pub fn from_client(client: &Rect) -> Self {
        let ratio = client.w as f64 / client.h as f64;
        let target = 3.0 / 2.0;
        if ratio > target {
            let h = client.h;
            let w = h * 3 / 2;
            Self { x: client.x + (client.w - w) / 2, y: client.y, w, h }
        } else if ratio < target {
            let w = client.w;
            let h = w * 2 / 3;
            Self { x: client.x, y: client.y + (client.h - h) / 2, w, h }
        } else {
            Self { x: client.x, y: client.y, w: client.w, h: client.h }
        }
    }

    /// Screen point -> percent of the frame area. Never negative; values
    /// above 1.0 are possible for points right/below the area and are the
    /// caller's job to clamp.
    pub fn percent_of(&self, x: i32, y: i32) -> (f64, f64) {
        if self.w == 0 || self.h == 0 {
            return (0.0, 0.0);
        }
        let px = (x - self.x) as f64 / self.w as f64;
        let py = (y - self.y) as f64 / self.h as f64;
        (px.max(0.0), py.max(0.0))
    }

    /// Percent -> absolute screen point.
    pub fn at_percent(&self, px: f64, py: f64) -> (i32, i32) {
        (
            self.x + (px * self.w as f64).round() as i32,
            self.y + (py * self.h as f64).round() as i32,
        )
    }

    /// Screen point -> frame-relative pixels (origin at the area's top-left).
    pub fn to_relative(&self, x: i32, y: i32) -> (i32, i32) {
        (x - self.x, y - self.y)
    }

    /// Frame-relative pixels -> absolute screen point.
    pub fn to_screen(&self, rx: i32, ry: i32) -> (i32, i32) {
        (self.x + rx, self.y + ry)
    }

    /// Scale factor from the background grid to screen pixels, rounded to
    /// four decimals.
    pub fn pixel_size(&self) -> f64 {
        let s = (self.w as f64 / GRID_W as f64).min(self.h as f64 / GRID_H as f64);
        (s * 10_000.0).round() / 10_000.0
    }
}

/// Target window as reported by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetWindow {
    pub id: WindowId,
    pub title: String,
    pub window: Rect,
    pub client: Rect,
}

/// Anchor for the external overlay UI, to the right of the frame area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverlayAnchor {
    pub x: i32,
    pub y: i32,
    pub available_height: i32,
}

/// Lifecycle of one automation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl SessionState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Normal,
    StorageFull,
    Timeout,
    Failsafe,
    Explicit,
    Error,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::StorageFull => "storage-full",
            Self::Timeout => "timeout",
            Self::Failsafe => "failsafe",
            Self::Explicit => "explicit",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outbound notification to the embedding UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    FailsafeStop { frame_id: FrameId, reason: String },
    Completion { frame_id: FrameId },
}

/// Callback the UI layer registers to receive [`UiEvent`]s.
pub type UiCallback = std::sync::Arc<dyn Fn(UiEvent) + Send + Sync>;

/// Window presence transition reported by the geometry cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryEvent {
    Found { id: WindowId, title: String },
    Lost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_wide_client_fits_height() {
        let area = FrameArea::from_client(&Rect::new(0, 0, 1920, 1080));
        assert_eq!(area, FrameArea { x: 150, y: 0, w: 1620, h: 1080 });
    }

    #[test]
    fn letterbox_tall_client_fits_width() {
        let area = FrameArea::from_client(&Rect::new(10, 20, 900, 900));
        assert_eq!(area.w, 900);
        assert_eq!(area.h, 600);
        assert_eq!(area.x, 10);
        assert_eq!(area.y, 20 + 150);
    }

    #[test]
    fn letterbox_exact_ratio_uses_full_client() {
        let area = FrameArea::from_client(&Rect::new(5, 7, 1500, 1000));
        assert_eq!(area, FrameArea { x: 5, y: 7, w: 1500, h: 1000 });
    }

    #[test]
    fn percent_round_trips_within_one_pixel() {
        let area = FrameArea { x: 150, y: 0, w: 1620, h: 1080 };
        for (x, y) in [
            (150, 0),
            (151, 1),
            (960, 540),
            (1769, 1079),
            (433, 977),
        ] {
            let (px, py) = area.percent_of(x, y);
            let (bx, by) = area.at_percent(px, py);
            assert!((bx - x).abs() <= 1, "x {} -> {}", x, bx);
            assert!((by - y).abs() <= 1, "y {} -> {}", y, by);
        }
    }

    #[test]
    fn percent_is_clamped_to_non_negative_only() {
        let area = FrameArea { x: 100, y: 100, w: 300, h: 200 };
        let (px, py) = area.percent_of(50, 50);
        assert_eq!((px, py), (0.0, 0.0));
        let (px, py) = area.percent_of(700, 500);
        assert!(px > 1.0 && py > 1.0);
    }

    #[test]
    fn relative_round_trips_exactly() {
        let area = FrameArea { x: 150, y: 30, w: 1620, h: 1080 };
        let (rx, ry) = area.to_relative(433, 977);
        assert_eq!(area.to_screen(rx, ry), (433, 977));
    }

    #[test]
    fn pixel_size_rounds_to_four_decimals() {
        let area = FrameArea { x: 0, y: 0, w: 1620, h: 1080 };
        assert_eq!(area.pixel_size(), 8.4375);
        let odd = FrameArea { x: 0, y: 0, w: 1000, h: 666 };
        assert_eq!(odd.pixel_size(), 5.2031);
    }
}
