use super::Platform;
use crate::types::*;

use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, BOOL, FALSE, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{ClientToScreen, GetDC, GetPixel, ReleaseDC};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_FORMAT,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_VIRTUALDESK,
    MOUSEINPUT, MOUSE_EVENT_FLAGS, VK_RBUTTON, VK_SPACE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetSystemMetrics, GetWindowRect, GetWindowTextW,
    GetWindowThreadProcessId, IsWindowVisible, SetProcessDPIAware, SM_CXVIRTUALSCREEN,
    SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN,
};

pub struct Win32Platform;

impl Win32Platform {
    pub fn new() -> Self {
        // Pixel sampling and SendInput need physical coordinates.
        unsafe {
            let _ = SetProcessDPIAware();
        }
        Self
    }
}

unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let vec = &mut *(lparam.0 as *mut Vec<isize>);
    vec.push(hwnd.0 as isize);
    TRUE
}

fn window_title(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn process_image(pid: u32) -> String {
    if pid == 0 {
        return String::new();
    }
    unsafe {
        let handle = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) {
            Ok(h) => h,
            Err(_) => return String::new(),
        };
        let mut buf = [0u16; 260];
        let mut len = buf.len() as u32;
        let ok = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_FORMAT(0),
            PWSTR(buf.as_mut_ptr()),
            &mut len,
        );
        let _ = CloseHandle(handle);
        if ok.is_ok() {
            let path = String::from_utf16_lossy(&buf[..len as usize]);
            path.rsplit('\\').next().unwrap_or("").to_string()
        } else {
            String::new()
        }
    }
}

/// Scale a screen point into the 0..65535 space SendInput uses for the
/// virtual desktop.
fn absolute(x: i32, y: i32) -> (i32, i32) {
    unsafe {
        let sx = GetSystemMetrics(SM_XVIRTUALSCREEN);
        let sy = GetSystemMetrics(SM_YVIRTUALSCREEN);
        let sw = GetSystemMetrics(SM_CXVIRTUALSCREEN).max(1);
        let sh = GetSystemMetrics(SM_CYVIRTUALSCREEN).max(1);
        ((x - sx) * 65535 / sw, (y - sy) * 65535 / sh)
    }
}

fn mouse_input(dx: i32, dy: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(inputs: &[INPUT]) {
    unsafe {
        SendInput(inputs, std::mem::size_of::<INPUT>() as i32);
    }
}

impl Platform for Win32Platform {
    fn find_window(&self, title: &str, process: &str) -> Option<TargetWindow> {
        unsafe {
            let mut hwnds: Vec<isize> = Vec::new();
            let _ = EnumWindows(Some(enum_proc), LPARAM(&mut hwnds as *mut Vec<isize> as isize));
            for &raw in &hwnds {
                let hwnd = HWND(raw as *mut _);
                if !IsWindowVisible(hwnd).as_bool() {
                    continue;
                }
                let t = window_title(hwnd);
                if t.is_empty() || !t.contains(title) {
                    continue;
                }
                let mut pid = 0u32;
                GetWindowThreadProcessId(hwnd, Some(&mut pid));
                if !process.is_empty() && !process_image(pid).eq_ignore_ascii_case(process) {
                    continue;
                }
                let mut wrect = RECT::default();
                if GetWindowRect(hwnd, &mut wrect).is_err() {
                    continue;
                }
                let mut crect = RECT::default();
                if GetClientRect(hwnd, &mut crect).is_err() {
                    continue;
                }
                let mut origin = POINT::default();
                if !ClientToScreen(hwnd, &mut origin).as_bool() {
                    continue;
                }
                return Some(TargetWindow {
                    id: raw as u64,
                    title: t,
                    window: Rect::new(
                        wrect.left,
                        wrect.top,
                        wrect.right - wrect.left,
                        wrect.bottom - wrect.top,
                    ),
                    client: Rect::new(
                        origin.x,
                        origin.y,
                        crect.right - crect.left,
                        crect.bottom - crect.top,
                    ),
                });
            }
            None
        }
    }

    fn sample_pixel(&self, x: i32, y: i32) -> Option<Rgb> {
        unsafe {
            let hdc = GetDC(None);
            if hdc.is_invalid() {
                return None;
            }
            let color = GetPixel(hdc, x, y);
            ReleaseDC(None, hdc);
            // CLR_INVALID
            if color.0 == 0xFFFF_FFFF {
                return None;
            }
            Some(Rgb::new(
                (color.0 & 0xFF) as u8,
                ((color.0 >> 8) & 0xFF) as u8,
                ((color.0 >> 16) & 0xFF) as u8,
            ))
        }
    }

    fn pointer_move(&self, x: i32, y: i32) {
        let (ax, ay) = absolute(x, y);
        send(&[mouse_input(
            ax,
            ay,
            MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK | MOUSEEVENTF_MOVE,
        )]);
    }

    fn pointer_press(&self, x: i32, y: i32) {
        let (ax, ay) = absolute(x, y);
        let flags = MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK | MOUSEEVENTF_MOVE;
        send(&[mouse_input(ax, ay, flags | MOUSEEVENTF_LEFTDOWN)]);
    }

    fn pointer_release(&self) {
        // Release wherever the pointer currently is.
        send(&[mouse_input(0, 0, MOUSEEVENTF_LEFTUP)]);
    }

    fn pointer_click(&self, x: i32, y: i32) {
        let (ax, ay) = absolute(x, y);
        let flags = MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK | MOUSEEVENTF_MOVE;
        send(&[
            mouse_input(ax, ay, flags | MOUSEEVENTF_LEFTDOWN),
            mouse_input(ax, ay, flags | MOUSEEVENTF_LEFTUP),
        ]);
    }

    fn abort_pressed(&self) -> bool {
        unsafe {
            GetAsyncKeyState(VK_RBUTTON.0 as i32) < 0 || GetAsyncKeyState(VK_SPACE.0 as i32) < 0
        }
    }
}
