//! Console window visibility, driven by the `start_hidden` setting.

#[cfg(windows)]
pub fn apply_window_mode(start_hidden: bool) {
    use windows::Win32::System::Console::GetConsoleWindow;
    use windows::Win32::UI::WindowsAndMessaging::{ShowWindow, SW_HIDE, SW_SHOW};

    // SAFETY: both calls only act on this process's own console window.
    unsafe {
        let handle = GetConsoleWindow();
        if handle.is_invalid() {
            tracing::debug!("no console window attached");
            return;
        }
        let _ = ShowWindow(handle, if start_hidden { SW_HIDE } else { SW_SHOW });
    }
}

#[cfg(not(windows))]
pub fn apply_window_mode(start_hidden: bool) {
    if start_hidden {
        tracing::debug!("start_hidden has no effect on this platform");
    }
}
