// Console key input adapter - console-mode keyboard reading on Windows

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;
use winapi::shared::minwindef::DWORD;
use winapi::shared::winerror::WAIT_TIMEOUT;
use winapi::um::consoleapi::{GetConsoleMode, ReadConsoleInputW, SetConsoleMode};
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::processenv::GetStdHandle;
use winapi::um::synchapi::WaitForSingleObject;
use winapi::um::winbase::{STD_INPUT_HANDLE, WAIT_OBJECT_0};
use winapi::um::wincon::{ENABLE_ECHO_INPUT, ENABLE_LINE_INPUT};
use winapi::um::wincontypes::{INPUT_RECORD, KEY_EVENT};
use winapi::um::winnt::HANDLE;

use crate::error::{SupervisorError, SupervisorResult};
use crate::ports::KeyInput;

/// Reads single keys from the console input buffer with line input and echo off
pub struct ConsoleKeyInput {
    saved: Mutex<Option<DWORD>>,
}

// The console handle is process-global; only the saved mode is stored here.
impl ConsoleKeyInput {
    pub fn new() -> Self {
        Self {
            saved: Mutex::new(None),
        }
    }

    /// Whether stdin is attached to a console
    pub fn is_available() -> bool {
        let handle = Self::handle();
        if handle.is_null() || handle == INVALID_HANDLE_VALUE {
            return false;
        }
        let mut mode: DWORD = 0;
        // SAFETY: valid handle and out pointer.
        unsafe { GetConsoleMode(handle, &mut mode) != 0 }
    }

    fn handle() -> HANDLE {
        // SAFETY: GetStdHandle has no preconditions.
        unsafe { GetStdHandle(STD_INPUT_HANDLE) }
    }

    fn unavailable(what: &str) -> SupervisorError {
        SupervisorError::TerminalModeUnavailable {
            reason: format!("{}: {}", what, io::Error::last_os_error()),
        }
    }
}

impl Default for ConsoleKeyInput {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyInput for ConsoleKeyInput {
    fn name(&self) -> &'static str {
        "console"
    }

    fn enter_raw_mode(&self) -> SupervisorResult<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| SupervisorError::TerminalModeUnavailable {
                reason: "console state lock poisoned".to_string(),
            })?;
        if saved.is_some() {
            return Ok(());
        }

        let handle = Self::handle();
        let mut original: DWORD = 0;
        // SAFETY: valid handle and out pointer.
        if unsafe { GetConsoleMode(handle, &mut original) } == 0 {
            return Err(Self::unavailable("GetConsoleMode failed"));
        }
        let raw = original & !(ENABLE_LINE_INPUT | ENABLE_ECHO_INPUT);
        if unsafe { SetConsoleMode(handle, raw) } == 0 {
            return Err(Self::unavailable("SetConsoleMode failed"));
        }

        *saved = Some(original);
        debug!("console switched to unbuffered input");
        Ok(())
    }

    fn read_key(&self, timeout: Duration) -> SupervisorResult<Option<char>> {
        let handle = Self::handle();
        let timeout_ms = timeout.as_millis().min(DWORD::MAX as u128) as DWORD;

        // SAFETY: waiting on the console input handle.
        match unsafe { WaitForSingleObject(handle, timeout_ms) } {
            WAIT_OBJECT_0 => {}
            WAIT_TIMEOUT => return Ok(None),
            _ => return Err(SupervisorError::IoError(io::Error::last_os_error())),
        }

        // SAFETY: INPUT_RECORD is plain data; ReadConsoleInputW fills one record.
        let mut record: INPUT_RECORD = unsafe { std::mem::zeroed() };
        let mut read: DWORD = 0;
        if unsafe { ReadConsoleInputW(handle, &mut record, 1, &mut read) } == 0 {
            return Err(SupervisorError::IoError(io::Error::last_os_error()));
        }
        if read == 0 || record.EventType != KEY_EVENT {
            return Ok(None);
        }

        // SAFETY: EventType says the union holds a key event.
        let key = unsafe { record.Event.KeyEvent() };
        if key.bKeyDown == 0 {
            return Ok(None);
        }
        let unit = unsafe { *key.uChar.UnicodeChar() };
        Ok(char::from_u32(unit as u32).filter(|c| *c != '\0'))
    }

    fn restore_mode(&self) -> SupervisorResult<()> {
        let original = match self.saved.lock() {
            Ok(mut saved) => saved.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(original) = original {
            // SAFETY: restoring a mode previously read from the same handle.
            if unsafe { SetConsoleMode(Self::handle(), original) } == 0 {
                return Err(Self::unavailable("SetConsoleMode restore failed"));
            }
            debug!("console mode restored");
        }
        Ok(())
    }
}
