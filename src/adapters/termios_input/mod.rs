// Termios key input adapter - cbreak-mode keyboard reading on unix terminals

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use crate::error::{SupervisorError, SupervisorResult};
use crate::ports::KeyInput;

/// Reads single keys from stdin with `ICANON` and `ECHO` switched off.
///
/// Signal generation and output post-processing are left alone, so Ctrl+C
/// still interrupts and `\n` written by other code still returns the cursor.
pub struct TermiosKeyInput {
    fd: libc::c_int,
    saved: Mutex<Option<libc::termios>>,
}

impl TermiosKeyInput {
    /// Adapter for the process's stdin
    pub fn new() -> Self {
        Self {
            fd: libc::STDIN_FILENO,
            saved: Mutex::new(None),
        }
    }

    /// Whether stdin is a terminal this adapter can drive
    pub fn is_available() -> bool {
        // SAFETY: isatty only inspects the descriptor.
        unsafe { libc::isatty(libc::STDIN_FILENO) == 1 }
    }

    fn unavailable(what: &str) -> SupervisorError {
        SupervisorError::TerminalModeUnavailable {
            reason: format!("{}: {}", what, io::Error::last_os_error()),
        }
    }
}

impl Default for TermiosKeyInput {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyInput for TermiosKeyInput {
    fn name(&self) -> &'static str {
        "termios"
    }

    fn enter_raw_mode(&self) -> SupervisorResult<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| SupervisorError::TerminalModeUnavailable {
                reason: "terminal state lock poisoned".to_string(),
            })?;
        if saved.is_some() {
            return Ok(());
        }

        // SAFETY: termios is plain old data; tcgetattr fills it in.
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(self.fd, &mut original) } != 0 {
            return Err(Self::unavailable("tcgetattr failed"));
        }

        let mut raw = original;
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;
        if unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &raw) } != 0 {
            return Err(Self::unavailable("tcsetattr failed"));
        }

        *saved = Some(original);
        debug!(fd = self.fd, "terminal switched to cbreak mode");
        Ok(())
    }

    fn read_key(&self, timeout: Duration) -> SupervisorResult<Option<char>> {
        let mut pollfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: one valid pollfd, count 1.
        let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(SupervisorError::IoError(err));
        }
        if ready == 0 {
            return Ok(None);
        }
        if pollfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0
            && pollfd.revents & libc::POLLIN == 0
        {
            return Err(SupervisorError::IoError(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stdin closed",
            )));
        }

        let mut byte = 0u8;
        // SAFETY: reading one byte into a valid stack buffer.
        let n = unsafe { libc::read(self.fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
        match n {
            1 => Ok(Some(byte as char)),
            0 => Err(SupervisorError::IoError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin reached end of file",
            ))),
            _ => {
                let err = io::Error::last_os_error();
                if matches!(err.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) {
                    Ok(None)
                } else {
                    Err(SupervisorError::IoError(err))
                }
            }
        }
    }

    fn restore_mode(&self) -> SupervisorResult<()> {
        let original = match self.saved.lock() {
            Ok(mut saved) => saved.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(original) = original {
            // SAFETY: restoring a termios previously returned by tcgetattr.
            if unsafe { libc::tcsetattr(self.fd, libc::TCSADRAIN, &original) } != 0 {
                return Err(Self::unavailable("tcsetattr restore failed"));
            }
            debug!(fd = self.fd, "terminal mode restored");
        }
        Ok(())
    }
}
