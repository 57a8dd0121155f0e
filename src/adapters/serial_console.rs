//! Serial console adapter.
//!
//! Reads bytes from UART0 (the same port the log output goes to), echoes
//! them back, and assembles them into `\n`-terminated lines for
//! [`ConsolePort`].  A line longer than [`MAX_LINE`] is discarded whole.

use log::warn;

use crate::app::ports::{ConsoleLine, ConsolePort, MAX_LINE};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ───────────────────────────────────────────────────────────────
// Line assembly
// ───────────────────────────────────────────────────────────────

/// Accumulates bytes until a newline.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: heapless::Vec<u8, MAX_LINE>,
    overflowed: bool,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            overflowed: false,
        }
    }

    /// Feed one byte; returns a completed line, newline included.
    pub fn push(&mut self, byte: u8) -> Option<ConsoleLine> {
        if self.overflowed {
            if byte == b'\n' {
                self.overflowed = false;
            }
            return None;
        }

        if self.buf.push(byte).is_err() {
            warn!("Console: line longer than {} bytes discarded", MAX_LINE);
            self.buf.clear();
            self.overflowed = byte != b'\n';
            return None;
        }

        if byte != b'\n' {
            return None;
        }

        let line = core::str::from_utf8(&self.buf)
            .ok()
            .and_then(|s| ConsoleLine::try_from(s).ok());
        if line.is_none() {
            warn!("Console: non-UTF-8 line discarded");
        }
        self.buf.clear();
        line
    }

    /// Bytes buffered toward the next line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

// ───────────────────────────────────────────────────────────────
// UART console
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
const CONSOLE_UART: uart_port_t = 0;
#[cfg(target_os = "espidf")]
const RX_BUFFER: i32 = 256;

pub struct SerialConsole {
    assembler: LineAssembler,
    #[cfg(not(target_os = "espidf"))]
    input: std::collections::VecDeque<u8>,
}

impl SerialConsole {
    /// Install the UART driver on the console port so reads do not block.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, EspError> {
        // SAFETY: the console UART is configured by the bootloader; this only
        // installs an RX ring buffer on it, once, from main.
        esp!(unsafe {
            uart_driver_install(CONSOLE_UART, RX_BUFFER, 0, 0, core::ptr::null_mut(), 0)
        })?;
        Ok(Self {
            assembler: LineAssembler::new(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            assembler: LineAssembler::new(),
            input: std::collections::VecDeque::new(),
        }
    }

    /// Queue simulated keyboard input.
    #[cfg(not(target_os = "espidf"))]
    pub fn type_text(&mut self, text: &str) {
        self.input.extend(text.bytes());
    }

    #[cfg(target_os = "espidf")]
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = 0u8;
        // SAFETY: the driver was installed in new(); zero ticks never blocks.
        let n = unsafe {
            uart_read_bytes(CONSOLE_UART, (&mut byte as *mut u8).cast(), 1, 0)
        };
        if n == 1 {
            // Echo so the operator sees what they type.
            unsafe {
                uart_write_bytes(CONSOLE_UART, (&byte as *const u8).cast(), 1);
            }
            Some(byte)
        } else {
            None
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SerialConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolePort for SerialConsole {
    fn read_line(&mut self) -> Option<ConsoleLine> {
        while let Some(byte) = self.read_byte() {
            if let Some(line) = self.assembler.push(byte) {
                return Some(line);
            }
        }
        None
    }
}
