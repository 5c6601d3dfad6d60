//! ECU UART adapter.
//!
//! Implements [`SerialPort`] on UART2 (RX GPIO16, TX GPIO17); UART0 stays
//! with the console.  Reads are batched through a small local buffer so
//! the per-byte decoder path does not pay for a driver call per byte.
//!
//! - **`target_os = "espidf"`**: the ESP-IDF UART driver, installed on
//!   `open()` and deleted on `close()`.
//! - **`not(target_os = "espidf")`**: in-memory RX/TX queues that host
//!   tests and the simulator feed directly.

use log::{debug, info};

use crate::app::ports::{SerialError, SerialPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

#[cfg(target_os = "espidf")]
const UART_NUM: uart_port_t = 2;
#[cfg(target_os = "espidf")]
const RX_PIN: i32 = 16;
#[cfg(target_os = "espidf")]
const TX_PIN: i32 = 17;
#[cfg(target_os = "espidf")]
const DRIVER_RX_BUF: i32 = 1024;

const CHUNK: usize = 64;

pub struct UartSerial {
    open: bool,
    chunk: [u8; CHUNK],
    pos: usize,
    len: usize,
    #[cfg(not(target_os = "espidf"))]
    rx: VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    tx: Vec<u8>,
}

impl Default for UartSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl UartSerial {
    pub fn new() -> Self {
        Self {
            open: false,
            chunk: [0; CHUNK],
            pos: 0,
            len: 0,
            #[cfg(not(target_os = "espidf"))]
            rx: VecDeque::new(),
            #[cfg(not(target_os = "espidf"))]
            tx: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn refill(&mut self) -> usize {
        self.pos = 0;
        self.len = self.platform_read(CHUNK);
        self.len
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_open(&mut self, baud: u32) -> Result<(), SerialError> {
        let cfg = uart_config_t {
            baud_rate: baud as i32,
            data_bits: uart_word_length_t_UART_DATA_8_BITS,
            parity: uart_parity_t_UART_PARITY_DISABLE,
            stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
            flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
            ..Default::default()
        };
        // SAFETY: single owner of UART2; config struct lives across the calls.
        unsafe {
            if uart_driver_install(UART_NUM, DRIVER_RX_BUF, 0, 0, core::ptr::null_mut(), 0) != ESP_OK {
                return Err(SerialError::OpenFailed);
            }
            if uart_param_config(UART_NUM, &cfg) != ESP_OK
                || uart_set_pin(UART_NUM, TX_PIN, RX_PIN, -1, -1) != ESP_OK
            {
                warn!("UART: configuration rejected, releasing driver");
                uart_driver_delete(UART_NUM);
                return Err(SerialError::OpenFailed);
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_open(&mut self, _baud: u32) -> Result<(), SerialError> {
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_close(&mut self) {
        // SAFETY: driver was installed by platform_open.
        unsafe {
            uart_driver_delete(UART_NUM);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_close(&mut self) {
        self.rx.clear();
    }

    #[cfg(target_os = "espidf")]
    fn platform_available(&self) -> usize {
        let mut n: usize = 0;
        // SAFETY: out-parameter is a live local.
        if unsafe { uart_get_buffered_data_len(UART_NUM, &mut n) } == ESP_OK {
            n
        } else {
            0
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_available(&self) -> usize {
        self.rx.len()
    }

    #[cfg(target_os = "espidf")]
    fn platform_read(&mut self, max: usize) -> usize {
        // SAFETY: buffer holds CHUNK bytes; zero timeout never blocks.
        let n = unsafe { uart_read_bytes(UART_NUM, self.chunk.as_mut_ptr() as *mut _, max as u32, 0) };
        n.max(0) as usize
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_read(&mut self, max: usize) -> usize {
        let n = max.min(self.rx.len());
        for (slot, byte) in self.chunk.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    #[cfg(target_os = "espidf")]
    fn platform_write(&mut self, byte: u8) -> Result<(), SerialError> {
        let buf = [byte];
        // SAFETY: one-byte buffer outlives the call.
        let n = unsafe { uart_write_bytes(UART_NUM, buf.as_ptr() as *const _, 1) };
        if n == 1 { Ok(()) } else { Err(SerialError::WriteFailed) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_write(&mut self, byte: u8) -> Result<(), SerialError> {
        self.tx.push(byte);
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl UartSerial {
    /// Queue bytes as if the ECU had sent them.  Dropped while closed.
    pub fn inject(&mut self, bytes: &[u8]) {
        if self.open {
            self.rx.extend(bytes);
        }
    }

    /// Everything written since the last call.
    pub fn take_written(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }
}

impl SerialPort for UartSerial {
    fn open(&mut self, baud: u32) -> Result<(), SerialError> {
        if self.open {
            self.close();
        }
        self.platform_open(baud)?;
        self.open = true;
        self.pos = 0;
        self.len = 0;
        info!("UART: open at {} baud", baud);
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.platform_close();
        self.open = false;
        self.pos = 0;
        self.len = 0;
        debug!("UART: closed");
    }

    fn available(&self) -> usize {
        if !self.open {
            return 0;
        }
        (self.len - self.pos) + self.platform_available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if !self.open {
            return None;
        }
        if self.pos >= self.len && self.refill() == 0 {
            return None;
        }
        let b = self.chunk[self.pos];
        self.pos += 1;
        Some(b)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), SerialError> {
        if !self.open {
            return Err(SerialError::NotOpen);
        }
        self.platform_write(byte)
    }
}
