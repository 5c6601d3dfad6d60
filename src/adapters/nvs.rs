//! NVS preferences adapter.
//!
//! Implements [`PrefsPort`] on the ESP-IDF NVS partition.  Values use the
//! same encodings as the Arduino `Preferences` library (bools as `u8`,
//! floats as 4-byte blobs) so settings written by older firmware load
//! unchanged.
//!
//! - **`target_os = "espidf"`**: raw `nvs_*` calls on the default
//!   partition.
//! - **`not(target_os = "espidf")`**: an in-memory map keyed
//!   `namespace::key`, used by host tests and simulation.

use log::{debug, info};

use crate::app::ports::{ConfigError, PrefsPort};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stored {
    U8(u8),
    I32(i32),
    U32(u32),
    F32(f32),
}

pub struct NvsPrefs {
    /// Open namespace and whether it is writable.
    open: Option<(heapless::String<16>, bool)>,
    #[cfg(target_os = "espidf")]
    handle: nvs_handle_t,
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Stored>,
}

impl NvsPrefs {
    /// Initialise NVS flash.  On first boot or after a layout change the
    /// partition is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::OpenFailed);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::OpenFailed);
            }
            info!("NvsPrefs: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsPrefs: simulation backend");

        Ok(Self {
            open: None,
            #[cfg(target_os = "espidf")]
            handle: 0,
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    fn writable(&self) -> Result<(), ConfigError> {
        match self.open {
            Some((_, true)) => Ok(()),
            _ => Err(ConfigError::NotWritable),
        }
    }
}

// ── Simulation backend ─────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl NvsPrefs {
    fn composite_key(&self, key: &str) -> Option<String> {
        self.open.as_ref().map(|(ns, _)| format!("{}::{}", ns, key))
    }

    fn get(&self, key: &str) -> Option<Stored> {
        self.composite_key(key).and_then(|k| self.store.get(&k).copied())
    }

    fn put(&mut self, key: &str, value: Stored) -> Result<(), ConfigError> {
        self.writable()?;
        let k = self.composite_key(key).ok_or(ConfigError::NotWritable)?;
        self.store.insert(k, value);
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl PrefsPort for NvsPrefs {
    fn begin(&mut self, namespace: &str, read_only: bool) -> Result<(), ConfigError> {
        let mut ns = heapless::String::new();
        ns.push_str(namespace).map_err(|()| ConfigError::OpenFailed)?;
        self.open = Some((ns, !read_only));
        debug!("NvsPrefs: opened '{}' ({})", namespace, if read_only { "ro" } else { "rw" });
        Ok(())
    }

    fn end(&mut self) {
        self.open = None;
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Stored::U8(v)) => v != 0,
            _ => default,
        }
    }

    fn get_u8(&self, key: &str, default: u8) -> u8 {
        match self.get(key) {
            Some(Stored::U8(v)) => v,
            _ => default,
        }
    }

    fn get_i32(&self, key: &str, default: i32) -> i32 {
        match self.get(key) {
            Some(Stored::I32(v)) => v,
            _ => default,
        }
    }

    fn get_u32(&self, key: &str, default: u32) -> u32 {
        match self.get(key) {
            Some(Stored::U32(v)) => v,
            _ => default,
        }
    }

    fn get_f32(&self, key: &str, default: f32) -> f32 {
        match self.get(key) {
            Some(Stored::F32(v)) => v,
            _ => default,
        }
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<(), ConfigError> {
        self.put(key, Stored::U8(u8::from(value)))
    }

    fn put_u8(&mut self, key: &str, value: u8) -> Result<(), ConfigError> {
        self.put(key, Stored::U8(value))
    }

    fn put_i32(&mut self, key: &str, value: i32) -> Result<(), ConfigError> {
        self.put(key, Stored::I32(value))
    }

    fn put_u32(&mut self, key: &str, value: u32) -> Result<(), ConfigError> {
        self.put(key, Stored::U32(value))
    }

    fn put_f32(&mut self, key: &str, value: f32) -> Result<(), ConfigError> {
        self.put(key, Stored::F32(value))
    }
}

// ── ESP-IDF backend ────────────────────────────────────────────────

/// NUL-terminated copy of a namespace or key (NVS limit: 15 chars).
#[cfg(target_os = "espidf")]
fn c_name(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

#[cfg(target_os = "espidf")]
impl NvsPrefs {
    fn commit_if(&self, ret: esp_err_t) -> Result<(), ConfigError> {
        if ret != ESP_OK {
            warn!("NvsPrefs: write error {}", ret);
            return Err(ConfigError::WriteFailed);
        }
        // SAFETY: handle is open read-write (checked by `writable`).
        if unsafe { nvs_commit(self.handle) } != ESP_OK {
            return Err(ConfigError::WriteFailed);
        }
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl PrefsPort for NvsPrefs {
    fn begin(&mut self, namespace: &str, read_only: bool) -> Result<(), ConfigError> {
        self.end();
        let ns = c_name(namespace);
        let mode = if read_only {
            nvs_open_mode_t_NVS_READONLY
        } else {
            nvs_open_mode_t_NVS_READWRITE
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        // A read-only open of a namespace never written reports NOT_FOUND;
        // getters then fall back to their defaults.
        if ret != ESP_OK && !(read_only && ret == ESP_ERR_NVS_NOT_FOUND) {
            warn!("NvsPrefs: open '{}' failed ({})", namespace, ret);
            return Err(ConfigError::OpenFailed);
        }
        let mut name = heapless::String::new();
        name.push_str(namespace).map_err(|()| ConfigError::OpenFailed)?;
        self.handle = if ret == ESP_OK { handle } else { 0 };
        self.open = Some((name, !read_only));
        debug!("NvsPrefs: opened '{}'", namespace);
        Ok(())
    }

    fn end(&mut self) {
        if self.open.take().is_some() && self.handle != 0 {
            // SAFETY: handle came from a successful nvs_open.
            unsafe { nvs_close(self.handle) };
        }
        self.handle = 0;
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_u8(key, u8::from(default)) != 0
    }

    fn get_u8(&self, key: &str, default: u8) -> u8 {
        let k = c_name(key);
        let mut v = 0u8;
        // SAFETY: key is NUL-terminated; out-pointer is a live local.
        let ret = unsafe { nvs_get_u8(self.handle, k.as_ptr() as *const _, &mut v) };
        if ret == ESP_OK { v } else { default }
    }

    fn get_i32(&self, key: &str, default: i32) -> i32 {
        let k = c_name(key);
        let mut v = 0i32;
        let ret = unsafe { nvs_get_i32(self.handle, k.as_ptr() as *const _, &mut v) };
        if ret == ESP_OK { v } else { default }
    }

    fn get_u32(&self, key: &str, default: u32) -> u32 {
        let k = c_name(key);
        let mut v = 0u32;
        let ret = unsafe { nvs_get_u32(self.handle, k.as_ptr() as *const _, &mut v) };
        if ret == ESP_OK { v } else { default }
    }

    fn get_f32(&self, key: &str, default: f32) -> f32 {
        let k = c_name(key);
        let mut buf = [0u8; 4];
        let mut size = buf.len();
        let ret = unsafe {
            nvs_get_blob(
                self.handle,
                k.as_ptr() as *const _,
                buf.as_mut_ptr() as *mut _,
                &mut size,
            )
        };
        if ret == ESP_OK && size == 4 {
            f32::from_le_bytes(buf)
        } else {
            default
        }
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<(), ConfigError> {
        self.put_u8(key, u8::from(value))
    }

    fn put_u8(&mut self, key: &str, value: u8) -> Result<(), ConfigError> {
        self.writable()?;
        let k = c_name(key);
        let ret = unsafe { nvs_set_u8(self.handle, k.as_ptr() as *const _, value) };
        self.commit_if(ret)
    }

    fn put_i32(&mut self, key: &str, value: i32) -> Result<(), ConfigError> {
        self.writable()?;
        let k = c_name(key);
        let ret = unsafe { nvs_set_i32(self.handle, k.as_ptr() as *const _, value) };
        self.commit_if(ret)
    }

    fn put_u32(&mut self, key: &str, value: u32) -> Result<(), ConfigError> {
        self.writable()?;
        let k = c_name(key);
        let ret = unsafe { nvs_set_u32(self.handle, k.as_ptr() as *const _, value) };
        self.commit_if(ret)
    }

    fn put_f32(&mut self, key: &str, value: f32) -> Result<(), ConfigError> {
        self.writable()?;
        let k = c_name(key);
        let bytes = value.to_le_bytes();
        let ret = unsafe {
            nvs_set_blob(
                self.handle,
                k.as_ptr() as *const _,
                bytes.as_ptr() as *const _,
                bytes.len(),
            )
        };
        self.commit_if(ret)
    }
}

#[cfg(target_os = "espidf")]
impl Drop for NvsPrefs {
    fn drop(&mut self) {
        self.end();
    }
}
