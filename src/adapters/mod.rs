//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements     | Connects to                    |
//! |------------------|----------------|--------------------------------|
//! | `console_render` | RenderPort     | Log output (headless builds)   |
//! | `fs_storage`     | StoragePort    | SD card FAT volume / host dir  |
//! | `http_portal`    | (none)         | ESP-IDF HTTP server → Channel  |
//! | `log_sink`       | EventSink      | Serial log output              |
//! | `nvs`            | PrefsPort      | NVS / in-memory store          |
//! | `time`           | (none)         | ESP32 system timer             |
//! | `uart`           | SerialPort     | UART2 to the ECU               |
//! | `wifi`           | ClientMonitor  | ESP-IDF Wi-Fi soft-AP          |

pub mod console_render;
pub mod fs_storage;
pub mod http_portal;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod uart;
pub mod wifi;
