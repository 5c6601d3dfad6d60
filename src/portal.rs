//! Configuration portal: request model, settings updates and log downloads.
//!
//! The network adapter owns sockets and page rendering.  It hands every
//! request to [`route`], passes the resulting [`PortalRequest`] to the
//! controller on the main loop and writes back the [`PortalResponse`].
//!
//! | Method | Path              | Request                        |
//! |--------|-------------------|--------------------------------|
//! | GET    | `/`, `/settings`  | [`PortalRequest::Settings`]    |
//! | POST   | `/save`           | [`PortalRequest::Apply`]       |
//! | GET    | `/rec`            | [`PortalRequest::ToggleRecording`] |
//! | GET    | `/download`       | [`PortalRequest::Download`]    |
//! | GET    | `/downloadLatest` | [`PortalRequest::DownloadLatest`] |
//! | GET    | `/logs`           | [`PortalRequest::ListLogs`]    |

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{Channel, DashSettings, FW_VERSION, ViewMode};
use crate::datalog::{LogPath, log_filename};

// ═══════════════════════════════════════════════════════════════
//  Portal information screen
// ═══════════════════════════════════════════════════════════════

/// What the static portal screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalInfo {
    pub ssid: &'static str,
    pub password: &'static str,
    pub channel: u8,
    pub max_clients: u8,
    pub address: heapless::String<16>,
    pub version: &'static str,
    pub hints: [&'static str; 2],
}

impl Default for PortalInfo {
    fn default() -> Self {
        let mut address = heapless::String::new();
        let _ = address.push_str("192.168.4.1");
        Self {
            ssid: "ESP_DASH",
            password: "12345678",
            channel: 6,
            max_clients: 2,
            address,
            version: FW_VERSION,
            hints: [
                "Tip: When connected, dashboard UI is stopped.",
                "Disconnect from AP to return to dashboard.",
            ],
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Settings update
// ═══════════════════════════════════════════════════════════════

/// New window for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    pub enabled: bool,
    pub min: f32,
    pub max: f32,
}

/// A full settings submission from the portal.
///
/// View, logging and shift fields are required; per-channel windows are
/// optional and left untouched when absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub view: ViewMode,
    #[serde(rename = "logEn")]
    pub logging_enabled: bool,
    #[serde(rename = "shiftEn")]
    pub shift_enabled: bool,
    #[serde(rename = "shiftRpm")]
    pub shift_rpm: i32,
    #[serde(default)]
    pub thresholds: [Option<ThresholdUpdate>; Channel::COUNT],
}

/// Why a submission was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    MissingFields,
    BadValue(&'static str),
    Json,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFields => write!(f, "Missing required fields"),
            Self::BadValue(field) => write!(f, "Bad value for {field}"),
            Self::Json => write!(f, "Malformed JSON"),
        }
    }
}

/// Parse an optional numeric form field; `label` names it in the error.
fn number_field<T: core::str::FromStr>(
    pairs: &[(String, String)],
    key: &str,
    label: &'static str,
) -> Result<Option<T>, UpdateError> {
    match form_value(pairs, key) {
        None => Ok(None),
        Some(v) => v.trim().parse().map(Some).map_err(|_| UpdateError::BadValue(label)),
    }
}

/// Like [`number_field`] for bounds; `NaN` and infinities are refused.
fn bound_field(pairs: &[(String, String)], key: &str, label: &'static str) -> Result<Option<f32>, UpdateError> {
    match number_field::<f32>(pairs, key, label)? {
        Some(v) if !v.is_finite() => Err(UpdateError::BadValue(label)),
        v => Ok(v),
    }
}

impl SettingsUpdate {
    /// Parse a JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self, UpdateError> {
        serde_json::from_slice(body).map_err(|_| UpdateError::Json)
    }

    /// Build from decoded form fields: `view`, `logEn`, `shiftEn`,
    /// `shiftRpm`, and optionally `w{i}e` / `w{i}min` / `w{i}max`.
    pub fn from_form(pairs: &[(String, String)]) -> Result<Self, UpdateError> {
        let (Some(view), Some(log_en), Some(shift_en), Some(shift_rpm)) = (
            number_field::<i32>(pairs, "view", "view")?,
            number_field::<i32>(pairs, "logEn", "logEn")?,
            number_field::<i32>(pairs, "shiftEn", "shiftEn")?,
            number_field::<i32>(pairs, "shiftRpm", "shiftRpm")?,
        ) else {
            return Err(UpdateError::MissingFields);
        };

        const LABELS: [&str; Channel::COUNT] = ["w0", "w1", "w2", "w3", "w4", "w5"];
        let mut thresholds = [None; Channel::COUNT];
        for ch in Channel::ALL {
            let i = ch.index();
            let label = LABELS[i];
            let enabled = number_field::<i32>(pairs, &format!("w{i}e"), label)?;
            let min = bound_field(pairs, &format!("w{i}min"), label)?;
            let max = bound_field(pairs, &format!("w{i}max"), label)?;
            // A window is only replaced when all three fields are present.
            if let (Some(e), Some(min), Some(max)) = (enabled, min, max) {
                thresholds[i] = Some(ThresholdUpdate {
                    enabled: e == 1,
                    min,
                    max,
                });
            }
        }

        Ok(Self {
            view: u8::try_from(view)
                .ok()
                .and_then(ViewMode::from_code)
                .unwrap_or_default(),
            logging_enabled: log_en == 1,
            shift_enabled: shift_en == 1,
            shift_rpm,
            thresholds,
        })
    }

    /// Apply to `settings`.  Shift rpm is clamped; inverted windows collapse.
    pub fn apply_to(&self, settings: &mut DashSettings) {
        settings.view = self.view;
        settings.logging_enabled = self.logging_enabled;
        settings.shift.enabled = self.shift_enabled;
        settings.shift.set_rpm(self.shift_rpm);
        for ch in Channel::ALL {
            if let Some(t) = self.thresholds[ch.index()] {
                let entry = settings.thresholds.entry_mut(ch);
                entry.set_enabled(t.enabled);
                entry.set_bounds(t.min, t.max);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Log downloads
// ═══════════════════════════════════════════════════════════════

/// Which log a download asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRequest {
    Index(i64),
    Name(String),
}

/// Download refusals, each with an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadError {
    NotReady,
    Recording,
    BadIndex,
    MissingName,
    BadPath,
    NotFound,
    NoLogs,
}

impl DownloadError {
    pub fn status(self) -> u16 {
        match self {
            Self::NotReady => 500,
            Self::Recording => 409,
            Self::BadIndex | Self::MissingName | Self::BadPath => 400,
            Self::NotFound | Self::NoLogs => 404,
        }
    }
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotReady => "SD not ready",
            Self::Recording => "Stop REC before download",
            Self::BadIndex => "Bad i",
            Self::MissingName => "Missing f",
            Self::BadPath => "Bad path",
            Self::NotFound => "Not found",
            Self::NoLogs => "No logs yet",
        })
    }
}

/// Map a request to an absolute path on the card.  Rejects traversal.
pub fn resolve_log_path(req: &LogRequest) -> Result<LogPath, DownloadError> {
    match req {
        LogRequest::Index(idx) => {
            let idx = u32::try_from(*idx).map_err(|_| DownloadError::BadIndex)?;
            if idx < 1 {
                return Err(DownloadError::BadIndex);
            }
            Ok(log_filename(idx))
        }
        LogRequest::Name(name) => {
            if name.is_empty() {
                return Err(DownloadError::MissingName);
            }
            if name.contains("..") {
                return Err(DownloadError::BadPath);
            }
            let mut path = LogPath::new();
            if !name.starts_with('/') {
                path.push('/').map_err(|_| DownloadError::BadPath)?;
            }
            path.push_str(name).map_err(|()| DownloadError::BadPath)?;
            Ok(path)
        }
    }
}

/// Whether a card file belongs in the log listing.
pub fn is_csv_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(b".csv")
}

/// Path of the newest completed log given the next index to be used.
pub fn latest_log_path(next_index: u32) -> Result<LogPath, DownloadError> {
    match next_index.saturating_sub(1) {
        0 => Err(DownloadError::NoLogs),
        idx => Ok(log_filename(idx)),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Requests and responses
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A routed portal request.
#[derive(Debug, Clone, PartialEq)]
pub enum PortalRequest {
    Settings,
    Apply(SettingsUpdate),
    ToggleRecording,
    Download(LogRequest),
    DownloadLatest,
    /// `.csv` files on the card with their sizes.
    ListLogs,
    /// Parsed, but rejected before reaching the controller.
    Invalid(u16, String),
}

/// What goes back over HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// `Location` header for 303 redirects.
    pub location: Option<&'static str>,
    /// `Content-Disposition` file name for downloads.
    pub attachment: Option<String>,
}

impl PortalResponse {
    pub fn text(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: message.as_bytes().to_vec(),
            location: None,
            attachment: None,
        }
    }

    pub fn redirect(location: &'static str) -> Self {
        Self {
            status: 303,
            content_type: "text/plain",
            body: Vec::new(),
            location: Some(location),
            attachment: None,
        }
    }

    pub fn json(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body,
            location: None,
            attachment: None,
        }
    }

    pub fn csv(path: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "text/csv",
            body,
            location: None,
            attachment: Some(path.trim_start_matches('/').to_string()),
        }
    }

    pub fn refused(err: DownloadError) -> Self {
        Self::text(err.status(), &err.to_string())
    }
}

/// Decode `application/x-www-form-urlencoded` text (also used for queries).
pub fn parse_form(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|kv| !kv.is_empty())
        .map(|kv| match kv.split_once('=') {
            Some((k, v)) => (url_decode(k), url_decode(v)),
            None => (url_decode(kv), String::new()),
        })
        .collect()
}

fn form_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Percent-decoding with `+` as space.  Malformed escapes pass through.
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = core::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Turn a raw HTTP request into a [`PortalRequest`], or `None` for an
/// unknown route.
pub fn route(method: Method, uri: &str, body: &[u8]) -> Option<PortalRequest> {
    let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
    let query = parse_form(query);

    let req = match (method, path) {
        (Method::Get, "/" | "/settings") => PortalRequest::Settings,
        (Method::Get, "/rec") => PortalRequest::ToggleRecording,
        (Method::Get, "/downloadLatest") => PortalRequest::DownloadLatest,
        (Method::Get, "/logs") => PortalRequest::ListLogs,
        (Method::Get, "/download") => match (form_value(&query, "i"), form_value(&query, "f")) {
            (Some(i), _) => match i.trim().parse::<i64>() {
                Ok(idx) => PortalRequest::Download(LogRequest::Index(idx)),
                Err(_) => PortalRequest::Invalid(400, DownloadError::BadIndex.to_string()),
            },
            (None, Some(f)) => PortalRequest::Download(LogRequest::Name(f.to_string())),
            (None, None) => PortalRequest::Invalid(400, DownloadError::MissingName.to_string()),
        },
        (Method::Post, "/save") => {
            let parsed = if body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
                SettingsUpdate::from_json(body)
            } else {
                SettingsUpdate::from_form(&parse_form(&String::from_utf8_lossy(body)))
            };
            match parsed {
                Ok(update) => PortalRequest::Apply(update),
                Err(e) => PortalRequest::Invalid(400, e.to_string()),
            }
        }
        _ => return None,
    };
    Some(req)
}
