//! Fuzz target: portal request routing
//!
//! Feeds arbitrary URIs and bodies to `route()`.  Routing must never panic,
//! any download name it accepts must resolve to a path on the card with no
//! parent-directory component, and any settings update it accepts must
//! leave every warning window ordered.
//!
//! cargo fuzz run fuzz_portal_route

#![no_main]

use libfuzzer_sys::fuzz_target;
use espdash::config::{Channel, DashSettings};
use espdash::portal::{Method, PortalRequest, resolve_log_path, route};

fuzz_target!(|data: &[u8]| {
    let Some((&sel, rest)) = data.split_first() else {
        return;
    };
    let split = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    let uri = String::from_utf8_lossy(&rest[..split]);
    let body = rest.get(split + 1..).unwrap_or(&[]);
    let method = if sel & 1 == 0 { Method::Get } else { Method::Post };

    match route(method, &uri, body) {
        Some(PortalRequest::Download(req)) => {
            if let Ok(path) = resolve_log_path(&req) {
                assert!(path.starts_with('/'));
                assert!(!path.contains(".."));
            }
        }
        Some(PortalRequest::Apply(update)) => {
            let mut settings = DashSettings::default();
            update.apply_to(&mut settings);
            for ch in Channel::ALL {
                let e = settings.thresholds.entry(ch);
                assert!(e.min() <= e.max());
            }
        }
        _ => {}
    }
});
