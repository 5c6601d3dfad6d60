//! HTTP configuration portal adapter.
//!
//! The HTTP server runs its handlers on its own task, but the controller
//! is single-threaded.  Handlers therefore only parse: each request is
//! routed to a [`PortalRequest`], queued as a [`PortalJob`] on a bounded
//! `embassy-sync` channel, and the handler waits on the job's reply
//! signal until the main loop has run it through
//! [`DashboardController::serve_portal`](crate::app::service::DashboardController::serve_portal).
//!
//! ```text
//!  httpd task                             main loop
//!  ──────────                             ─────────
//!  route() ──▶ PortalJob ──[Channel]──▶ PortalQueue::serve(..)
//!     ▲                                       │
//!     └──────[Signal]── PortalResponse ◀──────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{debug, warn};

use crate::portal::{Method, PortalRequest, PortalResponse, route};

/// Requests waiting for the main loop.
const QUEUE_DEPTH: usize = 4;

/// How long a handler waits for the main loop before answering 503.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handler sleep between reply checks.
const REPLY_POLL: Duration = Duration::from_millis(1);

type ReplySlot = Signal<CriticalSectionRawMutex, PortalResponse>;
type JobChannel = Channel<CriticalSectionRawMutex, PortalJob, QUEUE_DEPTH>;

/// One routed request and the slot its answer goes back in.
pub struct PortalJob {
    pub request: PortalRequest,
    reply: Arc<ReplySlot>,
}

/// Main-loop end of the queue.
pub struct PortalQueue {
    jobs: Arc<JobChannel>,
}

/// Handler end of the queue.  Cheap to clone into every handler.
#[derive(Clone)]
pub struct PortalClient {
    jobs: Arc<JobChannel>,
}

pub fn portal_channel() -> (PortalClient, PortalQueue) {
    let jobs = Arc::new(JobChannel::new());
    (PortalClient { jobs: Arc::clone(&jobs) }, PortalQueue { jobs })
}

impl PortalQueue {
    /// Run every queued job through `serve`.  Never blocks.  Returns the
    /// number of jobs answered.
    pub fn serve(&self, mut serve: impl FnMut(PortalRequest) -> PortalResponse) -> usize {
        let mut n = 0;
        while let Ok(job) = self.jobs.try_receive() {
            let response = serve(job.request);
            // Only the queue still holds the slot once the handler timed out.
            if Arc::strong_count(&job.reply) == 1 {
                debug!("PORTAL: client left before reply");
            }
            job.reply.signal(response);
            n += 1;
        }
        n
    }
}

impl PortalClient {
    /// Route a raw request and wait for the main loop to answer it.
    pub fn call(&self, method: Method, uri: &str, body: &[u8]) -> PortalResponse {
        let Some(request) = route(method, uri, body) else {
            return PortalResponse::text(404, "Not found");
        };
        if let PortalRequest::Invalid(status, message) = request {
            return PortalResponse::text(status, &message);
        }
        self.submit(request, REPLY_TIMEOUT)
    }

    /// Queue an already-routed request.
    pub fn submit(&self, request: PortalRequest, timeout: Duration) -> PortalResponse {
        let reply = Arc::new(ReplySlot::new());
        let job = PortalJob {
            request,
            reply: Arc::clone(&reply),
        };
        if self.jobs.try_send(job).is_err() {
            warn!("PORTAL: queue full, request dropped");
            return PortalResponse::text(503, "Busy");
        }

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(response) = reply.try_take() {
                return response;
            }
            if Instant::now() >= deadline {
                warn!("PORTAL: main loop did not answer within {:?}", timeout);
                return PortalResponse::text(503, "Busy");
            }
            std::thread::sleep(REPLY_POLL);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF HTTP server
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use server::HttpPortal;

#[cfg(target_os = "espidf")]
mod server {
    use esp_idf_svc::http::Headers as _;
    use esp_idf_svc::http::Method as HttpMethod;
    use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
    use esp_idf_svc::io::{Read, Write};
    use log::info;

    use super::PortalClient;
    use crate::error::{Error, Result};
    use crate::portal::{Method, PortalResponse};

    /// Largest accepted POST body.
    const MAX_BODY: usize = 2048;

    pub struct HttpPortal {
        _server: EspHttpServer<'static>,
    }

    type HandlerResult = core::result::Result<(), esp_idf_svc::io::EspIOError>;

    fn forward(client: &PortalClient, method: Method, mut req: Request<&mut EspHttpConnection<'_>>) -> HandlerResult {
        let uri = req.uri().to_string();
        let mut body = Vec::new();
        if method == Method::Post {
            let len = req.content_len().unwrap_or(0).min(MAX_BODY as u64) as usize;
            body.resize(len, 0);
            let mut read = 0;
            while read < len {
                match req.read(&mut body[read..])? {
                    0 => break,
                    n => read += n,
                }
            }
            body.truncate(read);
        }

        let response = client.call(method, &uri, &body);
        send(req, &response)
    }

    fn send(req: Request<&mut EspHttpConnection<'_>>, response: &PortalResponse) -> HandlerResult {
        let disposition = response
            .attachment
            .as_ref()
            .map(|name| format!("attachment; filename=\"{}\"", name));
        let mut headers: Vec<(&str, &str)> = vec![("Content-Type", response.content_type)];
        if let Some(location) = response.location {
            headers.push(("Location", location));
        }
        if let Some(d) = disposition.as_deref() {
            headers.push(("Content-Disposition", d));
        }
        let mut resp = req.into_response(response.status, None, &headers)?;
        resp.write_all(&response.body)?;
        Ok(())
    }

    impl HttpPortal {
        /// Start the server and register every portal route.
        pub fn start(client: PortalClient) -> Result<Self> {
            let mut server = EspHttpServer::new(&Configuration::default()).map_err(|_| Error::Init("http server"))?;

            let gets = ["/", "/settings", "/rec", "/download", "/downloadLatest", "/logs"];
            for path in gets {
                let c = client.clone();
                server
                    .fn_handler(path, HttpMethod::Get, move |req| forward(&c, Method::Get, req))
                    .map_err(|_| Error::Init("http route"))?;
            }
            let c = client.clone();
            server
                .fn_handler("/save", HttpMethod::Post, move |req| forward(&c, Method::Post, req))
                .map_err(|_| Error::Init("http route"))?;
            server
                .fn_handler("/reboot", HttpMethod::Get, |req| -> HandlerResult {
                    req.into_ok_response()?.write_all(b"Rebooting...")?;
                    esp_idf_svc::hal::delay::FreeRtos::delay_ms(200);
                    esp_idf_svc::hal::reset::restart();
                })
                .map_err(|_| Error::Init("http route"))?;

            info!("HttpPortal: listening on :80");
            Ok(Self { _server: server })
        }
    }
}
