// crates/autoconf-client/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Scripted local HTTP server and document fixtures.
// Purpose: Drive the autoconf client against deterministic HTTP responses.
// Dependencies: tiny_http, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! [`MockServer`] answers requests from a script of [`Reply`] values, repeating
//! the last one once the script is exhausted, and records the conditional
//! headers of every request it receives.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Cursor;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tiny_http::Header;
use tiny_http::Request;
use tiny_http::Response;
use tiny_http::Server;
use tiny_http::StatusCode;

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Returns a minimal valid document with the given version.
#[must_use]
pub fn document(version: i64) -> Vec<u8> {
    format!(
        r#"{{
  "AutoConfVersion": {version},
  "AutoConfSchema": 1,
  "AutoConfTTL": 0,
  "SystemRegistry": {{
    "AminoDHT": {{
      "NativeConfig": {{
        "Bootstrap": ["/dnsaddr/bootstrap.libp2p.io/p2p/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN"]
      }}
    }}
  }},
  "DNSResolvers": {{ "eth.": ["https://dns.eth.limo/dns-query"] }}
}}"#
    )
    .into_bytes()
}

// ============================================================================
// SECTION: Replies
// ============================================================================

/// One scripted HTTP reply.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
    /// `ETag` header value.
    pub etag: Option<String>,
    /// `Last-Modified` header value.
    pub last_modified: Option<String>,
    /// Sends the body with chunked encoding instead of `Content-Length`.
    pub chunked: bool,
    /// Delay before responding.
    pub delay: Duration,
}

impl Reply {
    /// A 200 reply carrying `body`.
    #[must_use]
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            etag: None,
            last_modified: None,
            chunked: false,
            delay: Duration::ZERO,
        }
    }

    /// A reply with `status` and an empty body.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok(Vec::new())
        }
    }

    /// A 304 reply.
    #[must_use]
    pub fn not_modified() -> Self {
        Self::status(304)
    }

    /// Adds an `ETag` header.
    #[must_use]
    pub fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.to_string());
        self
    }

    /// Adds a `Last-Modified` header.
    #[must_use]
    pub fn with_last_modified(mut self, value: &str) -> Self {
        self.last_modified = Some(value.to_string());
        self
    }

    /// Sends the body with chunked transfer encoding.
    #[must_use]
    pub const fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    /// Waits `delay` before responding.
    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Converts the reply into a `tiny_http` response.
    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let mut headers = Vec::new();
        if let Some(etag) = &self.etag {
            headers.push(Header::from_bytes(&b"ETag"[..], etag.as_bytes()).unwrap());
        }
        if let Some(value) = &self.last_modified {
            headers.push(Header::from_bytes(&b"Last-Modified"[..], value.as_bytes()).unwrap());
        }
        let length = if self.chunked { None } else { Some(self.body.len()) };
        Response::new(StatusCode(self.status), headers, Cursor::new(self.body), length, None)
    }
}

// ============================================================================
// SECTION: Mock Server
// ============================================================================

/// Conditional headers observed on one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedRequest {
    /// `If-None-Match` header.
    pub if_none_match: Option<String>,
    /// `If-Modified-Since` header.
    pub if_modified_since: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

/// Local HTTP server replaying a script.
pub struct MockServer {
    /// Autoconf URL served by this server.
    url: String,
    /// Underlying server, shared with the worker thread.
    server: Arc<Server>,
    /// Requests seen so far.
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Worker thread.
    handle: Option<thread::JoinHandle<()>>,
}

impl MockServer {
    /// Starts a server on an ephemeral port answering with `script`.
    #[must_use]
    pub fn start(script: Vec<Reply>) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let url = format!("http://{addr}/autoconf.json");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let worker_server = Arc::clone(&server);
        let worker_requests = Arc::clone(&requests);
        let handle = thread::spawn(move || {
            let mut script = script.into_iter();
            let mut last = Reply::status(500);
            for request in worker_server.incoming_requests() {
                if let Some(next) = script.next() {
                    last = next;
                }
                worker_requests.lock().unwrap().push(record(&request));
                let reply = last.clone();
                if !reply.delay.is_zero() {
                    thread::sleep(reply.delay);
                }
                let _ = request.respond(reply.into_response());
            }
        });

        Self {
            url,
            server,
            requests,
            handle: Some(handle),
        }
    }

    /// Returns the autoconf URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns the number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Extracts the headers the tests assert on.
fn record(request: &Request) -> RecordedRequest {
    let header = |name: &'static str| {
        request
            .headers()
            .iter()
            .find(|header| header.field.equiv(name))
            .map(|header| header.value.as_str().to_string())
    };
    RecordedRequest {
        if_none_match: header("If-None-Match"),
        if_modified_since: header("If-Modified-Since"),
        user_agent: header("User-Agent"),
    }
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Routes client logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}

// ============================================================================
// SECTION: Waiting
// ============================================================================

/// Polls `condition` every 10 ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
