// HTTP transport: the one place that talks to the network. The release
// client builds `ApiRequest`s and interprets `ApiResponse`s; everything in
// between lives behind the `Transport` trait so the client can be driven
// by a stub in tests.

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::Result;

pub const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully resolved request. Credentials travel with every request
/// because the service expects Basic auth on each call.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub user: String,
    pub password: SecretString,
    pub accept: &'static str,
    pub content_type: Option<String>,
    pub body: Option<Vec<u8>>,
}

/// Raw status and body. Whether the status counts as success is up to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Perform the request. Only network-level failures are errors.
    fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Blocking reqwest transport with the library's default timeouts.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // The hosting API refuses requests without a User-Agent.
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        debug!(method = %method, url = %request.url, "sending request");

        let mut builder = self
            .client
            .request(method, &request.url)
            .basic_auth(&request.user, Some(request.password.expose_secret()))
            .header(ACCEPT, request.accept);
        if let Some(content_type) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let res = builder.send()?;
        let status = res.status().as_u16();
        let body = res.text()?;
        debug!(status, "received response");
        Ok(ApiResponse { status, body })
    }
}
