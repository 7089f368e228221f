// Device API HTTP client
//
// Wraps `reqwest::Client` with base-path URL construction and response
// normalisation. Every outcome is folded into `Result<Value, Error>`:
// 2xx with a JSON body is the value, 2xx with an empty body is an ack
// (`Value::Null`), anything else lands in the error taxonomy.

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::{Method, Request, Transport, TransportConfig};

/// Longest body excerpt kept in `Error::Http`.
const ERROR_BODY_PREVIEW: usize = 512;

/// Raw HTTP client for the device's local API.
///
/// `base_url` is the API root, e.g. `http://192.168.1.1/api/`. Request paths
/// are joined onto it, so a trailing slash is added if missing.
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl DeviceClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base(base_url),
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            timeout_secs: 0,
        }
    }

    /// Parse `base` and build a client with default transport settings.
    pub fn from_str_url(base: &str, transport: &TransportConfig) -> Result<Self, Error> {
        Self::new(Url::parse(base)?, transport)
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the full URL for a request path relative to the API base.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Send one request and normalise the response.
    pub async fn send(&self, request: Request) -> Result<Value, Error> {
        let mut url = self.endpoint_url(&request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        debug!(method = %request.method, %url, "device request");

        let builder = match request.method {
            Method::Get => self.http.get(url.clone()),
            Method::Post => self.http.post(url.clone()),
            Method::Put => self.http.put(url.clone()),
            Method::Delete => self.http.delete(url.clone()),
        };
        let builder = match request.body {
            Some(ref body) => builder.json(body),
            None => builder,
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&e, url.as_str(), self.timeout_secs))?;

        self.parse_response(resp, &url).await
    }

    /// Fold status + body into the uniform result shape.
    async fn parse_response(&self, resp: reqwest::Response, url: &Url) -> Result<Value, Error> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(&e, url.as_str(), self.timeout_secs))?;

        if !status.is_success() {
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(Error::Http {
                status: status.as_u16(),
                body: preview,
            });
        }

        if body.trim().is_empty() {
            trace!(%url, "empty body, treating as ack");
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| Error::Malformed {
            message: e.to_string(),
            body,
        })
    }
}

impl Transport for DeviceClient {
    fn request(&self, request: Request) -> BoxFuture<'_, Result<Value, Error>> {
        Box::pin(self.send(request))
    }
}

fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
