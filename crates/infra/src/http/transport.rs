use std::time::Duration;

use async_trait::async_trait;
use hubwire_domain::{Headers, HttpMethod, MultipartForm, RequestBody};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Method};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// One network round trip, as handed to a [`Transport`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: Url,
    /// Lowercase header names
    pub headers: Headers,
    pub body: Option<RequestBody>,
}

/// Raw response: status, lowercase headers and the unparsed body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Response with a status and body and no headers
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Headers::new(), body: body.into() }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Failure before a complete response was received
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The underlying client gave up waiting
    #[error("transport timed out")]
    Timeout,

    /// The attempt's cancellation token fired
    #[error("request aborted")]
    Aborted,

    /// Connection, DNS, TLS or body read failure
    #[error("network error: {0}")]
    Network(String),

    /// The request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A single HTTP exchange
///
/// Implementations must stop work and return [`TransportError::Aborted`]
/// once `cancel` fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`
///
/// Retries and per-attempt timeouts belong to the executor; this type makes
/// exactly one round trip per call.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    fn build_request(
        &self,
        request: TransportRequest,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let mut builder = self.client.request(method, request.url);

        let multipart = matches!(request.body, Some(RequestBody::Multipart(_)));
        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            if multipart && name == "content-type" {
                continue;
            }
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("header '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(format!("header '{name}': {e}")))?;
            headers.insert(name, value);
        }
        builder = builder.headers(headers);

        builder = match request.body {
            None => builder,
            Some(RequestBody::Json(value)) => {
                let bytes = serde_json::to_vec(&value)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                builder.body(bytes)
            }
            Some(RequestBody::Text(text)) => builder.body(text),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes),
            Some(RequestBody::Multipart(form)) => builder.multipart(multipart_form(form)?),
        };
        Ok(builder)
    }
}

fn multipart_form(form: MultipartForm) -> Result<Form, TransportError> {
    let mut multipart = Form::new();
    for (name, value) in form.fields {
        multipart = multipart.text(name, value);
    }
    for file in form.files {
        let content_type =
            file.content_type.unwrap_or_else(|| "application/octet-stream".to_string());
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&content_type)
            .map_err(|e| TransportError::InvalidRequest(format!("content type: {e}")))?;
        multipart = multipart.part(file.field_name, part);
    }
    Ok(multipart)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        let method = request.method;
        let url = request.url.clone();
        let builder = self.build_request(request)?;
        debug!(%method, %url, "sending HTTP request");

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(TransportResponse { status, headers, body })
        };

        tokio::select! {
            () = cancel.cancelled() => {
                debug!(%method, %url, "HTTP request aborted");
                Err(TransportError::Aborted)
            }
            result = exchange => {
                let response = result.map_err(TransportError::from)?;
                debug!(%method, %url, status = response.status, "received HTTP response");
                Ok(response)
            }
        }
    }
}

fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    connect_timeout: Duration,
    user_agent: Option<String>,
    accept_invalid_certs: bool,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10), user_agent: None, accept_invalid_certs: false }
    }
}

impl ReqwestTransportBuilder {
    /// TCP/TLS connect timeout (default 10s)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `User-Agent` sent with every request
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Test-only helper to allow insecure TLS (e.g., self-signed certs).
    #[cfg(test)]
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    /// Build the transport
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] when reqwest rejects the
    /// client settings.
    pub fn build(self) -> Result<ReqwestTransport, TransportError> {
        let mut builder = ReqwestClient::builder().connect_timeout(self.connect_timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(TransportError::from)?;
        Ok(ReqwestTransport { client })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use hubwire_domain::FilePart;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::builder().user_agent("hubwire-test").build().expect("transport")
    }

    fn request(method: HttpMethod, url: &str) -> TransportRequest {
        TransportRequest {
            method,
            url: Url::parse(url).expect("url"),
            headers: Headers::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn sends_json_body_and_collects_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bookings"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "serviceId": 7 })))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Request-Id", "req-42")
                    .set_body_string("created"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(HttpMethod::Post, &format!("{}/bookings", server.uri()));
        req.headers.insert("content-type".into(), "application/json".into());
        req.body = Some(RequestBody::Json(json!({ "serviceId": 7 })));

        let response = transport().send(req, CancellationToken::new()).await.expect("response");
        assert_eq!(response.status, 201);
        assert_eq!(response.header("x-request-id"), Some("req-42"));
        assert_eq!(response.body, b"created");
    }

    #[tokio::test]
    async fn multipart_sets_its_own_boundary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut req = request(HttpMethod::Post, &format!("{}/upload", server.uri()));
        req.headers.insert("content-type".into(), "application/json".into());
        req.body = Some(RequestBody::Multipart(
            MultipartForm::new()
                .text("description", "before")
                .file(FilePart::new("photo", "a.png", vec![1, 2, 3]).with_content_type("image/png")),
        ));

        transport().send(req, CancellationToken::new()).await.expect("response");

        let received = server.received_requests().await.unwrap();
        let content_type = received[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8_lossy(&received[0].body);
        assert!(body.contains("name=\"description\""));
        assert!(body.contains("filename=\"a.png\""));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = transport().send(request(HttpMethod::Get, &server.uri()), cancel).await;
        assert_eq!(result, Err(TransportError::Aborted));
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let result = transport()
            .send(request(HttpMethod::Get, &format!("http://{addr}")), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TransportError::Network(_))), "got {result:?}");
    }

    #[test]
    fn invalid_header_is_rejected() {
        let mut req = request(HttpMethod::Get, "http://localhost/");
        req.headers.insert("bad header".into(), "x".into());
        let err = transport().build_request(req).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
